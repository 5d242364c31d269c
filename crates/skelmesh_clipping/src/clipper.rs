//! The clip region state machine and triangle clipping.

use glam::{Vec2, Vec4};
use tracing::{debug, trace};

use crate::triangulator::Triangulator;

/// Whether a clip region is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipState {
    /// No clip region.
    #[default]
    Idle,
    /// A clip region opened by a clipping attachment is active.
    Clipping {
        /// Slot holding the clipping attachment.
        source_slot: usize,
        /// Slot after which the region closes, if any.
        end_slot: Option<usize>,
    },
}

/// Clips attachment triangles against the active clip polygon.
///
/// One clipper serves one skeleton. The owner calls [`SkeletonClipper::clip_start`] when a
/// clipping attachment is reached in draw order, [`SkeletonClipper::clip_end_with_slot`] after each
/// slot, and [`SkeletonClipper::clip_end`] when the pass is over.
#[derive(Debug, Default, Clone)]
pub struct SkeletonClipper {
    state: ClipState,
    triangulator: Triangulator,
    clipping_polygon: Vec<Vec2>,
    clipping_polygons: Vec<Vec<Vec2>>,
    clip_output: Vec<Vec2>,
    scratch: Vec<Vec2>,
    clipped_vertices: Vec<Vec2>,
    clipped_uvs: Vec<Vec2>,
    clipped_colors: Vec<Vec4>,
    clipped_triangles: Vec<u32>,
    unterminated_clips: usize,
}

impl SkeletonClipper {
    /// Create an idle clipper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ClipState {
        self.state
    }

    /// Whether a clip region is active. Callers must skip [`SkeletonClipper::clip_triangles`] when
    /// this is false.
    pub fn is_clipping(&self) -> bool {
        matches!(self.state, ClipState::Clipping { .. })
    }

    /// Number of passes that ended with a clip region whose end slot was never reached.
    pub fn unterminated_clips(&self) -> usize {
        self.unterminated_clips
    }

    /// The world space clip polygon in clockwise order, empty when idle.
    pub fn clipping_polygon(&self) -> &[Vec2] {
        &self.clipping_polygon
    }

    /// The convex pieces the clip polygon was split into.
    pub fn convex_polygons(&self) -> &[Vec<Vec2>] {
        &self.clipping_polygons
    }

    /// Open a clip region from a world space polygon of either winding.
    ///
    /// An already active region is replaced. Returns the number of convex pieces, zero if the
    /// polygon is degenerate, in which case the clipper stays idle.
    pub fn clip_start(&mut self, source_slot: usize, end_slot: Option<usize>, polygon: &[Vec2]) -> usize {
        if let ClipState::Clipping { source_slot: previous, .. } = self.state {
            trace!(previous, source_slot, "Replacing active clip region");
            self.reset_region();
        }
        if polygon.len() < 3 {
            debug!(source_slot, vertices = polygon.len(), "Ignoring degenerate clip polygon");
            return 0;
        }

        self.clipping_polygon.clear();
        self.clipping_polygon.extend_from_slice(polygon);
        make_clockwise(&mut self.clipping_polygon);

        let triangles = self.triangulator.triangulate(&self.clipping_polygon).to_vec();
        let pieces = self.triangulator.decompose(&self.clipping_polygon, &triangles);
        self.clipping_polygons.clear();
        self.clipping_polygons.extend(pieces.iter().cloned());
        for piece in &mut self.clipping_polygons {
            make_clockwise(piece);
        }

        self.state = ClipState::Clipping {
            source_slot,
            end_slot,
        };
        trace!(source_slot, ?end_slot, pieces = self.clipping_polygons.len(), "Clip start");
        self.clipping_polygons.len()
    }

    /// Close the region if `slot` is its end slot.
    pub fn clip_end_with_slot(&mut self, slot: usize) {
        if let ClipState::Clipping {
            end_slot: Some(end),
            ..
        } = self.state
        {
            if end == slot {
                trace!(slot, "Clip end");
                self.reset_region();
            }
        }
    }

    /// Close any active region. Call once at the end of every pass.
    pub fn clip_end(&mut self) {
        if let ClipState::Clipping {
            source_slot,
            end_slot: Some(end_slot),
        } = self.state
        {
            self.unterminated_clips += 1;
            debug!(source_slot, end_slot, "Clip region end slot was never reached");
        }
        self.reset_region();
    }

    /// Close any active region without counting it as unterminated.
    pub fn reset(&mut self) {
        self.reset_region();
    }

    fn reset_region(&mut self) {
        self.state = ClipState::Idle;
        self.clipping_polygon.clear();
        self.clipping_polygons.clear();
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_colors.clear();
        self.clipped_triangles.clear();
    }

    /// Clip an indexed triangle list against the active region.
    ///
    /// `uvs` and `colors` are per vertex and interpolated onto new vertices. The result replaces
    /// the previous output. Does nothing but clear the output when idle.
    pub fn clip_triangles(
        &mut self,
        vertices: &[Vec2],
        triangles: &[u32],
        uvs: &[Vec2],
        colors: Option<&[Vec4]>,
    ) {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_colors.clear();
        self.clipped_triangles.clear();
        if !self.is_clipping() {
            return;
        }

        let color_at = |i: usize| colors.and_then(|c| c.get(i)).copied().unwrap_or(Vec4::ONE);
        let mut index = 0u32;
        for tri in triangles.chunks_exact(3) {
            let [i1, i2, i3] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (Some(&p1), Some(&p2), Some(&p3)) = (vertices.get(i1), vertices.get(i2), vertices.get(i3)) else {
                continue;
            };
            let uv = |i: usize| uvs.get(i).copied().unwrap_or(Vec2::ZERO);
            let (uv1, uv2, uv3) = (uv(i1), uv(i2), uv(i3));
            let (c1, c2, c3) = (color_at(i1), color_at(i2), color_at(i3));

            for piece in &self.clipping_polygons {
                if !clip(p1, p2, p3, piece, &mut self.clip_output, &mut self.scratch) {
                    // Entirely inside this piece, so no other piece can hold any of it.
                    self.clipped_vertices.extend([p1, p2, p3]);
                    self.clipped_uvs.extend([uv1, uv2, uv3]);
                    if colors.is_some() {
                        self.clipped_colors.extend([c1, c2, c3]);
                    }
                    self.clipped_triangles.extend([index, index + 1, index + 2]);
                    index += 3;
                    break;
                }
                if self.clip_output.is_empty() {
                    continue;
                }

                let d0 = p2.y - p3.y;
                let d1 = p3.x - p2.x;
                let d2 = p1.x - p3.x;
                let d4 = p3.y - p1.y;
                let denominator = d0 * d2 + d1 * (p1.y - p3.y);
                for &p in &self.clip_output {
                    let (a, b) = if denominator == 0.0 {
                        (1.0, 0.0)
                    } else {
                        let c0 = p.x - p3.x;
                        let c1 = p.y - p3.y;
                        (
                            (d0 * c0 + d1 * c1) / denominator,
                            (d4 * c0 + d2 * c1) / denominator,
                        )
                    };
                    let c = 1.0 - a - b;
                    self.clipped_vertices.push(p);
                    self.clipped_uvs.push(uv1 * a + uv2 * b + uv3 * c);
                    if colors.is_some() {
                        self.clipped_colors.push(c1 * a + c2 * b + c3 * c);
                    }
                }

                let count = self.clip_output.len() as u32;
                for ii in 1..count - 1 {
                    self.clipped_triangles.extend([index, index + ii, index + ii + 1]);
                }
                index += count;
            }
        }
    }

    /// Vertices produced by the last [`SkeletonClipper::clip_triangles`].
    pub fn clipped_vertices(&self) -> &[Vec2] {
        &self.clipped_vertices
    }

    /// UVs produced by the last [`SkeletonClipper::clip_triangles`].
    pub fn clipped_uvs(&self) -> &[Vec2] {
        &self.clipped_uvs
    }

    /// Colors produced by the last [`SkeletonClipper::clip_triangles`], empty if none were given.
    pub fn clipped_colors(&self) -> &[Vec4] {
        &self.clipped_colors
    }

    /// Triangle indices produced by the last [`SkeletonClipper::clip_triangles`].
    pub fn clipped_triangles(&self) -> &[u32] {
        &self.clipped_triangles
    }
}

/// Clip a triangle against a convex clockwise polygon with Sutherland-Hodgman.
///
/// Returns false when the triangle is entirely inside, leaving `output` untouched. Otherwise
/// `output` holds the clipped polygon, empty when nothing is left.
fn clip(
    p1: Vec2,
    p2: Vec2,
    p3: Vec2,
    area: &[Vec2],
    output: &mut Vec<Vec2>,
    scratch: &mut Vec<Vec2>,
) -> bool {
    let mut clipped = false;
    let mut input = std::mem::take(scratch);
    let mut out = std::mem::take(output);
    input.clear();
    input.extend([p1, p2, p3, p1]);
    out.clear();

    let n = area.len();
    for i in 0..n {
        let edge = area[i];
        let edge2 = area[(i + 1) % n];
        let delta = edge - edge2;
        let inside = |v: Vec2| delta.x * (v.y - edge2.y) - delta.y * (v.x - edge2.x) > 0.0;

        for pair in input.windows(2) {
            let (v1, v2) = (pair[0], pair[1]);
            let side2 = inside(v2);
            if inside(v1) {
                if side2 {
                    out.push(v2);
                    continue;
                }
                out.push(intersect(v1, v2, edge, edge2));
            } else if side2 {
                out.push(intersect(v1, v2, edge, edge2));
                out.push(v2);
            }
            clipped = true;
        }

        if out.is_empty() {
            input.clear();
            *scratch = input;
            *output = out;
            return true;
        }
        out.push(out[0]);
        if i + 1 < n {
            std::mem::swap(&mut input, &mut out);
            out.clear();
        }
    }

    // Drop the closing vertex.
    out.pop();
    *scratch = input;
    *output = out;
    clipped
}

/// Intersection of segment `v1..v2` with the line through `edge..edge2`.
fn intersect(v1: Vec2, v2: Vec2, edge: Vec2, edge2: Vec2) -> Vec2 {
    let c0 = v2.y - v1.y;
    let c2 = v2.x - v1.x;
    let s = c0 * (edge2.x - edge.x) - c2 * (edge2.y - edge.y);
    if s.abs() > 0.000001 {
        let ua = (c2 * (edge.y - v1.y) - c0 * (edge.x - v1.x)) / s;
        edge + (edge2 - edge) * ua
    } else {
        edge
    }
}

/// Reverse `polygon` in place unless it is already clockwise.
pub fn make_clockwise(polygon: &mut [Vec2]) {
    let n = polygon.len();
    let area: f32 = (0..n).map(|i| polygon[i].perp_dot(polygon[(i + 1) % n])).sum();
    if area < 0.0 {
        return;
    }
    polygon.reverse();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_clockwise_reverses_counter_clockwise() {
        let mut polygon = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        make_clockwise(&mut polygon);
        assert_eq!(polygon, [Vec2::Y, Vec2::ONE, Vec2::X, Vec2::ZERO]);

        let before = polygon;
        make_clockwise(&mut polygon);
        assert_eq!(polygon, before);
    }

    #[test]
    fn clip_edge_cases() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
        ];
        let (mut output, mut scratch) = (Vec::new(), Vec::new());

        let inside = clip(
            Vec2::new(0.5, 0.5),
            Vec2::new(0.5, 1.5),
            Vec2::new(1.5, 0.5),
            &square,
            &mut output,
            &mut scratch,
        );
        assert!(!inside);

        let outside = clip(
            Vec2::new(5.0, 5.0),
            Vec2::new(5.0, 6.0),
            Vec2::new(6.0, 5.0),
            &square,
            &mut output,
            &mut scratch,
        );
        assert!(outside);
        assert!(output.is_empty());

        let straddling = clip(
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 3.0),
            Vec2::new(3.0, 1.0),
            &square,
            &mut output,
            &mut scratch,
        );
        assert!(straddling);
        assert_eq!(output.len(), 4);
    }

    #[test]
    fn replacing_and_ending_regions() {
        let triangle = [Vec2::ZERO, Vec2::Y, Vec2::X];
        let mut clipper = SkeletonClipper::new();
        assert_eq!(clipper.clip_start(0, Some(2), &triangle), 1);
        assert!(clipper.is_clipping());

        clipper.clip_end_with_slot(1);
        assert!(clipper.is_clipping());

        assert_eq!(clipper.clip_start(3, None, &triangle), 1);
        assert_eq!(
            clipper.state(),
            ClipState::Clipping {
                source_slot: 3,
                end_slot: None
            }
        );
        clipper.clip_end_with_slot(2);
        assert!(clipper.is_clipping());
        clipper.clip_end();
        assert!(!clipper.is_clipping());
        assert_eq!(clipper.unterminated_clips(), 0);

        clipper.clip_start(0, Some(4), &triangle);
        clipper.clip_end();
        assert_eq!(clipper.unterminated_clips(), 1);

        assert_eq!(clipper.clip_start(0, None, &triangle[..2]), 0);
        assert!(!clipper.is_clipping());
    }
}
