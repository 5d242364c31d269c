//! Ear clipping triangulation and convex decomposition of simple polygons.

use glam::Vec2;

/// Reusable scratch state for triangulating clip polygons.
///
/// Polygons are expected to be simple and clockwise.
#[derive(Debug, Default, Clone)]
pub struct Triangulator {
    indices: Vec<usize>,
    is_concave: Vec<bool>,
    triangles: Vec<usize>,
    convex_polygons: Vec<Vec<Vec2>>,
    convex_indices: Vec<Vec<usize>>,
}

impl Triangulator {
    /// Create an empty triangulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a clockwise polygon into triangles, returned as a flat list of vertex indices.
    pub fn triangulate(&mut self, vertices: &[Vec2]) -> &[usize] {
        let mut vertex_count = vertices.len();
        self.triangles.clear();
        if vertex_count < 3 {
            return &self.triangles;
        }

        self.indices.clear();
        self.indices.extend(0..vertex_count);
        self.is_concave.clear();
        for i in 0..vertex_count {
            let concave = is_concave(i, vertex_count, vertices, &self.indices);
            self.is_concave.push(concave);
        }

        while vertex_count > 3 {
            let (mut previous, mut i, mut next) = (vertex_count - 1, 0, 1);
            loop {
                if !self.is_concave[i] && self.is_ear(previous, i, next, vertex_count, vertices) {
                    break;
                }
                if next == 0 {
                    // No ear found, fall back to the last convex vertex.
                    while i > 0 && self.is_concave[i] {
                        i -= 1;
                    }
                    break;
                }
                previous = i;
                i = next;
                next = (next + 1) % vertex_count;
            }

            self.triangles.extend([
                self.indices[(vertex_count + i - 1) % vertex_count],
                self.indices[i],
                self.indices[(i + 1) % vertex_count],
            ]);
            self.indices.remove(i);
            self.is_concave.remove(i);
            vertex_count -= 1;

            let previous_index = (vertex_count + i - 1) % vertex_count;
            let next_index = if i == vertex_count { 0 } else { i };
            self.is_concave[previous_index] =
                is_concave(previous_index, vertex_count, vertices, &self.indices);
            self.is_concave[next_index] =
                is_concave(next_index, vertex_count, vertices, &self.indices);
        }

        self.triangles
            .extend([self.indices[2], self.indices[0], self.indices[1]]);
        &self.triangles
    }

    /// Whether no concave vertex lies inside the triangle `previous, i, next`.
    fn is_ear(
        &self,
        previous: usize,
        i: usize,
        next: usize,
        vertex_count: usize,
        vertices: &[Vec2],
    ) -> bool {
        let p1 = vertices[self.indices[previous]];
        let p2 = vertices[self.indices[i]];
        let p3 = vertices[self.indices[next]];
        let mut ii = (next + 1) % vertex_count;
        while ii != previous {
            if self.is_concave[ii] {
                let v = vertices[self.indices[ii]];
                if positive_area(p3, p1, v) && positive_area(p1, p2, v) && positive_area(p2, p3, v) {
                    return false;
                }
            }
            ii = (ii + 1) % vertex_count;
        }
        true
    }

    /// Merge the triangles produced by [`Triangulator::triangulate`] into convex polygons.
    pub fn decompose(&mut self, vertices: &[Vec2], triangles: &[usize]) -> &[Vec<Vec2>] {
        let polygons = &mut self.convex_polygons;
        let polygon_indices = &mut self.convex_indices;
        polygons.clear();
        polygon_indices.clear();

        let mut polygon: Vec<Vec2> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut fan_base = None;
        let mut last_winding = 0;

        for tri in triangles.chunks_exact(3) {
            let (t1, t2, t3) = (tri[0], tri[1], tri[2]);
            let (p1, p2, p3) = (vertices[t1], vertices[t2], vertices[t3]);

            // Extend the current fan while it stays convex.
            let mut merged = false;
            if fan_base == Some(t1) {
                let o = polygon.len() - 2;
                let winding1 = winding(polygon[o], polygon[o + 1], p3);
                let winding2 = winding(p3, polygon[0], polygon[1]);
                if winding1 == last_winding && winding2 == last_winding {
                    polygon.push(p3);
                    indices.push(t3);
                    merged = true;
                }
            }

            if !merged {
                if !polygon.is_empty() {
                    polygons.push(std::mem::take(&mut polygon));
                    polygon_indices.push(std::mem::take(&mut indices));
                }
                polygon.extend([p1, p2, p3]);
                indices.extend([t1, t2, t3]);
                last_winding = winding(p1, p2, p3);
                fan_base = Some(t1);
            }
        }
        if !polygon.is_empty() {
            polygons.push(polygon);
            polygon_indices.push(indices);
        }

        // Absorb lone triangles that close the gap between a polygon's last and first vertex.
        for i in 0..polygons.len() {
            if polygon_indices[i].is_empty() {
                continue;
            }
            let first_index = polygon_indices[i][0];
            let mut last_index = polygon_indices[i][polygon_indices[i].len() - 1];
            let o = polygons[i].len() - 2;
            let mut prev_prev = polygons[i][o];
            let mut prev = polygons[i][o + 1];
            let first = polygons[i][0];
            let second = polygons[i][1];
            let winding0 = winding(prev_prev, prev, first);

            let mut ii = 0;
            while ii < polygons.len() {
                let other = &polygon_indices[ii];
                if ii == i
                    || other.len() != 3
                    || other[0] != first_index
                    || other[1] != last_index
                {
                    ii += 1;
                    continue;
                }
                let other_last = other[2];
                let p3 = polygons[ii][2];
                if winding(prev_prev, prev, p3) == winding0 && winding(p3, first, second) == winding0 {
                    polygons[ii].clear();
                    polygon_indices[ii].clear();
                    polygons[i].push(p3);
                    polygon_indices[i].push(other_last);
                    prev_prev = prev;
                    prev = p3;
                    last_index = other_last;
                    ii = 0;
                } else {
                    ii += 1;
                }
            }
        }

        polygons.retain(|p| !p.is_empty());
        polygon_indices.retain(|p| !p.is_empty());

        &self.convex_polygons
    }
}

fn is_concave(index: usize, vertex_count: usize, vertices: &[Vec2], indices: &[usize]) -> bool {
    let previous = vertices[indices[(vertex_count + index - 1) % vertex_count]];
    let current = vertices[indices[index]];
    let next = vertices[indices[(index + 1) % vertex_count]];
    !positive_area(previous, current, next)
}

/// True when `p1, p2, p3` turn clockwise or are collinear.
fn positive_area(p1: Vec2, p2: Vec2, p3: Vec2) -> bool {
    p1.x * (p3.y - p2.y) + p2.x * (p1.y - p3.y) + p3.x * (p2.y - p1.y) >= 0.0
}

fn winding(p1: Vec2, p2: Vec2, p3: Vec2) -> i32 {
    if (p2 - p1).perp_dot(p3 - p1) <= 0.0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(polygon: &[Vec2]) -> f32 {
        let n = polygon.len();
        (0..n)
            .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
            .sum::<f32>()
            .abs()
            * 0.5
    }

    // Clockwise L shape: a 2x2 square missing its top right quarter.
    fn l_shape() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(2.0, 0.0),
        ]
    }

    #[test]
    fn triangulates_convex_polygon() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
        ];
        let mut triangulator = Triangulator::new();
        let triangles = triangulator.triangulate(&square).to_vec();
        assert_eq!(triangles.len(), 6);

        let polygons = triangulator.decompose(&square, &triangles);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].len(), 4);
        assert!((area(&polygons[0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn triangulates_concave_polygon() {
        let shape = l_shape();
        let mut triangulator = Triangulator::new();
        let triangles = triangulator.triangulate(&shape).to_vec();
        assert_eq!(triangles.len(), (shape.len() - 2) * 3);

        let total: f32 = triangles
            .chunks_exact(3)
            .map(|t| area(&[shape[t[0]], shape[t[1]], shape[t[2]]]))
            .sum();
        assert!((total - 3.0).abs() < 1e-6);

        let polygons = triangulator.decompose(&shape, &triangles).to_vec();
        assert!(polygons.len() >= 2);
        let total: f32 = polygons.iter().map(|p| area(p)).sum();
        assert!((total - 3.0).abs() < 1e-6);
        for polygon in &polygons {
            let n = polygon.len();
            for i in 0..n {
                let turn = (polygon[(i + 1) % n] - polygon[i])
                    .perp_dot(polygon[(i + 2) % n] - polygon[(i + 1) % n]);
                assert!(turn <= 1e-6, "piece {polygon:?} is not convex");
            }
        }
    }

    #[test]
    fn degenerate_input() {
        let mut triangulator = Triangulator::new();
        assert!(triangulator.triangulate(&[Vec2::ZERO, Vec2::X]).is_empty());
        assert!(triangulator.decompose(&[], &[]).is_empty());
    }
}
