//! 2D tangent solving for normal mapped skeleton meshes.

use glam::{Vec2, Vec3, Vec4};

use crate::buffer::GrowBuffer;

/// Scratch space for [`solve_tangents_2d`].
#[derive(Debug, Clone, Default)]
pub struct TangentScratch {
    sdir: Vec<Vec2>,
    tdir: Vec<Vec2>,
}

/// Solve a tangent per vertex from positions, UVs and triangles.
///
/// Each triangle writes its tangent directions to its three vertices, so a vertex shared by
/// several triangles keeps the last one. `w` holds the handedness used to rebuild the binormal.
pub fn solve_tangents_2d<'a>(
    positions: &[Vec3],
    uvs: &[Vec2],
    triangle_lists: impl IntoIterator<Item = &'a [u32]>,
    scratch: &mut TangentScratch,
    tangents: &mut GrowBuffer<Vec4>,
) {
    let vertex_count = positions.len().min(uvs.len());
    scratch.sdir.clear();
    scratch.sdir.resize(vertex_count, Vec2::ZERO);
    scratch.tdir.clear();
    scratch.tdir.resize(vertex_count, Vec2::ZERO);

    for triangles in triangle_lists {
        for tri in triangles.chunks_exact(3) {
            let [i1, i2, i3] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i1.max(i2).max(i3) >= vertex_count {
                continue;
            }
            let (v1, v2, v3) = (positions[i1], positions[i2], positions[i3]);
            let (w1, w2, w3) = (uvs[i1], uvs[i2], uvs[i3]);

            let (x1, x2) = (v2.x - v1.x, v3.x - v1.x);
            let (y1, y2) = (v2.y - v1.y, v3.y - v1.y);
            let (s1, s2) = (w2.x - w1.x, w3.x - w1.x);
            let (t1, t2) = (w2.y - w1.y, w3.y - w1.y);

            let div = s1 * t2 - s2 * t1;
            let r = if div == 0.0 { 0.0 } else { 1.0 / div };
            let sdir = Vec2::new((t2 * x1 - t1 * x2) * r, (t2 * y1 - t1 * y2) * r);
            let tdir = Vec2::new((s1 * x2 - s2 * x1) * r, (s1 * y2 - s2 * y1) * r);
            for i in [i1, i2, i3] {
                scratch.sdir[i] = sdir;
                scratch.tdir[i] = tdir;
            }
        }
    }

    tangents.clear();
    for (&s, &t) in scratch.sdir.iter().zip(&scratch.tdir) {
        let length = s.length();
        let s = if length > 1e-5 { s / length } else { s };
        let w = if s.y * t.x > s.x * t.y { 1.0 } else { -1.0 };
        tangents.push(Vec4::new(s.x, s.y, 0.0, w));
    }
}
