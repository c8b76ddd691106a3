//! Planar predicates and vector helpers.

use nalgebra::{DVector, Vector2};

/// Even-odd ray casting test for a closed polygon given by its vertex loop.
///
/// The ray goes towards +x. Edges are treated half-open in y so a ray through a
/// vertex is counted once.
pub fn point_in_polygon(p: Vector2<f64>, poly: &[Vector2<f64>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut a = poly[n - 1];
    for &b in poly {
        if p.y > a.y.min(b.y) && p.y <= a.y.max(b.y) && p.x <= a.x.max(b.x) {
            let crosses = if a.x == b.x {
                true
            } else {
                // a.y != b.y here: p.y lies strictly inside the y-range of the edge
                let x_at = (p.y - a.y) * (b.x - a.x) / (b.y - a.y) + a.x;
                p.x <= x_at
            };
            if crosses {
                inside = !inside;
            }
        }
        a = b;
    }
    inside
}

/// Distance from `p` to the segment `[start, end]` and the nearest point on it.
///
/// A zero-length segment degenerates to the distance to `start`.
pub fn project_to_segment(
    p: Vector2<f64>,
    start: Vector2<f64>,
    end: Vector2<f64>,
) -> (f64, Vector2<f64>) {
    let seg = end - start;
    let len2 = seg.norm_squared();
    if len2 <= 0.0 {
        return ((p - start).norm(), start);
    }
    let t = ((p - start).dot(&seg) / len2).clamp(0.0, 1.0);
    let nearest = start + seg * t;
    ((p - nearest).norm(), nearest)
}

/// Unit vector in the direction of `v`, or `None` for a zero/non-finite vector.
pub fn unit_vector(v: &DVector<f64>) -> Option<DVector<f64>> {
    let norm = v.norm();
    if !norm.is_finite() || norm <= 0.0 {
        return None;
    }
    Some(v / norm)
}

/// Angle in radians in `[0, π]` between two vectors.
pub fn angle_between(a: &DVector<f64>, b: &DVector<f64>) -> Option<f64> {
    let ua = unit_vector(a)?;
    let ub = unit_vector(b)?;
    Some(ua.dot(&ub).clamp(-1.0, 1.0).acos())
}
