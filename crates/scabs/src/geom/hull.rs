//! Convex hulls and V→H conversion.
//!
//! - `convex_hull_2d`: Andrew's monotone chain, CCW, collinear points dropped.
//! - `halfspaces_from_points`: supporting hyperplanes of a full-dimensional
//!   point set. 1D and 2D use closed forms; higher dimensions enumerate
//!   `dim`-subsets (explicit and easy to audit; guarded by a candidate cap).

use std::collections::HashSet;

use nalgebra::{DMatrix, DVector, Vector2, SVD};

use super::types::{GeomCfg, Hs};

/// Andrew's monotone chain convex hull (returns hull in CCW order).
///
/// Returns `None` for fewer than two distinct points.
pub fn convex_hull_2d(points: &[Vector2<f64>]) -> Option<Vec<Vector2<f64>>> {
    if points.len() < 2 {
        return None;
    }
    let mut pts: Vec<_> = points.to_vec();
    pts.sort_by(|a, b| {
        match a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal),
            o => o,
        }
    });
    pts.dedup_by(|a, b| (*a - *b).norm() < 1e-12);
    if pts.len() < 2 {
        return None;
    }
    let mut lower: Vec<Vector2<f64>> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Vector2<f64>> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    Some(hull)
}

#[inline]
fn cross(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Remove near-duplicate points (lexicographic sort + tolerance dedup).
pub fn dedup_points(points: &mut Vec<DVector<f64>>, tol: f64) {
    points.sort_by(|a, b| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal))
            .find(|o| *o != std::cmp::Ordering::Equal)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    points.dedup_by(|a, b| (&*a - &*b).norm() < tol);
}

/// Vertices of the box `[lo, hi]` in `{0,1}^n` product order (first axis slowest).
pub fn box_vertices(lo: &DVector<f64>, hi: &DVector<f64>) -> Vec<DVector<f64>> {
    let n = lo.len();
    (0..1usize << n)
        .map(|bits| {
            DVector::from_iterator(
                n,
                (0..n).map(|d| {
                    if bits >> (n - 1 - d) & 1 == 1 {
                        hi[d]
                    } else {
                        lo[d]
                    }
                }),
            )
        })
        .collect()
}

/// Supporting half-spaces (unit outward normals) of the convex hull of `points`.
///
/// Returns `None` when the point set is not full-dimensional or when facet
/// enumeration would exceed `cfg.max_facet_candidates`; callers then fall back
/// to a V-representation method.
pub fn halfspaces_from_points(points: &[DVector<f64>], cfg: GeomCfg) -> Option<Vec<Hs>> {
    let dim = points.first()?.len();
    let mut pts = points.to_vec();
    dedup_points(&mut pts, cfg.eps_dedup.max(1e-12));
    match dim {
        0 => None,
        1 => {
            let lo = pts.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
            let hi = pts.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
            if hi - lo <= cfg.eps_rank {
                return None;
            }
            Some(vec![
                Hs::new(DVector::from_element(1, 1.0), hi),
                Hs::new(DVector::from_element(1, -1.0), -lo),
            ])
        }
        2 => {
            let planar: Vec<Vector2<f64>> = pts.iter().map(|p| Vector2::new(p[0], p[1])).collect();
            let hull = convex_hull_2d(&planar)?;
            if hull.len() < 3 {
                return None;
            }
            let mut hs = Vec::with_capacity(hull.len());
            for k in 0..hull.len() {
                let p = hull[k];
                let q = hull[(k + 1) % hull.len()];
                let edge = q - p;
                // For CCW hull order, outward normal is 90° CW: (edge.y, -edge.x)
                let n = Vector2::new(edge.y, -edge.x);
                let norm = n.norm();
                if norm <= 0.0 {
                    continue;
                }
                let n = n / norm;
                hs.push(Hs::new(DVector::from_column_slice(n.as_slice()), n.dot(&p)));
            }
            Some(hs)
        }
        _ => facets_by_enumeration(&pts, dim, cfg),
    }
}

fn facets_by_enumeration(pts: &[DVector<f64>], dim: usize, cfg: GeomCfg) -> Option<Vec<Hs>> {
    if pts.len() <= dim || binomial(pts.len() as u64, dim as u64) > cfg.max_facet_candidates {
        return None;
    }
    let p0 = &pts[0];
    let spread = DMatrix::from_fn(pts.len() - 1, dim, |i, j| pts[i + 1][j] - p0[j]);
    let scale = 1.0 + pts.iter().map(|p| p.amax()).fold(0.0, f64::max);
    if spread.rank(cfg.eps_rank * scale) < dim {
        return None;
    }
    let tol = cfg.eps_feas * scale;
    let mut seen: HashSet<Vec<i64>> = HashSet::new();
    let mut out = Vec::new();
    let mut comb: Vec<usize> = (0..dim).collect();
    loop {
        if let Some((n, c)) = hyperplane_through(pts, &comb, cfg.eps_rank * scale) {
            let mut on_pos = false;
            let mut on_neg = false;
            for x in pts {
                let d = n.dot(x) - c;
                on_pos |= d > tol;
                on_neg |= d < -tol;
                if on_pos && on_neg {
                    break;
                }
            }
            if !(on_pos && on_neg) {
                let (n, c) = if on_pos { (-n, -c) } else { (n, c) };
                let key: Vec<i64> = n
                    .iter()
                    .chain(std::iter::once(&c))
                    .map(|v| (v * 1e8).round() as i64)
                    .collect();
                if seen.insert(key) {
                    out.push(Hs::new(n, c));
                }
            }
        }
        if !next_combination(&mut comb, pts.len()) {
            break;
        }
    }
    if out.len() <= dim {
        return None;
    }
    Some(out)
}

/// Unit normal and offset of the hyperplane through `dim` points, if they span one.
fn hyperplane_through(pts: &[DVector<f64>], comb: &[usize], eps: f64) -> Option<(DVector<f64>, f64)> {
    let dim = comb.len();
    let base = &pts[comb[0]];
    // Pad with a zero row so the SVD returns a full right basis.
    let m = DMatrix::from_fn(dim, dim, |i, j| {
        if i + 1 < dim {
            pts[comb[i + 1]][j] - base[j]
        } else {
            0.0
        }
    });
    let svd = SVD::new(m, false, true);
    let vt = svd.v_t?;
    let s = &svd.singular_values;
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| s[a].partial_cmp(&s[b]).unwrap_or(std::cmp::Ordering::Equal));
    // Rank dim-1 required: exactly one vanishing singular value.
    if dim >= 2 && s[order[1]] <= eps {
        return None;
    }
    let n: DVector<f64> = vt.row(order[0]).transpose();
    let norm = n.norm();
    if norm <= 0.0 {
        return None;
    }
    let n = n / norm;
    let c = n.dot(base);
    Some((n, c))
}

fn next_combination(comb: &mut [usize], n: usize) -> bool {
    let k = comb.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if comb[i] < n - k + i {
            comb[i] += 1;
            for j in i + 1..k {
                comb[j] = comb[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

fn binomial(n: u64, k: u64) -> u64 {
    let k = k.min(n.saturating_sub(k));
    let mut acc: u64 = 1;
    for i in 0..k {
        acc = acc.saturating_mul(n - i) / (i + 1);
    }
    acc
}
