use super::*;
use nalgebra::{dvector, vector, DVector, Vector2};

fn unit_square() -> Vec<Vector2<f64>> {
    vec![
        vector![0.0, 0.0],
        vector![1.0, 0.0],
        vector![1.0, 1.0],
        vector![0.0, 1.0],
    ]
}

#[test]
fn point_in_polygon_square_and_concave() {
    let sq = unit_square();
    assert!(point_in_polygon(vector![0.5, 0.5], &sq));
    assert!(!point_in_polygon(vector![1.5, 0.5], &sq));
    assert!(!point_in_polygon(vector![0.5, -0.1], &sq));
    // L-shape: the notch at the top right is outside
    let l = vec![
        vector![0.0, 0.0],
        vector![2.0, 0.0],
        vector![2.0, 1.0],
        vector![1.0, 1.0],
        vector![1.0, 2.0],
        vector![0.0, 2.0],
    ];
    assert!(point_in_polygon(vector![0.5, 1.5], &l));
    assert!(point_in_polygon(vector![1.5, 0.5], &l));
    assert!(!point_in_polygon(vector![1.5, 1.5], &l));
    // Degenerate loops are never "inside"
    assert!(!point_in_polygon(vector![0.0, 0.0], &sq[..2]));
}

#[test]
fn project_to_segment_clamps_to_endpoints() {
    let a = vector![0.0, 0.0];
    let b = vector![2.0, 0.0];
    let (d, q) = project_to_segment(vector![1.0, 1.0], a, b);
    assert!((d - 1.0).abs() < 1e-12);
    assert!((q - vector![1.0, 0.0]).norm() < 1e-12);
    let (d, q) = project_to_segment(vector![3.0, 0.0], a, b);
    assert!((d - 1.0).abs() < 1e-12);
    assert_eq!(q, b);
    // Zero-length segment
    let (d, q) = project_to_segment(vector![3.0, 4.0], a, a);
    assert!((d - 5.0).abs() < 1e-12);
    assert_eq!(q, a);
}

#[test]
fn unit_vectors_and_angles() {
    let u = unit_vector(&dvector![3.0, 4.0]).unwrap();
    assert!((u.norm() - 1.0).abs() < 1e-12);
    assert!(unit_vector(&DVector::zeros(3)).is_none());
    let ang = angle_between(&dvector![1.0, 0.0], &dvector![0.0, 2.0]).unwrap();
    assert!((ang - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    let par = angle_between(&dvector![1.0, 1.0], &dvector![2.0, 2.0]).unwrap();
    assert!(par.abs() < 1e-7);
    let anti = angle_between(&dvector![1.0, 0.0], &dvector![-1.0, 0.0]).unwrap();
    assert!((anti - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn hull_2d_drops_interior_and_collinear_points() {
    let mut pts = unit_square();
    pts.push(vector![0.5, 0.5]);
    pts.push(vector![0.5, 0.0]);
    pts.push(vector![1.0, 1.0]);
    let hull = convex_hull_2d(&pts).unwrap();
    assert_eq!(hull.len(), 4);
    // CCW: positive signed area
    let mut area2 = 0.0;
    for k in 0..hull.len() {
        let p = hull[k];
        let q = hull[(k + 1) % hull.len()];
        area2 += p.x * q.y - p.y * q.x;
    }
    assert!((area2 - 2.0).abs() < 1e-12);
    assert!(convex_hull_2d(&[vector![1.0, 1.0]]).is_none());
}

#[test]
fn box_vertices_product_order() {
    let v = box_vertices(&dvector![0.0, 10.0], &dvector![1.0, 20.0]);
    assert_eq!(v.len(), 4);
    assert_eq!(v[0], dvector![0.0, 10.0]);
    assert_eq!(v[1], dvector![0.0, 20.0]);
    assert_eq!(v[2], dvector![1.0, 10.0]);
    assert_eq!(v[3], dvector![1.0, 20.0]);
}

#[test]
fn dedup_points_merges_close_points() {
    let mut pts = vec![dvector![1.0, 0.0], dvector![0.0, 0.0], dvector![1.0, 1e-15]];
    dedup_points(&mut pts, 1e-12);
    assert_eq!(pts.len(), 2);
    assert_eq!(pts[0], dvector![0.0, 0.0]);
}

#[test]
fn halfspaces_of_square_and_cube_contain_exactly_the_box() {
    let cfg = GeomCfg::default();
    let sq: Vec<DVector<f64>> = box_vertices(&dvector![-1.0, -2.0], &dvector![1.0, 2.0]);
    let hs = halfspaces_from_points(&sq, cfg).unwrap();
    assert_eq!(hs.len(), 4);
    let inside = |p: &DVector<f64>, hs: &[Hs]| hs.iter().all(|h| h.satisfies_eps(p, 1e-9));
    assert!(inside(&dvector![0.9, 1.9], &hs));
    assert!(inside(&dvector![1.0, -2.0], &hs));
    assert!(!inside(&dvector![1.1, 0.0], &hs));

    let cube = box_vertices(&dvector![0.0, 0.0, 0.0], &dvector![1.0, 1.0, 1.0]);
    let hs3 = halfspaces_from_points(&cube, cfg).unwrap();
    assert_eq!(hs3.len(), 6);
    assert!(inside(&dvector![0.5, 0.5, 0.5], &hs3));
    assert!(!inside(&dvector![0.5, 0.5, 1.01], &hs3));
    for h in &hs3 {
        assert!((h.n.norm() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn halfspaces_reject_flat_point_sets() {
    let cfg = GeomCfg::default();
    let segment = vec![dvector![0.0, 0.0], dvector![1.0, 1.0], dvector![2.0, 2.0]];
    assert!(halfspaces_from_points(&segment, cfg).is_none());
    let square_in_3d = box_vertices(&dvector![0.0, 0.0], &dvector![1.0, 1.0])
        .into_iter()
        .map(|p| dvector![p[0], p[1], 0.0])
        .collect::<Vec<_>>();
    assert!(halfspaces_from_points(&square_in_3d, cfg).is_none());
    assert!(halfspaces_from_points(&[dvector![1.0], dvector![1.0]], cfg).is_none());
}

#[test]
fn halfspaces_respect_candidate_cap() {
    let cfg = GeomCfg {
        max_facet_candidates: 10,
        ..GeomCfg::default()
    };
    let cube = box_vertices(&dvector![0.0, 0.0, 0.0], &dvector![1.0, 1.0, 1.0]);
    // C(8, 3) = 56 > 10
    assert!(halfspaces_from_points(&cube, cfg).is_none());
}

#[test]
fn translated_halfspace_follows_shift() {
    let h = Hs::new(dvector![1.0, 0.0], 1.0);
    let t = h.translated(&dvector![2.0, 5.0]);
    assert!(t.satisfies_eps(&dvector![3.0, 0.0], 0.0));
    assert!(!t.satisfies_eps(&dvector![3.1, 0.0], 0.0));
}
