//! Geometry kernel: half-spaces, hulls and small planar helpers.
//!
//! Purpose
//! - Provide the pure, stateless primitives the BRS builder and the action
//!   enabler rely on: n-D half-spaces, V→H conversion, a 2D convex hull and a
//!   few planar predicates used for diagnostics.
//!
//! Conventions
//! - Half-spaces are closed, `n·x <= c`; membership uses `<= c + eps`.
//! - Points are `DVector<f64>` in n-D code and `Vector2<f64>` in planar code.
//! - Degenerate inputs (flat point sets, zero vectors) return `None` instead
//!   of panicking; callers decide how to fall back.

mod hull;
mod plane;
mod types;

pub use hull::{box_vertices, convex_hull_2d, dedup_points, halfspaces_from_points};
pub use plane::{angle_between, point_in_polygon, project_to_segment, unit_vector};
pub use types::{GeomCfg, Hs};

#[cfg(test)]
mod tests;
