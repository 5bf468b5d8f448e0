//! # axle3d
//!
//! axle3d is a constraint-based rigid-body dynamics library. Given a set of
//! rigid bodies and the joints and contacts connecting them, it computes, once
//! per fixed timestep, the velocity update that satisfies every constraint
//! (joint limits, motors, contact friction cones) and integrates the bodies
//! forward.
//!
//! The solver is a direct one: each simulation island's constraints are
//! assembled into a dense mixed Linear Complementarity Problem which is solved
//! with the Dantzig pivoting algorithm, maintaining an incremental LDLᵀ
//! factorization of the active-constraint block. This gives hard,
//! non-drifting constraints at the cost of cubic worst-case work per island,
//! which is the usual trade for articulated figures and small piles.
//!
//! Collision detection is out of scope: contacts enter the solver through the
//! [`geometry::Contact`] record produced by whatever collision pipeline the
//! application uses.

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)] // the dense-matrix inner loops read better with indices.
#![allow(clippy::module_inception)]

pub extern crate nalgebra as na;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

pub mod data;
pub mod dynamics;
pub mod geometry;
pub mod linalg;
pub mod math;
pub mod utils;

/// The string version of axle3d.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude containing the common types defined by axle3d.
pub mod prelude {
    pub use crate::dynamics::*;
    pub use crate::geometry::*;
    pub use crate::math::*;
    pub use na::{vector, DMatrix, DVector};
}
