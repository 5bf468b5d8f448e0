//! Elementary mathematical entities (scalars, vectors, matrices, rotations).

/// The scalar type used by the solver.
///
/// The Dantzig solver pivots on raw residual signs, so it is run in double
/// precision unconditionally.
pub type Real = f64;

/// A 3D vector.
pub type Vector = na::Vector3<Real>;

/// A 3×3 matrix.
pub type Matrix = na::Matrix3<Real>;

/// A rotation expressed as a unit quaternion.
pub type Rotation = na::UnitQuaternion<Real>;

/// A (not necessarily unit) quaternion.
pub type Quaternion = na::Quaternion<Real>;

/// The number of degrees of freedom of a free rigid body (3 linear + 3
/// angular).
pub const SPATIAL_DIM: usize = 6;
