//! Contact records produced by an external collision pipeline and consumed
//! by contact joints.

use crate::math::{Real, Vector};

bitflags::bitflags! {
    /// Flags selecting which optional terms of the contact surface model are
    /// active.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
    pub struct SurfaceFlags: u16 {
        /// Use `mu2` for the second friction direction instead of `mu`.
        const MU2       = 0x001;
        /// Use the user-supplied first friction direction `fdir1`.
        const FDIR1     = 0x002;
        /// Apply restitution when the approach speed exceeds `bounce_vel`.
        const BOUNCE    = 0x004;
        /// Override the world ERP with `soft_erp` on the normal row.
        const SOFT_ERP  = 0x008;
        /// Override the world CFM with `soft_cfm` on the normal row.
        const SOFT_CFM  = 0x010;
        /// Drive the first friction direction to the surface velocity
        /// `motion1`.
        const MOTION1   = 0x020;
        /// Drive the second friction direction to the surface velocity
        /// `motion2`.
        const MOTION2   = 0x040;
        /// Force-proportional slip on the first friction direction.
        const SLIP1     = 0x080;
        /// Force-proportional slip on the second friction direction.
        const SLIP2     = 0x100;
        /// Friction bounds of the first direction scale with the normal
        /// force (friction pyramid approximation).
        const APPROX1_1 = 0x200;
        /// Friction bounds of the second direction scale with the normal
        /// force.
        const APPROX1_2 = 0x400;
        /// Both friction directions scale with the normal force.
        const APPROX1   = 0x200 | 0x400;
    }
}

/// Parameters of the contact surface model.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SurfaceParams {
    /// Flags selecting the active optional terms.
    pub flags: SurfaceFlags,
    /// Coulomb friction coefficient, in `[0, +∞]`. `0` removes the friction
    /// rows entirely; `+∞` makes them hard equality constraints.
    pub mu: Real,
    /// Friction coefficient of the second direction, used when [`SurfaceFlags::MU2`]
    /// is set.
    pub mu2: Real,
    /// Restitution in `[0, 1]`.
    pub bounce: Real,
    /// Minimum approach speed for restitution to apply.
    pub bounce_vel: Real,
    /// Normal-row ERP override.
    pub soft_erp: Real,
    /// Normal-row CFM override.
    pub soft_cfm: Real,
    /// Surface velocity along the first friction direction.
    pub motion1: Real,
    /// Surface velocity along the second friction direction.
    pub motion2: Real,
    /// Force-proportional slip of the first friction direction.
    pub slip1: Real,
    /// Force-proportional slip of the second friction direction.
    pub slip2: Real,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            flags: SurfaceFlags::empty(),
            mu: 0.0,
            mu2: 0.0,
            bounce: 0.0,
            bounce_vel: 0.0,
            soft_erp: 0.0,
            soft_cfm: 0.0,
            motion1: 0.0,
            motion2: 0.0,
            slip1: 0.0,
            slip2: 0.0,
        }
    }
}

/// The geometric part of a contact: one point of the contact manifold
/// produced by collision detection.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactGeom {
    /// The contact point, in world space.
    pub pos: Vector,
    /// The unit contact normal, pointing towards the first attached body.
    pub normal: Vector,
    /// Penetration depth along the normal. Non-negative for touching
    /// geometries.
    pub depth: Real,
}

/// A full contact record: geometry plus surface response parameters.
///
/// A contact joint is created from one of these each step the pair stays in
/// contact; the record is copied into the joint and not referenced
/// afterwards.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Contact {
    /// Surface response parameters.
    pub surface: SurfaceParams,
    /// Contact point geometry.
    pub geom: ContactGeom,
    /// The first friction direction, used when [`SurfaceFlags::FDIR1`] is
    /// set. Must be a unit vector perpendicular to the normal.
    pub fdir1: Vector,
}

impl Contact {
    /// A frictionless contact at `pos` with the given `normal` and `depth`.
    pub fn frictionless(pos: Vector, normal: Vector, depth: Real) -> Self {
        Self {
            surface: SurfaceParams::default(),
            geom: ContactGeom { pos, normal, depth },
            fdir1: Vector::zeros(),
        }
    }
}
