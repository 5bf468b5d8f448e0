//! Global parameters of the constraint solver.

use crate::math::Real;

/// Parameters controlling constraint stabilization and contact hardening for
/// every joint of a [`World`](crate::dynamics::World).
///
/// Individual joints can override `erp`/`cfm` on their limit and suspension
/// rows.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// The global Error Reduction Parameter: the fraction of positional
    /// constraint error corrected per step through the velocity-level right
    /// hand side (default: `0.2`).
    ///
    /// `1.0` attempts to correct all drift in a single step, which is rarely
    /// stable; values in `[0.1, 0.8]` are recommended.
    pub erp: Real,
    /// The global Constraint Force Mixing value added to the diagonal of the
    /// constraint system (default: `1.0e-10`).
    ///
    /// Larger values make constraints softer and the system better
    /// conditioned, at the price of visible constraint violation.
    pub cfm: Real,
    /// Maximum velocity the solver will impart to correct contact
    /// interpenetration (default: `+∞`).
    pub contact_max_correcting_vel: Real,
    /// Contact depth below which no correction is applied, letting surfaces
    /// rest slightly interpenetrated instead of jittering (default: `0.0`).
    pub contact_surface_layer: Real,
}

impl IntegrationParameters {
    /// The steps-per-second value corresponding to the timestep `h`.
    #[inline]
    pub fn fps(h: Real) -> Real {
        1.0 / h
    }
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            erp: 0.2,
            cfm: 1.0e-10,
            contact_max_correcting_vel: Real::INFINITY,
            contact_surface_layer: 0.0,
        }
    }
}
