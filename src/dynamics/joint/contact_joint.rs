//! The contact joint, synthesized each step from a collision contact.

use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow};
use crate::dynamics::{IntegrationParameters, RigidBodyHandle, RigidBodySet};
use crate::geometry::{Contact, SurfaceFlags};
use crate::math::{Real, Vector};
use crate::utils::orthonormal_basis;

/// A transient contact joint: a non-penetration row along the contact
/// normal, plus up to two friction rows on a plane-space basis of the
/// normal.
///
/// Contact joints are meant to be created into a joint group at the start of
/// a step and cleared after it; they hold no state beyond the contact record
/// itself.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactJoint {
    /// The contact record this joint was created from.
    pub contact: Contact,
}

impl ContactJoint {
    /// Creates a contact joint from a contact record.
    pub fn new(contact: Contact) -> Self {
        Self { contact }
    }

    pub(crate) fn info1(&self) -> ConstraintInfo1 {
        let surface = &self.contact.surface;
        let mu = surface.mu.max(0.0);

        // One normal row, plus one row per friction direction with a
        // non-zero coefficient.
        let mut m = 1;
        let mut nub = 0;
        if surface.flags.contains(SurfaceFlags::MU2) {
            if mu > 0.0 {
                m += 1;
                if mu == Real::INFINITY {
                    nub += 1;
                }
            }
            if surface.mu2 > 0.0 {
                m += 1;
                if surface.mu2 == Real::INFINITY {
                    nub += 1;
                }
            }
        } else if mu > 0.0 {
            m += 2;
            if mu == Real::INFINITY {
                // Both directions become equality constraints.
                nub += 2;
            }
        }

        ConstraintInfo1 { m, nub }
    }

    pub(crate) fn info2(
        &mut self,
        bodies: &mut RigidBodySet,
        h1: RigidBodyHandle,
        h2: Option<RigidBodyHandle>,
        reverse: bool,
        fps: Real,
        world: &IntegrationParameters,
        rows: &mut [ConstraintRow],
    ) {
        let b1 = bodies[h1].clone();
        let b2 = h2.map(|h| bodies[h].clone());
        let surface = &self.contact.surface;
        let geom = &self.contact.geom;
        let m = rows.len();

        // The record's normal points towards the first body named by the
        // contact; if attachment swapped the bodies, flip it.
        let normal = if reverse { -geom.normal } else { geom.normal };

        // Moment arms from each body's center of mass to the contact point.
        let c1 = geom.pos - b1.position;
        let c2 = b2.as_ref().map(|b2| geom.pos - b2.position);

        /*
         * Normal row.
         */
        rows[0].j1_linear = normal;
        rows[0].j1_angular = c1.cross(&normal);
        if let Some(c2) = c2 {
            rows[0].j2_linear = -normal;
            rows[0].j2_angular = -c2.cross(&normal);
        }

        let erp = if surface.flags.contains(SurfaceFlags::SOFT_ERP) {
            surface.soft_erp
        } else {
            world.erp
        };
        let depth = (geom.depth - world.contact_surface_layer).max(0.0);
        rows[0].rhs = (fps * erp * depth).min(world.contact_max_correcting_vel);
        if surface.flags.contains(SurfaceFlags::SOFT_CFM) {
            rows[0].cfm = surface.soft_cfm;
        }
        rows[0].lo = 0.0;
        rows[0].hi = Real::INFINITY;

        if surface.flags.contains(SurfaceFlags::BOUNCE) {
            // Outgoing contact velocity; negative while approaching.
            let mut outgoing =
                rows[0].j1_linear.dot(&b1.linvel) + rows[0].j1_angular.dot(&b1.angvel);
            if let Some(b2) = &b2 {
                outgoing += rows[0].j2_linear.dot(&b2.linvel) + rows[0].j2_angular.dot(&b2.angvel);
            }
            if outgoing < -surface.bounce_vel {
                let restitution = -surface.bounce * outgoing;
                if restitution > rows[0].rhs {
                    rows[0].rhs = restitution;
                }
            }
        }

        if m == 1 {
            return;
        }

        /*
         * Friction rows.
         */
        let (t1, t2) = if surface.flags.contains(SurfaceFlags::FDIR1) {
            let t1 = self.contact.fdir1;
            (t1, normal.cross(&t1))
        } else {
            let [t1, t2] = orthonormal_basis(&normal);
            (t1, t2)
        };

        let mu = surface.mu.max(0.0);
        let first_dir_present = !surface.flags.contains(SurfaceFlags::MU2) || mu > 0.0;
        let mut row = 1;

        if first_dir_present && mu > 0.0 {
            rows[row].j1_linear = t1;
            rows[row].j1_angular = c1.cross(&t1);
            if let Some(c2) = c2 {
                rows[row].j2_linear = -t1;
                rows[row].j2_angular = -c2.cross(&t1);
            }
            if surface.flags.contains(SurfaceFlags::MOTION1) {
                rows[row].rhs = surface.motion1;
            }
            if surface.flags.contains(SurfaceFlags::SLIP1) {
                rows[row].cfm = surface.slip1;
            }
            rows[row].lo = -mu;
            rows[row].hi = mu;
            if surface.flags.contains(SurfaceFlags::APPROX1_1) {
                // Bounds become a ratio on the normal force; the solver must
                // resolve the normal row first.
                rows[row].findex = Some(0);
            }
            row += 1;
        }

        let mu_second = if surface.flags.contains(SurfaceFlags::MU2) {
            surface.mu2
        } else {
            mu
        };
        if row < m && mu_second > 0.0 {
            rows[row].j1_linear = t2;
            rows[row].j1_angular = c1.cross(&t2);
            if let Some(c2) = c2 {
                rows[row].j2_linear = -t2;
                rows[row].j2_angular = -c2.cross(&t2);
            }
            if surface.flags.contains(SurfaceFlags::MOTION2) {
                rows[row].rhs = surface.motion2;
            }
            if surface.flags.contains(SurfaceFlags::SLIP2) {
                rows[row].cfm = surface.slip2;
            }
            rows[row].lo = -mu_second;
            rows[row].hi = mu_second;
            if surface.flags.contains(SurfaceFlags::APPROX1_2) {
                rows[row].findex = Some(0);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::SurfaceParams;

    fn contact_with_mu(mu: Real, flags: SurfaceFlags, mu2: Real) -> ContactJoint {
        ContactJoint::new(Contact {
            surface: SurfaceParams {
                flags,
                mu,
                mu2,
                ..SurfaceParams::default()
            },
            geom: crate::geometry::ContactGeom {
                pos: Vector::zeros(),
                normal: Vector::x(),
                depth: 0.01,
            },
            fdir1: Vector::zeros(),
        })
    }

    #[test]
    fn frictionless_contact_has_one_row() {
        let j = contact_with_mu(0.0, SurfaceFlags::empty(), 0.0);
        let info = j.info1();
        assert_eq!(info.m, 1);
        assert_eq!(info.nub, 0);
    }

    #[test]
    fn infinite_friction_makes_equality_rows() {
        let j = contact_with_mu(Real::INFINITY, SurfaceFlags::empty(), 0.0);
        let info = j.info1();
        assert_eq!(info.m, 3);
        assert_eq!(info.nub, 2);
    }

    #[test]
    fn finite_friction_rows_are_bounded() {
        let j = contact_with_mu(0.5, SurfaceFlags::empty(), 0.0);
        let info = j.info1();
        assert_eq!(info.m, 3);
        assert_eq!(info.nub, 0);
    }

    #[test]
    fn mu2_controls_the_second_direction_independently() {
        let j = contact_with_mu(0.5, SurfaceFlags::MU2, 0.0);
        assert_eq!(j.info1().m, 2);

        let j = contact_with_mu(0.0, SurfaceFlags::MU2, 0.5);
        assert_eq!(j.info1().m, 2);

        let j = contact_with_mu(Real::INFINITY, SurfaceFlags::MU2, 0.5);
        let info = j.info1();
        assert_eq!(info.m, 3);
        assert_eq!(info.nub, 1);
    }
}
