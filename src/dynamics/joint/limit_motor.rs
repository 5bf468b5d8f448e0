//! The per-axis limit/motor sub-model shared by every joint kind.

use crate::dynamics::joint::ConstraintRow;
use crate::dynamics::{IntegrationParameters, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// Joint parameters addressable through
/// [`World::set_joint_param`](crate::dynamics::World::set_joint_param).
///
/// For joints with several powered axes, the axis is selected separately;
/// the parameter names are shared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointParam {
    /// Low stop angle or position. Setting a value above the current high
    /// stop is ignored.
    LoStop,
    /// High stop angle or position. Setting a value below the current low
    /// stop is ignored.
    HiStop,
    /// Target velocity of the motor.
    Vel,
    /// Maximum force or torque the motor may apply to reach the target
    /// velocity. Zero (the default) disables the motor. Negative values are
    /// ignored.
    FMax,
    /// Fraction of the motor force applied when powering away from a
    /// violated limit, in `[0, 1]`.
    FudgeFactor,
    /// Restitution at the stops, in `[0, 1]`.
    Bounce,
    /// Minimum approach speed for stop restitution to apply.
    BounceVel,
    /// Constraint force mixing of the motor row.
    Cfm,
    /// Error reduction parameter used when violating a stop.
    StopErp,
    /// Constraint force mixing used when violating a stop.
    StopCfm,
    /// Suspension error reduction (hinge-2 only).
    SuspensionErp,
    /// Suspension constraint force mixing (hinge-2 only).
    SuspensionCfm,
}

/// Which stop, if any, the axis currently violates. Recomputed every step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub(crate) enum LimitState {
    /// Strictly between the stops (or no stops set).
    #[default]
    Free,
    /// At or below the low stop.
    AtLow,
    /// At or above the high stop.
    AtHigh,
}

/// Limit and motor model of one joint axis.
///
/// Every joint kind embeds one of these per drivable axis. It decides, each
/// step, whether the axis contributes an extra constraint row (because it is
/// powered, limited, or both) and fills that row.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct LimitMotor {
    /// Target velocity of the motor.
    pub(crate) vel: Real,
    /// Maximum motor force; zero disables the motor.
    pub(crate) fmax: Real,
    /// Low stop (angle or position).
    pub(crate) lo_stop: Real,
    /// High stop (angle or position).
    pub(crate) hi_stop: Real,
    /// Motor force fraction applied when powering away from a limit.
    pub(crate) fudge_factor: Real,
    /// Stop restitution.
    pub(crate) bounce: Real,
    /// Minimum incoming speed for the stop restitution.
    pub(crate) bounce_vel: Real,
    /// CFM of the motor row.
    pub(crate) normal_cfm: Real,
    /// ERP of a violated stop.
    pub(crate) stop_erp: Real,
    /// CFM of a violated stop.
    pub(crate) stop_cfm: Real,
    // Transient per-step state.
    pub(crate) limit: LimitState,
    pub(crate) limit_err: Real,
}

impl LimitMotor {
    /// A limit motor with both stops at infinity and the motor disabled,
    /// taking its softness defaults from the world parameters.
    pub(crate) fn new(params: &IntegrationParameters) -> Self {
        Self {
            vel: 0.0,
            fmax: 0.0,
            lo_stop: -Real::INFINITY,
            hi_stop: Real::INFINITY,
            fudge_factor: 1.0,
            bounce: 0.0,
            bounce_vel: 0.0,
            normal_cfm: params.cfm,
            stop_erp: params.erp,
            stop_cfm: params.cfm,
            limit: LimitState::Free,
            limit_err: 0.0,
        }
    }

    /// Sets one parameter. Out-of-range values are silently ignored and the
    /// previous value is kept.
    pub(crate) fn set(&mut self, param: JointParam, value: Real) {
        match param {
            JointParam::LoStop => {
                if value <= self.hi_stop {
                    self.lo_stop = value;
                }
            }
            JointParam::HiStop => {
                if value >= self.lo_stop {
                    self.hi_stop = value;
                }
            }
            JointParam::Vel => self.vel = value,
            JointParam::FMax => {
                if value >= 0.0 {
                    self.fmax = value;
                }
            }
            JointParam::FudgeFactor => {
                if (0.0..=1.0).contains(&value) {
                    self.fudge_factor = value;
                }
            }
            JointParam::Bounce => {
                if value >= 0.0 {
                    self.bounce = value;
                }
            }
            JointParam::BounceVel => {
                if value >= 0.0 {
                    self.bounce_vel = value;
                }
            }
            JointParam::Cfm => {
                if value >= 0.0 {
                    self.normal_cfm = value;
                }
            }
            JointParam::StopErp => self.stop_erp = value,
            JointParam::StopCfm => {
                if value >= 0.0 {
                    self.stop_cfm = value;
                }
            }
            // Suspension parameters are owned by the joint, not the axis.
            JointParam::SuspensionErp | JointParam::SuspensionCfm => (),
        }
    }

    /// Reads one parameter back.
    pub(crate) fn get(&self, param: JointParam) -> Real {
        match param {
            JointParam::LoStop => self.lo_stop,
            JointParam::HiStop => self.hi_stop,
            JointParam::Vel => self.vel,
            JointParam::FMax => self.fmax,
            JointParam::FudgeFactor => self.fudge_factor,
            JointParam::Bounce => self.bounce,
            JointParam::BounceVel => self.bounce_vel,
            JointParam::Cfm => self.normal_cfm,
            JointParam::StopErp => self.stop_erp,
            JointParam::StopCfm => self.stop_cfm,
            JointParam::SuspensionErp | JointParam::SuspensionCfm => 0.0,
        }
    }

    /// Are the stops set to values a rotational axis can actually reach?
    pub(crate) fn has_usable_rotational_stops(&self) -> bool {
        (self.lo_stop >= -std::f64::consts::PI || self.hi_stop <= std::f64::consts::PI)
            && self.lo_stop <= self.hi_stop
    }

    /// Compares the current angle or position against the stops, recording
    /// which stop is violated and by how much. Returns whether the joint
    /// must emit a limit row this step.
    pub(crate) fn test_limit(&mut self, pos: Real) -> bool {
        if self.lo_stop > self.hi_stop {
            self.limit = LimitState::Free;
            self.limit_err = 0.0;
            return false;
        }
        if pos <= self.lo_stop {
            self.limit = LimitState::AtLow;
            self.limit_err = pos - self.lo_stop;
            true
        } else if pos >= self.hi_stop {
            self.limit = LimitState::AtHigh;
            self.limit_err = pos - self.hi_stop;
            true
        } else {
            self.limit = LimitState::Free;
            self.limit_err = 0.0;
            false
        }
    }

    /// Is the axis powered or at a limit, i.e. will [`Self::add_limot`] emit
    /// a row?
    pub(crate) fn is_active(&self) -> bool {
        self.fmax > 0.0 || self.limit != LimitState::Free
    }

    /// Writes the powered/limited constraint row for `axis` if the axis is
    /// motorized or at a limit. Returns the number of rows written (0 or 1).
    ///
    /// The row value is `axis·(w1 - w2)` for a rotational axis and
    /// `axis·(v1 - v2)` for a linear one, which matches the sign convention
    /// of the joint angle/position queries.
    pub(crate) fn add_limot(
        &self,
        bodies: &mut RigidBodySet,
        h1: RigidBodyHandle,
        h2: Option<RigidBodyHandle>,
        row: &mut ConstraintRow,
        fps: Real,
        axis: &Vector,
        rotational: bool,
    ) -> usize {
        let mut powered = self.fmax > 0.0;
        if !powered && self.limit == LimitState::Free {
            return 0;
        }

        if rotational {
            row.j1_angular = *axis;
            if h2.is_some() {
                row.j2_angular = -axis;
            }
        } else {
            row.j1_linear = *axis;
            if h2.is_some() {
                row.j2_linear = -axis;
            }
        }

        // Equal stops admit no motion at all, so powering the axis is
        // contradictory; only the (bilateral) limit row is emitted.
        if self.limit != LimitState::Free && self.lo_stop == self.hi_stop {
            powered = false;
        }

        if powered {
            row.cfm = self.normal_cfm;
            if self.limit == LimitState::Free {
                row.rhs = self.vel;
                row.lo = -self.fmax;
                row.hi = self.fmax;
            } else {
                // The axis is powered *and* at a (one-sided) limit. The row
                // is used for the limit, so the motor force is applied
                // directly to the accumulators: the full force when pushing
                // into the limit (the limit holds anyway), and a
                // `fudge_factor` fraction when pushing away from it, since a
                // true two-sided bound would need a second row.
                let mut f = self.fmax;
                if self.vel > 0.0 {
                    f = -f;
                }
                if (self.limit == LimitState::AtLow && self.vel > 0.0)
                    || (self.limit == LimitState::AtHigh && self.vel < 0.0)
                {
                    f *= self.fudge_factor;
                }

                let (b1, b2) = match h2 {
                    Some(h2) => bodies.get2_mut(h1, h2),
                    None => (bodies.get_mut(h1), None),
                };
                let b1 = b1.expect("limit motor: invalid first body");
                if rotational {
                    b1.add_torque(-f * axis);
                    if let Some(b2) = b2 {
                        b2.add_torque(f * axis);
                    }
                } else {
                    b1.add_force(-f * axis);
                    if let Some(b2) = b2 {
                        b2.add_force(f * axis);
                    }
                }
            }
        }

        if self.limit != LimitState::Free {
            let k = fps * self.stop_erp;
            row.rhs = -k * self.limit_err;
            row.cfm = self.stop_cfm;

            if self.lo_stop == self.hi_stop {
                // Simultaneous low and high stop: the row is a bilateral
                // equality constraint.
                row.lo = -Real::INFINITY;
                row.hi = Real::INFINITY;
            } else if self.limit == LimitState::AtLow {
                row.lo = 0.0;
                row.hi = Real::INFINITY;
            } else {
                row.lo = -Real::INFINITY;
                row.hi = 0.0;
            }

            if self.bounce > 0.0 {
                let b1 = &bodies[h1];
                let b2 = h2.map(|h| &bodies[h]);
                let mut vel_along = if rotational {
                    axis.dot(&b1.angvel)
                } else {
                    axis.dot(&b1.linvel)
                };
                if let Some(b2) = b2 {
                    vel_along -= if rotational {
                        axis.dot(&b2.angvel)
                    } else {
                        axis.dot(&b2.linvel)
                    };
                }

                // Only bounce on an incoming approach faster than the
                // threshold, and never lower an already-larger target.
                if self.limit == LimitState::AtLow {
                    if vel_along < -self.bounce_vel {
                        let restitution = -self.bounce * vel_along;
                        if restitution > row.rhs {
                            row.rhs = restitution;
                        }
                    }
                } else if vel_along > self.bounce_vel {
                    let restitution = -self.bounce * vel_along;
                    if restitution < row.rhs {
                        row.rhs = restitution;
                    }
                }
            }
        }

        1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn motor() -> LimitMotor {
        LimitMotor::new(&IntegrationParameters::default())
    }

    #[test]
    fn out_of_range_assignments_are_ignored() {
        let mut lm = motor();
        lm.set(JointParam::LoStop, -1.0);
        lm.set(JointParam::HiStop, 2.0);

        // A low stop above the high stop must be rejected.
        lm.set(JointParam::LoStop, 3.0);
        assert_eq!(lm.get(JointParam::LoStop), -1.0);
        // A high stop below the low stop must be rejected.
        lm.set(JointParam::HiStop, -2.0);
        assert_eq!(lm.get(JointParam::HiStop), 2.0);
        // Negative forces and CFM must be rejected.
        lm.set(JointParam::FMax, -5.0);
        assert_eq!(lm.get(JointParam::FMax), 0.0);
        lm.set(JointParam::Cfm, -1.0e-3);
        assert_eq!(lm.get(JointParam::Cfm), IntegrationParameters::default().cfm);
    }

    #[test]
    fn limit_states() {
        let mut lm = motor();
        lm.set(JointParam::LoStop, -0.5);
        lm.set(JointParam::HiStop, 0.5);

        assert!(!lm.test_limit(0.0));
        assert_eq!(lm.limit, LimitState::Free);

        assert!(lm.test_limit(-0.7));
        assert_eq!(lm.limit, LimitState::AtLow);
        assert!((lm.limit_err - (-0.2)).abs() < 1.0e-12);

        assert!(lm.test_limit(0.9));
        assert_eq!(lm.limit, LimitState::AtHigh);
        assert!((lm.limit_err - 0.4).abs() < 1.0e-12);
    }

    #[test]
    fn equal_stops_emit_a_bilateral_row() {
        use crate::dynamics::{RigidBodyBuilder, RigidBodySet};

        let mut bodies = RigidBodySet::new();
        let h1 = bodies.insert(RigidBodyBuilder::new().build());

        let mut lm = motor();
        lm.set(JointParam::HiStop, 0.25);
        lm.set(JointParam::LoStop, 0.25);
        lm.set(JointParam::FMax, 10.0); // powered, but the limit must win
        lm.test_limit(0.3);

        let mut row = ConstraintRow::with_cfm(0.0);
        let n = lm.add_limot(
            &mut bodies,
            h1,
            None,
            &mut row,
            60.0,
            &Vector::x(),
            true,
        );
        assert_eq!(n, 1);
        assert_eq!(row.lo, -Real::INFINITY);
        assert_eq!(row.hi, Real::INFINITY);
        // The motor force must not have been applied.
        assert_eq!(bodies[h1].torque(), Vector::zeros());
    }
}
