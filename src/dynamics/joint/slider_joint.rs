//! The slider (prismatic) joint.

use crate::dynamics::joint::joint::{relative_rotation, set_orientation_rows};
use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow, LimitMotor};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Rotation, Vector};
use crate::utils::orthonormal_basis;

/// A slider joint: all relative rotation is removed and translation is only
/// allowed along one axis, optionally limited and powered.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct SliderJoint {
    /// Slide axis in the local frame of body 1.
    pub(crate) axis1: Vector,
    /// Vector from body 2 to body 1 at axis-set time, in body 2's frame
    /// (world frame if body 2 is absent); the zero-position reference.
    pub(crate) offset: Vector,
    /// Relative orientation at axis-set time.
    pub(crate) q_initial: Rotation,
    /// Limit and motor of the slide axis.
    pub(crate) limot: LimitMotor,
}

impl SliderJoint {
    /// Creates a slider along the world Z axis; the axis is set after
    /// attachment.
    pub fn new(params: &IntegrationParameters) -> Self {
        Self {
            axis1: Vector::z(),
            offset: Vector::zeros(),
            q_initial: Rotation::identity(),
            limot: LimitMotor::new(params),
        }
    }

    /// Sets the slide axis, given in world space, capturing the current
    /// configuration as the zero position.
    pub fn set_axis(&mut self, b1: &RigidBody, b2: Option<&RigidBody>, world_axis: Vector) {
        let world_axis = world_axis.normalize();
        self.axis1 = b1.vector_to_local(world_axis);
        self.offset = match b2 {
            Some(b2) => b2.vector_to_local(b1.position - b2.position),
            None => b1.position,
        };
        self.q_initial = relative_rotation(b1, b2);
    }

    /// The slide axis in world space.
    pub fn axis_world(&self, b1: &RigidBody) -> Vector {
        b1.vector_to_world(self.axis1)
    }

    /// The slider position: the displacement of body 1 along the axis since
    /// axis-set time.
    pub fn position(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let ax1 = self.axis_world(b1);
        let q = match b2 {
            Some(b2) => b1.position - b2.position - b2.vector_to_world(self.offset),
            None => b1.position - self.offset,
        };
        ax1.dot(&q)
    }

    /// The time derivative of [`Self::position`].
    pub fn position_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let ax1 = self.axis_world(b1);
        let mut rate = ax1.dot(&b1.linvel);
        if let Some(b2) = b2 {
            rate -= ax1.dot(&b2.linvel);
        }
        rate
    }

    pub(crate) fn info1(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) -> ConstraintInfo1 {
        let mut m = 5;
        self.limot.limit = Default::default();
        if self.limot.lo_stop <= self.limot.hi_stop {
            let pos = self.position(b1, b2);
            self.limot.test_limit(pos);
        }
        if self.limot.is_active() {
            m += 1;
        }
        ConstraintInfo1 { m, nub: 5 }
    }

    pub(crate) fn info2(
        &mut self,
        bodies: &mut RigidBodySet,
        h1: RigidBodyHandle,
        h2: Option<RigidBodyHandle>,
        fps: Real,
        erp: Real,
        rows: &mut [ConstraintRow],
    ) {
        let b1 = bodies[h1].clone();
        let b2 = h2.map(|h| bodies[h].clone());
        let k = fps * erp;

        // Three rows locking the relative orientation.
        set_orientation_rows(rows, &b1, b2.as_ref(), &self.q_initial, k);

        // Two rows restricting the relative linear velocity to the axis,
        // using a plane-space basis. The perpendicular directions rotate
        // with body 1, so the angular block picks up the moment arm to
        // body 2's center.
        let ax1 = self.axis_world(&b1);
        let [p, q] = orthonormal_basis(&ax1);

        rows[3].j1_linear = p;
        rows[4].j1_linear = q;

        let err;
        if let Some(b2) = &b2 {
            let c = b2.position - b1.position;
            rows[3].j1_angular = c.cross(&p);
            rows[4].j1_angular = c.cross(&q);
            rows[3].j2_linear = -p;
            rows[4].j2_linear = -q;

            // Drift of body 2's reference point off the slide line.
            err = b2.position + b2.vector_to_world(self.offset) - b1.position;
        } else {
            err = self.offset - b1.position;
        }
        rows[3].rhs = k * p.dot(&err);
        rows[4].rhs = k * q.dot(&err);

        if self.limot.is_active() {
            self.limot
                .add_limot(bodies, h1, h2, &mut rows[5], fps, &ax1, false);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::RigidBodyBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn position_tracks_axis_displacement() {
        let mut b1 = RigidBodyBuilder::new()
            .position(Vector::new(1.0, 0.0, 0.0))
            .build();
        let b2 = RigidBodyBuilder::new().build();

        let mut slider = SliderJoint::new(&IntegrationParameters::default());
        let axis = Vector::new(1.0, 1.0, 0.0).normalize();
        slider.set_axis(&b1, Some(&b2), axis);

        assert_relative_eq!(slider.position(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(slider.axis_world(&b1), axis, epsilon = 1.0e-12);

        b1.set_position(b1.position() + axis * 0.25);
        assert_relative_eq!(slider.position(&b1, Some(&b2)), 0.25, epsilon = 1.0e-12);
    }

    #[test]
    fn position_rate_matches_velocity_projection() {
        let b1 = RigidBodyBuilder::new()
            .linvel(Vector::new(1.0, 0.0, 0.0))
            .build();
        let b2 = RigidBodyBuilder::new()
            .linvel(Vector::new(0.0, 1.0, 0.0))
            .build();

        let mut slider = SliderJoint::new(&IntegrationParameters::default());
        let axis = Vector::new(1.0, 1.0, 0.0).normalize();
        slider.set_axis(&b1, Some(&b2), axis);

        // (v1 - v2)·axis = (1, -1, 0)·axis = 0.
        assert_relative_eq!(slider.position_rate(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);
    }
}
