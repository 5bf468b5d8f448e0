//! The hinge (revolute) joint.

use crate::dynamics::joint::joint::{joint_angle, set_ball_rows};
use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow, LimitMotor};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Rotation, Vector};
use crate::utils::orthonormal_basis;

/// A hinge joint: a shared anchor plus a shared axis, leaving one rotational
/// degree of freedom, optionally limited and powered through the embedded
/// [`LimitMotor`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct HingeJoint {
    pub(crate) anchor1: Vector,
    pub(crate) anchor2: Vector,
    /// Hinge axis in the local frame of body 1.
    pub(crate) axis1: Vector,
    /// Hinge axis in the local frame of body 2 (world frame if absent).
    pub(crate) axis2: Vector,
    /// Relative orientation at axis-set time; the reference for the angle
    /// measurement.
    pub(crate) q_initial: Rotation,
    /// Limit and motor of the hinge axis.
    pub(crate) limot: LimitMotor,
}

impl HingeJoint {
    /// Creates a hinge about the world Z axis; anchor and axis are set after
    /// attachment.
    pub fn new(params: &IntegrationParameters) -> Self {
        Self {
            anchor1: Vector::zeros(),
            anchor2: Vector::zeros(),
            axis1: Vector::z(),
            axis2: Vector::z(),
            q_initial: Rotation::identity(),
            limot: LimitMotor::new(params),
        }
    }

    /// Sets the anchor point, given in world space.
    pub fn set_anchor(&mut self, b1: &RigidBody, b2: Option<&RigidBody>, world_anchor: Vector) {
        self.anchor1 = b1.point_to_local(world_anchor);
        self.anchor2 = match b2 {
            Some(b2) => b2.point_to_local(world_anchor),
            None => world_anchor,
        };
    }

    /// Sets the hinge axis, given in world space, and captures the current
    /// relative orientation as the zero-angle reference.
    pub fn set_axis(&mut self, b1: &RigidBody, b2: Option<&RigidBody>, world_axis: Vector) {
        let world_axis = world_axis.normalize();
        self.axis1 = b1.vector_to_local(world_axis);
        self.axis2 = match b2 {
            Some(b2) => b2.vector_to_local(world_axis),
            None => world_axis,
        };
        self.q_initial = super::joint::relative_rotation(b1, b2);
    }

    /// The hinge axis in world space.
    pub fn axis_world(&self, b1: &RigidBody) -> Vector {
        b1.vector_to_world(self.axis1)
    }

    /// The anchor point attached to body 1, in world space.
    pub fn anchor1_world(&self, b1: &RigidBody) -> Vector {
        b1.point_to_world(self.anchor1)
    }

    /// The anchor point attached to body 2 (or the static frame), in world
    /// space.
    pub fn anchor2_world(&self, b2: Option<&RigidBody>) -> Vector {
        match b2 {
            Some(b2) => b2.point_to_world(self.anchor2),
            None => self.anchor2,
        }
    }

    /// The hinge angle, zero at axis-set time, in `(-π, π]`. Positive when
    /// body 1 leads body 2 about the axis.
    pub fn angle(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        joint_angle(b1, b2, &self.q_initial, &self.axis1)
    }

    /// The time derivative of [`Self::angle`].
    pub fn angle_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let axis = self.axis_world(b1);
        let mut rate = axis.dot(&b1.angvel);
        if let Some(b2) = b2 {
            rate -= axis.dot(&b2.angvel);
        }
        rate
    }

    pub(crate) fn info1(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) -> ConstraintInfo1 {
        let mut m = 5;
        self.limot.limit = Default::default();
        if self.limot.has_usable_rotational_stops() {
            let angle = self.angle(b1, b2);
            self.limot.test_limit(angle);
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

        set_ball_rows(rows, &b1, b2.as_ref(), &self.anchor1, &self.anchor2, k);

        // Two rows zeroing the relative angular velocity perpendicular to
        // the hinge axis, built on a plane-space basis of the axis.
        let ax1 = b1.vector_to_world(self.axis1);
        let ax2 = match &b2 {
            Some(b2) => b2.vector_to_world(self.axis2),
            None => self.axis2,
        };
        let [p, q] = orthonormal_basis(&ax1);

        rows[3].j1_angular = p;
        rows[4].j1_angular = q;
        if b2.is_some() {
            rows[3].j2_angular = -p;
            rows[4].j2_angular = -q;
        }

        // Axis misalignment shows up as ax1 × ax2; correct its plane-space
        // components.
        let b = ax1.cross(&ax2);
        rows[3].rhs = k * b.dot(&p);
        rows[4].rhs = k * b.dot(&q);

        if self.limot.is_active() {
            self.limot
                .add_limot(bodies, h1, h2, &mut rows[5], fps, &ax1, true);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::RigidBodyBuilder;
    use crate::na;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn axis_round_trip() {
        let b1 = RigidBodyBuilder::new()
            .orientation(Rotation::from_axis_angle(&na::Vector3::x_axis(), 0.7))
            .build();
        let b2 = RigidBodyBuilder::new()
            .orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), -0.3))
            .build();

        let axis = Vector::new(1.0, 2.0, -0.5).normalize();
        let mut hinge = HingeJoint::new(&IntegrationParameters::default());
        hinge.set_axis(&b1, Some(&b2), axis);

        assert_relative_eq!(hinge.axis_world(&b1), axis, epsilon = 1.0e-12);
    }

    #[test]
    fn angle_is_zero_at_creation_and_continuous_through_pi() {
        let b1 = RigidBodyBuilder::new().build();
        let mut b2 = RigidBodyBuilder::new().build();

        let mut hinge = HingeJoint::new(&IntegrationParameters::default());
        hinge.set_axis(&b1, Some(&b2), Vector::z());
        assert_relative_eq!(hinge.angle(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);

        // Rotate body 2 slowly about the hinge axis through almost ±π; the
        // measured angle must follow without discontinuity. Body 2 turning
        // positively means body 1 lags, so the angle decreases.
        let mut prev = 0.0;
        let steps = 1000;
        for i in 1..=steps {
            let theta = (i as Real / steps as Real) * (PI - 1.0e-3);
            b2.set_orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), theta));
            let angle = hinge.angle(&b1, Some(&b2));
            assert!(
                (angle - prev).abs() < 2.0 * PI / steps as Real + 1.0e-6,
                "discontinuity at step {}: {} -> {}",
                i,
                prev,
                angle
            );
            assert!(angle <= prev + 1.0e-12, "angle must decrease monotonically");
            prev = angle;
        }
        assert_relative_eq!(prev, -(PI - 1.0e-3), epsilon = 1.0e-9);

        // Same in the other direction.
        let mut prev = 0.0;
        for i in 1..=steps {
            let theta = -(i as Real / steps as Real) * (PI - 1.0e-3);
            b2.set_orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), theta));
            let angle = hinge.angle(&b1, Some(&b2));
            assert!((angle - prev).abs() < 2.0 * PI / steps as Real + 1.0e-6);
            prev = angle;
        }
        assert_relative_eq!(prev, PI - 1.0e-3, epsilon = 1.0e-9);
    }

    #[test]
    fn angle_sign_matches_rate_sign() {
        let b1 = RigidBodyBuilder::new()
            .angvel(Vector::new(0.0, 0.0, 1.0))
            .build();
        let b2 = RigidBodyBuilder::new().build();

        let mut hinge = HingeJoint::new(&IntegrationParameters::default());
        hinge.set_axis(&b1, Some(&b2), Vector::z());

        // Body 1 spinning positively about the axis leads body 2: both the
        // rate and (after a small rotation) the angle must be positive.
        assert!(hinge.angle_rate(&b1, Some(&b2)) > 0.0);
        let mut b1_rot = b1.clone();
        b1_rot.set_orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), 0.1));
        assert!(hinge.angle(&b1_rot, Some(&b2)) > 0.0);
    }
}
