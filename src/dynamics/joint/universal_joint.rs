//! The universal joint.

use crate::dynamics::joint::joint::set_ball_rows;
use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow, LimitMotor};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// A universal joint: a shared anchor plus two perpendicular axes, axis 1
/// anchored to body 1 and axis 2 to body 2. Each body may rotate about its
/// own axis (both rotations limitable and powerable), but the axes are held
/// perpendicular — the constraint a drive shaft's cross piece realizes.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct UniversalJoint {
    pub(crate) anchor1: Vector,
    pub(crate) anchor2: Vector,
    /// Axis 1 in body 1's frame.
    pub(crate) axis1: Vector,
    /// Axis 2 in body 2's frame (world frame if body 2 is absent).
    pub(crate) axis2: Vector,
    /// Axis 2's direction at set-up time, in body 1's frame; the angle-1
    /// reference.
    pub(crate) ref1: Vector,
    /// Axis 1's direction at set-up time, in body 2's frame; the angle-2
    /// reference.
    pub(crate) ref2: Vector,
    /// Limit and motor about axis 1.
    pub(crate) limot1: LimitMotor,
    /// Limit and motor about axis 2.
    pub(crate) limot2: LimitMotor,
}

impl UniversalJoint {
    /// Creates a universal joint with axes X and Y; anchor and axes are set
    /// after attachment.
    pub fn new(params: &IntegrationParameters) -> Self {
        Self {
            anchor1: Vector::zeros(),
            anchor2: Vector::zeros(),
            axis1: Vector::x(),
            axis2: Vector::y(),
            ref1: Vector::y(),
            ref2: Vector::x(),
            limot1: LimitMotor::new(params),
            limot2: LimitMotor::new(params),
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

    /// Sets both axes, given in world space. They must be perpendicular;
    /// both angles read as zero in this configuration.
    pub fn set_axes(
        &mut self,
        b1: &RigidBody,
        b2: Option<&RigidBody>,
        world_axis1: Vector,
        world_axis2: Vector,
    ) {
        let ax1 = world_axis1.normalize();
        let ax2 = world_axis2.normalize();
        assert!(
            ax1.dot(&ax2).abs() < 1.0e-6,
            "universal joint axes must be perpendicular"
        );

        self.axis1 = b1.vector_to_local(ax1);
        self.axis2 = match b2 {
            Some(b2) => b2.vector_to_local(ax2),
            None => ax2,
        };
        self.ref1 = b1.vector_to_local(ax2);
        self.ref2 = match b2 {
            Some(b2) => b2.vector_to_local(ax1),
            None => ax1,
        };
    }

    /// Axis 1 in world space.
    pub fn axis1_world(&self, b1: &RigidBody) -> Vector {
        b1.vector_to_world(self.axis1)
    }

    /// Axis 2 in world space.
    pub fn axis2_world(&self, b2: Option<&RigidBody>) -> Vector {
        match b2 {
            Some(b2) => b2.vector_to_world(self.axis2),
            None => self.axis2,
        }
    }

    /// The rotation about axis 1, zero at axes-set time. Positive when
    /// body 1 leads, matching the `axis·(w1 - w2)` rate convention.
    pub fn angle1(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let a1 = self.axis1_world(b1);
        // Where axis 2 currently sits, projected into the plane
        // perpendicular to axis 1, against the body-1-fixed reference.
        let target = self.axis2_world(b2);
        let target = (target - a1 * a1.dot(&target)).normalize();
        let reference = b1.vector_to_world(self.ref1);
        (target.cross(&reference)).dot(&a1).atan2(reference.dot(&target))
    }

    /// The rotation about axis 2, zero at axes-set time. Positive when
    /// body 1 leads, matching the `axis·(w1 - w2)` rate convention.
    pub fn angle2(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let a2 = self.axis2_world(b2);
        let target = self.axis1_world(b1);
        let target = (target - a2 * a2.dot(&target)).normalize();
        let reference = match b2 {
            Some(b2) => b2.vector_to_world(self.ref2),
            None => self.ref2,
        };
        (reference.cross(&target)).dot(&a2).atan2(reference.dot(&target))
    }

    /// The time derivative of [`Self::angle1`].
    pub fn angle1_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let ax1 = self.axis1_world(b1);
        let mut rate = ax1.dot(&b1.angvel);
        if let Some(b2) = b2 {
            rate -= ax1.dot(&b2.angvel);
        }
        rate
    }

    /// The time derivative of [`Self::angle2`].
    pub fn angle2_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let ax2 = self.axis2_world(b2);
        let mut rate = ax2.dot(&b1.angvel);
        if let Some(b2) = b2 {
            rate -= ax2.dot(&b2.angvel);
        }
        rate
    }

    pub(crate) fn info1(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) -> ConstraintInfo1 {
        let mut m = 4;
        self.limot1.limit = Default::default();
        if self.limot1.has_usable_rotational_stops() {
            let angle = self.angle1(b1, b2);
            self.limot1.test_limit(angle);
        }
        if self.limot1.is_active() {
            m += 1;
        }
        self.limot2.limit = Default::default();
        if self.limot2.has_usable_rotational_stops() {
            let angle = self.angle2(b1, b2);
            self.limot2.test_limit(angle);
        }
        if self.limot2.is_active() {
            m += 1;
        }
        ConstraintInfo1 { m, nub: 4 }
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

        // One row keeping the axes perpendicular: the angular velocity along
        // ax1 × ax2 is exactly what changes their dot product.
        let ax1 = self.axis1_world(&b1);
        let ax2 = self.axis2_world(b2.as_ref());
        let u = ax1.cross(&ax2).normalize();
        rows[3].j1_angular = u;
        if b2.is_some() {
            rows[3].j2_angular = -u;
        }
        rows[3].rhs = k * -ax1.dot(&ax2);

        let mut row = 4;
        if self.limot1.is_active() {
            row += self
                .limot1
                .add_limot(bodies, h1, h2, &mut rows[row], fps, &ax1, true);
        }
        if self.limot2.is_active() {
            self.limot2
                .add_limot(bodies, h1, h2, &mut rows[row], fps, &ax2, true);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::RigidBodyBuilder;
    use crate::math::Rotation;
    use crate::na;
    use approx::assert_relative_eq;

    #[test]
    fn angles_are_zero_at_setup() {
        let b1 = RigidBodyBuilder::new().build();
        let b2 = RigidBodyBuilder::new().build();
        let mut joint = UniversalJoint::new(&IntegrationParameters::default());
        joint.set_axes(&b1, Some(&b2), Vector::x(), Vector::y());

        assert_relative_eq!(joint.angle1(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);
        assert_relative_eq!(joint.angle2(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn angle1_tracks_body1_twist() {
        let mut b1 = RigidBodyBuilder::new().build();
        let b2 = RigidBodyBuilder::new().build();
        let mut joint = UniversalJoint::new(&IntegrationParameters::default());
        joint.set_axes(&b1, Some(&b2), Vector::x(), Vector::y());

        // Body 1 twisting +0.4 about its own axis; continuity and sign: the
        // angle must match the rate convention axis·(w1 - w2).
        let mut prev = 0.0;
        for i in 1..=40 {
            let theta = 0.01 * i as Real;
            b1.set_orientation(Rotation::from_axis_angle(&na::Vector3::x_axis(), theta));
            let angle = joint.angle1(&b1, Some(&b2));
            assert!(angle > prev - 1.0e-12, "angle1 must grow with body 1's twist");
            prev = angle;
        }
        assert_relative_eq!(prev, 0.4, epsilon = 1.0e-9);
        // Body 2 is untouched, so angle 2 stays zero.
        assert_relative_eq!(joint.angle2(&b1, Some(&b2)), 0.0, epsilon = 1.0e-9);
    }

    #[test]
    fn angle2_tracks_body2_twist() {
        let b1 = RigidBodyBuilder::new().build();
        let mut b2 = RigidBodyBuilder::new().build();
        let mut joint = UniversalJoint::new(&IntegrationParameters::default());
        joint.set_axes(&b1, Some(&b2), Vector::x(), Vector::y());

        b2.set_orientation(Rotation::from_axis_angle(&na::Vector3::y_axis(), 0.25));
        // Body 2 leading reads as a negative angle, mirroring the
        // axis·(w1 - w2) rate convention.
        assert_relative_eq!(joint.angle2(&b1, Some(&b2)), -0.25, epsilon = 1.0e-9);
        assert_relative_eq!(joint.angle1(&b1, Some(&b2)), 0.0, epsilon = 1.0e-9);
    }
}
