//! The hinge-2 joint (two hinges in series, e.g. a steered, suspended
//! wheel).

use crate::dynamics::joint::joint::set_ball_rows_aligned;
use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow, JointParam, LimitMotor};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// A hinge-2 joint: an anchor shared by both bodies, a first axis anchored
/// to body 1 (the steering axis) and a second axis anchored to body 2 (the
/// wheel axis).
///
/// The angle between the two axes is held at its initial value; rotation
/// about axis 1 can be limited and powered (steering), rotation about axis 2
/// can only be powered (the wheel spins freely otherwise). Translation along
/// axis 1 is softened into a suspension through dedicated ERP/CFM values.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Hinge2Joint {
    pub(crate) anchor1: Vector,
    pub(crate) anchor2: Vector,
    /// Steering axis in body 1's frame.
    pub(crate) axis1: Vector,
    /// Wheel axis in body 2's frame.
    pub(crate) axis2: Vector,
    /// Unit vectors in body 1's frame: `v1` is axis 2 (made perpendicular to
    /// axis 1) at set-up time, `v2 = axis1 × v1`. The steering angle is read
    /// against these.
    pub(crate) v1: Vector,
    pub(crate) v2: Vector,
    /// Cosine of the initial angle between the two axes.
    pub(crate) cos0: Real,
    /// Suspension error reduction along axis 1.
    pub(crate) susp_erp: Real,
    /// Suspension constraint force mixing along axis 1.
    pub(crate) susp_cfm: Real,
    /// Steering limit and motor (axis 1).
    pub(crate) limot1: LimitMotor,
    /// Wheel motor (axis 2); its stops are unused.
    pub(crate) limot2: LimitMotor,
}

impl Hinge2Joint {
    /// Creates a hinge-2 joint; anchor and axes are set after attachment.
    pub fn new(params: &IntegrationParameters) -> Self {
        Self {
            anchor1: Vector::zeros(),
            anchor2: Vector::zeros(),
            axis1: Vector::z(),
            axis2: Vector::x(),
            v1: Vector::x(),
            v2: Vector::y(),
            cos0: 0.0,
            susp_erp: params.erp,
            susp_cfm: params.cfm,
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

    /// Sets both axes, given in world space. The axes must not be parallel.
    /// The current angle between them becomes the maintained angle, and the
    /// current steering angle reads as zero.
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
            ax1.cross(&ax2).norm() > 1.0e-6,
            "hinge-2 axes must not be parallel"
        );

        self.axis1 = b1.vector_to_local(ax1);
        self.axis2 = match b2 {
            Some(b2) => b2.vector_to_local(ax2),
            None => ax2,
        };
        self.cos0 = ax1.dot(&ax2);

        // Steering-angle reference frame: axis 2 made perpendicular to
        // axis 1, and its quarter-turn companion, both in body 1's frame.
        let v1 = (ax2 - ax1 * ax1.dot(&ax2)).normalize();
        let v2 = ax1.cross(&v1);
        self.v1 = b1.vector_to_local(v1);
        self.v2 = b1.vector_to_local(v2);
    }

    /// The steering axis (axis 1) in world space.
    pub fn axis1_world(&self, b1: &RigidBody) -> Vector {
        b1.vector_to_world(self.axis1)
    }

    /// The wheel axis (axis 2) in world space.
    pub fn axis2_world(&self, b2: Option<&RigidBody>) -> Vector {
        match b2 {
            Some(b2) => b2.vector_to_world(self.axis2),
            None => self.axis2,
        }
    }

    /// The steering angle about axis 1, zero at axis-set time.
    pub fn angle1(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        // Track where the wheel axis currently sits in body 1's steering
        // reference plane.
        let a = b1.vector_to_local(self.axis2_world(b2));
        let x = self.v1.dot(&a);
        let y = self.v2.dot(&a);
        -y.atan2(x)
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

    /// The wheel spin rate about axis 2.
    pub fn angle2_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> Real {
        let ax2 = self.axis2_world(b2);
        let mut rate = ax2.dot(&b1.angvel);
        if let Some(b2) = b2 {
            rate -= ax2.dot(&b2.angvel);
        }
        rate
    }

    pub(crate) fn set_param(&mut self, axis_group: usize, param: JointParam, value: Real) {
        match (axis_group, param) {
            (1, JointParam::SuspensionErp) => self.susp_erp = value,
            (1, JointParam::SuspensionCfm) => {
                if value >= 0.0 {
                    self.susp_cfm = value;
                }
            }
            (1, _) => self.limot1.set(param, value),
            (2, _) => self.limot2.set(param, value),
            _ => (),
        }
    }

    pub(crate) fn param(&self, axis_group: usize, param: JointParam) -> Real {
        match (axis_group, param) {
            (1, JointParam::SuspensionErp) => self.susp_erp,
            (1, JointParam::SuspensionCfm) => self.susp_cfm,
            (1, _) => self.limot1.get(param),
            (2, _) => self.limot2.get(param),
            _ => 0.0,
        }
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
        // The wheel axis cannot be limited, only powered.
        self.limot2.limit = Default::default();
        if self.limot2.fmax > 0.0 {
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

        let ax1 = self.axis1_world(&b1);
        let ax2 = self.axis2_world(b2.as_ref());

        // Anchor rows, aligned so the one along the steering axis is the
        // suspension.
        set_ball_rows_aligned(
            rows,
            &b1,
            b2.as_ref(),
            &self.anchor1,
            &self.anchor2,
            &ax1,
            fps * self.susp_erp,
            k,
        );
        rows[0].cfm = self.susp_cfm;

        // One row keeping the angle between the axes at its initial value:
        // the relative angular velocity along ax1 × ax2 changes that angle.
        let u = ax1.cross(&ax2);
        rows[3].j1_angular = u;
        if b2.is_some() {
            rows[3].j2_angular = -u;
        }
        // Restoring term from the deviation of cos(angle), linearized.
        rows[3].rhs = k * (self.cos0 - ax1.dot(&ax2));

        let mut row = 4;
        if self.limot1.is_active() {
            row += self
                .limot1
                .add_limot(bodies, h1, h2, &mut rows[row], fps, &ax1, true);
        }
        if self.limot2.fmax > 0.0 {
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
    fn steering_angle_follows_body1_rotation() {
        let mut b1 = RigidBodyBuilder::new().build();
        let b2 = RigidBodyBuilder::new().build();

        let mut joint = Hinge2Joint::new(&IntegrationParameters::default());
        // Vertical steering axis, horizontal wheel axis.
        joint.set_axes(&b1, Some(&b2), Vector::z(), Vector::x());
        assert_relative_eq!(joint.angle1(&b1, Some(&b2)), 0.0, epsilon = 1.0e-12);

        // Body 1 leading by +0.3 about the steering axis reads as a +0.3
        // steering angle.
        b1.set_orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), 0.3));
        assert_relative_eq!(joint.angle1(&b1, Some(&b2)), 0.3, epsilon = 1.0e-9);
    }

    #[test]
    fn wheel_motor_adds_a_row() {
        let b1 = RigidBodyBuilder::new().build();
        let b2 = RigidBodyBuilder::new().build();

        let mut joint = Hinge2Joint::new(&IntegrationParameters::default());
        joint.set_axes(&b1, Some(&b2), Vector::z(), Vector::x());
        assert_eq!(joint.info1(&b1, Some(&b2)).m, 4);

        joint.limot2.set(JointParam::FMax, 10.0);
        joint.limot2.set(JointParam::Vel, 3.0);
        assert_eq!(joint.info1(&b1, Some(&b2)).m, 5);
    }
}
