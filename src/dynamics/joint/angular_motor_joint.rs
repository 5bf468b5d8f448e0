//! The angular motor joint.

use crate::dynamics::joint::{ConstraintInfo1, ConstraintRow, LimitMotor};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// Which frame an angular motor axis is anchored to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum MotorAxisFrame {
    /// The axis is fixed in world space.
    #[default]
    Global,
    /// The axis rotates with body 1.
    Body1,
    /// The axis rotates with body 2.
    Body2,
}

/// Operating mode of an [`AngularMotorJoint`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum AngularMotorMode {
    /// The user supplies up to three axes and keeps the angles up to date
    /// themselves.
    #[default]
    User,
    /// Axis 0 is fixed to body 1, axis 2 to body 2, axis 1 is derived, and
    /// the three Euler angles of the relative orientation are computed by
    /// the joint.
    Euler,
}

/// A joint controlling relative orientation only: up to three rotational
/// axes, each with its own [`LimitMotor`]. It constrains no translation and
/// is typically paired with a ball joint to drive or limit its rotation.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct AngularMotorJoint {
    pub(crate) mode: AngularMotorMode,
    /// Number of axes in use (0 to 3).
    pub(crate) num_axes: usize,
    /// The axes, each in the frame selected by `rel`.
    pub(crate) axes: [Vector; 3],
    pub(crate) rel: [MotorAxisFrame; 3],
    /// Current angles. Updated by the joint in Euler mode, by the user in
    /// user mode.
    pub(crate) angles: [Real; 3],
    /// Euler mode: axis 2's direction at set-up time, in body 1's frame.
    pub(crate) ref1: Vector,
    /// Euler mode: axis 0's direction at set-up time, in body 2's frame.
    pub(crate) ref2: Vector,
    /// Per-axis limits and motors.
    pub(crate) limot: [LimitMotor; 3],
}

impl AngularMotorJoint {
    /// Creates an angular motor with no axes configured.
    pub fn new(params: &IntegrationParameters) -> Self {
        Self {
            mode: AngularMotorMode::User,
            num_axes: 0,
            axes: [Vector::x(), Vector::y(), Vector::z()],
            rel: [MotorAxisFrame::Global; 3],
            angles: [0.0; 3],
            ref1: Vector::zeros(),
            ref2: Vector::zeros(),
            limot: [
                LimitMotor::new(params),
                LimitMotor::new(params),
                LimitMotor::new(params),
            ],
        }
    }

    /// The operating mode.
    pub fn mode(&self) -> AngularMotorMode {
        self.mode
    }

    /// Switches the operating mode. Euler mode uses all three axes.
    pub fn set_mode(&mut self, mode: AngularMotorMode) {
        self.mode = mode;
        if mode == AngularMotorMode::Euler {
            self.num_axes = 3;
            self.rel = [
                MotorAxisFrame::Body1,
                MotorAxisFrame::Global,
                MotorAxisFrame::Body2,
            ];
        }
    }

    /// The number of axes in use.
    pub fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Sets the number of axes in use (user mode; Euler mode always uses 3).
    pub fn set_num_axes(&mut self, num: usize) {
        if self.mode == AngularMotorMode::User {
            self.num_axes = num.min(3);
        }
    }

    /// Sets axis `i` (world space), anchored to the given frame.
    ///
    /// In Euler mode only axes 0 (anchored to body 1) and 2 (anchored to
    /// body 2) may be set; setting them re-captures the Euler reference
    /// directions, so both angles read zero in the current configuration.
    pub fn set_axis(
        &mut self,
        b1: &RigidBody,
        b2: Option<&RigidBody>,
        i: usize,
        frame: MotorAxisFrame,
        world_axis: Vector,
    ) {
        assert!(i < 3, "angular motor axis index out of range");
        let world_axis = world_axis.normalize();

        match self.mode {
            AngularMotorMode::User => {
                self.rel[i] = frame;
                self.axes[i] = match frame {
                    MotorAxisFrame::Global => world_axis,
                    MotorAxisFrame::Body1 => b1.vector_to_local(world_axis),
                    MotorAxisFrame::Body2 => match b2 {
                        Some(b2) => b2.vector_to_local(world_axis),
                        None => world_axis,
                    },
                };
            }
            AngularMotorMode::Euler => {
                match i {
                    0 => self.axes[0] = b1.vector_to_local(world_axis),
                    2 => {
                        self.axes[2] = match b2 {
                            Some(b2) => b2.vector_to_local(world_axis),
                            None => world_axis,
                        }
                    }
                    // Axis 1 is derived, never set.
                    _ => return,
                }
                self.update_euler_references(b1, b2);
            }
        }
    }

    /// Axis `i` in world space.
    pub fn axis(&self, b1: &RigidBody, b2: Option<&RigidBody>, i: usize) -> Vector {
        assert!(i < 3, "angular motor axis index out of range");
        self.global_axes(b1, b2)[i]
    }

    /// Tells the joint the current angle about axis `i` (user mode; the
    /// joint cannot know the geometry the axes came from).
    pub fn set_angle(&mut self, i: usize, angle: Real) {
        assert!(i < 3, "angular motor axis index out of range");
        if self.mode == AngularMotorMode::User {
            self.angles[i] = angle;
        }
    }

    /// The current angle about axis `i`: the user-supplied value in user
    /// mode, the Euler angle in Euler mode.
    pub fn angle(&self, b1: &RigidBody, b2: Option<&RigidBody>, i: usize) -> Real {
        assert!(i < 3, "angular motor axis index out of range");
        match self.mode {
            AngularMotorMode::User => self.angles[i],
            AngularMotorMode::Euler => {
                let axes = self.global_axes(b1, b2);
                self.euler_angles(b1, b2, &axes)[i]
            }
        }
    }

    /// The rate of change of the angle about axis `i`: the relative angular
    /// velocity projected on the same axis the constraint row for that angle
    /// uses.
    pub fn angle_rate(&self, b1: &RigidBody, b2: Option<&RigidBody>, i: usize) -> Real {
        assert!(i < 3, "angular motor axis index out of range");
        let axes = self.global_axes(b1, b2);
        let row_axes = self.row_axes(&axes);
        let mut rate = row_axes[i].dot(&b1.angvel);
        if let Some(b2) = b2 {
            rate -= row_axes[i].dot(&b2.angvel);
        }
        rate
    }

    fn update_euler_references(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) {
        let ax0 = b1.vector_to_world(self.axes[0]);
        let ax2 = match b2 {
            Some(b2) => b2.vector_to_world(self.axes[2]),
            None => self.axes[2],
        };
        self.ref1 = b1.vector_to_local(ax2);
        self.ref2 = match b2 {
            Some(b2) => b2.vector_to_local(ax0),
            None => ax0,
        };
    }

    /// All axes in world coordinates. In Euler mode the middle axis is
    /// derived from the two anchored ones.
    fn global_axes(&self, b1: &RigidBody, b2: Option<&RigidBody>) -> [Vector; 3] {
        let to_world = |frame: MotorAxisFrame, axis: &Vector| match frame {
            MotorAxisFrame::Global => *axis,
            MotorAxisFrame::Body1 => b1.vector_to_world(*axis),
            MotorAxisFrame::Body2 => match b2 {
                Some(b2) => b2.vector_to_world(*axis),
                None => *axis,
            },
        };

        match self.mode {
            AngularMotorMode::User => [
                to_world(self.rel[0], &self.axes[0]),
                to_world(self.rel[1], &self.axes[1]),
                to_world(self.rel[2], &self.axes[2]),
            ],
            AngularMotorMode::Euler => {
                let ax0 = b1.vector_to_world(self.axes[0]);
                let ax2 = match b2 {
                    Some(b2) => b2.vector_to_world(self.axes[2]),
                    None => self.axes[2],
                };
                let ax1 = ax2.cross(&ax0).normalize();
                [ax0, ax1, ax2]
            }
        }
    }

    /// Euler angles of the relative orientation, measured against the
    /// stored reference directions. All three are zero at axis-set time.
    fn euler_angles(
        &self,
        b1: &RigidBody,
        b2: Option<&RigidBody>,
        axes: &[Vector; 3],
    ) -> [Real; 3] {
        let [ax0, _, ax2] = *axes;

        // Angle 0: rotation of the middle frame about the body-1-fixed axis
        // 0, read from where axis 2 now points relative to its captured
        // direction.
        let ref1 = b1.vector_to_world(self.ref1);
        let target = (ax2 - ax0 * ax0.dot(&ax2)).normalize();
        let angle0 = (target.cross(&ref1)).dot(&ax0).atan2(ref1.dot(&target));

        // Angle 1: deviation of the two anchored axes from perpendicular,
        // signed to match the `axis·(w1 - w2)` convention about the middle
        // axis.
        let angle1 = -ax0.dot(&ax2).asin();

        // Angle 2: rotation about the body-2-fixed axis 2, read from where
        // axis 0 now points relative to its captured direction.
        let ref2 = match b2 {
            Some(b2) => b2.vector_to_world(self.ref2),
            None => self.ref2,
        };
        let target = (ax0 - ax2 * ax2.dot(&ax0)).normalize();
        let angle2 = (ref2.cross(&target)).dot(&ax2).atan2(ref2.dot(&target));

        [angle0, angle1, angle2]
    }

    /// The axes the constraint rows act along. In Euler mode the rows for
    /// the first and third angles use the duals `ax1 × ax2` and `ax0 × ax1`
    /// rather than the angles' own axes, which is what converts the
    /// inter-body angular velocity difference into Euler-rate error.
    fn row_axes(&self, axes: &[Vector; 3]) -> [Vector; 3] {
        match self.mode {
            AngularMotorMode::User => *axes,
            AngularMotorMode::Euler => [
                axes[1].cross(&axes[2]).normalize(),
                axes[1],
                axes[0].cross(&axes[1]).normalize(),
            ],
        }
    }

    pub(crate) fn info1(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) -> ConstraintInfo1 {
        if self.mode == AngularMotorMode::Euler {
            let axes = self.global_axes(b1, b2);
            self.angles = self.euler_angles(b1, b2, &axes);
        }

        let mut m = 0;
        for i in 0..self.num_axes {
            self.limot[i].limit = Default::default();
            self.limot[i].test_limit(self.angles[i]);
            if self.limot[i].is_active() {
                m += 1;
            }
        }
        ConstraintInfo1 { m, nub: 0 }
    }

    pub(crate) fn info2(
        &mut self,
        bodies: &mut RigidBodySet,
        h1: RigidBodyHandle,
        h2: Option<RigidBodyHandle>,
        fps: Real,
        rows: &mut [ConstraintRow],
    ) {
        let row_axes = {
            let b1 = bodies[h1].clone();
            let b2 = h2.map(|h| bodies[h].clone());
            let axes = self.global_axes(&b1, b2.as_ref());
            self.row_axes(&axes)
        };

        let mut row = 0;
        for i in 0..self.num_axes {
            if self.limot[i].is_active() {
                row += self.limot[i].add_limot(
                    bodies,
                    h1,
                    h2,
                    &mut rows[row],
                    fps,
                    &row_axes[i],
                    true,
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::joint::JointParam;
    use crate::dynamics::RigidBodyBuilder;
    use crate::math::Rotation;
    use crate::na;
    use approx::assert_relative_eq;

    #[test]
    fn user_mode_rows_follow_motor_state() {
        let b1 = RigidBodyBuilder::new().build();
        let mut joint = AngularMotorJoint::new(&IntegrationParameters::default());
        joint.set_num_axes(2);
        joint.set_axis(&b1, None, 0, MotorAxisFrame::Global, Vector::x());
        joint.set_axis(&b1, None, 1, MotorAxisFrame::Global, Vector::y());

        assert_eq!(joint.info1(&b1, None).m, 0);

        joint.limot[0].set(JointParam::FMax, 1.0);
        assert_eq!(joint.info1(&b1, None).m, 1);

        // A violated limit on the second axis adds its row too.
        joint.limot[1].set(JointParam::LoStop, -0.1);
        joint.limot[1].set(JointParam::HiStop, 0.1);
        joint.set_angle(1, 0.5);
        assert_eq!(joint.info1(&b1, None).m, 2);
    }

    #[test]
    fn euler_angles_are_zero_at_setup_and_track_each_axis() {
        let b1 = RigidBodyBuilder::new().build();
        let mut b2 = RigidBodyBuilder::new().build();

        let mut joint = AngularMotorJoint::new(&IntegrationParameters::default());
        joint.set_mode(AngularMotorMode::Euler);
        joint.set_axis(&b1, Some(&b2), 0, MotorAxisFrame::Body1, Vector::x());
        joint.set_axis(&b1, Some(&b2), 2, MotorAxisFrame::Body2, Vector::z());

        for i in 0..3 {
            assert_relative_eq!(joint.angle(&b1, Some(&b2), i), 0.0, epsilon = 1.0e-12);
        }

        // Twisting body 2 about the body-2-anchored axis changes only the
        // third angle, continuously.
        let mut prev = 0.0;
        for k in 1..=30 {
            let theta = 0.02 * k as Real;
            b2.set_orientation(Rotation::from_axis_angle(&na::Vector3::z_axis(), theta));
            let a2 = joint.angle(&b1, Some(&b2), 2);
            assert!((a2 - prev).abs() < 0.05, "angle 2 must move continuously");
            prev = a2;
            assert_relative_eq!(joint.angle(&b1, Some(&b2), 0), 0.0, epsilon = 1.0e-9);
            assert_relative_eq!(joint.angle(&b1, Some(&b2), 1), 0.0, epsilon = 1.0e-9);
        }
        assert_relative_eq!(prev.abs(), 0.6, epsilon = 1.0e-9);
    }
}
