//! The world: the container and stepping entry point for bodies and joints.

use crate::dynamics::joint::{
    AngularMotorJoint, BallJoint, ContactJoint, FixedJoint, Hinge2Joint, HingeJoint, Joint,
    JointGroupHandle, JointHandle, JointKind, JointParam, JointParams, JointSet, SliderJoint,
    UniversalJoint,
};
use crate::dynamics::solver::{step_island, StepMethod};
use crate::dynamics::{
    IntegrationParameters, IslandManager, RigidBody, RigidBodyHandle, RigidBodySet,
};
use crate::geometry::Contact;
use crate::math::{Real, Vector};

/// A dynamics world owning rigid bodies, joints and the solver state needed
/// to advance them through time.
#[derive(Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct World {
    /// The rigid bodies of this world.
    pub bodies: RigidBodySet,
    /// The joints of this world.
    pub joints: JointSet,
    /// Constraint solver parameters (ERP, CFM, contact clamping).
    pub params: IntegrationParameters,
    /// The gravitational acceleration applied to every non-exempt body.
    pub gravity: Vector,
    islands: IslandManager,
}

impl World {
    /// Creates an empty world with zero gravity.
    pub fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            joints: JointSet::new(),
            params: IntegrationParameters::default(),
            gravity: Vector::zeros(),
            islands: IslandManager::new(),
        }
    }

    /*
     * Bodies.
     */

    /// Inserts a rigid body and returns its handle.
    pub fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    /// Removes a body, severing (but not destroying) every joint attached
    /// to it.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> Option<RigidBody> {
        self.joints.sever_body(handle);
        self.bodies.remove(handle)
    }

    /// A shared reference to a body.
    ///
    /// Panics on a dangling handle; use `bodies.get` for a fallible lookup.
    pub fn body(&self, handle: RigidBodyHandle) -> &RigidBody {
        &self.bodies[handle]
    }

    /// An exclusive reference to a body.
    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> &mut RigidBody {
        &mut self.bodies[handle]
    }

    /*
     * Joints.
     */

    /// Inserts an unattached joint of the given kind.
    pub fn insert_joint(&mut self, params: impl Into<JointParams>) -> JointHandle {
        self.joints.insert(Joint::new(params.into()))
    }

    /// Inserts an unattached joint into a bulk-destruction group.
    pub fn insert_joint_in_group(
        &mut self,
        params: impl Into<JointParams>,
        group: JointGroupHandle,
    ) -> JointHandle {
        let mut joint = Joint::new(params.into());
        joint.group = Some(group);
        self.joints.insert(joint)
    }

    /// Creates a transient contact joint between the two bodies named by a
    /// collision contact, inside a group.
    ///
    /// The record's normal is expected to point towards `body1`.
    pub fn insert_contact_joint(
        &mut self,
        contact: Contact,
        body1: Option<RigidBodyHandle>,
        body2: Option<RigidBodyHandle>,
        group: JointGroupHandle,
    ) -> JointHandle {
        assert!(
            body1.is_some() || body2.is_some(),
            "a contact joint needs at least one body"
        );
        let handle = self.insert_joint_in_group(ContactJoint::new(contact), group);
        self.joints.attach(handle, body1, body2);
        handle
    }

    /// Reserves a fresh joint group.
    pub fn create_joint_group(&mut self) -> JointGroupHandle {
        self.joints.next_group()
    }

    /// Destroys every joint in `group` at once.
    pub fn clear_joint_group(&mut self, group: JointGroupHandle) {
        self.joints.clear_group(group);
    }

    /// Attaches a joint to one or two bodies. Joint geometry (anchors,
    /// axes) is captured afterwards via the `set_joint_*` methods.
    pub fn attach_joint(
        &mut self,
        handle: JointHandle,
        body1: Option<RigidBodyHandle>,
        body2: Option<RigidBodyHandle>,
    ) {
        self.joints.attach(handle, body1, body2);
    }

    /// Removes a joint. Panics if the joint belongs to a group.
    pub fn remove_joint(&mut self, handle: JointHandle) -> Option<Joint> {
        self.joints.remove(handle)
    }

    /// A shared reference to a joint.
    pub fn joint(&self, handle: JointHandle) -> &Joint {
        &self.joints[handle]
    }

    /// An exclusive reference to a joint.
    pub fn joint_mut(&mut self, handle: JointHandle) -> &mut Joint {
        &mut self.joints[handle]
    }

    fn joint_bodies(&self, handle: JointHandle) -> (&RigidBody, Option<&RigidBody>) {
        let joint = &self.joints[handle];
        let b1 = &self.bodies[joint
            .body1
            .expect("the joint is not attached to any body")];
        let b2 = joint.body2.map(|h| &self.bodies[h]);
        (b1, b2)
    }

    /// Sets the anchor point (world space) of a ball, hinge, hinge-2 or
    /// universal joint.
    ///
    /// Panics if the joint kind has no anchor, which is a programming error.
    pub fn set_joint_anchor(&mut self, handle: JointHandle, anchor: Vector) {
        let (b1, b2) = {
            let (b1, b2) = self.joint_bodies(handle);
            (b1.clone(), b2.cloned())
        };
        match &mut self.joints[handle].params {
            JointParams::Ball(j) => j.set_anchor(&b1, b2.as_ref(), anchor),
            JointParams::Hinge(j) => j.set_anchor(&b1, b2.as_ref(), anchor),
            JointParams::Hinge2(j) => j.set_anchor(&b1, b2.as_ref(), anchor),
            JointParams::Universal(j) => j.set_anchor(&b1, b2.as_ref(), anchor),
            p => panic!("{:?} joints have no anchor point", p.kind()),
        }
    }

    /// Sets the axis (world space) of a hinge or slider joint.
    pub fn set_joint_axis(&mut self, handle: JointHandle, axis: Vector) {
        let (b1, b2) = {
            let (b1, b2) = self.joint_bodies(handle);
            (b1.clone(), b2.cloned())
        };
        match &mut self.joints[handle].params {
            JointParams::Hinge(j) => j.set_axis(&b1, b2.as_ref(), axis),
            JointParams::Slider(j) => j.set_axis(&b1, b2.as_ref(), axis),
            p => panic!("{:?} joints have no single axis", p.kind()),
        }
    }

    /// Sets both axes (world space) of a hinge-2 or universal joint.
    pub fn set_joint_axes(&mut self, handle: JointHandle, axis1: Vector, axis2: Vector) {
        let (b1, b2) = {
            let (b1, b2) = self.joint_bodies(handle);
            (b1.clone(), b2.cloned())
        };
        match &mut self.joints[handle].params {
            JointParams::Hinge2(j) => j.set_axes(&b1, b2.as_ref(), axis1, axis2),
            JointParams::Universal(j) => j.set_axes(&b1, b2.as_ref(), axis1, axis2),
            p => panic!("{:?} joints do not have two axes", p.kind()),
        }
    }

    /// Captures the current relative configuration of a fixed joint's
    /// bodies as the configuration to maintain.
    pub fn set_joint_fixed(&mut self, handle: JointHandle) {
        let (b1, b2) = {
            let (b1, b2) = self.joint_bodies(handle);
            (b1.clone(), b2.cloned())
        };
        match &mut self.joints[handle].params {
            JointParams::Fixed(j) => j.set_fixed(&b1, b2.as_ref()),
            p => panic!("{:?} is not a fixed joint", p.kind()),
        }
    }

    /// Sets a limit/motor parameter on the given axis group of a joint.
    pub fn set_joint_param(
        &mut self,
        handle: JointHandle,
        axis_group: usize,
        param: JointParam,
        value: Real,
    ) {
        self.joints[handle].set_param(axis_group, param, value);
    }

    /// Reads a limit/motor parameter of the given axis group of a joint.
    pub fn joint_param(&self, handle: JointHandle, axis_group: usize, param: JointParam) -> Real {
        self.joints[handle].param(axis_group, param)
    }

    /// The current angle (hinge) or position (slider) of a joint's first
    /// degree of freedom.
    pub fn joint_position(&self, handle: JointHandle) -> Real {
        let (b1, b2) = self.joint_bodies(handle);
        match &self.joints[handle].params {
            JointParams::Hinge(j) => j.angle(b1, b2),
            JointParams::Slider(j) => j.position(b1, b2),
            JointParams::Hinge2(j) => j.angle1(b1, b2),
            JointParams::Universal(j) => j.angle1(b1, b2),
            p => panic!("{:?} joints have no primary position", p.kind()),
        }
    }

    /// The time derivative of [`Self::joint_position`].
    pub fn joint_position_rate(&self, handle: JointHandle) -> Real {
        let (b1, b2) = self.joint_bodies(handle);
        match &self.joints[handle].params {
            JointParams::Hinge(j) => j.angle_rate(b1, b2),
            JointParams::Slider(j) => j.position_rate(b1, b2),
            JointParams::Hinge2(j) => j.angle1_rate(b1, b2),
            JointParams::Universal(j) => j.angle1_rate(b1, b2),
            p => panic!("{:?} joints have no primary position", p.kind()),
        }
    }

    /*
     * Stepping.
     */

    /// Advances the simulation by the fixed timestep `h`, using the
    /// block-structured assembly path.
    ///
    /// Panics if `h` is not positive.
    pub fn step(&mut self, h: Real) {
        self.step_with_method(h, StepMethod::BlockSparse);
    }

    /// Advances the simulation by `h` using the straightforward
    /// dense-matrix assembly path.
    ///
    /// This produces the same results as [`Self::step`] up to floating
    /// point noise; it exists as the cross-checking reference and is not
    /// meant for production stepping.
    pub fn step_dense(&mut self, h: Real) {
        self.step_with_method(h, StepMethod::Dense);
    }

    fn step_with_method(&mut self, h: Real, method: StepMethod) {
        assert!(h > 0.0, "the timestep must be positive");

        self.islands.update(&mut self.bodies, &mut self.joints);
        for island in 0..self.islands.num_islands() {
            step_island(
                &mut self.bodies,
                &mut self.joints,
                self.islands.island_bodies(island),
                self.islands.island_joints(island),
                &self.gravity,
                &self.params,
                h,
                method,
            );
        }
    }

    /// Convenience constructors for the joint kinds that take world
    /// parameters as defaults.
    pub fn new_joint(&mut self, kind: JointKind) -> JointHandle {
        let params = match kind {
            JointKind::Ball => JointParams::Ball(BallJoint::new()),
            JointKind::Hinge => JointParams::Hinge(HingeJoint::new(&self.params)),
            JointKind::Slider => JointParams::Slider(SliderJoint::new(&self.params)),
            JointKind::Hinge2 => JointParams::Hinge2(Hinge2Joint::new(&self.params)),
            JointKind::Universal => JointParams::Universal(UniversalJoint::new(&self.params)),
            JointKind::Fixed => JointParams::Fixed(FixedJoint::new()),
            JointKind::AngularMotor => {
                JointParams::AngularMotor(AngularMotorJoint::new(&self.params))
            }
            JointKind::Null => JointParams::Null,
            JointKind::Contact => {
                panic!("contact joints are created from contact records")
            }
        };
        self.insert_joint(params)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::{MassProperties, RigidBodyBuilder};
    use crate::geometry::{ContactGeom, SurfaceFlags, SurfaceParams};
    use approx::assert_relative_eq;

    const H: Real = 1.0 / 60.0;

    #[test]
    fn resting_state_is_a_fixed_point() {
        let mut world = World::new();
        let b1 = world.insert_body(RigidBodyBuilder::new().build());
        let b2 = world.insert_body(
            RigidBodyBuilder::new()
                .position(Vector::new(2.0, 0.0, 0.0))
                .build(),
        );
        let j = world.new_joint(JointKind::Ball);
        world.attach_joint(j, Some(b1), Some(b2));
        world.set_joint_anchor(j, Vector::new(1.0, 0.0, 0.0));

        let p1 = world.body(b1).position();
        let q1 = world.body(b1).orientation();
        for _ in 0..10 {
            world.step(H);
        }
        // No forces, no velocities, no constraint error: nothing may move.
        assert_relative_eq!(world.body(b1).position(), p1, epsilon = 1.0e-12);
        assert_relative_eq!(
            world.body(b1).orientation().angle_to(&q1),
            0.0,
            epsilon = 1.0e-12
        );
        assert_relative_eq!(world.body(b1).linvel(), Vector::zeros(), epsilon = 1.0e-12);
    }

    #[test]
    fn ball_joint_keeps_anchors_coincident_under_load() {
        let mut world = World::new();
        world.gravity = Vector::new(0.0, -9.81, 0.0);

        let b1 = world.insert_body(RigidBodyBuilder::new().build());
        let b2 = world.insert_body(
            RigidBodyBuilder::new()
                .position(Vector::new(1.0, 0.0, 0.0))
                .build(),
        );
        let j = world.new_joint(JointKind::Ball);
        world.attach_joint(j, Some(b1), Some(b2));
        world.set_joint_anchor(j, Vector::new(0.5, 0.0, 0.0));

        for k in 0..240 {
            // An arbitrary, time-varying external force on one body.
            let f = Vector::new((k as Real * 0.1).sin() * 5.0, 3.0, (k as Real * 0.07).cos());
            world.body_mut(b1).add_force(f);
            world.step(H);

            let joint = world.joint(j);
            let ball = joint.params.as_ball().unwrap();
            let a1 = ball.anchor1_world(world.body(b1));
            let a2 = ball.anchor2_world(Some(world.body(b2)));
            assert!(
                (a1 - a2).norm() < 1.0e-2,
                "anchors drifted apart: {:?} vs {:?} at step {}",
                a1,
                a2,
                k
            );
        }
    }

    #[test]
    fn one_body_ball_joint_pins_to_the_static_frame() {
        let mut world = World::new();
        world.gravity = Vector::new(0.0, -9.81, 0.0);

        let b = world.insert_body(RigidBodyBuilder::new().build());
        let j = world.new_joint(JointKind::Ball);
        world.attach_joint(j, Some(b), None);
        world.set_joint_anchor(j, Vector::new(0.0, 1.0, 0.0));

        for _ in 0..240 {
            world.step(H);
        }
        // The body swings but its anchor point must stay pinned.
        let ball = world.joint(j).params.as_ball().unwrap();
        let a = ball.anchor1_world(world.body(b));
        assert!(
            (a - Vector::new(0.0, 1.0, 0.0)).norm() < 1.0e-2,
            "anchor left the pin: {:?}",
            a
        );
    }

    #[test]
    fn dense_and_sparse_steps_agree() {
        let build = || {
            let mut world = World::new();
            world.gravity = Vector::new(0.0, -9.81, 0.0);

            let b1 = world.insert_body(
                RigidBodyBuilder::new()
                    .angvel(Vector::new(0.2, 1.0, -0.4))
                    .build(),
            );
            let b2 = world.insert_body(
                RigidBodyBuilder::new()
                    .position(Vector::new(1.0, 0.0, 0.0))
                    .linvel(Vector::new(0.0, 0.5, 0.0))
                    .build(),
            );
            let b3 = world.insert_body(
                RigidBodyBuilder::new()
                    .position(Vector::new(2.0, 0.0, 0.0))
                    .build(),
            );

            let hinge = world.new_joint(JointKind::Hinge);
            world.attach_joint(hinge, Some(b1), Some(b2));
            world.set_joint_anchor(hinge, Vector::new(0.5, 0.0, 0.0));
            world.set_joint_axis(hinge, Vector::new(0.0, 0.0, 1.0));
            world.set_joint_param(hinge, 1, JointParam::LoStop, -0.4);
            world.set_joint_param(hinge, 1, JointParam::HiStop, 0.4);
            world.set_joint_param(hinge, 1, JointParam::FMax, 2.0);
            world.set_joint_param(hinge, 1, JointParam::Vel, 1.0);

            let ball = world.new_joint(JointKind::Ball);
            world.attach_joint(ball, Some(b2), Some(b3));
            world.set_joint_anchor(ball, Vector::new(1.5, 0.0, 0.0));

            // A contact with friction between b3 and the static frame.
            let group = world.create_joint_group();
            let contact = Contact {
                surface: SurfaceParams {
                    flags: SurfaceFlags::APPROX1,
                    mu: 0.4,
                    ..SurfaceParams::default()
                },
                geom: ContactGeom {
                    pos: Vector::new(2.0, -0.5, 0.0),
                    normal: Vector::new(0.0, 1.0, 0.0),
                    depth: 0.01,
                },
                fdir1: Vector::zeros(),
            };
            world.insert_contact_joint(contact, Some(b3), None, group);

            (world, [b1, b2, b3])
        };

        let (mut sparse_world, handles) = build();
        let (mut dense_world, _) = build();

        sparse_world.step(H);
        dense_world.step_dense(H);

        for hb in handles {
            let s = sparse_world.body(hb);
            let d = dense_world.body(hb);
            assert_relative_eq!(s.linvel(), d.linvel(), epsilon = 1.0e-6);
            assert_relative_eq!(s.angvel(), d.angvel(), epsilon = 1.0e-6);
            assert_relative_eq!(s.position(), d.position(), epsilon = 1.0e-6);
        }
    }

    #[test]
    fn head_on_spheres_stop_interpenetrating() {
        // Two unit-mass spheres of radius 0.5, centers 0.9 apart along X,
        // approaching at 1 m/s each, coupled by a single frictionless
        // contact. fps = 60, erp = 0.2.
        let mut world = World::new();
        world.params.erp = 0.2;

        let a = world.insert_body(
            RigidBodyBuilder::new()
                .mass_properties(MassProperties::ball(1.0, 0.5))
                .linvel(Vector::new(1.0, 0.0, 0.0))
                .build(),
        );
        let b = world.insert_body(
            RigidBodyBuilder::new()
                .position(Vector::new(0.9, 0.0, 0.0))
                .mass_properties(MassProperties::ball(1.0, 0.5))
                .linvel(Vector::new(-1.0, 0.0, 0.0))
                .build(),
        );

        // The normal (1, 0, 0) points towards the first attached body, so
        // the sphere it points at is body 1.
        let group = world.create_joint_group();
        let contact = Contact::frictionless(Vector::new(0.45, 0.0, 0.0), Vector::x(), 0.1);
        let j = world.insert_contact_joint(contact, Some(b), Some(a), group);
        world.joint_mut(j).set_feedback_enabled(true);

        world.step(H);

        // The contact must at least stop the approach.
        let rel_normal_vel = (world.body(b).linvel() - world.body(a).linvel()).x;
        assert!(
            rel_normal_vel >= -1.0e-9,
            "bodies still approaching: {}",
            rel_normal_vel
        );
        // And must only ever push, not pull.
        let feedback = world.joint(j).feedback().unwrap();
        assert!(
            feedback.force1.x >= -1.0e-9,
            "normal force must be non-negative: {:?}",
            feedback.force1
        );
    }

    #[test]
    fn hinge_motor_drives_towards_target_velocity() {
        let mut world = World::new();
        let b = world.insert_body(RigidBodyBuilder::new().build());
        let j = world.new_joint(JointKind::Hinge);
        world.attach_joint(j, Some(b), None);
        world.set_joint_anchor(j, Vector::zeros());
        world.set_joint_axis(j, Vector::z());
        world.set_joint_param(j, 1, JointParam::FMax, 100.0);
        world.set_joint_param(j, 1, JointParam::Vel, 2.0);

        for _ in 0..60 {
            world.step(H);
        }
        assert_relative_eq!(world.joint_position_rate(j), 2.0, epsilon = 1.0e-6);
    }

    #[test]
    fn hinge_limits_clamp_the_angle() {
        let mut world = World::new();
        let b = world.insert_body(RigidBodyBuilder::new().build());
        let j = world.new_joint(JointKind::Hinge);
        world.attach_joint(j, Some(b), None);
        world.set_joint_anchor(j, Vector::zeros());
        world.set_joint_axis(j, Vector::z());
        world.set_joint_param(j, 1, JointParam::LoStop, -0.5);
        world.set_joint_param(j, 1, JointParam::HiStop, 0.5);

        // Drive the body into the high stop with a constant torque.
        for _ in 0..600 {
            world.body_mut(b).add_torque(Vector::new(0.0, 0.0, 2.0));
            world.step(H);
        }
        let angle = world.joint_position(j);
        assert!(
            angle <= 0.5 + 0.05,
            "angle {} exceeded the high stop noticeably",
            angle
        );
        assert!(angle > 0.3, "the torque should have reached the stop");
    }

    #[test]
    fn gravity_exempt_bodies_hover() {
        let mut world = World::new();
        world.gravity = Vector::new(0.0, -9.81, 0.0);
        let normal = world.insert_body(RigidBodyBuilder::new().build());
        let exempt = world.insert_body(RigidBodyBuilder::new().gravity_exempt().build());

        world.step(H);
        assert!(world.body(normal).linvel().y < 0.0);
        assert_relative_eq!(world.body(exempt).linvel(), Vector::zeros(), epsilon = 1.0e-12);
    }

    #[test]
    fn disabled_bodies_do_not_move() {
        let mut world = World::new();
        world.gravity = Vector::new(0.0, -9.81, 0.0);
        let b = world.insert_body(RigidBodyBuilder::new().disabled().build());

        for _ in 0..10 {
            world.step(H);
        }
        assert_relative_eq!(world.body(b).position(), Vector::zeros());
        assert_relative_eq!(world.body(b).linvel(), Vector::zeros());
    }

    #[test]
    fn resting_contact_feedback_carries_the_weight() {
        let mut world = World::new();
        world.gravity = Vector::new(0.0, -9.81, 0.0);
        let b = world.insert_body(
            RigidBodyBuilder::new()
                .position(Vector::new(0.0, 0.5, 0.0))
                .mass_properties(MassProperties::ball(2.0, 0.5))
                .build(),
        );

        let group = world.create_joint_group();
        let contact = Contact::frictionless(Vector::zeros(), Vector::y(), 0.0);
        let j = world.insert_contact_joint(contact, Some(b), None, group);
        world.joint_mut(j).set_feedback_enabled(true);

        world.step(H);

        // The contact must cancel gravity exactly: N = m·g.
        let feedback = world.joint(j).feedback().unwrap();
        assert_relative_eq!(feedback.force1.y, 2.0 * 9.81, max_relative = 1.0e-6);
        assert_relative_eq!(world.body(b).linvel().y, 0.0, epsilon = 1.0e-9);
    }

    #[test]
    #[should_panic(expected = "timestep must be positive")]
    fn non_positive_timestep_is_a_contract_violation() {
        let mut world = World::new();
        world.step(0.0);
    }

    #[test]
    fn slider_limits_and_motor_cooperate() {
        let mut world = World::new();
        let b = world.insert_body(RigidBodyBuilder::new().build());
        let j = world.new_joint(JointKind::Slider);
        world.attach_joint(j, Some(b), None);
        world.set_joint_axis(j, Vector::x());
        world.set_joint_param(j, 1, JointParam::LoStop, -0.2);
        world.set_joint_param(j, 1, JointParam::HiStop, 0.2);
        world.set_joint_param(j, 1, JointParam::FMax, 50.0);
        world.set_joint_param(j, 1, JointParam::Vel, 1.0);

        for _ in 0..300 {
            world.step(H);
        }
        let pos = world.joint_position(j);
        // The motor pushes to the high stop and holds there.
        assert!(pos <= 0.2 + 0.02, "position {} overran the stop", pos);
        assert!(pos >= 0.15, "position {} never reached the stop", pos);
    }
}
