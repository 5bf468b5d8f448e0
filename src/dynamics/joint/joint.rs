//! The joint type and the two-phase constraint-row contract shared by every
//! joint kind.

use crate::dynamics::joint::{
    AngularMotorJoint, BallJoint, ContactJoint, FixedJoint, Hinge2Joint, HingeJoint, JointParam,
    SliderJoint, UniversalJoint,
};
use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Rotation, Vector};

/// Row counts reported by a joint for the current step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstraintInfo1 {
    /// The number of constraint rows the joint contributes this step. This
    /// depends on the current limit/motor state and is recomputed on every
    /// query.
    pub m: usize,
    /// How many of those rows are unbounded (equality constraints) rather
    /// than box-constrained.
    pub nub: usize,
}

/// One row of the constraint Jacobian, together with its right hand side,
/// softness and bounds.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ConstraintRow {
    /// Linear Jacobian block of the first body.
    pub j1_linear: Vector,
    /// Angular Jacobian block of the first body.
    pub j1_angular: Vector,
    /// Linear Jacobian block of the second body (zero if absent).
    pub j2_linear: Vector,
    /// Angular Jacobian block of the second body (zero if absent).
    pub j2_angular: Vector,
    /// Target value of the row (relative velocity along the constraint
    /// direction, including the `fps·erp` drift-correction term).
    pub rhs: Real,
    /// Constraint force mixing of this row.
    pub cfm: Real,
    /// Low force bound.
    pub lo: Real,
    /// High force bound.
    pub hi: Real,
    /// If set, the bounds are a ratio applied to the solved magnitude of the
    /// referenced row (index local to this joint; re-based by the step
    /// orchestrator).
    pub findex: Option<usize>,
}

impl ConstraintRow {
    /// An inactive equality row with the given default constraint force
    /// mixing.
    pub(crate) fn with_cfm(cfm: Real) -> Self {
        Self {
            j1_linear: Vector::zeros(),
            j1_angular: Vector::zeros(),
            j2_linear: Vector::zeros(),
            j2_angular: Vector::zeros(),
            rhs: 0.0,
            cfm,
            lo: -Real::INFINITY,
            hi: Real::INFINITY,
            findex: None,
        }
    }
}

/// The resolved constraint force a joint applied to its bodies during the
/// last step, filled when feedback is enabled on the joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct JointFeedback {
    /// Force applied to the first body.
    pub force1: Vector,
    /// Torque applied to the first body.
    pub torque1: Vector,
    /// Force applied to the second body.
    pub force2: Vector,
    /// Torque applied to the second body.
    pub torque2: Vector,
}

impl Default for JointFeedback {
    fn default() -> Self {
        Self {
            force1: Vector::zeros(),
            torque1: Vector::zeros(),
            force2: Vector::zeros(),
            torque2: Vector::zeros(),
        }
    }
}

/// The kind tag of a joint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointKind {
    /// Ball-and-socket.
    Ball,
    /// Hinge (one rotational degree of freedom).
    Hinge,
    /// Slider (one translational degree of freedom).
    Slider,
    /// Two hinges in series, with suspension (a wheel joint).
    Hinge2,
    /// Universal joint (two perpendicular hinges).
    Universal,
    /// No relative motion at all.
    Fixed,
    /// A transient contact.
    Contact,
    /// A motor acting on relative orientation only.
    AngularMotor,
    /// A joint with no effect; a placeholder awaiting configuration.
    Null,
}

/// An enum grouping all possible kinds of joints.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointParams {
    /// A ball-and-socket joint, removing the three relative translational
    /// degrees of freedom.
    Ball(BallJoint),
    /// A hinge joint, leaving only a rotation about one axis.
    Hinge(HingeJoint),
    /// A slider joint, leaving only a translation along one axis.
    Slider(SliderJoint),
    /// A hinge-2 joint: steering hinge plus wheel hinge with suspension.
    Hinge2(Hinge2Joint),
    /// A universal joint: two perpendicular hinges sharing an anchor.
    Universal(UniversalJoint),
    /// A fixed joint, removing all relative degrees of freedom.
    Fixed(FixedJoint),
    /// A transient contact joint synthesized from a collision contact.
    Contact(ContactJoint),
    /// An angular motor driving up to three rotational axes.
    AngularMotor(AngularMotorJoint),
    /// A joint contributing no constraints.
    Null,
}

impl JointParams {
    /// The kind tag of this joint.
    pub fn kind(&self) -> JointKind {
        match self {
            JointParams::Ball(_) => JointKind::Ball,
            JointParams::Hinge(_) => JointKind::Hinge,
            JointParams::Slider(_) => JointKind::Slider,
            JointParams::Hinge2(_) => JointKind::Hinge2,
            JointParams::Universal(_) => JointKind::Universal,
            JointParams::Fixed(_) => JointKind::Fixed,
            JointParams::Contact(_) => JointKind::Contact,
            JointParams::AngularMotor(_) => JointKind::AngularMotor,
            JointParams::Null => JointKind::Null,
        }
    }

    /// Gets a reference to the underlying ball joint, if `self` is one.
    pub fn as_ball(&self) -> Option<&BallJoint> {
        if let JointParams::Ball(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying hinge joint, if `self` is one.
    pub fn as_hinge(&self) -> Option<&HingeJoint> {
        if let JointParams::Hinge(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying slider joint, if `self` is one.
    pub fn as_slider(&self) -> Option<&SliderJoint> {
        if let JointParams::Slider(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying hinge-2 joint, if `self` is one.
    pub fn as_hinge2(&self) -> Option<&Hinge2Joint> {
        if let JointParams::Hinge2(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying universal joint, if `self` is one.
    pub fn as_universal(&self) -> Option<&UniversalJoint> {
        if let JointParams::Universal(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying fixed joint, if `self` is one.
    pub fn as_fixed(&self) -> Option<&FixedJoint> {
        if let JointParams::Fixed(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying contact joint, if `self` is one.
    pub fn as_contact(&self) -> Option<&ContactJoint> {
        if let JointParams::Contact(j) = self {
            Some(j)
        } else {
            None
        }
    }

    /// Gets a reference to the underlying angular motor joint, if `self` is
    /// one.
    pub fn as_angular_motor(&self) -> Option<&AngularMotorJoint> {
        if let JointParams::AngularMotor(j) = self {
            Some(j)
        } else {
            None
        }
    }
}

impl From<BallJoint> for JointParams {
    fn from(j: BallJoint) -> Self {
        JointParams::Ball(j)
    }
}

impl From<HingeJoint> for JointParams {
    fn from(j: HingeJoint) -> Self {
        JointParams::Hinge(j)
    }
}

impl From<SliderJoint> for JointParams {
    fn from(j: SliderJoint) -> Self {
        JointParams::Slider(j)
    }
}

impl From<Hinge2Joint> for JointParams {
    fn from(j: Hinge2Joint) -> Self {
        JointParams::Hinge2(j)
    }
}

impl From<UniversalJoint> for JointParams {
    fn from(j: UniversalJoint) -> Self {
        JointParams::Universal(j)
    }
}

impl From<FixedJoint> for JointParams {
    fn from(j: FixedJoint) -> Self {
        JointParams::Fixed(j)
    }
}

impl From<ContactJoint> for JointParams {
    fn from(j: ContactJoint) -> Self {
        JointParams::Contact(j)
    }
}

impl From<AngularMotorJoint> for JointParams {
    fn from(j: AngularMotorJoint) -> Self {
        JointParams::AngularMotor(j)
    }
}

/// A joint, its body attachments and per-step bookkeeping.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Joint {
    /// Handle of the first attached body. `None` only while unattached.
    pub(crate) body1: Option<RigidBodyHandle>,
    /// Handle of the second attached body; `None` means the joint connects
    /// the first body to the static world frame.
    pub(crate) body2: Option<RigidBodyHandle>,
    /// Set when `attach` swapped the bodies to keep `body1` occupied; kind
    /// implementations with asymmetric conventions (contacts) honor it.
    pub(crate) reverse: bool,
    /// Bulk-destruction group membership; a grouped joint cannot be
    /// destroyed individually.
    pub(crate) group: Option<super::JointGroupHandle>,
    /// Constraint-force feedback, collected when `Some`.
    pub(crate) feedback: Option<JointFeedback>,
    // Island bookkeeping, only meaningful while its timestamp matches the
    // island manager's.
    pub(crate) island_timestamp: u32,
    /// The joint geometric parameters, limits and motors.
    pub params: JointParams,
}

impl Joint {
    pub(crate) fn new(params: JointParams) -> Self {
        Self {
            body1: None,
            body2: None,
            reverse: false,
            group: None,
            feedback: None,
            island_timestamp: 0,
            params,
        }
    }

    /// The first attached body, if any.
    #[inline]
    pub fn body1(&self) -> Option<RigidBodyHandle> {
        self.body1
    }

    /// The second attached body. `None` means the static world frame.
    #[inline]
    pub fn body2(&self) -> Option<RigidBodyHandle> {
        self.body2
    }

    /// Enables (or disables) collection of the resolved constraint forces
    /// applied by this joint.
    pub fn set_feedback_enabled(&mut self, enabled: bool) {
        self.feedback = enabled.then(JointFeedback::default);
    }

    /// The constraint forces applied by this joint during the last step, if
    /// feedback collection is enabled.
    pub fn feedback(&self) -> Option<&JointFeedback> {
        self.feedback.as_ref()
    }

    /// Sets one limit/motor parameter of the given axis group (1-based, as
    /// in `axis 1`/`axis 2`; kinds with a single drivable axis use group 1).
    ///
    /// Out-of-range values, unknown groups and parameters the kind does not
    /// have are silently ignored.
    pub fn set_param(&mut self, axis_group: usize, param: JointParam, value: Real) {
        match &mut self.params {
            JointParams::Hinge(j) if axis_group == 1 => j.limot.set(param, value),
            JointParams::Slider(j) if axis_group == 1 => j.limot.set(param, value),
            JointParams::Hinge2(j) => j.set_param(axis_group, param, value),
            JointParams::Universal(j) if axis_group == 1 => j.limot1.set(param, value),
            JointParams::Universal(j) if axis_group == 2 => j.limot2.set(param, value),
            JointParams::AngularMotor(j) if (1..=3).contains(&axis_group) => {
                j.limot[axis_group - 1].set(param, value)
            }
            _ => (),
        }
    }

    /// Reads one limit/motor parameter of the given axis group back. Returns
    /// `0.0` for parameters the kind does not have.
    pub fn param(&self, axis_group: usize, param: JointParam) -> Real {
        match &self.params {
            JointParams::Hinge(j) if axis_group == 1 => j.limot.get(param),
            JointParams::Slider(j) if axis_group == 1 => j.limot.get(param),
            JointParams::Hinge2(j) => j.param(axis_group, param),
            JointParams::Universal(j) if axis_group == 1 => j.limot1.get(param),
            JointParams::Universal(j) if axis_group == 2 => j.limot2.get(param),
            JointParams::AngularMotor(j) if (1..=3).contains(&axis_group) => {
                j.limot[axis_group - 1].get(param)
            }
            _ => 0.0,
        }
    }

    /// First phase of the row contract: how many rows, and how many of them
    /// unbounded, does this joint contribute this step?
    pub(crate) fn info1(&mut self, bodies: &RigidBodySet) -> ConstraintInfo1 {
        let Some(h1) = self.body1 else {
            return ConstraintInfo1::default();
        };
        let b1 = &bodies[h1];
        let b2 = self.body2.map(|h| &bodies[h]);

        match &mut self.params {
            JointParams::Ball(_) => ConstraintInfo1 { m: 3, nub: 3 },
            JointParams::Hinge(j) => j.info1(b1, b2),
            JointParams::Slider(j) => j.info1(b1, b2),
            JointParams::Hinge2(j) => j.info1(b1, b2),
            JointParams::Universal(j) => j.info1(b1, b2),
            JointParams::Fixed(_) => ConstraintInfo1 { m: 6, nub: 6 },
            JointParams::Contact(j) => j.info1(),
            JointParams::AngularMotor(j) => j.info1(b1, b2),
            JointParams::Null => ConstraintInfo1::default(),
        }
    }

    /// Second phase of the row contract: fill the `m` rows reported by the
    /// matching [`Self::info1`] call.
    ///
    /// `rows` arrives pre-initialized with the world CFM and unbounded
    /// limits.
    pub(crate) fn info2(
        &mut self,
        h: Real,
        world: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        rows: &mut [ConstraintRow],
    ) {
        let h1 = self
            .body1
            .expect("info2 called on an unattached joint");
        let h2 = self.body2;
        let fps = 1.0 / h;
        let erp = world.erp;

        match &mut self.params {
            JointParams::Ball(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Hinge(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Slider(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Hinge2(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Universal(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Fixed(j) => j.info2(bodies, h1, h2, fps, erp, rows),
            JointParams::Contact(j) => j.info2(bodies, h1, h2, self.reverse, fps, world, rows),
            JointParams::AngularMotor(j) => j.info2(bodies, h1, h2, fps, rows),
            JointParams::Null => (),
        }
    }
}

/*
 * Shared row-construction helpers.
 */

/// The relative rotation `q1⁻¹·q2` of the two bodies (`q2 = identity` for
/// the static frame).
pub(crate) fn relative_rotation(b1: &RigidBody, b2: Option<&RigidBody>) -> Rotation {
    match b2 {
        Some(b2) => b1.orientation.inverse() * b2.orientation,
        None => b1.orientation.inverse(),
    }
}

/// The angle of the relative rotation drift since `q_initial` about the
/// body-1-local `axis`, in `(-π, π]`.
///
/// The quaternion's vector part is projected onto the axis rather than taking
/// its norm, so the reading keeps its sign as the quaternion crosses between
/// its two equivalent representations and the angle does not appear to
/// reverse.
pub(crate) fn joint_angle(
    b1: &RigidBody,
    b2: Option<&RigidBody>,
    q_initial: &Rotation,
    axis: &Vector,
) -> Real {
    // Positive when body 1 leads body 2 about the axis, matching the row
    // value convention `axis·(w1 - w2)` of the limit motors.
    let qerr = *q_initial * relative_rotation(b1, b2).inverse();
    let q = qerr.quaternion();
    let sin_half = q.imag().dot(axis);
    let cos_half = q.w;
    let mut theta = 2.0 * sin_half.atan2(cos_half);
    if theta > std::f64::consts::PI {
        theta -= 2.0 * std::f64::consts::PI;
    } else if theta <= -std::f64::consts::PI {
        theta += 2.0 * std::f64::consts::PI;
    }
    theta
}

/// The world-frame rotation by which body 2 leads body 1 beyond the stored
/// initial relative orientation, as a (doubled, small-angle) rotation vector.
///
/// Used as the drift term of orientation-equality rows (`rhs = k·err`).
pub(crate) fn rotation_error(
    b1: &RigidBody,
    b2: Option<&RigidBody>,
    q_initial: &Rotation,
) -> Vector {
    let mut qerr = (relative_rotation(b1, b2) * q_initial.inverse()).into_inner();
    if qerr.w < 0.0 {
        qerr = -qerr;
    }
    b1.rotation * (2.0 * qerr.imag())
}

/// Fills three rows constraining the world-space velocity of `anchor1` (local
/// to body 1) to match that of `anchor2` (local to body 2, or a world point
/// if body 2 is absent), with positional drift corrected at rate `k`.
pub(crate) fn set_ball_rows(
    rows: &mut [ConstraintRow],
    b1: &RigidBody,
    b2: Option<&RigidBody>,
    anchor1: &Vector,
    anchor2: &Vector,
    k: Real,
) {
    let a1 = b1.rotation * anchor1;
    let err;

    for (r, e) in [Vector::x(), Vector::y(), Vector::z()].iter().enumerate() {
        rows[r].j1_linear = *e;
        rows[r].j1_angular = a1.cross(e);
    }
    if let Some(b2) = b2 {
        let a2 = b2.rotation * anchor2;
        for (r, e) in [Vector::x(), Vector::y(), Vector::z()].iter().enumerate() {
            rows[r].j2_linear = -e;
            rows[r].j2_angular = -a2.cross(e);
        }
        err = (b2.position + a2) - (b1.position + a1);
    } else {
        err = anchor2 - (b1.position + a1);
    }
    for r in 0..3 {
        rows[r].rhs = k * err[r];
    }
}

/// Like [`set_ball_rows`], but with the three rows aligned to `axis` and its
/// plane-space basis instead of the world axes, so that the first row (the
/// one along `axis`) can be given its own error reduction `k_axis` — this is
/// how the hinge-2 suspension softens exactly one translational direction.
pub(crate) fn set_ball_rows_aligned(
    rows: &mut [ConstraintRow],
    b1: &RigidBody,
    b2: Option<&RigidBody>,
    anchor1: &Vector,
    anchor2: &Vector,
    axis: &Vector,
    k_axis: Real,
    k: Real,
) {
    let [p, q] = crate::utils::orthonormal_basis(axis);
    let dirs = [*axis, p, q];

    let a1 = b1.rotation * anchor1;
    let err;

    for (r, u) in dirs.iter().enumerate() {
        rows[r].j1_linear = *u;
        rows[r].j1_angular = a1.cross(u);
    }
    if let Some(b2) = b2 {
        let a2 = b2.rotation * anchor2;
        for (r, u) in dirs.iter().enumerate() {
            rows[r].j2_linear = -u;
            rows[r].j2_angular = -a2.cross(u);
        }
        err = (b2.position + a2) - (b1.position + a1);
    } else {
        err = anchor2 - (b1.position + a1);
    }
    rows[0].rhs = k_axis * dirs[0].dot(&err);
    rows[1].rhs = k * dirs[1].dot(&err);
    rows[2].rhs = k * dirs[2].dot(&err);
}

/// Fills three rows forcing the relative angular velocity of the two bodies
/// to zero, with orientation drift away from `q_initial` corrected at rate
/// `k`. Used by the slider and fixed joints.
pub(crate) fn set_orientation_rows(
    rows: &mut [ConstraintRow],
    b1: &RigidBody,
    b2: Option<&RigidBody>,
    q_initial: &Rotation,
    k: Real,
) {
    let err = rotation_error(b1, b2, q_initial);
    for (r, e) in [Vector::x(), Vector::y(), Vector::z()].iter().enumerate() {
        rows[r].j1_angular = *e;
        if b2.is_some() {
            rows[r].j2_angular = -e;
        }
        rows[r].rhs = k * err[r];
    }
}
