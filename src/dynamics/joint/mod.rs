pub use self::angular_motor_joint::{AngularMotorJoint, AngularMotorMode, MotorAxisFrame};
pub use self::ball_joint::BallJoint;
pub use self::contact_joint::ContactJoint;
pub use self::fixed_joint::FixedJoint;
pub use self::hinge2_joint::Hinge2Joint;
pub use self::hinge_joint::HingeJoint;
pub(crate) use self::joint::ConstraintRow;
pub use self::joint::{ConstraintInfo1, Joint, JointFeedback, JointKind, JointParams};
pub use self::joint_set::{JointGroupHandle, JointHandle, JointSet};
pub use self::limit_motor::{JointParam, LimitMotor};
pub use self::slider_joint::SliderJoint;
pub use self::universal_joint::UniversalJoint;

mod angular_motor_joint;
mod ball_joint;
mod contact_joint;
mod fixed_joint;
mod hinge2_joint;
mod hinge_joint;
mod joint;
mod joint_set;
mod limit_motor;
mod slider_joint;
mod universal_joint;
