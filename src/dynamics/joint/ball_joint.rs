//! The ball-and-socket joint.

use crate::dynamics::joint::joint::set_ball_rows;
use crate::dynamics::joint::ConstraintRow;
use crate::dynamics::{RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Vector};

/// A ball-and-socket joint: the anchor points of the two bodies are forced
/// to coincide, removing the three relative translational degrees of
/// freedom.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BallJoint {
    /// Anchor in the local frame of body 1.
    pub(crate) anchor1: Vector,
    /// Anchor in the local frame of body 2, or in world space when the joint
    /// connects body 1 to the static frame.
    pub(crate) anchor2: Vector,
}

impl Default for BallJoint {
    fn default() -> Self {
        Self::new()
    }
}

impl BallJoint {
    /// Creates a ball joint; the anchor is set after attachment.
    pub fn new() -> Self {
        Self {
            anchor1: Vector::zeros(),
            anchor2: Vector::zeros(),
        }
    }

    /// Sets the anchor point, given in world space, capturing it in each
    /// body's local frame.
    pub fn set_anchor(&mut self, b1: &RigidBody, b2: Option<&RigidBody>, world_anchor: Vector) {
        self.anchor1 = b1.point_to_local(world_anchor);
        self.anchor2 = match b2 {
            Some(b2) => b2.point_to_local(world_anchor),
            None => world_anchor,
        };
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
        set_ball_rows(rows, &b1, b2.as_ref(), &self.anchor1, &self.anchor2, fps * erp);
    }
}
