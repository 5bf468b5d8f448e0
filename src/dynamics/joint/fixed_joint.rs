//! The fixed joint.

use crate::dynamics::joint::joint::{relative_rotation, set_ball_rows, set_orientation_rows};
use crate::dynamics::joint::ConstraintRow;
use crate::dynamics::{RigidBody, RigidBodyHandle, RigidBodySet};
use crate::math::{Real, Rotation, Vector};

/// A joint that removes all relative movement between two bodies.
///
/// Mostly useful to temporarily glue bodies together, or to pin a body to
/// the static frame; permanently rigid assemblies are better modeled as a
/// single body.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct FixedJoint {
    /// Body 2's position at fixation time, in body 1's frame (world position
    /// if body 2 is absent).
    pub(crate) offset: Vector,
    /// Relative orientation at fixation time.
    pub(crate) q_initial: Rotation,
}

impl Default for FixedJoint {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedJoint {
    /// Creates a fixed joint; call [`Self::set_fixed`] once attached to
    /// capture the current relative configuration.
    pub fn new() -> Self {
        Self {
            offset: Vector::zeros(),
            q_initial: Rotation::identity(),
        }
    }

    /// Captures the current relative position and orientation of the two
    /// bodies as the configuration to maintain.
    pub fn set_fixed(&mut self, b1: &RigidBody, b2: Option<&RigidBody>) {
        self.offset = match b2 {
            Some(b2) => b1.point_to_local(b2.position),
            None => b1.position,
        };
        self.q_initial = relative_rotation(b1, b2);
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

        // The linear part is a ball joint whose body-1 anchor is body 2's
        // captured position and whose body-2 anchor is its own center.
        match &b2 {
            Some(_) => {
                set_ball_rows(rows, &b1, b2.as_ref(), &self.offset, &Vector::zeros(), k)
            }
            None => set_ball_rows(rows, &b1, None, &Vector::zeros(), &self.offset, k),
        }

        set_orientation_rows(&mut rows[3..6], &b1, b2.as_ref(), &self.q_initial, k);
    }
}
