//! The set of joints of a world.

use crate::data::arena::Arena;
use crate::dynamics::joint::Joint;
use crate::dynamics::RigidBodyHandle;

/// The unique identifier of a joint added to a [`JointSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct JointHandle(pub(crate) crate::data::arena::Index);

impl JointHandle {
    /// Converts this handle into its (slot, generation) components.
    pub fn into_raw_parts(self) -> (u32, u32) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (slot, generation) components.
    pub fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self(crate::data::arena::Index::from_raw_parts(index, generation))
    }
}

/// The identifier of a joint group: a bulk-destruction arena for transient
/// joints (typically contacts), created and cleared wholesale each step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct JointGroupHandle(pub(crate) u32);

/// A set of joints addressed by stable generational handles, maintaining
/// per-body adjacency so islands can be discovered by graph traversal.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct JointSet {
    pub(crate) joints: Arena<Joint>,
    /// Joint handles attached to each body, indexed by the body's arena
    /// slot. Replaces intrusive linked lists: adjacency is index lists.
    attached: Vec<Vec<JointHandle>>,
    next_group: u32,
}

impl JointSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            joints: Arena::new(),
            attached: Vec::new(),
            next_group: 0,
        }
    }

    /// The number of joints in this set.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Inserts an unattached joint and returns its handle.
    pub fn insert(&mut self, joint: Joint) -> JointHandle {
        debug_assert!(joint.body1.is_none() && joint.body2.is_none());
        JointHandle(self.joints.insert(joint))
    }

    /// Reserves a fresh joint group identifier.
    pub fn next_group(&mut self) -> JointGroupHandle {
        let g = JointGroupHandle(self.next_group);
        self.next_group += 1;
        g
    }

    /// Is the given handle valid?
    pub fn contains(&self, handle: JointHandle) -> bool {
        self.joints.contains(handle.0)
    }

    /// Gets the joint with the given handle.
    pub fn get(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle.0)
    }

    /// Gets the joint with the given handle, mutably.
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle.0)
    }

    /// Iterates over the joints with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter().map(|(i, j)| (JointHandle(i), j))
    }

    /// The handles of the joints attached to `body`.
    pub fn attached_joints(&self, body: RigidBodyHandle) -> &[JointHandle] {
        self.attached
            .get(body.0.slot())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Attaches a joint to one or two bodies. `None, None` detaches it.
    ///
    /// If only the second slot is given, the bodies are swapped so the first
    /// slot is always occupied, and the joint is flagged as reversed so
    /// asymmetric kinds keep their sign conventions.
    pub fn attach(
        &mut self,
        handle: JointHandle,
        body1: Option<RigidBodyHandle>,
        body2: Option<RigidBodyHandle>,
    ) {
        if let (Some(b1), Some(b2)) = (body1, body2) {
            assert!(b1 != b2, "cannot attach a joint to a body twice");
        }

        self.detach(handle);

        let joint = self
            .joints
            .get_mut(handle.0)
            .expect("attach: invalid joint handle");
        if body1.is_none() && body2.is_some() {
            joint.body1 = body2;
            joint.body2 = None;
            joint.reverse = true;
        } else {
            joint.body1 = body1;
            joint.body2 = body2;
            joint.reverse = false;
        }

        let (b1, b2) = (joint.body1, joint.body2);
        for body in [b1, b2].into_iter().flatten() {
            let slot = body.0.slot();
            if self.attached.len() <= slot {
                self.attached.resize_with(slot + 1, Vec::new);
            }
            self.attached[slot].push(handle);
        }
    }

    /// Detaches a joint from its bodies without removing it.
    pub fn detach(&mut self, handle: JointHandle) {
        let Some(joint) = self.joints.get_mut(handle.0) else {
            return;
        };
        let (b1, b2) = (joint.body1.take(), joint.body2.take());
        joint.reverse = false;
        for body in [b1, b2].into_iter().flatten() {
            if let Some(list) = self.attached.get_mut(body.0.slot()) {
                list.retain(|&h| h != handle);
            }
        }
    }

    /// Removes a joint, returning it if the handle was valid.
    ///
    /// Panics if the joint belongs to a group: grouped joints can only be
    /// destroyed by clearing their whole group.
    pub fn remove(&mut self, handle: JointHandle) -> Option<Joint> {
        if let Some(joint) = self.joints.get(handle.0) {
            assert!(
                joint.group.is_none(),
                "a grouped joint cannot be destroyed individually; clear its group"
            );
        }
        self.detach(handle);
        self.joints.remove(handle.0)
    }

    /// Removes every joint belonging to `group`.
    pub fn clear_group(&mut self, group: JointGroupHandle) {
        let members: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, j)| j.group == Some(group))
            .map(|(i, _)| JointHandle(i))
            .collect();
        for handle in members {
            self.detach(handle);
            self.joints.remove(handle.0);
        }
    }

    /// Detaches every joint attached to `body`; used when the body is
    /// removed.
    pub(crate) fn sever_body(&mut self, body: RigidBodyHandle) {
        let handles: Vec<JointHandle> = self.attached_joints(body).to_vec();
        for handle in handles {
            self.detach(handle);
        }
    }
}

impl std::ops::Index<JointHandle> for JointSet {
    type Output = Joint;

    fn index(&self, handle: JointHandle) -> &Joint {
        &self.joints[handle.0]
    }
}

impl std::ops::IndexMut<JointHandle> for JointSet {
    fn index_mut(&mut self, handle: JointHandle) -> &mut Joint {
        &mut self.joints[handle.0]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::joint::{Joint, JointParams};
    use crate::dynamics::{RigidBodyBuilder, RigidBodySet};

    #[test]
    fn attach_detach_maintains_adjacency() {
        let mut bodies = RigidBodySet::new();
        let b1 = bodies.insert(RigidBodyBuilder::new().build());
        let b2 = bodies.insert(RigidBodyBuilder::new().build());

        let mut joints = JointSet::new();
        let j = joints.insert(Joint::new(JointParams::Null));
        joints.attach(j, Some(b1), Some(b2));

        assert_eq!(joints.attached_joints(b1), &[j]);
        assert_eq!(joints.attached_joints(b2), &[j]);

        joints.detach(j);
        assert!(joints.attached_joints(b1).is_empty());
        assert!(joints.attached_joints(b2).is_empty());
    }

    #[test]
    fn second_slot_only_attachment_is_normalized() {
        let mut bodies = RigidBodySet::new();
        let b = bodies.insert(RigidBodyBuilder::new().build());

        let mut joints = JointSet::new();
        let j = joints.insert(Joint::new(JointParams::Null));
        joints.attach(j, None, Some(b));

        // The static frame is only ever the *second* slot.
        assert_eq!(joints[j].body1(), Some(b));
        assert_eq!(joints[j].body2(), None);
        assert!(joints[j].reverse);
    }

    #[test]
    #[should_panic(expected = "grouped joint")]
    fn grouped_joint_cannot_be_removed_individually() {
        let mut joints = JointSet::new();
        let group = joints.next_group();
        let j = joints.insert(Joint::new(JointParams::Null));
        joints.get_mut(j).unwrap().group = Some(group);
        let _ = joints.remove(j);
    }

    #[test]
    fn clear_group_removes_all_members() {
        let mut joints = JointSet::new();
        let group = joints.next_group();
        let j1 = joints.insert(Joint::new(JointParams::Null));
        let j2 = joints.insert(Joint::new(JointParams::Null));
        let j3 = joints.insert(Joint::new(JointParams::Null));
        joints.get_mut(j1).unwrap().group = Some(group);
        joints.get_mut(j2).unwrap().group = Some(group);

        joints.clear_group(group);
        assert!(!joints.contains(j1));
        assert!(!joints.contains(j2));
        assert!(joints.contains(j3));
    }
}
