//! The set of rigid bodies of a world.

use crate::data::arena::Arena;
use crate::dynamics::RigidBody;

/// The unique identifier of a rigid body added to a [`RigidBodySet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RigidBodyHandle(pub(crate) crate::data::arena::Index);

impl RigidBodyHandle {
    /// Converts this handle into its (slot, generation) components.
    pub fn into_raw_parts(self) -> (u32, u32) {
        self.0.into_raw_parts()
    }

    /// Reconstructs a handle from its (slot, generation) components.
    pub fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self(crate::data::arena::Index::from_raw_parts(index, generation))
    }
}

/// A set of rigid bodies addressed by stable generational handles.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RigidBodySet {
    pub(crate) bodies: Arena<RigidBody>,
}

impl RigidBodySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            bodies: Arena::new(),
        }
    }

    /// The number of bodies in this set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Is this set empty?
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Inserts a body and returns its handle.
    pub fn insert(&mut self, body: RigidBody) -> RigidBodyHandle {
        RigidBodyHandle(self.bodies.insert(body))
    }

    /// Removes a body, returning it if the handle was valid.
    ///
    /// Prefer [`World::remove_body`](crate::dynamics::World::remove_body),
    /// which also severs the joints attached to the body.
    pub fn remove(&mut self, handle: RigidBodyHandle) -> Option<RigidBody> {
        self.bodies.remove(handle.0)
    }

    /// Is the given handle valid?
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// Gets the body with the given handle.
    pub fn get(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    /// Gets the body with the given handle, mutably.
    pub fn get_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }

    /// Gets two distinct bodies mutably at once.
    pub(crate) fn get2_mut(
        &mut self,
        h1: RigidBodyHandle,
        h2: RigidBodyHandle,
    ) -> (Option<&mut RigidBody>, Option<&mut RigidBody>) {
        self.bodies.get2_mut(h1.0, h2.0)
    }

    /// Iterates over the bodies with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.bodies.iter().map(|(i, b)| (RigidBodyHandle(i), b))
    }

    /// Iterates mutably over the bodies with their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        self.bodies.iter_mut().map(|(i, b)| (RigidBodyHandle(i), b))
    }
}

impl std::ops::Index<RigidBodyHandle> for RigidBodySet {
    type Output = RigidBody;

    fn index(&self, handle: RigidBodyHandle) -> &RigidBody {
        &self.bodies[handle.0]
    }
}

impl std::ops::IndexMut<RigidBodyHandle> for RigidBodySet {
    fn index_mut(&mut self, handle: RigidBodyHandle) -> &mut RigidBody {
        &mut self.bodies[handle.0]
    }
}
