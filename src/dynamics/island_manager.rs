//! Partitioning of the body/joint graph into independently solvable islands.

use crate::dynamics::{JointHandle, JointSet, RigidBodyHandle, RigidBodySet};

/// Structure responsible for splitting the world, once per step, into
/// maximal connected groups of bodies and joints ("islands") that can be
/// solved independently of each other.
///
/// The traversal is seeded only by enabled bodies; a disabled body reached
/// through a joint from an active island is forcibly re-enabled, so an
/// island is always simulated whole. Joints with no enabled body are left
/// out entirely.
#[derive(Clone)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IslandManager {
    /// Active bodies, grouped by island.
    active_bodies: Vec<RigidBodyHandle>,
    /// Span offsets into `active_bodies`, one entry per island plus a final
    /// sentinel.
    body_offsets: Vec<usize>,
    /// Active joints, grouped by island.
    active_joints: Vec<JointHandle>,
    /// Span offsets into `active_joints`.
    joint_offsets: Vec<usize>,
    /// Tag generation; a body/joint belongs to the current partition iff its
    /// stamp matches. Avoids clearing per-object tags every step.
    timestamp: u32,
    #[cfg_attr(feature = "serde-serialize", serde(skip))]
    stack: Vec<RigidBodyHandle>, // Workspace.
}

impl IslandManager {
    /// Creates a new empty island manager.
    pub fn new() -> Self {
        Self {
            active_bodies: vec![],
            body_offsets: vec![0],
            active_joints: vec![],
            joint_offsets: vec![0],
            timestamp: 0,
            stack: vec![],
        }
    }

    /// The number of islands found by the last [`Self::update`].
    pub fn num_islands(&self) -> usize {
        self.body_offsets.len() - 1
    }

    /// The bodies of the given island.
    pub fn island_bodies(&self, island: usize) -> &[RigidBodyHandle] {
        &self.active_bodies[self.body_offsets[island]..self.body_offsets[island + 1]]
    }

    /// The joints of the given island.
    pub fn island_joints(&self, island: usize) -> &[JointHandle] {
        &self.active_joints[self.joint_offsets[island]..self.joint_offsets[island + 1]]
    }

    /// Recomputes the partition by flood-filling the joint adjacency from
    /// every enabled, not-yet-visited body.
    pub fn update(&mut self, bodies: &mut RigidBodySet, joints: &mut JointSet) {
        self.timestamp = self.timestamp.wrapping_add(1);
        self.active_bodies.clear();
        self.active_joints.clear();
        self.body_offsets.clear();
        self.body_offsets.push(0);
        self.joint_offsets.clear();
        self.joint_offsets.push(0);
        self.stack.clear();

        let seeds: Vec<RigidBodyHandle> = bodies
            .iter()
            .filter(|(_, b)| b.is_enabled())
            .map(|(h, _)| h)
            .collect();

        for seed in seeds {
            {
                let body = &mut bodies[seed];
                if body.island_timestamp == self.timestamp {
                    continue; // Already swept into an earlier island.
                }
                body.island_timestamp = self.timestamp;
            }

            let island_id = self.body_offsets.len() - 1;
            self.stack.push(seed);

            while let Some(handle) = self.stack.pop() {
                {
                    let body = &mut bodies[handle];
                    body.island_id = island_id;
                    body.local_index = self.active_bodies.len() - self.body_offsets[island_id];
                }
                self.active_bodies.push(handle);

                let adjacent = joints.attached_joints(handle).to_vec();
                for jh in adjacent {
                    let joint = &mut joints[jh];
                    if joint.island_timestamp == self.timestamp {
                        continue;
                    }
                    joint.island_timestamp = self.timestamp;
                    self.active_joints.push(jh);

                    let other = match (joint.body1, joint.body2) {
                        (Some(b1), _) if b1 != handle => Some(b1),
                        (_, Some(b2)) if b2 != handle => Some(b2),
                        _ => None,
                    };
                    if let Some(other) = other {
                        let body = &mut bodies[other];
                        if body.island_timestamp != self.timestamp {
                            body.island_timestamp = self.timestamp;
                            // Reachable from an active island: wake it up.
                            body.set_enabled(true);
                            self.stack.push(other);
                        }
                    }
                }
            }

            self.body_offsets.push(self.active_bodies.len());
            self.joint_offsets.push(self.active_joints.len());
        }
    }
}

impl Default for IslandManager {
    fn default() -> Self {
        Self::new()
    }
}
