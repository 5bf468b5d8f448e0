//! Structures related to dynamics: bodies, joints, islands, and the
//! constraint solver.

pub use self::integration_parameters::IntegrationParameters;
pub use self::island_manager::IslandManager;
pub use self::joint::*;
pub use self::rigid_body::{MassProperties, RigidBody, RigidBodyBuilder, RigidBodyFlags};
pub use self::rigid_body_set::{RigidBodyHandle, RigidBodySet};
pub use self::solver::{solve_lcp, solve_lcp_basic};
pub use self::world::World;

mod integration_parameters;
mod island_manager;
mod joint;
mod rigid_body;
mod rigid_body_set;
mod solver;
mod world;
