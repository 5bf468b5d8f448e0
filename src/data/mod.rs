//! Data structures modified for their use in axle3d.

pub mod arena;

pub use arena::{Arena, Index};
