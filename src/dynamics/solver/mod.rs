//! The constraint solver: LCP kernels and the per-island stepping logic.

pub use self::lcp::solve_lcp;
pub use self::lcp_basic::solve_lcp_basic;
pub(crate) use self::island_solver::{step_island, StepMethod};

mod island_solver;
mod lcp;
mod lcp_basic;
