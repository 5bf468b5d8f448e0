//! Dense lower-triangular linear algebra used by the constraint solver.

pub mod ldlt;

pub use ldlt::{
    factor_ldlt, ldlt_add_tl, ldlt_remove, remove_row_col, solve_l1, solve_l1t, solve_ldlt,
};
