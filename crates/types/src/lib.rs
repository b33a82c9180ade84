//! Semantic checker for Quill.
//!
//! Validates struct and function tables, `main`'s signature, operator
//! operand rules, builtin call signatures, variable scoping, and field
//! paths. As it goes it annotates every expression with its resolved
//! type; the compiler requires a checked program as input.

pub mod check;

pub use check::{check, CheckError};
