//! Command modules - one file per CLI command

pub mod add;
pub mod completions;
pub mod delta;
pub mod print;
pub mod sign;
