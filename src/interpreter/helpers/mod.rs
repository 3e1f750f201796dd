//! Helper functions for the interpreter

pub mod ifs;
pub mod xtrace;
