//! Utility modules shared across the generator.

pub mod command;
pub mod fs;
pub mod text;
