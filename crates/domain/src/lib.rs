//! Shared types for skills-runner: the cross-crate error, the
//! OpenAI-shaped conversation wire types, and the configuration tree.

pub mod config;
pub mod error;
pub mod tool;
