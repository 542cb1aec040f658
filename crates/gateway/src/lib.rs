//! HTTP gateway, CLI and conversation runtime for skills-runner.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
