//! Side-effecting adapters: config, subprocess execution, and the VCS.

pub mod actions;
pub mod config;
pub mod hg;
pub mod process;
pub mod vcs;
