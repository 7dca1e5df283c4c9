//! deptrace launcher
//!
//! Runs the instrumented geth as a single-node development chain, with the
//! tracer configured from a resolved runtime config and an optional trace
//! viewer running alongside it. Child processes are owned by
//! [`ChildGuard`]s so none outlive the launch.

pub mod error;
pub mod flags;
pub mod orchestrator;
pub mod process;
pub mod readiness;

// Re-export key types
pub use error::{LaunchError, Result};
pub use flags::node_args;
pub use orchestrator::{
    launch, launch_until, Companion, LaunchOptions, NodeExit, COMPANION_URL, SHUTDOWN_GRACE,
};
pub use process::ChildGuard;
pub use readiness::Readiness;
