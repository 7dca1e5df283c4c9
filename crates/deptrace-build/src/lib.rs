//! deptrace build pipeline
//!
//! Builds the tracer-instrumented toolchain targets:
//! - `node`: go-ethereum with the tracer registered as a live tracer
//! - `lib`: the tracer as a C static archive and header
//! - `toolchain`: foundry's `cast`, patched to call the tracer and linked
//!   against `lib`
//!
//! Targets run strictly in sequence in the order the [`TargetGraph`] gives.

pub mod artifact;
pub mod builder;
pub mod driver;
pub mod error;
pub mod fakes;
pub mod graph;
pub mod layout;
pub mod rules;
pub mod runner;
pub mod target;

// Re-export key types
pub use artifact::{Artifact, ArtifactKind};
pub use builder::TargetBuilder;
pub use driver::{BuildDriver, BuildReport, TargetReport};
pub use error::{BuildError, Result};
pub use graph::TargetGraph;
pub use layout::Layout;
pub use runner::{CommandRunner, Invocation, ProcessRunner};
pub use target::{BuildTarget, TargetSelector};
