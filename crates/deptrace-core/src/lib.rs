//! deptrace core
//!
//! Building blocks shared by the build pipeline and the launcher:
//! - anchored regex patching of upstream sources ([`patch`])
//! - mirroring tracer sources into foreign trees ([`transplant`])
//! - runtime config resolution ([`config`])

pub mod config;
pub mod error;
pub mod patch;
pub mod telemetry;
pub mod transplant;

pub use config::{ResolvedConfig, PERSISTENT_ENGINES};
pub use error::{DeptraceError, Result};
pub use patch::{GitIndex, MemoryPristine, PatchSet, PatchSpec, PristineSource, StagedPatch};
pub use telemetry::init_tracing;
pub use transplant::{remove_path, transplant};
