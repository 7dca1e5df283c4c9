//! Per-target build procedures.
//!
//! Each procedure transplants and patches sources, runs the target's native
//! toolchain and only then publishes artifacts, so a failed command never
//! leaves a half-updated output directory for that target.

use std::sync::Arc;

use deptrace_core::patch::{self, PristineSource};
use deptrace_core::{remove_path, transplant, DeptraceError};
use tracing::info;

use crate::artifact::{self, Artifact, ArtifactKind};
use crate::error::{BuildError, Result};
use crate::layout::Layout;
use crate::rules::{self, Transplant};
use crate::runner::{CommandRunner, Invocation};
use crate::target::BuildTarget;

/// Go package the node needs for the tracer's riak backend.
const NODE_EXTRA_MODULE: &str = "github.com/basho/riak-go-client";

/// Runs one target's build procedure.
pub struct TargetBuilder {
    layout: Layout,
    runner: Arc<dyn CommandRunner>,
    pristine: Arc<dyn PristineSource>,
}

impl TargetBuilder {
    pub fn new(
        layout: Layout,
        runner: Arc<dyn CommandRunner>,
        pristine: Arc<dyn PristineSource>,
    ) -> Self {
        Self {
            layout,
            runner,
            pristine,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Build `target` and publish its artifacts.
    pub async fn build(&self, target: BuildTarget) -> Result<Vec<Artifact>> {
        std::fs::create_dir_all(&self.layout.out_dir)
            .map_err(|e| BuildError::io(&self.layout.out_dir, e))?;

        match target {
            BuildTarget::Node => self.build_node().await,
            BuildTarget::Lib => self.build_lib().await,
            BuildTarget::Toolchain => self.build_toolchain().await,
        }
    }

    /// `git pull` in the node checkout.
    pub async fn pull_node(&self) -> Result<()> {
        self.runner
            .run(&Invocation::new("git", &self.layout.node_repo).arg("pull"))
            .await
    }

    async fn build_node(&self) -> Result<Vec<Artifact>> {
        let layout = &self.layout;
        apply_transplants(&rules::node_transplants(layout))?;

        self.runner
            .run(&Invocation::new("go", &layout.node_repo).args(["get", NODE_EXTRA_MODULE]))
            .await?;
        self.runner
            .run(&Invocation::new("make", &layout.node_repo).arg("geth"))
            .await?;

        let target = BuildTarget::Node;
        let out = &layout.out_dir;
        Ok(vec![
            artifact::publish(
                target,
                &layout.in_node("build/bin/geth"),
                out,
                artifact::NODE_BINARY,
                ArtifactKind::Executable,
            )?,
            artifact::publish(
                target,
                &layout.default_config,
                out,
                artifact::DEFAULT_CONFIG,
                ArtifactKind::Config,
            )?,
            artifact::publish(
                target,
                &layout.launcher_script,
                out,
                artifact::LAUNCHER,
                ArtifactKind::Launcher,
            )?,
            artifact::publish(
                target,
                &layout.webview_dir,
                out,
                artifact::WEBVIEW,
                ArtifactKind::Tree,
            )?,
        ])
    }

    async fn build_lib(&self) -> Result<Vec<Artifact>> {
        let layout = &self.layout;
        let out = &layout.out_dir;

        remove_path(&out.join(artifact::LIB_ARCHIVE))?;
        remove_path(&out.join(artifact::LIB_HEADER))?;

        let staging = layout.lib_staging_dir();
        remove_path(&staging)?;
        std::fs::create_dir_all(&staging).map_err(|e| BuildError::io(&staging, e))?;

        let archive = staging.join(artifact::LIB_ARCHIVE);
        self.runner
            .run(
                &Invocation::new("go", &layout.tracer_dir)
                    .args(["build", "-buildmode=c-archive", "-o"])
                    .arg(archive.to_string_lossy())
                    .arg("libdep.go")
                    .env("CGO_ENABLED", "1"),
            )
            .await?;

        let target = BuildTarget::Lib;
        let artifacts = vec![
            artifact::publish(
                target,
                &archive,
                out,
                artifact::LIB_ARCHIVE,
                ArtifactKind::StaticArchive,
            )?,
            artifact::publish(
                target,
                &staging.join(artifact::LIB_HEADER),
                out,
                artifact::LIB_HEADER,
                ArtifactKind::Header,
            )?,
        ];
        remove_path(&staging)?;
        Ok(artifacts)
    }

    async fn build_toolchain(&self) -> Result<Vec<Artifact>> {
        let layout = &self.layout;
        let out = &layout.out_dir;

        if !layout.tracevm_dir.is_dir() {
            return Err(DeptraceError::MissingSource(layout.tracevm_dir.clone()).into());
        }

        // Render every patch before touching the checkout: a drifted anchor
        // must fail before anything is copied, written or compiled.
        let staged = patch::stage(
            &layout.toolchain_repo,
            &rules::toolchain_patches(layout),
            self.pristine.as_ref(),
        )?;
        apply_transplants(&rules::toolchain_transplants(layout))?;
        patch::commit(&staged)?;
        info!(files = staged.len(), "toolchain patched");

        let out_str = out.to_string_lossy();
        self.runner
            .run(
                &Invocation::new("cargo", &layout.toolchain_repo)
                    .args(["build", "--release", "--bin", "cast"])
                    .env("DEP_PATH", out_str.as_ref())
                    .env("RUSTFLAGS", format!("-C link-args=-Wl,-rpath,{out_str}")),
            )
            .await?;

        Ok(vec![artifact::publish(
            BuildTarget::Toolchain,
            &layout.in_toolchain("target/release/cast"),
            out,
            artifact::TOOLCHAIN_BINARY,
            ArtifactKind::Executable,
        )?])
    }
}

fn apply_transplants(transplants: &[Transplant]) -> Result<()> {
    for t in transplants {
        transplant(&t.source, &t.destination)?;
    }
    Ok(())
}
