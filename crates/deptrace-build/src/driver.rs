//! Build orchestration over the target graph.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::artifact::Artifact;
use crate::builder::TargetBuilder;
use crate::error::Result;
use crate::graph::TargetGraph;
use crate::target::{BuildTarget, TargetSelector};

/// Result of one target's build.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: BuildTarget,
    pub artifacts: Vec<Artifact>,
    pub duration_ms: u64,
}

/// Result of a complete build invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// What was asked for (`all`, `lib`, ...).
    pub selector: String,
    pub started_at: DateTime<Utc>,
    /// Targets in the order they were built.
    pub targets: Vec<TargetReport>,
    pub duration_ms: u64,
}

impl BuildReport {
    /// Every published artifact, in build order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.targets.iter().flat_map(|t| t.artifacts.iter())
    }
}

/// Plans a selector against the graph and builds each target in sequence.
pub struct BuildDriver {
    graph: TargetGraph,
    builder: TargetBuilder,
}

impl BuildDriver {
    pub fn new(graph: TargetGraph, builder: TargetBuilder) -> Self {
        Self { graph, builder }
    }

    pub fn builder(&self) -> &TargetBuilder {
        &self.builder
    }

    /// Build everything `selector` needs, dependencies first.
    ///
    /// Stops at the first failing target; later targets are not attempted.
    pub async fn run(&self, selector: TargetSelector) -> Result<BuildReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let plan = self.graph.plan(selector)?;
        info!(
            selector = %selector,
            plan = ?plan.iter().map(BuildTarget::name).collect::<Vec<_>>(),
            "starting build"
        );

        let mut targets = Vec::with_capacity(plan.len());
        for target in plan {
            let target_start = Instant::now();
            info!(target = %target, "building target");

            let artifacts = match self.builder.build(target).await {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    error!(target = %target, error = %e, "target failed");
                    return Err(e);
                }
            };

            let duration_ms = target_start.elapsed().as_millis() as u64;
            info!(target = %target, duration_ms, artifacts = artifacts.len(), "target built");
            targets.push(TargetReport {
                target,
                artifacts,
                duration_ms,
            });
        }

        Ok(BuildReport {
            selector: selector.to_string(),
            started_at,
            targets,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
