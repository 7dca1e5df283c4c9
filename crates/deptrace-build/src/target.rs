//! Build target identities and the command-line selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// One independently buildable unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildTarget {
    /// go-ethereum with the tracer registered as a live tracer
    Node,

    /// The tracer as a C-ABI static archive plus header
    Lib,

    /// foundry's `cast` linked against the tracer archive
    Toolchain,
}

impl BuildTarget {
    pub const ALL: [BuildTarget; 3] = [BuildTarget::Node, BuildTarget::Lib, BuildTarget::Toolchain];

    /// Get the target name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuildTarget::Node => "node",
            BuildTarget::Lib => "lib",
            BuildTarget::Toolchain => "toolchain",
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the operator asked to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelector {
    One(BuildTarget),
    /// `all`: the node and the toolchain, with whatever they depend on.
    All,
}

impl TargetSelector {
    /// Every accepted spelling, for usage messages.
    pub const NAMES: [&'static str; 4] = ["node", "lib", "toolchain", "all"];

    /// Targets the selector names directly, before dependency expansion.
    pub fn roots(&self) -> Vec<BuildTarget> {
        match self {
            TargetSelector::One(target) => vec![*target],
            TargetSelector::All => vec![BuildTarget::Node, BuildTarget::Toolchain],
        }
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        TargetSelector::All
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSelector::One(target) => target.fmt(f),
            TargetSelector::All => f.write_str("all"),
        }
    }
}

impl FromStr for TargetSelector {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(TargetSelector::All);
        }
        BuildTarget::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .map(TargetSelector::One)
            .ok_or_else(|| BuildError::UnknownTarget {
                name: s.to_string(),
                valid: Self::NAMES.join(", "),
            })
    }
}
