//! Declarative dependencies between build targets.
//!
//! An edge `dependent -> dependency` means the dependency must be built
//! before the dependent in the same invocation. Plans are expanded
//! depth-first so every dependency precedes its dependents and each target
//! appears at most once. There is no caching: a dependency in the plan is
//! rebuilt on every run.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{BuildError, Result};
use crate::target::{BuildTarget, TargetSelector};

/// Directed dependency graph over [`BuildTarget`]s.
#[derive(Debug, Clone, Default)]
pub struct TargetGraph {
    /// `dependent -> [dependency, ...]`, in declaration order
    upstream: BTreeMap<BuildTarget, Vec<BuildTarget>>,
}

impl TargetGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph the pipeline ships with: `toolchain` links against `lib`.
    pub fn standard() -> Self {
        Self::new().depends_on(BuildTarget::Toolchain, BuildTarget::Lib)
    }

    /// Declare that `dependent` needs `dependency` built first.
    pub fn depends_on(mut self, dependent: BuildTarget, dependency: BuildTarget) -> Self {
        let deps = self.upstream.entry(dependent).or_default();
        if !deps.contains(&dependency) {
            deps.push(dependency);
        }
        self
    }

    /// Direct dependencies of `target`.
    pub fn dependencies_of(&self, target: BuildTarget) -> &[BuildTarget] {
        self.upstream
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Ordered build sequence for `selector`, dependencies first.
    ///
    /// Returns [`BuildError::DependencyCycle`] if the declared edges loop.
    pub fn plan(&self, selector: TargetSelector) -> Result<Vec<BuildTarget>> {
        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut visiting = Vec::new();

        for root in selector.roots() {
            self.visit(root, &mut visiting, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        target: BuildTarget,
        visiting: &mut Vec<BuildTarget>,
        done: &mut BTreeSet<BuildTarget>,
        order: &mut Vec<BuildTarget>,
    ) -> Result<()> {
        if done.contains(&target) {
            return Ok(());
        }
        if let Some(pos) = visiting.iter().position(|t| *t == target) {
            let mut targets: Vec<String> =
                visiting[pos..].iter().map(|t| t.name().to_string()).collect();
            targets.push(target.name().to_string());
            return Err(BuildError::DependencyCycle { targets });
        }

        visiting.push(target);
        for dep in self.dependencies_of(target) {
            self.visit(*dep, visiting, done, order)?;
        }
        visiting.pop();

        done.insert(target);
        order.push(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(selector: TargetSelector) -> Vec<BuildTarget> {
        TargetGraph::standard().plan(selector).unwrap()
    }

    #[test]
    fn test_every_selector_plans_something() {
        for name in TargetSelector::NAMES {
            let selector: TargetSelector = name.parse().unwrap();
            assert!(!plan(selector).is_empty(), "{name} planned nothing");
        }
    }

    #[test]
    fn test_lib_alone() {
        assert_eq!(plan(TargetSelector::One(BuildTarget::Lib)), vec![BuildTarget::Lib]);
    }

    #[test]
    fn test_toolchain_pulls_in_lib_first() {
        assert_eq!(
            plan(TargetSelector::One(BuildTarget::Toolchain)),
            vec![BuildTarget::Lib, BuildTarget::Toolchain]
        );
    }

    #[test]
    fn test_all_is_node_then_toolchain_chain() {
        assert_eq!(
            plan(TargetSelector::All),
            vec![BuildTarget::Node, BuildTarget::Lib, BuildTarget::Toolchain]
        );
    }

    #[test]
    fn test_shared_dependency_built_once() {
        let graph = TargetGraph::standard().depends_on(BuildTarget::Node, BuildTarget::Lib);
        assert_eq!(
            graph.plan(TargetSelector::All).unwrap(),
            vec![BuildTarget::Lib, BuildTarget::Node, BuildTarget::Toolchain]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let graph = TargetGraph::standard().depends_on(BuildTarget::Lib, BuildTarget::Toolchain);
        let err = graph.plan(TargetSelector::One(BuildTarget::Toolchain)).unwrap_err();
        match err {
            BuildError::DependencyCycle { targets } => {
                assert!(targets.contains(&"lib".to_string()));
                assert!(targets.contains(&"toolchain".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_edge_ignored() {
        let graph = TargetGraph::standard().depends_on(BuildTarget::Toolchain, BuildTarget::Lib);
        assert_eq!(graph.dependencies_of(BuildTarget::Toolchain), &[BuildTarget::Lib]);
    }
}
