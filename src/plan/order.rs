//! Dependency ordering between plan components.

use crate::error::{PlanError, Result};
use crate::plan::StackSpec;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Indices of `stacks` in deploy order: every component after the ones it
/// depends on. Teardown walks the same list backwards.
pub fn deploy_order(stacks: &[StackSpec]) -> Result<Vec<usize>> {
    let mut graph = DiGraph::<usize, ()>::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for (index, spec) in stacks.iter().enumerate() {
        if nodes.contains_key(spec.component.as_str()) {
            return Err(PlanError::DuplicateComponent {
                component: spec.component.clone(),
            }
            .into());
        }
        nodes.insert(spec.component.as_str(), graph.add_node(index));
    }

    for spec in stacks {
        let to = nodes[spec.component.as_str()];
        for dependency in &spec.depends_on {
            let from = nodes.get(dependency.as_str()).ok_or_else(|| PlanError::UnknownDependency {
                component: spec.component.clone(),
                dependency: dependency.clone(),
            })?;
            graph.add_edge(*from, to, ());
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| PlanError::CircularDependency {
        component: stacks[graph[cycle.node_id()]].component.clone(),
    })?;

    Ok(sorted.into_iter().map(|node| graph[node]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(component: &str, depends_on: &[&str]) -> StackSpec {
        StackSpec {
            component: component.to_string(),
            template: "t.yaml".into(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            ..StackSpec::default()
        }
    }

    fn names(stacks: &[StackSpec], order: &[usize]) -> Vec<String> {
        order.iter().map(|i| stacks[*i].component.clone()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let stacks = vec![
            spec("api", &["network", "storage"]),
            spec("storage", &["network"]),
            spec("network", &[]),
        ];
        let order = deploy_order(&stacks).unwrap();
        assert_eq!(names(&stacks, &order), ["network", "storage", "api"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let stacks = vec![spec("a", &["b"]), spec("b", &["a"])];
        assert!(matches!(
            deploy_order(&stacks),
            Err(crate::error::OpsError::Plan(PlanError::CircularDependency { .. }))
        ));
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let stacks = vec![spec("a", &["ghost"])];
        assert!(deploy_order(&stacks).is_err());
    }

    #[test]
    fn test_duplicate_component_is_rejected() {
        let stacks = vec![spec("a", &[]), spec("a", &[])];
        assert!(deploy_order(&stacks).is_err());
    }
}
