use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use tracing::debug;

use bolide_core::types::Environment;
use bolide_core::types::Role;
use bolide_core::BundleError;
use bolide_core::BundleResult;

use crate::bundle::Bundle;
use crate::bundle::BuildKey;

#[derive(Clone, Copy, Eq, PartialEq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// Orders the package builds so that every build follows everything it
/// depends on.
///
/// Dependency edges always point at `Use` builds, whatever the dependent's
/// role; this keeps the relation acyclic even when a test imports the
/// package it tests. Edges to names the dependent marked `unordered` are
/// left out. Ties break by build creation order.
#[tracing::instrument(level = "debug", skip_all)]
pub fn order(bundle: &mut Bundle) -> BundleResult<()> {
  let keys: Vec<BuildKey> = bundle.builds.keys().cloned().collect();
  let index_of: HashMap<&BuildKey, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();

  let mut graph = StableDiGraph::<usize, ()>::new();
  let nodes: Vec<NodeIndex> = (0..keys.len()).map(|i| graph.add_node(i)).collect();
  for (from, key) in keys.iter().enumerate() {
    let build = &bundle.builds[key];
    let package = &build.package;
    for environment in Environment::ALL {
      for name in &package.uses[build.role][environment] {
        if package.unordered.contains(name) {
          continue;
        }
        // A name with no corresponding build constrains nothing.
        let Some(used) = bundle.by_name.get(name) else {
          continue;
        };
        if let Some(&to) = index_of.get(&(Role::Use, used.id.clone())) {
          graph.add_edge(nodes[from], nodes[to], ());
        }
      }
    }
  }

  let mut marks = vec![Mark::Unvisited; keys.len()];
  let mut order: Vec<BuildKey> = Vec::with_capacity(keys.len());

  for start in 0..keys.len() {
    if marks[start] != Mark::Unvisited {
      continue;
    }
    // Iterative depth-first post-order: a build is emitted once all of its
    // dependencies are.
    let mut stack: Vec<(usize, bool)> = vec![(start, false)];
    while let Some((current, expanded)) = stack.pop() {
      if expanded {
        marks[current] = Mark::Done;
        order.push(keys[current].clone());
        continue;
      }
      if marks[current] != Mark::Unvisited {
        continue;
      }
      marks[current] = Mark::InProgress;
      stack.push((current, true));
      // Neighbors iterate most-recently-added first; restore edge order.
      let mut dependencies: Vec<usize> =
        graph.neighbors(nodes[current]).map(|node| graph[node]).collect();
      dependencies.reverse();
      for dependency in dependencies {
        match marks[dependency] {
          Mark::Done => {}
          Mark::InProgress => {
            return Err(cycle_error(bundle, &keys[dependency], &keys[current]));
          }
          Mark::Unvisited => stack.push((dependency, false)),
        }
      }
    }
  }

  debug!(builds = order.len(), "computed load order");
  bundle.order = order;
  Ok(())
}

fn cycle_error(bundle: &Bundle, first: &BuildKey, second: &BuildKey) -> BundleError {
  let name_of = |key: &BuildKey| bundle.builds[key].package.display_name().to_string();
  BundleError::Cycle(name_of(first), name_of(second))
}
