//! Exhaustive sentence generation from a graph.

use std::collections::BTreeMap;

use intent_graph::{IntentGraph, StateId};

use crate::converters::Converters;
use crate::error::Result;
use crate::interpret::path_to_recognition;
use crate::types::{MatchPath, PathStep, Recognition};

/// Every simple path from start to final, depth first in edge order.
/// Wildcard self-loops are never taken.
pub fn simple_paths(graph: &IntentGraph, limit: Option<usize>) -> Vec<MatchPath> {
    let mut paths = Vec::new();
    let (Some(start), Some(end)) = (graph.start(), graph.final_state()) else {
        return paths;
    };
    let targets: Vec<Vec<StateId>> = (0..graph.num_states())
        .map(|s| graph.edges_from(s).map(|e| e.target).collect())
        .collect();

    let mut on_path = vec![false; graph.num_states()];
    on_path[start] = true;
    let mut path: MatchPath = Vec::new();
    let mut stack: Vec<(StateId, usize)> = vec![(start, 0)];

    while let Some(top) = stack.last_mut() {
        if limit.is_some_and(|max| paths.len() >= max) {
            break;
        }
        let state = top.0;
        let Some(&target) = targets[state].get(top.1) else {
            on_path[state] = false;
            stack.pop();
            path.pop();
            continue;
        };
        top.1 += 1;
        if on_path[target] {
            continue;
        }
        if target == end {
            let mut done = path.clone();
            done.push(PathStep::new(state, target, Vec::new()));
            paths.push(done);
            continue;
        }
        on_path[target] = true;
        path.push(PathStep::new(state, target, Vec::new()));
        stack.push((target, 0));
    }
    paths
}

/// Interprets every sentence the graph can produce, grouped by intent.
pub fn sample_by_intent(
    graph: &IntentGraph,
    limit: Option<usize>,
    converters: &Converters,
) -> Result<BTreeMap<String, Vec<Recognition>>> {
    let mut by_intent: BTreeMap<String, Vec<Recognition>> = BTreeMap::new();
    for path in simple_paths(graph, limit) {
        let recognition = path_to_recognition(&path, graph, None, converters)?;
        by_intent
            .entry(recognition.intent.name.clone())
            .or_default()
            .push(recognition);
    }
    Ok(by_intent)
}
