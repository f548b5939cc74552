//! Directed labeled graph produced by the compiler.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::labels;

pub type StateId = usize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub start: bool,
    pub is_final: bool,
    /// Raw word consumed on the way into this state.
    pub word: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: StateId,
    pub target: StateId,
    /// Empty for epsilon.
    #[serde(default)]
    pub ilabel: String,
    #[serde(default)]
    pub olabel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence_count: Option<u64>,
}

impl Edge {
    pub fn is_epsilon(&self) -> bool {
        self.ilabel.is_empty()
    }
}

/// States are numbered densely from 0. At most one edge exists per
/// `(source, target)` pair and out-edges keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphData", into = "GraphData")]
pub struct IntentGraph {
    states: Vec<State>,
    edges: Vec<Edge>,
    out_edges: Vec<Vec<usize>>,
    edge_index: HashMap<(StateId, StateId), usize>,
    start: Option<StateId>,
    final_state: Option<StateId>,
}

impl IntentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::default());
        self.out_edges.push(Vec::new());
        self.states.len() - 1
    }

    /// New state recording the word consumed to reach it.
    pub fn add_word_state(&mut self, word: &str) -> StateId {
        let id = self.add_state();
        self.states[id].word = Some(word.to_string());
        id
    }

    pub fn set_start(&mut self, id: StateId) {
        if let Some(old) = self.start.replace(id) {
            self.states[old].start = false;
        }
        self.states[id].start = true;
    }

    pub fn set_final(&mut self, id: StateId) {
        if let Some(old) = self.final_state.replace(id) {
            self.states[old].is_final = false;
        }
        self.states[id].is_final = true;
    }

    /// Adds or overwrites the edge `source -> target`. An overwritten edge
    /// keeps its position among the source's out-edges.
    pub fn add_edge(
        &mut self,
        source: StateId,
        target: StateId,
        ilabel: impl Into<String>,
        olabel: impl Into<String>,
    ) -> &mut Edge {
        let ilabel = ilabel.into();
        let olabel = olabel.into();
        if let Some(&idx) = self.edge_index.get(&(source, target)) {
            let edge = &mut self.edges[idx];
            edge.ilabel = ilabel;
            edge.olabel = olabel;
            return edge;
        }
        let idx = self.edges.len();
        self.edges.push(Edge {
            source,
            target,
            ilabel,
            olabel,
            weight: None,
            sentence_count: None,
        });
        self.out_edges[source].push(idx);
        self.edge_index.insert((source, target), idx);
        &mut self.edges[idx]
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn final_state(&self) -> Option<StateId> {
        self.final_state
    }

    pub fn is_final(&self, id: StateId) -> bool {
        self.states.get(id).is_some_and(|s| s.is_final)
    }

    pub fn word(&self, id: StateId) -> Option<&str> {
        self.states.get(id).and_then(|s| s.word.as_deref())
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, source: StateId, target: StateId) -> Option<&Edge> {
        self.edge_index.get(&(source, target)).map(|&i| &self.edges[i])
    }

    /// Out-edges of `id` in insertion order.
    pub fn edges_from(&self, id: StateId) -> impl Iterator<Item = &Edge> + '_ {
        self.out_edges
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.edges[i])
    }

    /// Intent branch edges leaving the start state, in declaration order.
    pub fn intent_edges(&self) -> impl Iterator<Item = (&str, &Edge)> + '_ {
        self.start
            .into_iter()
            .flat_map(move |s| self.edges_from(s))
            .filter_map(|e| labels::intent_name(&e.olabel).map(|name| (name, e)))
    }

    pub fn intent_names(&self) -> Vec<String> {
        self.intent_edges().map(|(n, _)| n.to_string()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|e| GraphError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), states = self.num_states(), "saved graph");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| GraphError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&text)
    }
}

/// Portable node/edge list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub id: StateId,
    #[serde(default, skip_serializing_if = "is_false")]
    pub start: bool,
    #[serde(rename = "final", default, skip_serializing_if = "is_false")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl From<IntentGraph> for GraphData {
    fn from(graph: IntentGraph) -> Self {
        let nodes = graph
            .states
            .into_iter()
            .enumerate()
            .map(|(id, s)| NodeData {
                id,
                start: s.start,
                is_final: s.is_final,
                word: s.word,
            })
            .collect();
        GraphData {
            nodes,
            edges: graph.edges,
        }
    }
}

impl TryFrom<GraphData> for IntentGraph {
    type Error = GraphError;

    fn try_from(mut data: GraphData) -> Result<Self> {
        data.nodes.sort_by_key(|n| n.id);
        let mut graph = IntentGraph::new();
        for (expected, node) in data.nodes.iter().enumerate() {
            if node.id != expected {
                return Err(GraphError::InvalidGraph(format!(
                    "state ids must be dense from 0, found {} at position {expected}",
                    node.id
                )));
            }
            let id = graph.add_state();
            graph.states[id].word = node.word.clone();
        }

        let starts: Vec<_> = data.nodes.iter().filter(|n| n.start).map(|n| n.id).collect();
        let finals: Vec<_> = data.nodes.iter().filter(|n| n.is_final).map(|n| n.id).collect();
        match (starts.as_slice(), finals.as_slice()) {
            ([start], [fin]) => {
                graph.set_start(*start);
                graph.set_final(*fin);
            }
            _ => {
                return Err(GraphError::InvalidGraph(format!(
                    "expected one start and one final state, found {} and {}",
                    starts.len(),
                    finals.len()
                )))
            }
        }

        let n = graph.num_states();
        for edge in data.edges {
            if edge.source >= n || edge.target >= n {
                return Err(GraphError::InvalidGraph(format!(
                    "edge {} -> {} references a missing state",
                    edge.source, edge.target
                )));
            }
            let added = graph.add_edge(edge.source, edge.target, edge.ilabel, edge.olabel);
            added.weight = edge.weight;
            added.sentence_count = edge.sentence_count;
        }
        Ok(graph)
    }
}
