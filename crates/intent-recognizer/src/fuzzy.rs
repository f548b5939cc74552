//! Cost-based matching that tolerates extra input tokens.

use std::collections::{BTreeMap, HashSet, VecDeque};

use intent_graph::{labels, IntentGraph, StateId};
use template_grammar::WILDCARD;

use crate::strict::SearchOptions;
use crate::types::{MatchPath, PathStep};

/// Input to a [`FuzzyCost`] for one edge.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyCostInput<'a> {
    pub ilabel: &'a str,
    /// Remaining input tokens.
    pub tokens: &'a [String],
    pub stop_words: &'a HashSet<String>,
    pub options: &'a SearchOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyCostOutput {
    pub cost: f64,
    /// False kills the branch.
    pub continue_search: bool,
    /// Tokens removed from the front of the input, matched or not.
    pub consumed: usize,
    /// Tokens the edge actually matched.
    pub matched: Vec<String>,
}

impl FuzzyCostOutput {
    fn free() -> Self {
        Self {
            cost: 0.0,
            continue_search: true,
            consumed: 0,
            matched: Vec::new(),
        }
    }
}

pub trait FuzzyCost: Send + Sync {
    fn cost(&self, input: &FuzzyCostInput<'_>) -> FuzzyCostOutput;
}

impl<F> FuzzyCost for F
where
    F: Fn(&FuzzyCostInput<'_>) -> FuzzyCostOutput + Send + Sync,
{
    fn cost(&self, input: &FuzzyCostInput<'_>) -> FuzzyCostOutput {
        self(input)
    }
}

/// Skips mismatched tokens until the edge label matches. Each skipped stop
/// word costs 0.1, any other token 1. A wildcard takes one token for 0.1.
pub fn default_fuzzy_cost(input: &FuzzyCostInput<'_>) -> FuzzyCostOutput {
    if input.ilabel.is_empty() {
        return FuzzyCostOutput::free();
    }
    if input.ilabel == WILDCARD {
        if let Some(token) = input.tokens.first() {
            return FuzzyCostOutput {
                cost: 0.1,
                continue_search: true,
                consumed: 1,
                matched: vec![token.clone()],
            };
        }
    }

    let ilabel = input.options.transform(input.ilabel);
    let mut cost = 0.0;
    for (skipped, token) in input.tokens.iter().enumerate() {
        let token_t = input.options.transform(token);
        if token_t == ilabel {
            return FuzzyCostOutput {
                cost,
                continue_search: true,
                consumed: skipped + 1,
                matched: vec![token.clone()],
            };
        }
        cost += if input.stop_words.contains(token_t.as_ref()) {
            0.1
        } else {
            1.0
        };
    }
    FuzzyCostOutput {
        cost,
        continue_search: false,
        consumed: input.tokens.len(),
        matched: Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyResult {
    pub intent: String,
    pub path: MatchPath,
    pub cost: f64,
}

/// Lowest-cost paths per intent. Every path kept for an intent has the same cost.
pub type FuzzyMatches = BTreeMap<String, Vec<FuzzyResult>>;

struct Frontier {
    state: StateId,
    pos: usize,
    path: MatchPath,
    out_count: usize,
    cost: f64,
    intent: Option<String>,
}

/// Breadth-first search scoring every branch with `cost_fn`.
///
/// A path is reported only when its cost is below the number of output
/// words it produced, and unconsumed input is added to its final cost.
/// Branches costlier than the best final cost seen so far are dropped, which
/// can miss a cheaper path for an intent that is reached later.
pub fn match_fuzzy(
    tokens: &[String],
    graph: &IntentGraph,
    stop_words: &HashSet<String>,
    cost_fn: Option<&dyn FuzzyCost>,
    options: &SearchOptions,
) -> FuzzyMatches {
    let mut results = FuzzyMatches::new();
    let Some(start) = graph.start() else {
        return results;
    };
    if tokens.is_empty() {
        return results;
    }
    let cost_fn: &dyn FuzzyCost = cost_fn.unwrap_or(&default_fuzzy_cost);

    let mut best_cost = graph.num_states() as f64;
    let mut queue = VecDeque::from([Frontier {
        state: start,
        pos: 0,
        path: Vec::new(),
        out_count: 0,
        cost: 0.0,
        intent: None,
    }]);

    while let Some(item) = queue.pop_front() {
        if graph.is_final(item.state) && item.cost < item.out_count as f64 {
            let intent = item.intent.clone().unwrap_or_default();
            let final_cost = item.cost + (tokens.len() - item.pos) as f64;
            let entry = results.entry(intent.clone()).or_default();
            let result = FuzzyResult {
                intent,
                path: item.path.clone(),
                cost: final_cost,
            };
            match entry.first().map(|r| r.cost) {
                Some(best) if final_cost > best => {}
                Some(best) if final_cost == best => entry.push(result),
                _ => *entry = vec![result],
            }
            if final_cost < best_cost {
                best_cost = final_cost;
            }
        }

        if item.cost > best_cost {
            continue;
        }

        for edge in graph.edges_from(item.state) {
            let mut intent = item.intent.clone();
            let mut out_count = item.out_count;
            if !edge.olabel.is_empty() {
                if let Some(name) = labels::intent_name(&edge.olabel) {
                    if !options.allows(name) {
                        continue;
                    }
                    intent = Some(name.to_string());
                } else if !labels::is_control(&edge.olabel) {
                    out_count += 1;
                }
            }

            let output = cost_fn.cost(&FuzzyCostInput {
                ilabel: &edge.ilabel,
                tokens: &tokens[item.pos..],
                stop_words,
                options,
            });
            if !output.continue_search {
                continue;
            }

            let mut path = item.path.clone();
            path.push(PathStep::new(item.state, edge.target, output.matched));
            queue.push_back(Frontier {
                state: edge.target,
                pos: (item.pos + output.consumed).min(tokens.len()),
                path,
                out_count,
                cost: item.cost + output.cost,
                intent,
            });
        }
    }
    results
}

/// Every result tied at the lowest cost across intents, by intent name.
pub fn best_fuzzy_cost(matches: &FuzzyMatches) -> Vec<FuzzyResult> {
    let best = matches
        .values()
        .filter_map(|results| results.first().map(|r| r.cost))
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))));
    let Some(best) = best else {
        return Vec::new();
    };
    matches
        .values()
        .filter(|results| results.first().is_some_and(|r| r.cost == best))
        .flat_map(|results| results.iter().cloned())
        .collect()
}
