//! Exact matching of input tokens against the graph.

use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use intent_graph::{labels, IntentGraph, StateId};
use template_grammar::WILDCARD;

use crate::types::{MatchPath, PathStep};

pub type IntentFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;
pub type WordTransform = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Options shared by strict and fuzzy search.
#[derive(Default)]
pub struct SearchOptions {
    /// Intents for which this returns false are never entered.
    pub intent_filter: Option<IntentFilter>,
    /// Applied to both edge labels and input tokens before comparing.
    pub word_transform: Option<WordTransform>,
}

impl SearchOptions {
    pub fn with_intent_filter(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.intent_filter = Some(Box::new(f));
        self
    }

    pub fn with_word_transform(
        mut self,
        f: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.word_transform = Some(Box::new(f));
        self
    }

    pub fn allows(&self, intent: &str) -> bool {
        self.intent_filter.as_ref().map_or(true, |f| f(intent))
    }

    pub fn transform<'a>(&self, word: &'a str) -> Cow<'a, str> {
        match &self.word_transform {
            Some(f) => Cow::Owned(f(word)),
            None => Cow::Borrowed(word),
        }
    }

    /// False when `olabel` enters an intent the filter rejects.
    pub(crate) fn passes_label(&self, olabel: &str) -> bool {
        labels::intent_name(olabel).map_or(true, |intent| self.allows(intent))
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("intent_filter", &self.intent_filter.is_some())
            .field("word_transform", &self.word_transform.is_some())
            .finish()
    }
}

/// Breadth-first search for paths that consume every token exactly.
///
/// A labeled edge that does not match the next token is still taken without
/// consuming anything when its label is in `exclude_tokens`. Search stops
/// after `max_paths` accepted paths.
pub fn match_strict(
    tokens: &[String],
    graph: &IntentGraph,
    options: &SearchOptions,
    exclude_tokens: Option<&HashSet<String>>,
    max_paths: Option<usize>,
) -> Vec<MatchPath> {
    let mut found = Vec::new();
    let Some(start) = graph.start() else {
        return found;
    };
    if tokens.is_empty() {
        return found;
    }

    let mut queue: VecDeque<(StateId, MatchPath, usize)> = VecDeque::from([(start, Vec::new(), 0)]);
    while let Some((state, path, pos)) = queue.pop_front() {
        if graph.is_final(state) && pos == tokens.len() {
            found.push(path.clone());
            if max_paths.is_some_and(|max| found.len() >= max) {
                break;
            }
        }

        for edge in graph.edges_from(state) {
            if !options.passes_label(&edge.olabel) {
                continue;
            }

            let mut next = pos;
            let mut matched = Vec::new();
            if !edge.ilabel.is_empty() {
                let Some(token) = tokens.get(pos) else {
                    continue;
                };
                let ilabel = options.transform(&edge.ilabel);
                if edge.ilabel == WILDCARD || ilabel == options.transform(token) {
                    matched.push(token.clone());
                    next += 1;
                } else if !exclude_tokens.is_some_and(|ex| ex.contains(ilabel.as_ref())) {
                    continue;
                }
            }

            let mut next_path = path.clone();
            next_path.push(PathStep::new(state, edge.target, matched));
            queue.push_back((edge.target, next_path, next));
        }
    }
    found
}
