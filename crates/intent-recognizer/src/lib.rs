//! Intent recognizer
//!
//! Matches tokenized input against a compiled [`IntentGraph`], either
//! strictly (every token consumed by a path) or fuzzily (extra tokens skipped
//! at a cost), then interprets the winning paths into [`Recognition`]s with
//! entities and converted values.

mod error;
pub mod config;
pub mod converters;
pub mod extract;
pub mod fuzzy;
pub mod interpret;
pub mod sample;
pub mod strict;
pub mod types;

use std::time::Instant;

use intent_graph::IntentGraph;
use tracing::{debug, warn};

pub use config::{RecognizeOptions, RecognizerConfig};
pub use converters::{BoxError, ConvertResult, Converter, Converters};
pub use error::{RecognizeError, Result};
pub use extract::{EnglishExtractor, ValueExtractor};
pub use fuzzy::{
    best_fuzzy_cost, default_fuzzy_cost, match_fuzzy, FuzzyCost, FuzzyCostInput, FuzzyCostOutput,
    FuzzyMatches, FuzzyResult,
};
pub use interpret::path_to_recognition;
pub use sample::{sample_by_intent, simple_paths};
pub use strict::{match_strict, IntentFilter, SearchOptions, WordTransform};
pub use types::{Entity, Intent, MatchPath, PathStep, Recognition, Value};

/// Recognizes `tokens` against `graph`.
///
/// Fuzzy mode returns every path tied for the lowest cost. Strict mode
/// returns every exact path and, when none exists and stop words are set,
/// retries with the stop words removed from the input and made optional in
/// the graph. Paths whose converters reject their values are dropped.
pub fn recognize(
    tokens: &[String],
    graph: &IntentGraph,
    options: &RecognizeOptions,
    converters: &Converters,
) -> Result<Vec<Recognition>> {
    let started = Instant::now();
    let mut recognitions = Vec::new();

    if options.fuzzy {
        let matches = match_fuzzy(
            tokens,
            graph,
            &options.stop_words,
            options.cost_fn.as_deref(),
            &options.search,
        );
        for result in best_fuzzy_cost(&matches) {
            if let Some(r) = interpret(&result.path, graph, Some(result.cost), converters)? {
                recognitions.push(r);
            }
        }
    } else {
        let mut paths = match_strict(tokens, graph, &options.search, None, options.max_paths);
        if paths.is_empty() && !options.stop_words.is_empty() {
            let kept: Vec<String> = tokens
                .iter()
                .filter(|t| !options.stop_words.contains(options.search.transform(t).as_ref()))
                .cloned()
                .collect();
            debug!(removed = tokens.len() - kept.len(), "retrying without stop words");
            paths = match_strict(
                &kept,
                graph,
                &options.search,
                Some(&options.stop_words),
                options.max_paths,
            );
        }
        for path in &paths {
            if let Some(r) = interpret(path, graph, None, converters)? {
                recognitions.push(r);
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    for r in &mut recognitions {
        r.recognize_seconds = elapsed;
    }
    debug!(
        tokens = tokens.len(),
        results = recognitions.len(),
        fuzzy = options.fuzzy,
        seconds = elapsed,
        "recognized"
    );
    Ok(recognitions)
}

/// Splits `text` on whitespace and calls [`recognize`].
pub fn recognize_text(
    text: &str,
    graph: &IntentGraph,
    options: &RecognizeOptions,
    converters: &Converters,
) -> Result<Vec<Recognition>> {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    recognize(&tokens, graph, options, converters)
}

fn interpret(
    path: &[PathStep],
    graph: &IntentGraph,
    cost: Option<f64>,
    converters: &Converters,
) -> Result<Option<Recognition>> {
    match path_to_recognition(path, graph, cost, converters) {
        Ok(r) => Ok(Some(r)),
        Err(RecognizeError::Conversion { converter, message }) => {
            warn!(%converter, %message, "dropping path");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use intent_graph::{GraphBuilder, IntentGraph};
    use template_grammar::{parse_ini, LoadOptions};

    pub fn graph(text: &str) -> IntentGraph {
        let corpus = parse_ini(text, "test.ini", &LoadOptions::default()).unwrap();
        GraphBuilder::default().build(corpus).unwrap()
    }

    pub fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
