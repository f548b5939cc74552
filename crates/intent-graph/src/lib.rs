//! Intent graph compiler
//!
//! Resolves rule and slot references in a parsed template corpus, applies
//! number rewrites and compiles everything into one directed graph. Each
//! intent hangs off the start state behind a `__label__<intent>` edge and
//! control tokens on output labels mark entities, converters and slot
//! provenance for the recognizer.

mod error;
pub mod compiler;
pub mod fst;
pub mod graph;
pub mod labels;
pub mod numbers;
pub mod replacements;
pub mod train;

pub use compiler::{
    compile_expression, compile_sentence, intent_counts, intent_weights, sentences_to_graph,
    CompileContext, CompileOptions,
};
pub use error::{GraphError, Result};
pub use fst::{to_fst, to_intent_fsts, FstOptions, GraphFst, SymbolTable};
pub use graph::{Edge, GraphData, IntentGraph, NodeData, State, StateId};
pub use labels::{pack, unpack, Control};
pub use numbers::{
    number_range_values, rewrite_number_ranges, rewrite_numbers, EnglishNumbers, NumberSpeller,
    NUMBER_SLOT,
};
pub use replacements::{
    add_slot_replacements, rewrite_all, split_rules, GeneratorResult, IntentSentences,
    ReplacementsTable, SlotGenerator, SlotGenerators,
};
pub use train::{Casing, GraphBuilder, TrainConfig};
