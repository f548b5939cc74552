//! Sentence template grammar
//!
//! Parses the template notation used to author voice commands (literal
//! words, `(groups)`, `[optionals]`, `a | b` alternatives, `<rules>`,
//! `$slots`, `{tags}`, `:substitutions` and `!converters`) into an
//! [`Expression`] tree, and loads ini-style corpora that group templates by
//! intent.

mod error;
pub mod expression;
pub mod ini;
pub mod parser;

pub use error::{GrammarError, Result, SyntaxError};
pub use expression::{
    split_slot_args, CorpusItem, Expression, IntentCorpus, IntentSection, Rule, RuleReference,
    Sentence, Sequence, SequenceKind, SlotReference, Tag, Word, WILDCARD,
};
pub use ini::{load_ini_file, load_ini_paths, parse_ini, LoadOptions};
pub use parser::{parse_rule, parse_sentence, parse_substitution, ParseMetadata};
