//! Corpus to graph pipeline.

use serde::{Deserialize, Serialize};
use template_grammar::{Expression, IntentCorpus, Sentence, Word};
use tracing::{debug, info};

use crate::compiler::{sentences_to_graph, CompileOptions};
use crate::error::Result;
use crate::graph::IntentGraph;
use crate::numbers::{
    number_range_values, rewrite_number_ranges, rewrite_numbers, EnglishNumbers, NumberSpeller,
    NUMBER_SLOT,
};
use crate::replacements::{
    add_slot_replacements, rewrite_all, split_rules, ReplacementsTable, SlotGenerator,
    SlotGenerators,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Casing {
    #[default]
    Keep,
    Lower,
    Upper,
}

impl Casing {
    pub fn apply(self, text: &str) -> String {
        match self {
            Casing::Keep => text.to_string(),
            Casing::Lower => text.to_lowercase(),
            Casing::Upper => text.to_uppercase(),
        }
    }

    /// Re-cases a word's input text. The original text becomes the output
    /// unless the word already substitutes something.
    fn word(self, mut word: Word) -> Word {
        let cased = self.apply(&word.text);
        if cased != word.text {
            if word.substitution.is_none() {
                word.substitution = Some(vec![word.text.clone()]);
            }
            word.text = cased;
        }
        word
    }

    pub fn expression(self, expr: Expression) -> Expression {
        if self == Casing::Keep {
            return expr;
        }
        match expr.map_words(&mut |w| Ok::<_, std::convert::Infallible>(self.word(w).into())) {
            Ok(e) => e,
            Err(never) => match never {},
        }
    }

    pub fn sentence(self, sentence: Sentence) -> Sentence {
        match self.expression(Expression::Sequence(sentence)) {
            Expression::Sequence(s) => s,
            other => Sentence::group(other.text().to_string(), vec![other]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub casing: Casing,
    /// Let bare integers also match their spoken form.
    pub replace_numbers: bool,
    pub add_intent_weights: bool,
    pub exclude_slots_from_counts: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            casing: Casing::Keep,
            replace_numbers: true,
            add_intent_weights: true,
            exclude_slots_from_counts: true,
        }
    }
}

/// Builds an [`IntentGraph`] from a parsed corpus.
///
/// ```ignore
/// let corpus = template_grammar::parse_ini("[Greet]\nhello\n", "g.ini", &Default::default())?;
/// let graph = GraphBuilder::new(TrainConfig::default()).build(corpus)?;
/// ```
pub struct GraphBuilder {
    config: TrainConfig,
    generators: SlotGenerators,
    speller: Box<dyn NumberSpeller>,
}

impl GraphBuilder {
    pub fn new(config: TrainConfig) -> Self {
        let mut generators = SlotGenerators::new();
        generators.register(NUMBER_SLOT, number_range_values);
        Self {
            config,
            generators,
            speller: Box::new(EnglishNumbers),
        }
    }

    pub fn with_slot_generator(mut self, name: &str, generator: impl SlotGenerator + 'static) -> Self {
        self.generators.register(name, generator);
        self
    }

    pub fn with_slot_values(mut self, name: &str, values: Vec<String>) -> Self {
        self.generators.register_values(name, values);
        self
    }

    pub fn with_speller(mut self, speller: impl NumberSpeller + 'static) -> Self {
        self.speller = Box::new(speller);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn build(&self, corpus: IntentCorpus) -> Result<IntentGraph> {
        let casing = self.config.casing;
        let (sentences, table) = split_rules(corpus, ReplacementsTable::new());
        debug!(intents = sentences.len(), rules = table.len(), "split rules");

        let (sentences, table) = rewrite_all(sentences, table, &rewrite_number_ranges);
        let (sentences, mut table) =
            rewrite_all(sentences, table, &|e: Expression| casing.expression(e));

        let visitor: &dyn Fn(Sentence) -> Sentence = &move |s| casing.sentence(s);
        add_slot_replacements(&mut table, &sentences, &self.generators, Some(visitor))?;

        let (sentences, table) = if self.config.replace_numbers {
            let speller = self.speller.as_ref();
            rewrite_all(sentences, table, &|e: Expression| rewrite_numbers(e, speller))
        } else {
            (sentences, table)
        };

        let options = CompileOptions {
            add_intent_weights: self.config.add_intent_weights,
            exclude_slots_from_counts: self.config.exclude_slots_from_counts,
            expand_slots: true,
        };
        let graph = sentences_to_graph(&sentences, &table, &options)?;
        info!(
            intents = sentences.len(),
            states = graph.num_states(),
            edges = graph.num_edges(),
            "built intent graph"
        );
        Ok(graph)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(TrainConfig::default())
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("config", &self.config)
            .field("generators", &self.generators)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use template_grammar::{parse_ini, LoadOptions};

    fn build(text: &str, config: TrainConfig) -> IntentGraph {
        let corpus = parse_ini(text, "t.ini", &LoadOptions::default()).unwrap();
        GraphBuilder::new(config).build(corpus).unwrap()
    }

    fn has_ilabel(g: &IntentGraph, label: &str) -> bool {
        g.edges().iter().any(|e| e.ilabel == label)
    }

    #[test]
    fn number_range_becomes_slot_values() {
        let g = build(
            "[SetTemp]\nset temperature to (0..100){temperature}\n",
            TrainConfig::default(),
        );
        assert!(has_ilabel(&g, "72"));
        assert!(has_ilabel(&g, "seventy"));
        assert!(g.edges().iter().any(|e| e.olabel == "__source__mycroft/number"));
    }

    #[test]
    fn integers_left_alone_when_disabled() {
        let config = TrainConfig {
            replace_numbers: false,
            ..TrainConfig::default()
        };
        let g = build("[A]\nchannel 5\n", config);
        assert!(has_ilabel(&g, "5"));
        assert!(!has_ilabel(&g, "five"));
    }

    #[test]
    fn lower_casing_keeps_original_output() {
        let config = TrainConfig {
            casing: Casing::Lower,
            ..TrainConfig::default()
        };
        let g = build("[A]\nTurn on the TV\n", config);
        assert!(!has_ilabel(&g, "Turn"));
        assert!(has_ilabel(&g, "turn"));
        assert!(g.edges().iter().any(|e| e.olabel == "Turn"));

        let corpus = parse_ini("[A]\nTurn on $dev\n", "t.ini", &LoadOptions::default()).unwrap();
        let g = GraphBuilder::new(TrainConfig {
            casing: Casing::Lower,
            ..TrainConfig::default()
        })
        .with_slot_values("dev", vec!["TV".into()])
        .build(corpus)
        .unwrap();
        assert!(has_ilabel(&g, "tv"));
    }

    #[test]
    fn custom_slot_generator() {
        let corpus = parse_ini("[Color]\nmake it $color\n", "t.ini", &LoadOptions::default())
            .unwrap();
        let g = GraphBuilder::default()
            .with_slot_values("color", vec!["red".into(), "dark blue".into()])
            .build(corpus)
            .unwrap();
        assert!(has_ilabel(&g, "red"));
        assert!(has_ilabel(&g, "blue"));
    }

    #[test]
    fn config_from_json() {
        let config: TrainConfig =
            serde_json::from_str(r#"{"casing":"lower","replace_numbers":false}"#).unwrap();
        assert_eq!(config.casing, Casing::Lower);
        assert!(!config.replace_numbers);
        assert!(config.add_intent_weights);
    }
}
