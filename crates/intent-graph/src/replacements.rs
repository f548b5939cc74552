//! Rule and slot replacement table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use template_grammar::{
    parse_sentence, split_slot_args, CorpusItem, Expression, IntentCorpus, Sentence,
};
use tracing::debug;

use crate::error::{GraphError, Result};

/// `<grammar.rule>` or `$slot[,args]` to alternative expressions.
pub type ReplacementsTable = BTreeMap<String, Vec<Expression>>;

/// Sentences grouped by intent, in declaration order.
pub type IntentSentences = Vec<(String, Vec<Sentence>)>;

/// Moves every rule into `table` under `<intent.rule>`, leaving only sentences.
pub fn split_rules(
    corpus: IntentCorpus,
    mut table: ReplacementsTable,
) -> (IntentSentences, ReplacementsTable) {
    let mut sentences = Vec::with_capacity(corpus.intents.len());
    for section in corpus.intents {
        let mut intent_sentences = Vec::new();
        for item in section.items {
            match item {
                CorpusItem::Sentence(s) => intent_sentences.push(s),
                CorpusItem::Rule(rule) => {
                    let key = format!("<{}.{}>", section.name, rule.name);
                    table.insert(key, vec![Expression::Sequence(rule.body)]);
                }
            }
        }
        sentences.push((section.name, intent_sentences));
    }
    (sentences, table)
}

pub type GeneratorResult = core::result::Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;

/// Produces raw value lines for `$name,arg1,arg2`.
pub trait SlotGenerator: Send + Sync {
    fn generate(&self, args: &[&str]) -> GeneratorResult;
}

impl<F> SlotGenerator for F
where
    F: Fn(&[&str]) -> GeneratorResult + Send + Sync,
{
    fn generate(&self, args: &[&str]) -> GeneratorResult {
        self(args)
    }
}

/// Slot generators by name. Names are stored with their `$` prefix.
#[derive(Default)]
pub struct SlotGenerators {
    generators: BTreeMap<String, Box<dyn SlotGenerator>>,
}

impl SlotGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, generator: impl SlotGenerator + 'static) {
        self.generators.insert(slot_key(name), Box::new(generator));
    }

    /// Fixed list of values for `$name`.
    pub fn register_values(&mut self, name: &str, values: Vec<String>) {
        self.register(name, move |_: &[&str]| -> GeneratorResult { Ok(values.clone()) });
    }

    pub fn get(&self, name: &str) -> Option<&dyn SlotGenerator> {
        self.generators.get(&slot_key(name)).map(|g| g.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }
}

impl fmt::Debug for SlotGenerators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.generators.keys()).finish()
    }
}

fn slot_key(name: &str) -> String {
    if name.starts_with('$') {
        name.to_string()
    } else {
        format!("${name}")
    }
}

fn collect_slot_keys(expr: &Expression, keys: &mut BTreeSet<String>) {
    keys.extend(expr.slot_keys());
}

/// Generates values for every `$slot` referenced by the sentences, by rule
/// bodies in the table, and by generated values themselves. Keys already in
/// the table are left alone. `visitor` is applied to each parsed value.
pub fn add_slot_replacements(
    table: &mut ReplacementsTable,
    sentences: &IntentSentences,
    generators: &SlotGenerators,
    visitor: Option<&dyn Fn(Sentence) -> Sentence>,
) -> Result<()> {
    let mut pending: BTreeSet<String> = BTreeSet::new();
    for (_, intent_sentences) in sentences {
        for sentence in intent_sentences {
            for item in &sentence.items {
                collect_slot_keys(item, &mut pending);
            }
        }
    }
    for values in table.values() {
        for value in values {
            collect_slot_keys(value, &mut pending);
        }
    }

    while let Some(key) = pending.pop_first() {
        if table.contains_key(&key) {
            continue;
        }
        let (name, args) = split_slot_args(&key);
        let generator = generators
            .get(name)
            .ok_or_else(|| GraphError::MissingSlotGenerator(key.clone()))?;
        let lines = generator
            .generate(&args)
            .map_err(|e| GraphError::SlotGenerator {
                slot: key.clone(),
                message: e.to_string(),
            })?;

        let mut values = Vec::new();
        for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let mut sentence = parse_sentence(line, None)?;
            if let Some(visit) = visitor {
                sentence = visit(sentence);
            }
            let value = Expression::Sequence(sentence);
            collect_slot_keys(&value, &mut pending);
            values.push(value);
        }
        if values.is_empty() {
            return Err(GraphError::EmptySlotOutput(key));
        }
        debug!(slot = %key, values = values.len(), "loaded slot values");
        table.insert(key, values);
    }
    Ok(())
}

/// Applies a functional rewrite to every sentence and table entry once.
pub fn rewrite_all(
    sentences: IntentSentences,
    table: ReplacementsTable,
    f: &dyn Fn(Expression) -> Expression,
) -> (IntentSentences, ReplacementsTable) {
    let sentences = sentences
        .into_iter()
        .map(|(intent, list)| {
            let list = list
                .into_iter()
                .map(|s| match f(Expression::Sequence(s)) {
                    Expression::Sequence(s) => s,
                    other => Sentence::group(other.text().to_string(), vec![other]),
                })
                .collect();
            (intent, list)
        })
        .collect();
    let table = table
        .into_iter()
        .map(|(key, values)| (key, values.into_iter().map(f).collect()))
        .collect();
    (sentences, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use template_grammar::{parse_ini, LoadOptions};

    fn corpus(text: &str) -> IntentCorpus {
        parse_ini(text, "t.ini", &LoadOptions::default()).unwrap()
    }

    #[test]
    fn rules_move_into_table() {
        let (sentences, table) = split_rules(
            corpus("[A]\ncolor = red | green\nset <color>\n"),
            ReplacementsTable::new(),
        );
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].1.len(), 1);
        assert!(table.contains_key("<A.color>"));
    }

    #[test]
    fn slots_expand_transitively() {
        let (sentences, mut table) = split_rules(
            corpus("[A]\nset $outer\n"),
            ReplacementsTable::new(),
        );
        let mut generators = SlotGenerators::new();
        generators.register_values("outer", vec!["light $inner".into(), "  ".into()]);
        generators.register_values("$inner", vec!["on".into(), "off".into()]);
        add_slot_replacements(&mut table, &sentences, &generators, None).unwrap();
        assert_eq!(table["$outer"].len(), 1);
        assert_eq!(table["$inner"].len(), 2);
    }

    #[test]
    fn slot_errors() {
        let (sentences, mut table) =
            split_rules(corpus("[A]\nset $missing\n"), ReplacementsTable::new());
        let err = add_slot_replacements(&mut table, &sentences, &SlotGenerators::new(), None);
        assert!(matches!(err, Err(GraphError::MissingSlotGenerator(k)) if k == "$missing"));

        let mut generators = SlotGenerators::new();
        generators.register_values("missing", vec!["".into()]);
        let err = add_slot_replacements(&mut table, &sentences, &generators, None);
        assert!(matches!(err, Err(GraphError::EmptySlotOutput(_))));

        let mut generators = SlotGenerators::new();
        generators.register("missing", |_: &[&str]| -> GeneratorResult {
            Err("backend down".into())
        });
        let err = add_slot_replacements(&mut table, &sentences, &generators, None);
        assert!(matches!(err, Err(GraphError::SlotGenerator { .. })));
    }

    #[test]
    fn existing_entries_are_kept_and_args_passed() {
        let (sentences, mut table) =
            split_rules(corpus("[A]\npick $n,1,3\n"), ReplacementsTable::new());
        let mut generators = SlotGenerators::new();
        generators.register("n", |args: &[&str]| -> GeneratorResult {
            Ok(args.iter().map(|a| a.to_string()).collect())
        });
        add_slot_replacements(&mut table, &sentences, &generators, None).unwrap();
        let texts: Vec<_> = table["$n,1,3"].iter().map(|e| e.text().to_string()).collect();
        assert_eq!(texts, vec!["1", "3"]);
    }
}
