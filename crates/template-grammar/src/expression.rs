//! In-memory tree for parsed sentence templates.

use serde::{Deserialize, Serialize};

/// Text of a word that matches any single input token.
pub const WILDCARD: &str = "*";

/// `{name}` attached to an expression. Names an entity span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub substitution: Option<Vec<String>>,
    #[serde(default)]
    pub converters: Vec<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            substitution: None,
            converters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    /// Items follow one another.
    Group,
    /// Exactly one item matches.
    Alternative,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    #[serde(default)]
    pub substitution: Option<Vec<String>>,
    #[serde(default)]
    pub converters: Vec<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// The empty word closes every optional.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_wildcard(&self) -> bool {
        self.text == WILDCARD
    }

    /// True when nothing but the literal text is set.
    pub fn is_bare(&self) -> bool {
        self.substitution.is_none() && self.converters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub text: String,
    pub kind: SequenceKind,
    pub items: Vec<Expression>,
    #[serde(default)]
    pub substitution: Option<Vec<String>>,
    #[serde(default)]
    pub converters: Vec<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

impl Sequence {
    pub fn group(text: impl Into<String>, items: Vec<Expression>) -> Self {
        Self::new(text, SequenceKind::Group, items)
    }

    pub fn alternative(text: impl Into<String>, items: Vec<Expression>) -> Self {
        Self::new(text, SequenceKind::Alternative, items)
    }

    fn new(text: impl Into<String>, kind: SequenceKind, items: Vec<Expression>) -> Self {
        Self {
            text: text.into(),
            kind,
            items,
            substitution: None,
            converters: Vec::new(),
            tag: None,
        }
    }

    /// An alternative whose last branch is the empty word.
    pub fn is_optional(&self) -> bool {
        self.kind == SequenceKind::Alternative
            && matches!(self.items.last(), Some(Expression::Word(w)) if w.text.is_empty())
    }
}

/// A complete sentence template is a top-level group.
pub type Sentence = Sequence;

/// `<rule>` or `<grammar.rule>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleReference {
    pub text: String,
    pub rule_name: String,
    #[serde(default)]
    pub grammar_name: Option<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

impl RuleReference {
    pub fn full_rule_name(&self) -> String {
        match &self.grammar_name {
            Some(grammar) if !grammar.is_empty() => format!("{grammar}.{}", self.rule_name),
            _ => self.rule_name.clone(),
        }
    }
}

/// `$name` or `$name,arg1,arg2`. The slot name keeps its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReference {
    pub text: String,
    pub slot_name: String,
    #[serde(default)]
    pub substitution: Option<Vec<String>>,
    #[serde(default)]
    pub converters: Vec<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

impl SlotReference {
    pub fn new(text: impl Into<String>, slot_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            slot_name: slot_name.into(),
            substitution: None,
            converters: Vec::new(),
            tag: None,
        }
    }

    /// Replacement table key, e.g. `$color` or `$mycroft/number,0,10,1`.
    pub fn key(&self) -> String {
        format!("${}", self.slot_name)
    }

    /// Slot name with any `,arg` suffix removed.
    pub fn base_name(&self) -> &str {
        split_slot_args(&self.slot_name).0
    }
}

/// Splits `name,arg1,arg2` into the name and its arguments.
pub fn split_slot_args(slot_name: &str) -> (&str, Vec<&str>) {
    let mut parts = slot_name.split(',');
    let name = parts.next().unwrap_or_default();
    (name, parts.collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    Word(Word),
    Sequence(Sequence),
    Rule(RuleReference),
    Slot(SlotReference),
}

impl Expression {
    pub fn text(&self) -> &str {
        match self {
            Expression::Word(w) => &w.text,
            Expression::Sequence(s) => &s.text,
            Expression::Rule(r) => &r.text,
            Expression::Slot(s) => &s.text,
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Expression::Word(w) => w.tag.as_ref(),
            Expression::Sequence(s) => s.tag.as_ref(),
            Expression::Rule(r) => r.tag.as_ref(),
            Expression::Slot(s) => s.tag.as_ref(),
        }
    }

    pub fn set_tag(&mut self, tag: Tag) {
        let slot = match self {
            Expression::Word(w) => &mut w.tag,
            Expression::Sequence(s) => &mut s.tag,
            Expression::Rule(r) => &mut r.tag,
            Expression::Slot(s) => &mut s.tag,
        };
        *slot = Some(tag);
    }

    /// Own substitution. Rule references never carry one.
    pub fn substitution(&self) -> Option<&[String]> {
        match self {
            Expression::Word(w) => w.substitution.as_deref(),
            Expression::Sequence(s) => s.substitution.as_deref(),
            Expression::Slot(s) => s.substitution.as_deref(),
            Expression::Rule(_) => None,
        }
    }

    pub fn converters(&self) -> &[String] {
        match self {
            Expression::Word(w) => &w.converters,
            Expression::Sequence(s) => &s.converters,
            Expression::Slot(s) => &s.converters,
            Expression::Rule(_) => &[],
        }
    }

    /// Mutable access to substitution and converters, `None` for rule references.
    pub fn substitutable_mut(&mut self) -> Option<(&mut Option<Vec<String>>, &mut Vec<String>)> {
        match self {
            Expression::Word(w) => Some((&mut w.substitution, &mut w.converters)),
            Expression::Sequence(s) => Some((&mut s.substitution, &mut s.converters)),
            Expression::Slot(s) => Some((&mut s.substitution, &mut s.converters)),
            Expression::Rule(_) => None,
        }
    }

    /// Visits this expression and every descendant, parents first.
    /// Rule and slot references are not followed.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expression)) {
        visit(self);
        if let Expression::Sequence(seq) = self {
            for item in &seq.items {
                item.walk(visit);
            }
        }
    }

    /// Builds a new tree where every word is passed through `f`.
    /// The output of `f` is not visited again.
    pub fn map_words<E, F>(self, f: &mut F) -> Result<Expression, E>
    where
        F: FnMut(Word) -> Result<Expression, E>,
    {
        match self {
            Expression::Word(word) => f(word),
            Expression::Sequence(seq) => Ok(Expression::Sequence(seq.map_words(f)?)),
            other => Ok(other),
        }
    }

    /// Collects `$slot[,args]` keys referenced anywhere in this tree.
    pub fn slot_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.walk(&mut |expr| {
            if let Expression::Slot(slot) = expr {
                keys.push(slot.key());
            }
        });
        keys
    }
}

impl Sequence {
    pub fn map_words<E, F>(self, f: &mut F) -> Result<Sequence, E>
    where
        F: FnMut(Word) -> Result<Expression, E>,
    {
        let Sequence {
            text,
            kind,
            items,
            substitution,
            converters,
            tag,
        } = self;
        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            mapped.push(item.map_words(f)?);
        }
        Ok(Sequence {
            text,
            kind,
            items: mapped,
            substitution,
            converters,
            tag,
        })
    }
}

impl From<Word> for Expression {
    fn from(w: Word) -> Self {
        Expression::Word(w)
    }
}

impl From<Sequence> for Expression {
    fn from(s: Sequence) -> Self {
        Expression::Sequence(s)
    }
}

impl From<RuleReference> for Expression {
    fn from(r: RuleReference) -> Self {
        Expression::Rule(r)
    }
}

impl From<SlotReference> for Expression {
    fn from(s: SlotReference) -> Self {
        Expression::Slot(s)
    }
}

/// `public? <name> = body;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub body: Sentence,
    pub public: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusItem {
    Sentence(Sentence),
    Rule(Rule),
}

/// Sentences and rules declared under one `[IntentName]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSection {
    pub name: String,
    pub items: Vec<CorpusItem>,
}

/// Intents in declaration order. Order decides graph state numbering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntentCorpus {
    pub intents: Vec<IntentSection>,
}

impl IntentCorpus {
    pub fn get(&self, name: &str) -> Option<&IntentSection> {
        self.intents.iter().find(|s| s.name == name)
    }

    /// Section for `name`, created at the end when missing.
    pub fn section_mut(&mut self, name: &str) -> &mut IntentSection {
        let idx = match self.intents.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.intents.push(IntentSection {
                    name: name.to_string(),
                    items: Vec::new(),
                });
                self.intents.len() - 1
            }
        };
        &mut self.intents[idx]
    }

    pub fn intent_names(&self) -> impl Iterator<Item = &str> {
        self.intents.iter().map(|s| s.name.as_str())
    }

    /// Appends every section of `other`, merging sections with the same name.
    pub fn merge(&mut self, other: IntentCorpus) {
        for section in other.intents {
            self.section_mut(&section.name).items.extend(section.items);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_words_rewrites_nested_words_once() {
        let seq = Sequence::group(
            "a (b | c)",
            vec![
                Word::new("a").into(),
                Sequence::alternative("b | c", vec![Word::new("b").into(), Word::new("c").into()])
                    .into(),
            ],
        );
        let mut calls = 0;
        let out = seq
            .map_words(&mut |w: Word| -> Result<Expression, ()> {
                calls += 1;
                // Returning a sequence must not cause its words to be revisited.
                Ok(Sequence::group(w.text.clone(), vec![Word::new(w.text.to_uppercase()).into()]).into())
            })
            .unwrap();
        assert_eq!(calls, 3);
        let Expression::Sequence(first) = &out.items[0] else {
            panic!("expected sequence");
        };
        assert_eq!(first.items[0].text(), "A");
    }

    #[test]
    fn slot_args_split() {
        assert_eq!(split_slot_args("color"), ("color", vec![]));
        assert_eq!(
            split_slot_args("mycroft/number,0,10,2"),
            ("mycroft/number", vec!["0", "10", "2"])
        );
        let slot = SlotReference::new("$x,1", "x,1");
        assert_eq!(slot.key(), "$x,1");
        assert_eq!(slot.base_name(), "x");
    }

    #[test]
    fn optional_detection() {
        let opt = Sequence::alternative("a", vec![Word::new("a").into(), Word::empty().into()]);
        assert!(opt.is_optional());
        let alt = Sequence::alternative("a | b", vec![Word::new("a").into(), Word::new("b").into()]);
        assert!(!alt.is_optional());
    }

    #[test]
    fn corpus_sections_merge_in_order() {
        let mut corpus = IntentCorpus::default();
        corpus.section_mut("B");
        corpus.section_mut("A");
        let mut other = IntentCorpus::default();
        other
            .section_mut("B")
            .items
            .push(CorpusItem::Sentence(Sequence::group("x", vec![])));
        corpus.merge(other);
        let names: Vec<_> = corpus.intent_names().collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(corpus.get("B").map(|s| s.items.len()), Some(1));
    }
}
