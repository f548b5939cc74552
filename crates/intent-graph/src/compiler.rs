//! Lowers expression trees into the intent graph.

use serde::{Deserialize, Serialize};
use template_grammar::{
    Expression, RuleReference, Sentence, Sequence, SequenceKind, SlotReference, Tag, Word,
    WILDCARD,
};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::{IntentGraph, StateId};
use crate::labels::{self, BEGIN, CONVERT, CONVERTED, END, LABEL, SOURCE};
use crate::replacements::{IntentSentences, ReplacementsTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Put `weight`/`sentence_count` on intent edges when there are several intents.
    pub add_intent_weights: bool,
    /// Count a slot reference as one sentence instead of one per value.
    pub exclude_slots_from_counts: bool,
    /// Compile slot values in place. When off only the `__source__` marker is emitted.
    pub expand_slots: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            add_intent_weights: true,
            exclude_slots_from_counts: true,
            expand_slots: true,
        }
    }
}

/// Per-expression compile state. Cloned into children so that changes made
/// by one expression never leak into its siblings.
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Intent the sentence belongs to.
    pub grammar_name: String,
    /// Grammar of the innermost rule being expanded.
    pub rule_grammar: Option<String>,
    /// Enclosing substitutions still pending. Words emit no output while > 0.
    pub empty_substitution: usize,
    pub expand_slots: bool,
    rule_stack: Vec<String>,
}

impl CompileContext {
    pub fn new(grammar_name: impl Into<String>) -> Self {
        Self {
            grammar_name: grammar_name.into(),
            rule_grammar: None,
            empty_substitution: 0,
            expand_slots: true,
            rule_stack: Vec::new(),
        }
    }

    /// Table key for a rule reference and the grammar its body is compiled in.
    fn resolve_rule(&self, rule: &RuleReference) -> (String, String) {
        let grammar = match &rule.grammar_name {
            Some(g) if !g.is_empty() => g.clone(),
            _ => self
                .rule_grammar
                .clone()
                .unwrap_or_else(|| self.grammar_name.clone()),
        };
        (format!("<{grammar}.{}>", rule.rule_name), grammar)
    }

    fn enter_rule(&self, key: &str, grammar: String) -> Result<Self> {
        if self.rule_stack.iter().any(|k| k == key) {
            return Err(GraphError::RecursiveReference(key.to_string()));
        }
        let mut child = self.clone();
        child.rule_grammar = Some(grammar);
        child.rule_stack.push(key.to_string());
        Ok(child)
    }
}

/// Borrowed view of the parts every expression shares.
struct Node<'a> {
    substitution: Option<&'a [String]>,
    converters: &'a [String],
    tag: Option<&'a Tag>,
    content: Content<'a>,
}

enum Content<'a> {
    Word(&'a Word),
    Sequence(SequenceKind, &'a [Expression]),
    Rule(&'a RuleReference),
    Slot(&'a SlotReference),
}

impl<'a> Node<'a> {
    fn of(expr: &'a Expression) -> Self {
        match expr {
            Expression::Word(w) => Self {
                substitution: w.substitution.as_deref(),
                converters: &w.converters,
                tag: w.tag.as_ref(),
                content: Content::Word(w),
            },
            Expression::Sequence(s) => Self::of_sequence(s),
            Expression::Rule(r) => Self {
                substitution: None,
                converters: &[],
                tag: r.tag.as_ref(),
                content: Content::Rule(r),
            },
            Expression::Slot(s) => Self {
                substitution: s.substitution.as_deref(),
                converters: &s.converters,
                tag: s.tag.as_ref(),
                content: Content::Slot(s),
            },
        }
    }

    fn of_sequence(s: &'a Sequence) -> Self {
        Self {
            substitution: s.substitution.as_deref(),
            converters: &s.converters,
            tag: s.tag.as_ref(),
            content: Content::Sequence(s.kind, &s.items),
        }
    }

    fn bare_alternative(items: &'a [Expression]) -> Self {
        Self {
            substitution: None,
            converters: &[],
            tag: None,
            content: Content::Sequence(SequenceKind::Alternative, items),
        }
    }
}

/// Appends an epsilon edge with output `olabel` to a new state.
fn emit(graph: &mut IntentGraph, source: StateId, olabel: &str) -> StateId {
    let next = graph.add_state();
    graph.add_edge(source, next, "", labels::pack(olabel));
    next
}

fn emit_substitution(graph: &mut IntentGraph, mut source: StateId, tokens: &[String]) -> StateId {
    for token in tokens {
        source = emit(graph, source, token);
    }
    source
}

/// Compiles `expr` starting at `source` and returns its exit state.
pub fn compile_expression(
    expr: &Expression,
    graph: &mut IntentGraph,
    source: StateId,
    table: &ReplacementsTable,
    ctx: &CompileContext,
) -> Result<StateId> {
    compile_node(Node::of(expr), graph, source, table, ctx)
}

/// Compiles a top-level sentence.
pub fn compile_sentence(
    sentence: &Sentence,
    graph: &mut IntentGraph,
    source: StateId,
    table: &ReplacementsTable,
    ctx: &CompileContext,
) -> Result<StateId> {
    compile_node(Node::of_sequence(sentence), graph, source, table, ctx)
}

fn compile_node(
    node: Node<'_>,
    graph: &mut IntentGraph,
    mut state: StateId,
    table: &ReplacementsTable,
    ctx: &CompileContext,
) -> Result<StateId> {
    let mut empty_substitution = ctx.empty_substitution;
    if node.substitution.is_some() {
        empty_substitution += 1;
    }

    if let Some(tag) = node.tag {
        state = emit(graph, state, &format!("{BEGIN}{}", tag.name));
        if tag.substitution.is_some() {
            empty_substitution += 1;
        }
    }

    let tag_converters: &[String] = node.tag.map_or(&[], |t| &t.converters);
    for name in tag_converters.iter().rev().chain(node.converters.iter().rev()) {
        state = emit(graph, state, &format!("{CONVERT}{name}"));
    }

    let mut child = ctx.clone();
    child.empty_substitution = empty_substitution;

    state = match node.content {
        Content::Word(word) => {
            let next = graph.add_word_state(&word.text);
            if word.is_wildcard() {
                graph.add_edge(state, state, WILDCARD, WILDCARD);
            }
            let olabel = if word.substitution.is_none() && empty_substitution == 0 {
                labels::pack(&word.text)
            } else {
                String::new()
            };
            graph.add_edge(state, next, word.text.clone(), olabel);
            next
        }
        Content::Sequence(SequenceKind::Group, items) => {
            let mut next = state;
            for item in items {
                next = compile_expression(item, graph, next, table, &child)?;
            }
            next
        }
        Content::Sequence(SequenceKind::Alternative, items) => {
            let mut exits = Vec::with_capacity(items.len());
            for item in items {
                exits.push(compile_expression(item, graph, state, table, &child)?);
            }
            let join = graph.add_state();
            for exit in exits {
                graph.add_edge(exit, join, "", "");
            }
            join
        }
        Content::Rule(rule) => {
            let (key, grammar) = ctx.resolve_rule(rule);
            let body = table
                .get(&key)
                .and_then(|values| values.first())
                .ok_or_else(|| GraphError::UnresolvedReference(key.clone()))?;
            let rule_ctx = child.enter_rule(&key, grammar)?;
            compile_expression(body, graph, state, table, &rule_ctx)?
        }
        Content::Slot(slot) => {
            let mut next = state;
            if ctx.expand_slots {
                let key = slot.key();
                let values = table
                    .get(&key)
                    .filter(|values| !values.is_empty())
                    .ok_or(GraphError::UnresolvedReference(key))?;
                next = compile_node(Node::bare_alternative(values), graph, next, table, &child)?;
            }
            emit(graph, next, &format!("{SOURCE}{}", slot.base_name()))
        }
    };

    if let Some(substitution) = node.substitution {
        empty_substitution -= 1;
        if empty_substitution == 0 {
            state = emit_substitution(graph, state, substitution);
        }
    }

    if let Some(tag) = node.tag {
        if let Some(substitution) = &tag.substitution {
            state = emit_substitution(graph, state, substitution);
        }
    }

    for name in node.converters.iter().chain(tag_converters) {
        state = emit(graph, state, &format!("{CONVERTED}{name}"));
    }

    if let Some(tag) = node.tag {
        state = emit(graph, state, &format!("{END}{}", tag.name));
    }

    Ok(state)
}

/// Number of sentences an expression can produce. Groups multiply,
/// alternatives add.
pub fn expression_count(
    expr: &Expression,
    table: &ReplacementsTable,
    exclude_slots: bool,
    ctx: &CompileContext,
) -> Result<u128> {
    match expr {
        Expression::Word(_) => Ok(1),
        Expression::Sequence(seq) => sequence_count(seq, table, exclude_slots, ctx),
        Expression::Rule(rule) => {
            let (key, grammar) = ctx.resolve_rule(rule);
            let values = table
                .get(&key)
                .ok_or_else(|| GraphError::UnresolvedReference(key.clone()))?;
            let rule_ctx = ctx.enter_rule(&key, grammar)?;
            sum_counts(values, table, exclude_slots, &rule_ctx)
        }
        Expression::Slot(_) if exclude_slots => Ok(1),
        Expression::Slot(slot) => {
            let key = slot.key();
            let values = table
                .get(&key)
                .ok_or(GraphError::UnresolvedReference(key))?;
            sum_counts(values, table, exclude_slots, ctx)
        }
    }
}

fn sequence_count(
    seq: &Sequence,
    table: &ReplacementsTable,
    exclude_slots: bool,
    ctx: &CompileContext,
) -> Result<u128> {
    match seq.kind {
        SequenceKind::Group => {
            let mut count: u128 = 1;
            for item in &seq.items {
                count = count.saturating_mul(expression_count(item, table, exclude_slots, ctx)?);
            }
            Ok(count)
        }
        SequenceKind::Alternative => sum_counts(&seq.items, table, exclude_slots, ctx),
    }
}

fn sum_counts(
    items: &[Expression],
    table: &ReplacementsTable,
    exclude_slots: bool,
    ctx: &CompileContext,
) -> Result<u128> {
    let mut total: u128 = 0;
    for item in items {
        total = total.saturating_add(expression_count(item, table, exclude_slots, ctx)?);
    }
    Ok(total)
}

/// Possible sentence count per intent, at least 1 each.
pub fn intent_counts(
    sentences: &IntentSentences,
    table: &ReplacementsTable,
    exclude_slots: bool,
) -> Result<Vec<(String, u128)>> {
    let mut counts = Vec::with_capacity(sentences.len());
    for (intent, list) in sentences {
        let ctx = CompileContext::new(intent.as_str());
        let mut total: u128 = 0;
        for sentence in list {
            total = total.saturating_add(sequence_count(sentence, table, exclude_slots, &ctx)?);
        }
        counts.push((intent.clone(), total.max(1)));
    }
    Ok(counts)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn checked_lcm(counts: &[u128]) -> Option<u128> {
    counts.iter().try_fold(1u128, |acc, &n| {
        let g = gcd(acc, n);
        (acc / g).checked_mul(n)
    })
}

/// Weights inversely proportional to sentence count, summing to 1.
pub fn intent_weights(counts: &[(String, u128)]) -> Vec<f64> {
    let values: Vec<u128> = counts.iter().map(|(_, c)| (*c).max(1)).collect();
    let raw: Vec<f64> = match checked_lcm(&values) {
        Some(lcm) => values.iter().map(|c| (lcm / c) as f64).collect(),
        None => values.iter().map(|c| 1.0 / *c as f64).collect(),
    };
    let sum: f64 = raw.iter().sum();
    if sum > 0.0 {
        raw.iter().map(|w| w / sum).collect()
    } else {
        raw
    }
}

/// Builds the full graph: one start state, a `__label__` branch per intent,
/// every sentence compiled from its branch, and one shared final state.
pub fn sentences_to_graph(
    sentences: &IntentSentences,
    table: &ReplacementsTable,
    options: &CompileOptions,
) -> Result<IntentGraph> {
    let weighted = options.add_intent_weights && sentences.len() > 1;
    let (counts, weights) = if weighted {
        let counts = intent_counts(sentences, table, options.exclude_slots_from_counts)?;
        let weights = intent_weights(&counts);
        (counts, weights)
    } else {
        (Vec::new(), Vec::new())
    };

    let mut graph = IntentGraph::new();
    let start = graph.add_state();
    graph.set_start(start);
    let mut exits = Vec::new();

    for (idx, (intent, list)) in sentences.iter().enumerate() {
        let intent_state = graph.add_state();
        let edge = graph.add_edge(start, intent_state, "", format!("{LABEL}{intent}"));
        if weighted {
            edge.sentence_count = Some(u64::try_from(counts[idx].1).unwrap_or(u64::MAX));
            edge.weight = Some(weights[idx]);
        }

        let mut ctx = CompileContext::new(intent.as_str());
        ctx.expand_slots = options.expand_slots;
        for sentence in list {
            exits.push(compile_sentence(sentence, &mut graph, intent_state, table, &ctx)?);
        }
    }

    let final_state = graph.add_state();
    graph.set_final(final_state);
    for exit in exits {
        graph.add_edge(exit, final_state, "", "");
    }

    debug!(
        intents = sentences.len(),
        states = graph.num_states(),
        edges = graph.num_edges(),
        "compiled intent graph"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replacements::split_rules;
    use template_grammar::{parse_ini, parse_sentence, LoadOptions};

    fn compile(text: &str) -> IntentGraph {
        let corpus = parse_ini(text, "t.ini", &LoadOptions::default()).unwrap();
        let (sentences, table) = split_rules(corpus, ReplacementsTable::new());
        sentences_to_graph(&sentences, &table, &CompileOptions::default()).unwrap()
    }

    fn olabels(graph: &IntentGraph) -> Vec<String> {
        graph.edges().iter().map(|e| e.olabel.clone()).collect()
    }

    #[test]
    fn single_intent_layout() {
        let g = compile("[Greet]\nhello [world]\n");
        assert_eq!(g.start(), Some(0));
        let intent_edge = g.edge(0, 1).unwrap();
        assert_eq!(intent_edge.olabel, "__label__Greet");
        assert!(intent_edge.weight.is_none());
        assert_eq!(g.word(2), Some("hello"));
        assert_eq!(g.final_state(), Some(g.num_states() - 1));
        // hello, world, empty word, join, final
        assert_eq!(g.num_states(), 7);
    }

    #[test]
    fn weights_favor_smaller_intents() {
        let g = compile("[A]\n(a | b | c) x\n[B]\ny\n");
        let edges: Vec<_> = g.intent_edges().collect();
        assert_eq!(edges.len(), 2);
        let (a, b) = (edges[0].1, edges[1].1);
        assert_eq!(a.sentence_count, Some(3));
        assert_eq!(b.sentence_count, Some(1));
        let (wa, wb) = (a.weight.unwrap(), b.weight.unwrap());
        assert!((wa - 0.25).abs() < 1e-9);
        assert!((wb - 0.75).abs() < 1e-9);
    }

    #[test]
    fn substitution_suppresses_inner_words() {
        let g = compile("[A]\n(living room):den\n");
        let outs = olabels(&g);
        assert!(!outs.contains(&"living".to_string()));
        assert!(outs.contains(&"den".to_string()));
        let ins: Vec<_> = g.edges().iter().map(|e| e.ilabel.as_str()).collect();
        assert!(ins.contains(&"living") && ins.contains(&"room"));
    }

    #[test]
    fn tag_and_converter_marker_order() {
        let g = compile("[A]\nset (one:1){n!int}\n");
        let markers: Vec<_> = olabels(&g)
            .into_iter()
            .filter(|l| !l.is_empty() && l != "set")
            .collect();
        assert_eq!(
            markers,
            vec![
                "__label__A",
                "__begin__n",
                "__convert__int",
                "1",
                "__converted__int",
                "__end__n"
            ]
        );
    }

    #[test]
    fn converters_nest_as_a_stack() {
        let g = compile("[A]\n((x)!c!d){t!a!b}\n");
        let markers: Vec<_> = olabels(&g)
            .into_iter()
            .filter(|l| l.starts_with("__con"))
            .collect();
        assert_eq!(
            markers,
            vec![
                "__convert__b",
                "__convert__a",
                "__convert__d",
                "__convert__c",
                "__converted__c",
                "__converted__d",
                "__converted__a",
                "__converted__b",
            ]
        );
    }

    #[test]
    fn multi_word_output_is_packed() {
        let g = compile("[A]\ntv:(television set)\n");
        assert!(olabels(&g).iter().any(|l| l == "television"));
        let g = compile("[A]\n(a){x:(two words)}\n");
        assert!(olabels(&g).iter().all(|l| !l.contains(' ')));
    }

    #[test]
    fn rules_and_slots_resolve() {
        let corpus = parse_ini(
            "[A]\ncolor = red | $shade\nset <color>{c}\n",
            "t.ini",
            &LoadOptions::default(),
        )
        .unwrap();
        let (sentences, mut table) = split_rules(corpus, ReplacementsTable::new());
        table.insert(
            "$shade".to_string(),
            vec![parse_sentence("dark blue", None).unwrap().into()],
        );
        let g = sentences_to_graph(&sentences, &table, &CompileOptions::default()).unwrap();
        assert!(olabels(&g).contains(&"__source__shade".to_string()));
        assert!(olabels(&g).contains(&"blue".to_string()));
    }

    #[test]
    fn unresolved_and_recursive_references() {
        let corpus = parse_ini("[A]\nsay <nothing>\n", "t.ini", &LoadOptions::default()).unwrap();
        let (sentences, table) = split_rules(corpus, ReplacementsTable::new());
        let err = sentences_to_graph(&sentences, &table, &CompileOptions::default());
        assert!(matches!(err, Err(GraphError::UnresolvedReference(k)) if k == "<A.nothing>"));

        let corpus = parse_ini("[A]\nr = x <r>\nsay <r>\n", "t.ini", &LoadOptions::default())
            .unwrap();
        let (sentences, table) = split_rules(corpus, ReplacementsTable::new());
        let options = CompileOptions {
            add_intent_weights: false,
            ..CompileOptions::default()
        };
        let err = sentences_to_graph(&sentences, &table, &options);
        assert!(matches!(err, Err(GraphError::RecursiveReference(_))));
    }

    #[test]
    fn wildcard_self_loop() {
        let g = compile("[Play]\nplay *\n");
        let loops: Vec<_> = g.edges().iter().filter(|e| e.source == e.target).collect();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].ilabel, "*");
    }

    #[test]
    fn deterministic_output() {
        let text = "[A]\n(a | b) [c]\n[B]\nd <e>\ne = f | g\n";
        assert_eq!(compile(text), compile(text));
    }

    #[test]
    fn lcm_overflow_falls_back_to_reciprocals() {
        let counts = vec![
            ("a".to_string(), u128::MAX - 1),
            ("b".to_string(), u128::MAX - 2),
            ("c".to_string(), 1),
        ];
        let w = intent_weights(&counts);
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(w[2] > w[0]);
    }
}
