//! OpenFST text export.
//!
//! Arcs are written as `from to ilabel olabel weight` with states numbered in
//! the order an edge breadth-first search first meets them. Accepting states
//! follow, one per line.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{GraphError, Result};
use crate::graph::{IntentGraph, StateId};
use crate::labels;

pub struct FstOptions {
    /// Symbol written for empty labels.
    pub eps: String,
    pub default_weight: f64,
    /// Write intent weights on arcs that carry one.
    pub include_weights: bool,
    pub intent_filter: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl Default for FstOptions {
    fn default() -> Self {
        Self {
            eps: "<eps>".to_string(),
            default_weight: 0.0,
            include_weights: true,
            intent_filter: None,
        }
    }
}

impl fmt::Debug for FstOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FstOptions")
            .field("eps", &self.eps)
            .field("default_weight", &self.default_weight)
            .field("include_weights", &self.include_weights)
            .field("intent_filter", &self.intent_filter.is_some())
            .finish()
    }
}

impl FstOptions {
    fn allows(&self, intent: &str) -> bool {
        self.intent_filter.as_ref().map_or(true, |f| f(intent))
    }
}

/// Symbol table that numbers symbols in first-seen order. Epsilon is 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    symbols: Vec<String>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    fn with_eps(eps: &str) -> Self {
        let mut table = Self::default();
        table.intern(eps);
        table
    }

    fn intern(&mut self, symbol: &str) -> usize {
        if let Some(&id) = self.index.get(symbol) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(symbol.to_string());
        self.index.insert(symbol.to_string(), id);
        id
    }

    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// `symbol id` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (id, symbol) in self.symbols.iter().enumerate() {
            out.push_str(&format!("{symbol} {id}\n"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphFst {
    pub text: String,
    pub input_symbols: SymbolTable,
    pub output_symbols: SymbolTable,
}

impl GraphFst {
    pub fn write(
        &self,
        fst_path: impl AsRef<Path>,
        isymbols_path: impl AsRef<Path>,
        osymbols_path: impl AsRef<Path>,
    ) -> Result<()> {
        write_file(fst_path.as_ref(), &self.text)?;
        write_file(isymbols_path.as_ref(), &self.input_symbols.to_text())?;
        write_file(osymbols_path.as_ref(), &self.output_symbols.to_text())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| GraphError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn symbol<'a>(label: &'a str, eps: &'a str) -> Result<&'a str> {
    if label.is_empty() {
        return Ok(eps);
    }
    if label.chars().any(char::is_whitespace) {
        return Err(GraphError::InvalidLabel(format!(
            "whitespace in FST label {label:?}"
        )));
    }
    Ok(label)
}

struct FstWriter<'a> {
    options: &'a FstOptions,
    input_symbols: SymbolTable,
    output_symbols: SymbolTable,
}

impl<'a> FstWriter<'a> {
    fn new(options: &'a FstOptions) -> Self {
        Self {
            options,
            input_symbols: SymbolTable::with_eps(&options.eps),
            output_symbols: SymbolTable::with_eps(&options.eps),
        }
    }

    /// Edge BFS from `root`. Every reachable edge is written once.
    fn write_from(&mut self, graph: &IntentGraph, root: StateId, skip_intents: bool) -> Result<String> {
        let mut numbering: HashMap<StateId, usize> = HashMap::new();
        let number = |numbering: &mut HashMap<StateId, usize>, s: StateId| {
            let next = numbering.len();
            *numbering.entry(s).or_insert(next)
        };
        number(&mut numbering, root);

        let mut text = String::new();
        let mut finals = Vec::new();
        let mut visited: HashSet<StateId> = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(state) = queue.pop_front() {
            if graph.is_final(state) {
                finals.push(number(&mut numbering, state));
            }
            for edge in graph.edges_from(state) {
                if skip_intents {
                    if let Some(intent) = labels::intent_name(&edge.olabel) {
                        if !self.options.allows(intent) {
                            continue;
                        }
                    }
                }

                let from = number(&mut numbering, edge.source);
                let to = number(&mut numbering, edge.target);
                let ilabel = symbol(&edge.ilabel, &self.options.eps)?;
                let olabel = symbol(&edge.olabel, &self.options.eps)?;
                self.input_symbols.intern(ilabel);
                self.output_symbols.intern(olabel);

                let weight = match edge.weight {
                    Some(w) if self.options.include_weights => w,
                    _ => self.options.default_weight,
                };
                text.push_str(&format!("{from} {to} {ilabel} {olabel} {weight}\n"));

                if visited.insert(edge.target) {
                    queue.push_back(edge.target);
                }
            }
        }

        finals.sort_unstable();
        finals.dedup();
        for state in finals {
            text.push_str(&format!("{state}\n"));
        }
        Ok(text)
    }
}

/// Whole graph as one FST rooted at the start state.
pub fn to_fst(graph: &IntentGraph, options: &FstOptions) -> Result<GraphFst> {
    let start = graph
        .start()
        .ok_or_else(|| GraphError::InvalidGraph("graph has no start state".to_string()))?;
    let mut writer = FstWriter::new(options);
    let text = writer.write_from(graph, start, true)?;
    Ok(GraphFst {
        text,
        input_symbols: writer.input_symbols,
        output_symbols: writer.output_symbols,
    })
}

/// One FST per intent, rooted at the intent's branch state. Symbol tables
/// are shared across all intents.
pub fn to_intent_fsts(
    graph: &IntentGraph,
    options: &FstOptions,
) -> Result<(BTreeMap<String, String>, SymbolTable, SymbolTable)> {
    let mut writer = FstWriter::new(options);
    let mut fsts = BTreeMap::new();
    let roots: Vec<(String, StateId)> = graph
        .intent_edges()
        .filter(|(name, _)| options.allows(name))
        .map(|(name, edge)| (name.to_string(), edge.target))
        .collect();
    for (intent, root) in roots {
        let text = writer.write_from(graph, root, false)?;
        fsts.insert(intent, text);
    }
    Ok((fsts, writer.input_symbols, writer.output_symbols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{sentences_to_graph, CompileOptions};
    use crate::replacements::{split_rules, ReplacementsTable};
    use template_grammar::{parse_ini, LoadOptions};

    fn graph(text: &str) -> IntentGraph {
        let corpus = parse_ini(text, "t.ini", &LoadOptions::default()).unwrap();
        let (sentences, table) = split_rules(corpus, ReplacementsTable::new());
        sentences_to_graph(&sentences, &table, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn single_fst_text() {
        let fst = to_fst(&graph("[Greet]\nhello\n"), &FstOptions::default()).unwrap();
        let lines: Vec<_> = fst.text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0 1 <eps> __label__Greet 0",
                "1 2 hello hello 0",
                "2 3 <eps> <eps> 0",
                "3"
            ]
        );
        assert!(fst.text.ends_with("2 3 <eps> <eps> 0\n3\n"));
        assert_eq!(fst.input_symbols.get("<eps>"), Some(0));
        assert_eq!(fst.input_symbols.get("hello"), Some(1));
        assert_eq!(fst.output_symbols.to_text(), "<eps> 0\n__label__Greet 1\nhello 2\n");
    }

    #[test]
    fn weights_and_filter() {
        let g = graph("[A]\na | b | c\n[B]\nb\n");
        let fst = to_fst(&g, &FstOptions::default()).unwrap();
        assert!(fst.text.starts_with("0 1 <eps> __label__A 0.25\n"));

        let options = FstOptions {
            intent_filter: Some(Box::new(|i: &str| i == "B")),
            include_weights: false,
            ..FstOptions::default()
        };
        let fst = to_fst(&g, &options).unwrap();
        assert!(!fst.text.contains("__label__A"));
        assert!(fst.text.contains("__label__B 0"));
    }

    #[test]
    fn per_intent_fsts_share_symbols() {
        let g = graph("[A]\nx\n[B]\ny\n");
        let (fsts, isyms, _) = to_intent_fsts(&g, &FstOptions::default()).unwrap();
        assert_eq!(fsts.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(fsts["A"].starts_with("0 1 x x 0\n"));
        assert_eq!(isyms.get("y"), Some(2));
    }

    #[test]
    fn whitespace_label_is_rejected() {
        let mut g = IntentGraph::new();
        let s = g.add_state();
        g.set_start(s);
        let f = g.add_state();
        g.set_final(f);
        g.add_edge(s, f, "two words", "");
        assert!(matches!(
            to_fst(&g, &FstOptions::default()),
            Err(GraphError::InvalidLabel(_))
        ));
    }

    #[test]
    fn write_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fst = to_fst(&graph("[Greet]\nhi\n"), &FstOptions::default())?;
        let (a, b, c) = (
            dir.path().join("g.fst.txt"),
            dir.path().join("in.txt"),
            dir.path().join("out.txt"),
        );
        fst.write(&a, &b, &c)?;
        assert_eq!(fs::read_to_string(a)?, fst.text);
        assert!(fs::read_to_string(b)?.contains("hi 1"));
        Ok(())
    }
}
