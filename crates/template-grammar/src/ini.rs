//! Ini-style intent corpora: `[IntentName]` sections holding sentence
//! templates and `key = template` rules.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GrammarError, Result, SyntaxError};
use crate::expression::{CorpusItem, IntentCorpus};
use crate::parser::{parse_rule, parse_sentence, ParseMetadata};

type IntentFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;
type SentenceTransform = Box<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Default)]
pub struct LoadOptions {
    /// Sections whose name fails this predicate are skipped entirely.
    pub intent_filter: Option<IntentFilter>,
    /// Rewrites each sentence or rule body before it is parsed.
    pub sentence_transform: Option<SentenceTransform>,
    /// Warn and continue when an input path does not exist.
    pub skip_missing: bool,
}

impl LoadOptions {
    pub fn with_intent_filter(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.intent_filter = Some(Box::new(f));
        self
    }

    pub fn with_sentence_transform(
        mut self,
        f: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.sentence_transform = Some(Box::new(f));
        self
    }

    pub fn skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    fn accepts(&self, intent: &str) -> bool {
        self.intent_filter.as_ref().map_or(true, |f| f(intent))
    }

    fn transform(&self, text: &str) -> String {
        match &self.sentence_transform {
            Some(f) => f(text),
            None => text.to_string(),
        }
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("intent_filter", &self.intent_filter.is_some())
            .field("sentence_transform", &self.sentence_transform.is_some())
            .field("skip_missing", &self.skip_missing)
            .finish()
    }
}

/// One body line after duplicate folding.
struct Entry {
    key: String,
    value: Option<String>,
    line_number: usize,
}

struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    /// A repeated key keeps its first position and takes the latest value.
    fn upsert(&mut self, key: String, value: Option<String>, line_number: usize) {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.value = value;
                entry.line_number = line_number;
            }
            None => self.entries.push(Entry {
                key,
                value,
                line_number,
            }),
        }
    }
}

/// A body line starting with `\[` is a sentence opening with an optional.
fn unescape_leading_bracket(text: &str) -> &str {
    match text.strip_prefix('\\') {
        Some(rest) if rest.starts_with('[') => rest,
        _ => text,
    }
}

fn split_sections(text: &str, file_name: &str) -> Result<Vec<Section>> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<usize> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
            let name = trimmed[1..trimmed.len() - 1].trim().to_string();
            current = Some(match sections.iter().position(|s| s.name == name) {
                Some(existing) => existing,
                None => {
                    sections.push(Section {
                        name,
                        entries: Vec::new(),
                    });
                    sections.len() - 1
                }
            });
            continue;
        }

        let Some(section) = current else {
            return Err(SyntaxError {
                message: "Line appears before the first [section]".to_string(),
                text: trimmed.to_string(),
                column: 1,
                file_name: Some(file_name.to_string()),
                line_number: Some(line_number),
            }
            .into());
        };

        let (key, value) = match trimmed.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
            None => (trimmed.to_string(), None),
        };
        sections[section].upsert(key, value, line_number);
    }

    Ok(sections)
}

/// Parse an ini document into an intent corpus.
pub fn parse_ini(text: &str, file_name: &str, options: &LoadOptions) -> Result<IntentCorpus> {
    let mut corpus = IntentCorpus::default();

    for section in split_sections(text, file_name)? {
        if !options.accepts(&section.name) {
            debug!(intent = %section.name, "skipping filtered intent");
            continue;
        }

        let mut items = Vec::with_capacity(section.entries.len());
        for entry in section.entries {
            let metadata =
                ParseMetadata::new(file_name, entry.line_number).with_intent(section.name.as_str());
            match entry.value {
                None => {
                    let sentence = options.transform(unescape_leading_bracket(&entry.key));
                    items.push(CorpusItem::Sentence(parse_sentence(&sentence, Some(&metadata))?));
                }
                Some(value) => {
                    let body = options.transform(unescape_leading_bracket(&value));
                    let rule_text = format!("<{}> = ({body});", entry.key);
                    items.push(CorpusItem::Rule(parse_rule(&rule_text, Some(&metadata))?));
                }
            }
        }
        corpus.section_mut(&section.name).items.extend(items);
    }

    debug!(file = file_name, intents = corpus.intents.len(), "parsed ini");
    Ok(corpus)
}

fn io_error(path: &Path, err: std::io::Error) -> GrammarError {
    GrammarError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn collect_ini_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        entries.push(entry.path());
    }
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_ini_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "ini") {
            out.push(path);
        }
    }
    Ok(())
}

/// Load one ini file.
pub fn load_ini_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<IntentCorpus> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    parse_ini(&text, &path.display().to_string(), options)
}

/// Load every file or directory (searched recursively for `*.ini`) into a
/// single corpus. Sections with the same name merge.
pub fn load_ini_paths<P: AsRef<Path>>(paths: &[P], options: &LoadOptions) -> Result<IntentCorpus> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            collect_ini_files(path, &mut files)?;
        } else if path.exists() {
            files.push(path.to_path_buf());
        } else if options.skip_missing {
            warn!(path = %path.display(), "skipping missing grammar path");
        } else {
            return Err(GrammarError::Io {
                path: path.display().to_string(),
                message: "no such file or directory".to_string(),
            });
        }
    }

    let mut corpus = IntentCorpus::default();
    for file in files {
        debug!(path = %file.display(), "loading grammar");
        corpus.merge(load_ini_file(&file, options)?);
    }
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn sentences(corpus: &IntentCorpus, intent: &str) -> Vec<String> {
        corpus
            .get(intent)
            .map(|s| {
                s.items
                    .iter()
                    .filter_map(|item| match item {
                        CorpusItem::Sentence(s) => Some(s.text.clone()),
                        CorpusItem::Rule(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn sections_sentences_and_rules() {
        let text = "\
# lights
[LightOn]
colors = (red | green)
turn on the light
turn on the <colors> light

[LightOff]
turn off the light
";
        let corpus = parse_ini(text, "test.ini", &LoadOptions::default()).unwrap();
        let names: Vec<_> = corpus.intent_names().collect();
        assert_eq!(names, vec!["LightOn", "LightOff"]);

        let on = corpus.get("LightOn").unwrap();
        assert_eq!(on.items.len(), 3);
        let CorpusItem::Rule(rule) = &on.items[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.name, "colors");
        assert_eq!(rule.text, "<colors> = ((red | green));");

        let CorpusItem::Sentence(s) = &on.items[2] else {
            panic!("expected sentence");
        };
        let Expression::Rule(r) = &s.items[3] else {
            panic!("expected rule reference");
        };
        assert_eq!(r.full_rule_name(), "LightOn.colors");
    }

    #[test]
    fn escaped_leading_optional_is_a_sentence() {
        let text = "[Greet]\n\\[good] morning\n";
        let corpus = parse_ini(text, "t.ini", &LoadOptions::default()).unwrap();
        assert_eq!(sentences(&corpus, "Greet"), vec!["[good] morning"]);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let text = "[A]\nx = one\nhello\nx = two\nhello\n[B]\nbye\n[A]\nagain\n";
        let corpus = parse_ini(text, "t.ini", &LoadOptions::default()).unwrap();
        let a = corpus.get("A").unwrap();
        assert_eq!(a.items.len(), 3);
        let CorpusItem::Rule(rule) = &a.items[0] else {
            panic!("expected rule");
        };
        assert_eq!(rule.text, "<x> = (two);");
        assert_eq!(sentences(&corpus, "A"), vec!["hello", "again"]);
    }

    #[test]
    fn filter_and_transform() {
        let text = "[Keep]\nHello There\n[Drop]\nbye\n";
        let options = LoadOptions::default()
            .with_intent_filter(|name| name != "Drop")
            .with_sentence_transform(|s| s.to_lowercase());
        let corpus = parse_ini(text, "t.ini", &options).unwrap();
        assert!(corpus.get("Drop").is_none());
        assert_eq!(sentences(&corpus, "Keep"), vec!["hello there"]);
    }

    #[test]
    fn line_before_section_is_an_error() {
        let err = parse_ini("orphan\n[A]\nx\n", "t.ini", &LoadOptions::default()).unwrap_err();
        let GrammarError::Syntax(e) = err else {
            panic!("expected syntax error");
        };
        assert_eq!(e.line_number, Some(1));
    }

    #[test]
    fn syntax_errors_report_real_line_numbers() {
        let text = "[A]\n\n# comment\nok\nbroken (\n";
        let err = parse_ini(text, "bad.ini", &LoadOptions::default()).unwrap_err();
        let GrammarError::Syntax(e) = err else {
            panic!("expected syntax error");
        };
        assert_eq!(e.line_number, Some(5));
        assert_eq!(e.file_name.as_deref(), Some("bad.ini"));
    }

    #[test]
    fn loads_directories_recursively_in_sorted_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("b.ini"), "[B]\nbee\n")?;
        fs::write(dir.path().join("a.ini"), "[A]\nay\n")?;
        fs::write(dir.path().join("nested").join("c.ini"), "[A]\nsea\n")?;
        fs::write(dir.path().join("notes.txt"), "[Z]\nignored\n")?;

        let corpus = load_ini_paths(&[dir.path()], &LoadOptions::default())?;
        let names: Vec<_> = corpus.intent_names().collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(sentences(&corpus, "A"), vec!["ay", "sea"]);
        Ok(())
    }

    #[test]
    fn missing_paths() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("nope.ini");
        assert!(matches!(
            load_ini_paths(&[&missing], &LoadOptions::default()),
            Err(GrammarError::Io { .. })
        ));
        let corpus = load_ini_paths(&[&missing], &LoadOptions::default().skip_missing(true))?;
        assert!(corpus.is_empty());
        Ok(())
    }
}
