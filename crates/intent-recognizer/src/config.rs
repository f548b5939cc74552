//! Recognizer settings.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use intent_graph::Casing;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RecognizeError, Result};
use crate::fuzzy::FuzzyCost;
use crate::strict::SearchOptions;

/// File form of [`RecognizeOptions`].
///
/// ```yaml
/// fuzzy: true
/// stop_words: [please, the, a]
/// casing: lower
/// intents: [SetTemp, Greet]
/// max_paths: 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub fuzzy: bool,
    pub stop_words: Vec<String>,
    /// Applied to labels and input before comparing.
    pub casing: Casing,
    /// Only these intents are considered when set.
    pub intents: Option<Vec<String>>,
    /// Strict search stops after this many paths.
    pub max_paths: Option<usize>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            fuzzy: true,
            stop_words: Vec::new(),
            casing: Casing::Keep,
            intents: None,
            max_paths: None,
        }
    }
}

impl RecognizerConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| RecognizeError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| RecognizeError::Config(format!("reading {}: {e}", path.display())))?;
        let config = serde_yaml::from_str(&raw)
            .map_err(|e| RecognizeError::Config(format!("parsing {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded recognizer config");
        Ok(config)
    }

    pub fn options(&self) -> RecognizeOptions {
        let mut search = SearchOptions::default();
        if let Some(intents) = &self.intents {
            let allowed: HashSet<String> = intents.iter().cloned().collect();
            search = search.with_intent_filter(move |name| allowed.contains(name));
        }
        let casing = self.casing;
        if casing != Casing::Keep {
            search = search.with_word_transform(move |w| casing.apply(w));
        }
        RecognizeOptions {
            fuzzy: self.fuzzy,
            stop_words: self.stop_words.iter().cloned().collect(),
            search,
            max_paths: self.max_paths,
            cost_fn: None,
        }
    }
}

/// Everything [`recognize`](crate::recognize) needs besides the graph.
pub struct RecognizeOptions {
    pub fuzzy: bool,
    pub stop_words: HashSet<String>,
    pub search: SearchOptions,
    pub max_paths: Option<usize>,
    /// Replaces the default fuzzy cost.
    pub cost_fn: Option<Box<dyn FuzzyCost>>,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        RecognizerConfig::default().options()
    }
}

impl RecognizeOptions {
    pub fn strict() -> Self {
        Self {
            fuzzy: false,
            ..Self::default()
        }
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for RecognizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizeOptions")
            .field("fuzzy", &self.fuzzy)
            .field("stop_words", &self.stop_words)
            .field("search", &self.search)
            .field("max_paths", &self.max_paths)
            .field("cost_fn", &self.cost_fn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_defaults_and_overrides() {
        let config = RecognizerConfig::from_yaml_str("stop_words: [please]\ncasing: lower\n").unwrap();
        assert!(config.fuzzy);
        assert_eq!(config.stop_words, vec!["please".to_string()]);
        assert_eq!(config.casing, Casing::Lower);

        let options = config.options();
        assert!(options.stop_words.contains("please"));
        assert_eq!(options.search.transform("HeLLo"), "hello");
        assert!(options.search.allows("Anything"));
    }

    #[test]
    fn intents_allowlist() {
        let config = RecognizerConfig {
            intents: Some(vec!["Greet".into()]),
            ..RecognizerConfig::default()
        };
        let options = config.options();
        assert!(options.search.allows("Greet"));
        assert!(!options.search.allows("Bye"));
    }

    #[test]
    fn load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("recognizer.yaml");
        fs::write(&path, "fuzzy: false\nmax_paths: 3\n")?;
        let config = RecognizerConfig::load(&path)?;
        assert!(!config.fuzzy);
        assert_eq!(config.max_paths, Some(3));

        fs::write(&path, "fuzzy: [not, a, bool]\n")?;
        assert!(matches!(RecognizerConfig::load(&path), Err(RecognizeError::Config(_))));
        Ok(())
    }
}
