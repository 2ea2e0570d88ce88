//! YAML fixture loader
//!
//! Loads question/answer fixture pairs from external YAML files. Each pair
//! lives in two files sharing an id:
//!
//! ```text
//! <root>/questions/<id>.yaml
//! <root>/answers/<id>.yaml
//! ```
//!
//! Both files are mappings with at least a `text` field. A missing or
//! malformed file fails the whole load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_QUESTIONS_DIR: &str = "questions";
pub const DEFAULT_ANSWERS_DIR: &str = "answers";

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// One side of a fixture pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub text: String,
    /// Any other keys in the file
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FixtureRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.extra.get(key)
    }
}

/// A loaded (question, answer) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixturePair {
    pub id: String,
    pub question: FixtureRecord,
    pub answer: FixtureRecord,
}

/// Parse a single fixture record
pub fn load_record(path: &Path) -> Result<FixtureRecord> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::fixture(path, format!("failed to read: {e}")))?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::fixture(path, format!("failed to parse: {e}")))
}

/// Where fixtures live and which ones to load
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSource {
    root: PathBuf,
    questions_dir: String,
    answers_dir: String,
    ids: Vec<String>,
    repeat: usize,
}

impl FixtureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            questions_dir: DEFAULT_QUESTIONS_DIR.to_string(),
            answers_dir: DEFAULT_ANSWERS_DIR.to_string(),
            ids: Vec::new(),
            repeat: 1,
        }
    }

    pub fn questions_dir(mut self, dir: impl Into<String>) -> Self {
        self.questions_dir = dir.into();
        self
    }

    pub fn answers_dir(mut self, dir: impl Into<String>) -> Self {
        self.answers_dir = dir.into();
        self
    }

    /// Load exactly these ids instead of discovering them
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Run every pair this many times
    pub fn repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn question_path(&self, id: &str) -> PathBuf {
        resolve(&self.root.join(&self.questions_dir), id)
    }

    pub fn answer_path(&self, id: &str) -> PathBuf {
        resolve(&self.root.join(&self.answers_dir), id)
    }

    /// Ids of every question file, sorted
    pub fn discover_ids(&self) -> Result<Vec<String>> {
        let dir = self.root.join(&self.questions_dir);
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::fixture(&dir, format!("failed to read directory: {e}")))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| EXTENSIONS.contains(&ext));
            if !is_yaml {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Read every configured (or discovered) pair once
    pub fn load(&self) -> Result<FixtureSet> {
        if self.repeat == 0 {
            return Err(Error::config("fixture repeat must be at least 1"));
        }

        let ids = if self.ids.is_empty() {
            self.discover_ids()?
        } else {
            self.ids.clone()
        };

        if ids.is_empty() {
            return Err(Error::config(format!(
                "no fixtures found under {}",
                self.root.join(&self.questions_dir).display()
            )));
        }

        let mut pairs = Vec::with_capacity(ids.len());
        for id in ids {
            let question = load_record(&self.question_path(&id))?;
            let answer = load_record(&self.answer_path(&id))?;
            debug!(id = %id, "Loaded fixture pair");
            pairs.push(Arc::new(FixturePair { id, question, answer }));
        }

        info!(
            "Loaded {} fixture pair(s) from {} (repeat {})",
            pairs.len(),
            self.root.display(),
            self.repeat
        );

        Ok(FixtureSet {
            pairs,
            repeat: self.repeat,
        })
    }
}

/// Prefer `<id>.yaml`, fall back to an existing `<id>.yml`
fn resolve(dir: &Path, id: &str) -> PathBuf {
    let primary = dir.join(format!("{id}.yaml"));
    if primary.exists() {
        return primary;
    }
    let alternate = dir.join(format!("{id}.yml"));
    if alternate.exists() {
        alternate
    } else {
        primary
    }
}

/// Fixture pairs loaded for one session
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    pairs: Vec<Arc<FixturePair>>,
    repeat: usize,
}

impl FixtureSet {
    /// Build a set from pairs already in memory
    pub fn from_pairs(pairs: Vec<FixturePair>, repeat: usize) -> Self {
        Self {
            pairs: pairs.into_iter().map(Arc::new).collect(),
            repeat,
        }
    }

    /// Distinct loaded pairs
    pub fn pairs(&self) -> &[Arc<FixturePair>] {
        &self.pairs
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// One entry per invocation: every pair `repeat` times, in id order
    pub fn invocations(&self) -> Vec<Arc<FixturePair>> {
        self.pairs
            .iter()
            .flat_map(|pair| std::iter::repeat(pair).take(self.repeat))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len() * self.repeat
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_pair(root: &Path, id: &str, question: &str, answer: &str) {
        let q_dir = root.join(DEFAULT_QUESTIONS_DIR);
        let a_dir = root.join(DEFAULT_ANSWERS_DIR);
        fs::create_dir_all(&q_dir).unwrap();
        fs::create_dir_all(&a_dir).unwrap();
        fs::write(q_dir.join(format!("{id}.yaml")), question).unwrap();
        fs::write(a_dir.join(format!("{id}.yaml")), answer).unwrap();
    }

    #[test]
    fn test_load_configured_pair() {
        let dir = TempDir::new().unwrap();
        write_pair(
            dir.path(),
            "example_001",
            "text: What is the capital of France?\nlang: en\n",
            "text: Paris\n",
        );

        let set = FixtureSource::new(dir.path())
            .ids(["example_001"])
            .load()
            .unwrap();

        assert_eq!(set.pairs().len(), 1);
        let pair = &set.pairs()[0];
        assert_eq!(pair.id, "example_001");
        assert_eq!(pair.question.text, "What is the capital of France?");
        assert_eq!(
            pair.question.field("lang").and_then(|v| v.as_str()),
            Some("en")
        );
        assert_eq!(pair.answer.text, "Paris");
    }

    #[test]
    fn test_discover_ids_sorted() {
        let dir = TempDir::new().unwrap();
        write_pair(dir.path(), "b", "text: q-b", "text: a-b");
        write_pair(dir.path(), "a", "text: q-a", "text: a-a");
        fs::write(dir.path().join("questions/notes.txt"), "ignored").unwrap();

        let ids = FixtureSource::new(dir.path()).discover_ids().unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_yml_extension() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("questions")).unwrap();
        fs::create_dir_all(dir.path().join("answers")).unwrap();
        fs::write(dir.path().join("questions/q.yml"), "text: hi").unwrap();
        fs::write(dir.path().join("answers/q.yml"), "text: hello").unwrap();

        let set = FixtureSource::new(dir.path()).load().unwrap();
        assert_eq!(set.pairs()[0].answer.text, "hello");
    }

    #[test]
    fn test_repeat_duplicates_invocations() {
        let dir = TempDir::new().unwrap();
        write_pair(dir.path(), "x", "text: q", "text: a");

        let set = FixtureSource::new(dir.path()).repeat(2).load().unwrap();

        let invocations = set.invocations();
        assert_eq!(invocations.len(), 2);
        assert!(Arc::ptr_eq(&invocations[0], &invocations[1]));
        assert_eq!(set.pairs().len(), 1);
    }

    #[test]
    fn test_missing_answer_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("questions")).unwrap();
        fs::write(dir.path().join("questions/only.yaml"), "text: q").unwrap();

        let err = FixtureSource::new(dir.path()).load().unwrap_err();
        match err {
            Error::Fixture { path, .. } => assert!(path.ends_with("answers/only.yaml")),
            other => panic!("Expected fixture error, got {other:?}"),
        }
    }

    #[test]
    fn test_record_without_text_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_pair(dir.path(), "bad", "prompt: no text here", "text: a");

        let err = FixtureSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, Error::Fixture { .. }));
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn test_empty_directory_is_config_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("questions")).unwrap();

        let err = FixtureSource::new(dir.path()).load().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = FixtureSource::new(dir.path().join("nowhere")).load().unwrap_err();
        assert!(matches!(err, Error::Fixture { .. }));
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let dir = TempDir::new().unwrap();
        write_pair(dir.path(), "x", "text: q", "text: a");
        let err = FixtureSource::new(dir.path()).repeat(0).load().unwrap_err();
        assert!(err.is_config());
    }
}
