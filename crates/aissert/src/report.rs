//! Session-scoped metric report
//!
//! Maps a test name to the last value its gate recorded. One report is
//! created per session and handed to whoever runs the gates; clones share
//! the same underlying map.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// How a metric value was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Computed directly from the output (string match, overlap, ...)
    #[default]
    Heuristic,
    /// Graded by a separate language model
    LlmJudge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Heuristic => write!(f, "heuristic"),
            MetricKind::LlmJudge => write!(f, "llm_judge"),
        }
    }
}

/// A single recorded metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub kind: MetricKind,
}

/// Live, shareable metric report
#[derive(Debug, Clone, Default)]
pub struct MetricReport {
    entries: Arc<RwLock<BTreeMap<String, MetricResult>>>,
}

impl MetricReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under `name`, replacing whatever was there
    pub fn record(&self, name: impl Into<String>, value: f64, kind: MetricKind) {
        let name = name.into();
        let result = MetricResult {
            name: name.clone(),
            value,
            kind,
        };
        // A panic elsewhere must not lock other cases out of the report.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(name, result);
    }

    /// Last recorded value for `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).map(|r| r.value)
    }

    /// Copy of the current name -> value mapping
    pub fn current(&self) -> BTreeMap<String, f64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(name, r)| (name.clone(), r.value))
            .collect()
    }

    /// Immutable copy of the report at this point in time
    pub fn snapshot(&self) -> ReportSnapshot {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        ReportSnapshot {
            entries: entries.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every recorded value. Never called implicitly.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Frozen copy of a [`MetricReport`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportSnapshot {
    entries: BTreeMap<String, MetricResult>,
}

impl ReportSnapshot {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.get(name).map(|r| r.value)
    }

    pub fn result(&self, name: &str) -> Option<&MetricResult> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Results in ascending name order
    pub fn iter(&self) -> impl Iterator<Item = &MetricResult> {
        self.entries.values()
    }

    pub fn values(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(name, r)| (name.clone(), r.value))
            .collect()
    }

    /// Only the results produced by one kind of metric
    pub fn by_kind(&self, kind: MetricKind) -> Vec<&MetricResult> {
        self.entries.values().filter(|r| r.kind == kind).collect()
    }

    /// The end-of-session line: `<<< {"name": value, ...} >>>`
    pub fn render_line(&self) -> String {
        format!("<<< {} >>>", self)
    }
}

impl fmt::Display for ReportSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, result)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", name, result.value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_then_snapshot() {
        let report = MetricReport::new();
        report.record("t1", 0.8, MetricKind::Heuristic);

        let snapshot = report.snapshot();
        assert_eq!(snapshot.get("t1"), Some(0.8));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let report = MetricReport::new();
        report.record("t1", 0.2, MetricKind::Heuristic);
        report.record("t1", 0.9, MetricKind::LlmJudge);

        assert_eq!(report.len(), 1);
        assert_eq!(report.get("t1"), Some(0.9));
        let snapshot = report.snapshot();
        assert_eq!(snapshot.result("t1").map(|r| r.kind), Some(MetricKind::LlmJudge));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let report = MetricReport::new();
        report.record("a", 1.0, MetricKind::Heuristic);
        let before = report.snapshot();

        report.record("a", 0.0, MetricKind::Heuristic);
        report.record("b", 0.5, MetricKind::Heuristic);

        assert_eq!(before.get("a"), Some(1.0));
        assert_eq!(before.get("b"), None);
        assert_eq!(report.snapshot().get("a"), Some(0.0));
    }

    #[test]
    fn test_clones_share_state() {
        let report = MetricReport::new();
        let handle = report.clone();
        handle.record("shared", 0.3, MetricKind::Heuristic);
        assert_eq!(report.get("shared"), Some(0.3));
    }

    #[test]
    fn test_render_line() {
        let report = MetricReport::new();
        report.record("t2", 0.8, MetricKind::Heuristic);
        report.record("t1", 1.0, MetricKind::LlmJudge);

        assert_eq!(
            report.snapshot().render_line(),
            r#"<<< {"t1": 1.0, "t2": 0.8} >>>"#
        );
        assert_eq!(MetricReport::new().snapshot().render_line(), "<<< {} >>>");
    }

    #[test]
    fn test_by_kind() {
        let report = MetricReport::new();
        report.record("lang", 1.0, MetricKind::Heuristic);
        report.record("judge", 0.0, MetricKind::LlmJudge);

        let snapshot = report.snapshot();
        let judged = snapshot.by_kind(MetricKind::LlmJudge);
        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].name, "judge");
    }

    #[test]
    fn test_survives_poisoned_lock() {
        let report = MetricReport::new();
        let handle = report.clone();
        let _ = std::thread::spawn(move || {
            let _guard = handle.entries.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        report.record("after", 0.7, MetricKind::Heuristic);
        assert_eq!(report.get("after"), Some(0.7));
    }

    #[test]
    fn test_snapshot_serializes_as_map() {
        let report = MetricReport::new();
        report.record("t1", 0.5, MetricKind::Heuristic);
        let json = serde_json::to_value(report.snapshot()).unwrap();
        assert_eq!(json["t1"]["value"], 0.5);
        assert_eq!(json["t1"]["kind"], "heuristic");
    }
}
