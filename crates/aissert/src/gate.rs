//! Threshold-gated metric assertions
//!
//! A [`MetricGate`] turns a metric-producing function into a pass/fail
//! check. The value is recorded in the report before the threshold is
//! enforced, so failing values still show up in the end-of-session line.

use thiserror::Error;
use tracing::debug;

use crate::report::{MetricKind, MetricReport};

/// Threshold used when none is configured
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Why a single gated check failed
#[derive(Debug, Error)]
pub enum GateFailure {
    #[error("Metric {name}={value} below threshold {threshold}")]
    ThresholdViolation {
        name: String,
        value: f64,
        threshold: f64,
        kind: MetricKind,
    },

    #[error("Metric {name} failed: {error:#}")]
    MetricFunction { name: String, error: anyhow::Error },
}

impl GateFailure {
    pub fn name(&self) -> &str {
        match self {
            GateFailure::ThresholdViolation { name, .. } => name,
            GateFailure::MetricFunction { name, .. } => name,
        }
    }

    /// The recorded value, if the metric produced one
    pub fn value(&self) -> Option<f64> {
        match self {
            GateFailure::ThresholdViolation { value, .. } => Some(*value),
            GateFailure::MetricFunction { .. } => None,
        }
    }
}

/// Builder for [`MetricGate`]
#[derive(Debug, Clone, Default)]
pub struct GateBuilder {
    name: Option<String>,
    threshold: Option<f64>,
    kind: MetricKind,
}

impl GateBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    /// Validate the configuration
    ///
    /// The name is the report key, so a missing or blank one is rejected
    /// here instead of being recorded under an empty key later.
    pub fn build(self) -> common::Result<MetricGate> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => return Err(common::Error::config("gate name must not be blank")),
            None => return Err(common::Error::config("gate name is required")),
        };

        let threshold = self.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if threshold.is_nan() {
            return Err(common::Error::config(format!(
                "gate {name}: threshold must be a number"
            )));
        }

        Ok(MetricGate {
            name,
            threshold,
            kind: self.kind,
        })
    }
}

/// A named, thresholded metric check
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGate {
    name: String,
    threshold: f64,
    kind: MetricKind,
}

impl MetricGate {
    pub fn builder() -> GateBuilder {
        GateBuilder::default()
    }

    /// Gate for a heuristic metric
    pub fn ai_metric(name: impl Into<String>) -> GateBuilder {
        GateBuilder::default().name(name).kind(MetricKind::Heuristic)
    }

    /// Gate for a model-judged metric
    pub fn llm_judge(name: impl Into<String>) -> GateBuilder {
        GateBuilder::default().name(name).kind(MetricKind::LlmJudge)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// `value >= threshold`; NaN never passes
    pub fn passes(&self, value: f64) -> bool {
        value >= self.threshold
    }

    /// Run `metric`, record its value, then enforce the threshold
    ///
    /// An error from `metric` leaves the report untouched.
    pub fn evaluate<F>(&self, report: &MetricReport, metric: F) -> Result<f64, GateFailure>
    where
        F: FnOnce() -> anyhow::Result<f64>,
    {
        let value = metric().map_err(|error| GateFailure::MetricFunction {
            name: self.name.clone(),
            error,
        })?;

        report.record(self.name.clone(), value, self.kind);
        debug!(name = %self.name, value, threshold = self.threshold, "Recorded metric");

        if self.passes(value) {
            Ok(value)
        } else {
            Err(GateFailure::ThresholdViolation {
                name: self.name.clone(),
                value,
                threshold: self.threshold,
                kind: self.kind,
            })
        }
    }

    /// Like [`evaluate`](Self::evaluate), for use inside a plain `#[test]`
    ///
    /// # Panics
    ///
    /// Panics with the failure message when the check does not pass.
    pub fn assert<F>(&self, report: &MetricReport, metric: F) -> f64
    where
        F: FnOnce() -> anyhow::Result<f64>,
    {
        match self.evaluate(report, metric) {
            Ok(value) => value,
            Err(failure) => panic!("{failure}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        let gate = MetricGate::ai_metric("t").build().unwrap();
        assert_eq!(gate.threshold(), DEFAULT_THRESHOLD);
        assert_eq!(gate.kind(), MetricKind::Heuristic);
    }

    #[test]
    fn test_missing_name_is_config_error() {
        let err = MetricGate::builder().threshold(0.7).build().unwrap_err();
        assert!(err.is_config());

        let err = MetricGate::ai_metric("   ").build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let err = MetricGate::ai_metric("t").threshold(f64::NAN).build().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_passes_at_boundary() {
        let gate = MetricGate::ai_metric("t").threshold(0.9).build().unwrap();
        assert!(gate.passes(0.9));
        assert!(gate.passes(1.5));
        assert!(!gate.passes(0.8999));
        assert!(!gate.passes(f64::NAN));
    }

    #[test]
    fn test_scenario_pass_records_value() {
        let report = MetricReport::new();
        let gate = MetricGate::ai_metric("t1").threshold(0.5).build().unwrap();

        let value = gate.evaluate(&report, || Ok(0.8)).unwrap();

        assert_eq!(value, 0.8);
        assert_eq!(report.current().get("t1"), Some(&0.8));
    }

    #[test]
    fn test_scenario_fail_still_records_value() {
        let report = MetricReport::new();
        let gate = MetricGate::ai_metric("t2").threshold(0.9).build().unwrap();

        let failure = gate.evaluate(&report, || Ok(0.8)).unwrap_err();

        assert!(matches!(
            failure,
            GateFailure::ThresholdViolation { value, threshold, .. }
                if value == 0.8 && threshold == 0.9
        ));
        assert_eq!(report.get("t2"), Some(0.8));
    }

    #[test]
    fn test_metric_error_leaves_report_alone() {
        let report = MetricReport::new();
        report.record("earlier", 1.0, MetricKind::Heuristic);
        let gate = MetricGate::ai_metric("broken").build().unwrap();

        let failure = gate
            .evaluate(&report, || Err(anyhow::anyhow!("invalid value")))
            .unwrap_err();

        assert_eq!(failure.name(), "broken");
        assert!(failure.value().is_none());
        assert!(failure.to_string().contains("invalid value"));
        assert_eq!(report.get("broken"), None);
        assert_eq!(report.get("earlier"), Some(1.0));
    }

    #[test]
    fn test_judge_kind_is_recorded() {
        let report = MetricReport::new();
        let gate = MetricGate::llm_judge("judge").threshold(0.9).build().unwrap();

        let _ = gate.evaluate(&report, || Ok(0.8));

        let snapshot = report.snapshot();
        assert_eq!(snapshot.result("judge").unwrap().kind, MetricKind::LlmJudge);
    }

    #[test]
    fn test_assert_returns_value() {
        let report = MetricReport::new();
        let gate = MetricGate::ai_metric("ok").build().unwrap();
        assert_eq!(gate.assert(&report, || Ok(0.5)), 0.5);
    }

    #[test]
    #[should_panic(expected = "Metric low=0.1 below threshold 0.5")]
    fn test_assert_panics_below_threshold() {
        let report = MetricReport::new();
        let gate = MetricGate::ai_metric("low").build().unwrap();
        gate.assert(&report, || Ok(0.1));
    }
}
