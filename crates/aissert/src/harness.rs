//! Session harness for gated test cases
//!
//! Expands cases over loaded fixture pairs, runs every invocation in order,
//! and collects per-invocation outcomes plus the final metric report.
//! A failing invocation never stops the session; configuration problems do.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::case::{CaseArgs, FixtureParam, TestCase};
use crate::fixture::{FixturePair, FixtureSet, FixtureSource};
use crate::report::{MetricKind, MetricReport, ReportSnapshot};

/// One planned run of a test case
#[derive(Debug, Clone)]
pub struct Invocation {
    /// `name` or `name[i]` for parametrized cases
    pub id: String,
    case_index: usize,
    pair: Option<Arc<FixturePair>>,
}

impl Invocation {
    pub fn fixture_id(&self) -> Option<&str> {
        self.pair.as_deref().map(|p| p.id.as_str())
    }
}

/// Result of a single invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed(String),
}

impl CaseStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub id: String,
    pub name: String,
    pub kind: MetricKind,
    pub fixture_id: Option<String>,
    pub threshold: f64,
    /// Value the metric produced, if it produced one
    pub value: Option<f64>,
    #[serde(flatten)]
    pub status: CaseStatus,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.status.is_passed()
    }
}

/// Everything a session produced
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcomes: Vec<CaseOutcome>,
    pub metrics: ReportSnapshot,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl SessionReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Invocations for a given test name
    pub fn outcomes_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CaseOutcome> {
        self.outcomes.iter().filter(move |o| o.name == name)
    }

    pub fn report_line(&self) -> String {
        self.metrics.render_line()
    }

    /// Print per-case results and the report line
    pub fn print_summary(&self) {
        println!();
        for outcome in &self.outcomes {
            match &outcome.status {
                CaseStatus::Passed => println!("{} PASSED", outcome.id),
                CaseStatus::Failed(reason) => println!("{} FAILED - {}", outcome.id, reason),
            }
        }
        println!(
            "\n{} passed, {} failed ({} total)",
            self.passed, self.failed, self.total
        );
        println!("{}", self.report_line());
    }
}

/// Runs gated test cases for one session
pub struct TestHarness {
    source: Option<FixtureSource>,
    fixtures: Option<FixtureSet>,
    report: MetricReport,
    cases: Vec<TestCase>,
}

impl TestHarness {
    /// Harness that loads pairs from `source` the first time a case needs them
    pub fn new(source: FixtureSource) -> Self {
        Self {
            source: Some(source),
            fixtures: None,
            report: MetricReport::new(),
            cases: Vec::new(),
        }
    }

    /// Harness over an already loaded fixture set
    pub fn with_fixtures(fixtures: FixtureSet) -> Self {
        Self {
            source: None,
            fixtures: Some(fixtures),
            report: MetricReport::new(),
            cases: Vec::new(),
        }
    }

    /// Harness for cases that take no fixtures
    pub fn without_fixtures() -> Self {
        Self {
            source: None,
            fixtures: None,
            report: MetricReport::new(),
            cases: Vec::new(),
        }
    }

    /// Record into `report` instead of a fresh one
    pub fn with_report(mut self, report: MetricReport) -> Self {
        self.report = report;
        self
    }

    pub fn case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn add_case(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    pub fn report(&self) -> &MetricReport {
        &self.report
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Fixture set, loading it on first use
    fn fixtures(&mut self) -> Result<&FixtureSet> {
        if self.fixtures.is_none() {
            let source = self.source.as_ref().ok_or_else(|| {
                Error::config("a test case needs fixture pairs but no fixture source is configured")
            })?;
            self.fixtures = Some(source.load()?);
        }
        Ok(self.fixtures.get_or_insert_with(FixtureSet::default))
    }

    /// Expand cases into invocations
    pub fn plan(&mut self) -> Result<Vec<Invocation>> {
        for case in &self.cases {
            let declared = |p: FixtureParam| case.params().contains(&p);
            if declared(FixtureParam::Question) != declared(FixtureParam::Answer) {
                return Err(Error::config(format!(
                    "test {} must declare both question and answer fixtures, or neither",
                    case.name()
                )));
            }
        }

        let needs_pairs = self.cases.iter().any(TestCase::requires_pair);
        let pairs = if needs_pairs {
            self.fixtures()?.invocations()
        } else {
            Vec::new()
        };

        let mut invocations = Vec::new();
        for (case_index, case) in self.cases.iter().enumerate() {
            if case.requires_pair() {
                for (i, pair) in pairs.iter().enumerate() {
                    invocations.push(Invocation {
                        id: format!("{}[{}]", case.name(), i),
                        case_index,
                        pair: Some(Arc::clone(pair)),
                    });
                }
            } else {
                invocations.push(Invocation {
                    id: case.name().to_string(),
                    case_index,
                    pair: None,
                });
            }
        }

        info!(
            "Planned {} invocation(s) for {} test case(s)",
            invocations.len(),
            self.cases.len()
        );
        Ok(invocations)
    }

    /// Run every invocation and return the session report
    pub fn run(&mut self) -> Result<SessionReport> {
        let invocations = match self.plan() {
            Ok(invocations) => invocations,
            Err(e) => {
                warn!("Session aborted: {}", e);
                info!("Session finished: {}", self.report.snapshot().render_line());
                return Err(e);
            }
        };

        let outcomes: Vec<CaseOutcome> = invocations
            .iter()
            .map(|invocation| self.run_invocation(invocation))
            .collect();

        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed()).count();
        let session = SessionReport {
            outcomes,
            metrics: self.report.snapshot(),
            total,
            passed,
            failed: total - passed,
        };

        info!(
            passed = session.passed,
            failed = session.failed,
            "Session finished: {}",
            session.report_line()
        );
        Ok(session)
    }

    fn run_invocation(&self, invocation: &Invocation) -> CaseOutcome {
        let case = &self.cases[invocation.case_index];
        let gate = case.gate();
        let args = match invocation.pair.as_deref() {
            Some(pair) => CaseArgs::with_pair(pair),
            None => CaseArgs::empty(),
        };

        debug!(id = %invocation.id, "Running invocation");

        // Panics in the metric function fail this invocation only.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            gate.evaluate(&self.report, || case.call(&args))
        }));

        let (value, status) = match result {
            Ok(Ok(value)) => (Some(value), CaseStatus::Passed),
            Ok(Err(failure)) => {
                warn!(id = %invocation.id, "{}", failure);
                let value = failure.value();
                (value, CaseStatus::Failed(failure.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(id = %invocation.id, "Metric function panicked: {}", message);
                (None, CaseStatus::Failed(format!("panicked: {message}")))
            }
        };

        CaseOutcome {
            id: invocation.id.clone(),
            name: gate.name().to_string(),
            kind: gate.kind(),
            fixture_id: invocation.fixture_id().map(str::to_string),
            threshold: gate.threshold(),
            value,
            status,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
