//! Metric-gated test assertions
//!
//! Turns functions that produce a numeric score into pass/fail test cases
//! and keeps a session-wide report of every recorded score.
//!
//! ## Pieces
//!
//! - **Report**: name -> last recorded value, one per session
//! - **Gate**: runs a metric, records it, fails below a threshold
//! - **Fixtures**: question/answer YAML pairs that parametrize cases
//! - **Harness**: expands cases over fixtures and runs them in order
//!
//! ```ignore
//! use aissert::{FixtureSource, MetricGate, TestCase, TestHarness};
//!
//! let gate = MetricGate::ai_metric("language_test").build()?;
//! let mut harness = TestHarness::new(FixtureSource::new("tests"))
//!     .case(TestCase::new(gate, |args| {
//!         let answer = args.answer()?;
//!         Ok(if answer.text.is_empty() { 0.0 } else { 1.0 })
//!     }).with_pair());
//!
//! let session = harness.run()?;
//! println!("{}", session.report_line());
//! ```

pub mod case;
pub mod config;
pub mod fixture;
pub mod gate;
pub mod harness;
pub mod judge;
pub mod metrics;
pub mod report;

pub use case::{CaseArgs, FixtureParam, MetricFn, TestCase};
pub use config::{load_config, HarnessConfig};
pub use fixture::{load_record, FixturePair, FixtureRecord, FixtureSet, FixtureSource};
pub use gate::{GateBuilder, GateFailure, MetricGate, DEFAULT_THRESHOLD};
pub use harness::{CaseOutcome, CaseStatus, Invocation, SessionReport, TestHarness};
pub use judge::{Criterion, JudgeBackend, LlmJudge};
pub use metrics::BuiltinMetric;
pub use report::{MetricKind, MetricReport, MetricResult, ReportSnapshot};
