//! Test case definitions
//!
//! A test case is a gate, a metric function, and the list of fixtures the
//! function wants injected. The harness reads that list to decide how many
//! times the case runs and what it gets.

use std::fmt;

use anyhow::anyhow;

use crate::fixture::{FixturePair, FixtureRecord};
use crate::gate::MetricGate;

/// A fixture a metric function can ask for by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureParam {
    Question,
    Answer,
}

impl fmt::Display for FixtureParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureParam::Question => write!(f, "question"),
            FixtureParam::Answer => write!(f, "answer"),
        }
    }
}

/// Arguments resolved for one invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseArgs<'a> {
    pair: Option<&'a FixturePair>,
}

impl<'a> CaseArgs<'a> {
    /// No injected fixtures
    pub fn empty() -> Self {
        Self { pair: None }
    }

    pub fn with_pair(pair: &'a FixturePair) -> Self {
        Self { pair: Some(pair) }
    }

    pub fn question(&self) -> anyhow::Result<&'a FixtureRecord> {
        self.pair
            .map(|p| &p.question)
            .ok_or_else(|| anyhow!("fixture `question` was not declared for this case"))
    }

    pub fn answer(&self) -> anyhow::Result<&'a FixtureRecord> {
        self.pair
            .map(|p| &p.answer)
            .ok_or_else(|| anyhow!("fixture `answer` was not declared for this case"))
    }

    /// Id of the injected fixture pair, if any
    pub fn fixture_id(&self) -> Option<&'a str> {
        self.pair.map(|p| p.id.as_str())
    }
}

/// The function under test: returns a metric value for one invocation
pub type MetricFn = Box<dyn Fn(&CaseArgs<'_>) -> anyhow::Result<f64> + Send + Sync>;

/// A gated metric plus its declared fixture parameters
pub struct TestCase {
    gate: MetricGate,
    params: Vec<FixtureParam>,
    metric: MetricFn,
}

impl TestCase {
    pub fn new<F>(gate: MetricGate, metric: F) -> Self
    where
        F: Fn(&CaseArgs<'_>) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        Self {
            gate,
            params: Vec::new(),
            metric: Box::new(metric),
        }
    }

    /// Declare a fixture the metric function needs
    pub fn with_param(mut self, param: FixtureParam) -> Self {
        if !self.params.contains(&param) {
            self.params.push(param);
        }
        self
    }

    /// Declare both `question` and `answer`
    pub fn with_pair(self) -> Self {
        self.with_param(FixtureParam::Question)
            .with_param(FixtureParam::Answer)
    }

    pub fn gate(&self) -> &MetricGate {
        &self.gate
    }

    pub fn name(&self) -> &str {
        self.gate.name()
    }

    pub fn params(&self) -> &[FixtureParam] {
        &self.params
    }

    /// Whether the case is parametrized over fixture pairs
    pub fn requires_pair(&self) -> bool {
        self.params.contains(&FixtureParam::Question)
            && self.params.contains(&FixtureParam::Answer)
    }

    pub(crate) fn call(&self, args: &CaseArgs<'_>) -> anyhow::Result<f64> {
        (self.metric)(args)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("gate", &self.gate)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
