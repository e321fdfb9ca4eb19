//! # NavKit Test
//!
//! Scenario harness for the NavKit interception engine.
//!
//! ## Pieces
//!
//! 1. **Mock embedder**: a scripted, recording [`NavigationDelegate`](navkit_engine::NavigationDelegate)
//! 2. **Scenarios**: JSON-described navigation sequences with expectations
//! 3. **Conformance tests**: the reference scenarios and the engine's
//!    safety properties, run against the real gateway
//!
//! ## Usage
//!
//! ```rust,ignore
//! use navkit_test::{EmbedderProfile, ScenarioRunner};
//!
//! let mut runner = ScenarioRunner::with_profile(EmbedderProfile::new().with_marketplace());
//! let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
//! assert!(verdict.is_intercepted());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub mod embedder;
pub mod scenario;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod reference;

pub use embedder::{EmbedderCall, EmbedderProfile, HandlerRule, MockEmbedder, BROWSER_PACKAGE};
pub use scenario::{Expectation, Scenario, ScenarioRunner, ScenarioStep, StepRecord};

/// Errors that can occur in testing.
#[derive(Error, Debug)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),
}

/// Scenario result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
}

/// Result of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pass,
            duration_ms,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, duration_ms: u64, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Fail,
            duration_ms,
            message: Some(message.into()),
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Error,
            duration_ms: 0,
            message: Some(message.into()),
        }
    }
}

/// Aggregated results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TestResult) {
        self.total += 1;
        self.duration_ms += result.duration_ms;
        match result.status {
            TestStatus::Pass => self.passed += 1,
            TestStatus::Fail => self.failed += 1,
            TestStatus::Error => self.errors += 1,
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

/// Load scenarios from a JSON file holding one scenario or an array.
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<Scenario>, TestError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading scenarios");
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    let scenarios = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(scenarios)
}

/// Run every scenario and summarize.
pub fn run_all(scenarios: &[Scenario]) -> TestSummary {
    let mut summary = TestSummary::new();
    for scenario in scenarios {
        let (result, _) = ScenarioRunner::run(scenario);
        summary.add(result);
    }
    info!(
        passed = summary.passed,
        total = summary.total,
        "Scenarios complete"
    );
    summary
}
