//! # Scenarios
//!
//! Scripted navigation sequences run against a gateway backed by a
//! [`MockEmbedder`]. Scenarios are plain JSON so the smoke harness can load
//! them from disk.

use crate::embedder::{EmbedderCall, EmbedderProfile, MockEmbedder};
use crate::{TestError, TestResult};
use navkit_core::InterceptConfig;
use navkit_engine::{
    Decision, DecisionReason, InterceptGateway, NavigationParams, PromptId, PromptResponse,
    Verdict,
};
use navkit_intent::parse_uri;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// A named sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: InterceptConfig,
    #[serde(default)]
    pub embedder: EmbedderProfile,
    pub steps: Vec<ScenarioStep>,
}

fn yes() -> bool {
    true
}

/// One step of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Another application opened the surface with `url`.
    Launch {
        url: String,
        #[serde(default)]
        custom_tab: bool,
        #[serde(default)]
        send_to_external_apps: bool,
    },
    /// The surface starts a navigation.
    Navigate {
        navigation: NavigationParams,
        #[serde(default)]
        expect: Option<Expectation>,
    },
    /// A navigation committed `url`.
    Commit { url: String },
    /// A navigation finished.
    Finish {
        #[serde(default = "yes")]
        committed: bool,
        #[serde(default = "yes")]
        main_frame: bool,
    },
    /// The user answered the most recent prompt.
    Answer {
        response: PromptResponse,
        #[serde(default)]
        expect: Option<Expectation>,
    },
    /// The navigation callback returned; run deferred work.
    RunDeferred {
        #[serde(default)]
        expect_actions: Option<usize>,
    },
}

impl ScenarioStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioStep::Launch { .. } => "launch",
            ScenarioStep::Navigate { .. } => "navigate",
            ScenarioStep::Commit { .. } => "commit",
            ScenarioStep::Finish { .. } => "finish",
            ScenarioStep::Answer { .. } => "answer",
            ScenarioStep::RunDeferred { .. } => "run_deferred",
        }
    }
}

/// What a step is expected to decide. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectation {
    /// `continue`, `clobber`, `launch` or `async`.
    pub decision: Option<String>,
    pub reason: Option<DecisionReason>,
    pub intercepted: Option<bool>,
    /// Package of the launched request.
    pub package: Option<String>,
}

impl Expectation {
    pub fn decision(kind: &str) -> Self {
        Self {
            decision: Some(kind.to_string()),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: DecisionReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn check(&self, decision: &Decision, reason: Option<DecisionReason>) -> Result<(), String> {
        if let Some(expected) = &self.decision {
            if expected != decision.kind() {
                return Err(format!("expected {expected}, got {}", decision.kind()));
            }
        }
        if let (Some(expected), Some(actual)) = (self.reason, reason) {
            if expected != actual {
                return Err(format!("expected reason {expected:?}, got {actual:?}"));
            }
        }
        if let Some(expected) = self.intercepted {
            if expected == decision.is_continue() {
                return Err(format!("expected intercepted={expected}"));
            }
        }
        if let Some(expected) = &self.package {
            let actual = decision.launch_request().and_then(|r| r.package.as_deref());
            if actual != Some(expected.as_str()) {
                return Err(format!("expected launch of {expected}, got {actual:?}"));
            }
        }
        Ok(())
    }
}

/// What happened in one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DecisionReason>,
    pub calls: Vec<EmbedderCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Drives an [`InterceptGateway`] over a [`MockEmbedder`].
pub struct ScenarioRunner {
    gateway: InterceptGateway<MockEmbedder>,
    last_prompt: Option<PromptId>,
}

impl ScenarioRunner {
    pub fn new(config: InterceptConfig, profile: EmbedderProfile) -> Self {
        Self {
            gateway: InterceptGateway::new(MockEmbedder::new(profile), config),
            last_prompt: None,
        }
    }

    pub fn with_profile(profile: EmbedderProfile) -> Self {
        Self::new(InterceptConfig::default(), profile)
    }

    pub fn gateway(&mut self) -> &mut InterceptGateway<MockEmbedder> {
        &mut self.gateway
    }

    pub fn embedder(&self) -> &MockEmbedder {
        self.gateway.delegate()
    }

    pub fn last_prompt(&self) -> Option<PromptId> {
        self.last_prompt
    }

    /// Another application opens the surface with `url`.
    pub fn launch(
        &mut self,
        url: &str,
        custom_tab: bool,
        send_to_external_apps: bool,
    ) -> Result<(), TestError> {
        let request = parse_uri(url).map_err(|err| TestError::Parse(err.to_string()))?;
        self.gateway
            .on_external_launch_received(Some(&request), custom_tab, send_to_external_apps);
        Ok(())
    }

    pub fn navigate(&mut self, params: NavigationParams) -> Verdict {
        let verdict = self.gateway.handle_navigation(&params);
        if verdict.prompt.is_some() {
            self.last_prompt = verdict.prompt;
        }
        verdict
    }

    /// Navigate, and commit the URL when the navigation was not intercepted.
    pub fn navigate_and_commit(&mut self, params: NavigationParams) -> Verdict {
        let url = params.url.clone();
        let verdict = self.navigate(params);
        if !verdict.is_intercepted() {
            self.embedder().commit(&url);
            self.gateway.on_navigation_finished(true, true);
        }
        verdict
    }

    /// Answer the most recent prompt.
    pub fn answer(&mut self, response: PromptResponse) -> Result<Decision, TestError> {
        let prompt = self
            .last_prompt
            .take()
            .ok_or_else(|| TestError::Assertion("no prompt to answer".into()))?;
        self.gateway
            .resolve_prompt(prompt, response)
            .map_err(|err| TestError::Assertion(err.to_string()))
    }

    /// Run every step of `scenario` on a fresh runner.
    pub fn run(scenario: &Scenario) -> (TestResult, Vec<StepRecord>) {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Running scenario");
        let start = Instant::now();
        let mut runner = Self::new(scenario.config.clone(), scenario.embedder.clone());
        let mut records = Vec::with_capacity(scenario.steps.len());
        let mut first_failure = None;

        for (index, step) in scenario.steps.iter().enumerate() {
            let record = runner.run_step(index, step);
            if let Some(failure) = &record.failure {
                debug!(index, failure = %failure, "Step failed");
                first_failure.get_or_insert_with(|| format!("step {index}: {failure}"));
            }
            records.push(record);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = match first_failure {
            None => TestResult::pass(&scenario.name, duration_ms),
            Some(message) => TestResult::fail(&scenario.name, duration_ms, message),
        };
        (result, records)
    }

    fn run_step(&mut self, index: usize, step: &ScenarioStep) -> StepRecord {
        let mut record = StepRecord {
            index,
            step: step.name(),
            url: None,
            decision: None,
            reason: None,
            calls: Vec::new(),
            failure: None,
        };

        match step {
            ScenarioStep::Launch {
                url,
                custom_tab,
                send_to_external_apps,
            } => {
                record.url = Some(url.clone());
                if let Err(err) = self.launch(url, *custom_tab, *send_to_external_apps) {
                    record.failure = Some(err.to_string());
                }
            }
            ScenarioStep::Navigate { navigation, expect } => {
                record.url = Some(navigation.url.clone());
                let verdict = self.navigate(navigation.clone());
                if let Some(expect) = expect {
                    record.failure = expect.check(&verdict.decision, Some(verdict.reason)).err();
                }
                record.reason = Some(verdict.reason);
                record.decision = Some(verdict.decision);
            }
            ScenarioStep::Commit { url } => {
                record.url = Some(url.clone());
                self.embedder().commit(url);
            }
            ScenarioStep::Finish {
                committed,
                main_frame,
            } => {
                self.gateway.on_navigation_finished(*committed, *main_frame);
            }
            ScenarioStep::Answer { response, expect } => match self.answer(*response) {
                Ok(decision) => {
                    if let Some(expect) = expect {
                        record.failure = expect.check(&decision, None).err();
                    }
                    record.decision = Some(decision);
                }
                Err(err) => record.failure = Some(err.to_string()),
            },
            ScenarioStep::RunDeferred { expect_actions } => {
                let ran = self.gateway.run_deferred();
                if let Some(expected) = expect_actions {
                    if ran != *expected {
                        record.failure =
                            Some(format!("expected {expected} deferred actions, ran {ran}"));
                    }
                }
            }
        }

        record.calls = self.embedder().take_calls();
        record
    }
}
