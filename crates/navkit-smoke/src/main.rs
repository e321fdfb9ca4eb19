//! NavKit Smoke Harness
//!
//! Runs scripted navigation scenarios against the interception gateway and
//! a mock embedder. Every step is printed as one JSON line, followed by a
//! summary line. Exits non-zero when any scenario fails.

use clap::Parser;
use navkit_common::{init_logging, LogConfig, LogFormat};
use navkit_core::InterceptConfig;
use navkit_test::{load_scenarios, Scenario, ScenarioRunner, TestStatus, TestSummary};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Run NavKit navigation scenarios")]
struct Cli {
    /// Scenario files, each holding one scenario or an array of them.
    #[arg(value_name = "FILE", required = true)]
    scenarios: Vec<PathBuf>,

    /// Intercept configuration replacing the one in every scenario.
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format: pretty, compact or json.
    #[arg(long, default_value = "compact")]
    log_format: String,

    /// Log every guard evaluation.
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = match cli.log_format.parse::<LogFormat>() {
        Ok(format) => format,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let log_config = if cli.verbose {
        LogConfig::trace()
    } else {
        LogConfig::default()
    };
    if let Err(err) = init_logging(log_config.with_format(format)) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let config = match cli.config.as_deref().map(InterceptConfig::load).transpose() {
        Ok(config) => config.map(InterceptConfig::apply_env_overrides),
        Err(err) => {
            error!(error = %err, "Invalid intercept config");
            return ExitCode::from(2);
        }
    };

    let mut scenarios: Vec<Scenario> = Vec::new();
    for path in &cli.scenarios {
        match load_scenarios(path) {
            Ok(loaded) => scenarios.extend(loaded),
            Err(err) => {
                error!(path = %path.display(), error = %err, "Failed to load scenarios");
                return ExitCode::from(2);
            }
        }
    }
    for scenario in &mut scenarios {
        scenario.config = match &config {
            Some(config) => config.clone(),
            None => scenario.config.clone().apply_env_overrides(),
        };
    }
    info!(count = scenarios.len(), "Scenarios loaded");

    let mut summary = TestSummary::new();
    for scenario in &scenarios {
        let (result, records) = ScenarioRunner::run(scenario);
        for record in &records {
            let line = json!({
                "scenario": scenario.name,
                "record": record,
            });
            println!("{line}");
        }
        if result.status != TestStatus::Pass {
            error!(
                scenario = %result.name,
                message = result.message.as_deref().unwrap_or_default(),
                "Scenario failed"
            );
        }
        summary.add(result);
    }

    let line = json!({
        "summary": {
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
            "errors": summary.errors,
            "duration_ms": summary.duration_ms,
        }
    });
    println!("{line}");

    if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
