//! aissert command-line runner
//!
//! Checks single metric values and runs built-in metrics over fixture pairs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use aissert::config::{self, HarnessConfig};
use aissert::{BuiltinMetric, GateFailure, MetricGate, MetricReport, TestCase, TestHarness};

#[derive(Parser)]
#[command(name = "aissert")]
#[command(about = "Metric-gated assertions for AI outputs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (or set AISSERT_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding questions/ and answers/ (overrides fixtures.root)
    #[arg(long, global = true)]
    fixtures_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute one metric and fail if it is below the threshold
    Check {
        #[arg(value_enum)]
        metric: BuiltinMetric,

        /// Reference or prompt text
        input: String,

        /// Text to score
        output: String,

        /// Minimum passing value
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Run a metric over every fixture pair
    Run {
        #[arg(short, long, value_enum, default_value_t = BuiltinMetric::TokenF1)]
        metric: BuiltinMetric,

        /// Report name (defaults to the metric id)
        #[arg(short, long)]
        name: Option<String>,

        /// Minimum passing value
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Run each pair this many times
        #[arg(long)]
        repeat: Option<usize>,

        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// List fixture pairs
    Fixtures,

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print one value
    Get { key: String },
    /// Set one value and save
    Set { key: String, value: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into())
                .add_directive("aissert=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::get_config_file()?,
    };
    let saved = config::load_config_from(&config_path)?;
    let mut config = with_overrides(saved.clone(), cli.fixtures_root);

    match cli.command {
        Commands::Check {
            metric,
            input,
            output,
            threshold,
        } => check_metric(&config, metric, &input, &output, threshold),
        Commands::Run {
            metric,
            name,
            threshold,
            repeat,
            json,
        } => {
            if let Some(repeat) = repeat {
                config.fixtures.repeat = repeat;
            }
            run_fixtures(&config, metric, name, threshold, json)
        }
        Commands::Fixtures => list_fixtures(&config),
        Commands::Config { action } => configure(saved, &config_path, action),
    }
}

/// Apply one-off command-line overrides; never saved back to the file
fn with_overrides(mut config: HarnessConfig, fixtures_root: Option<PathBuf>) -> HarnessConfig {
    if let Some(root) = fixtures_root {
        config.fixtures.root = root;
    }
    config
}

fn check_metric(
    config: &HarnessConfig,
    metric: BuiltinMetric,
    input: &str,
    output: &str,
    threshold: Option<f64>,
) -> Result<()> {
    let gate = MetricGate::ai_metric(metric.id())
        .threshold(threshold.unwrap_or(config.gate.threshold))
        .build()?;
    let report = MetricReport::new();

    match gate.evaluate(&report, || Ok(metric.compute(input, output))) {
        Ok(_) => {
            println!("{}", metric);
            Ok(())
        }
        Err(failure @ GateFailure::ThresholdViolation { .. }) => {
            eprintln!("ERROR: {}", failure);
            std::process::exit(1);
        }
        Err(failure) => Err(failure.into()),
    }
}

fn run_fixtures(
    config: &HarnessConfig,
    metric: BuiltinMetric,
    name: Option<String>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let gate = MetricGate::ai_metric(name.unwrap_or_else(|| metric.id().to_string()))
        .threshold(threshold.unwrap_or(config.gate.threshold))
        .build()?;

    let case = TestCase::new(gate, move |args| {
        let question = args.question()?;
        let answer = args.answer()?;
        Ok(metric.compute(&question.text, &answer.text))
    })
    .with_pair();

    let mut harness = TestHarness::new(config.fixtures.source()).case(case);
    let session = harness.run().context("Failed to run fixtures")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        session.print_summary();
    }

    if !session.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

fn list_fixtures(config: &HarnessConfig) -> Result<()> {
    let source = config.fixtures.source();
    let fixtures = source.load().context("Failed to load fixtures")?;

    println!("Fixtures in {}:\n", source.root().display());
    for pair in fixtures.pairs() {
        println!("  {}", pair.id);
        println!("    Q: {}", pair.question.text);
        println!("    A: {}", pair.answer.text);
    }
    println!(
        "\n{} pair(s), {} invocation(s) per pair-based test",
        fixtures.pairs().len(),
        fixtures.len()
    );
    Ok(())
}

fn configure(mut config: HarnessConfig, path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => match config::get_config_value(&config, &key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("No value for config key: {}", key),
        },
        ConfigAction::Set { key, value } => {
            config::set_config_value(&mut config, &key, &value)?;
            config::save_config_to(&config, path)?;
            println!("Set {} = {}", key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_apply_to_effective_config() {
        let config = with_overrides(HarnessConfig::default(), Some(PathBuf::from("/elsewhere")));
        assert_eq!(config.fixtures.root, PathBuf::from("/elsewhere"));

        let config = with_overrides(HarnessConfig::default(), None);
        assert_eq!(config.fixtures.root, PathBuf::from("tests"));
    }

    #[test]
    fn test_config_set_keeps_saved_fixtures_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aissert.toml");
        std::fs::write(&path, "[fixtures]\nroot = \"tests\"\n").unwrap();

        let saved = config::load_config_from(&path).unwrap();
        let effective = with_overrides(saved.clone(), Some(PathBuf::from("/elsewhere")));
        assert_eq!(effective.fixtures.root, PathBuf::from("/elsewhere"));

        configure(
            saved,
            &path,
            ConfigAction::Set {
                key: "gate.threshold".to_string(),
                value: "0.7".to_string(),
            },
        )
        .unwrap();

        let reloaded = config::load_config_from(&path).unwrap();
        assert_eq!(reloaded.fixtures.root, PathBuf::from("tests"));
        assert_eq!(reloaded.gate.threshold, 0.7);
    }
}
