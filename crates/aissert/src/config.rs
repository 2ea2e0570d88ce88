//! Run configuration
//!
//! Read from `aissert.toml`. Lookup order: `$AISSERT_CONFIG_PATH`, then
//! `./aissert.toml`, then the platform config directory. A missing file
//! means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::fixture::{FixtureSource, DEFAULT_ANSWERS_DIR, DEFAULT_QUESTIONS_DIR};
use crate::gate::DEFAULT_THRESHOLD;

const APP_NAME: &str = "aissert";
const CONFIG_FILE: &str = "aissert.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub fixtures: FixturesConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub harness: HarnessSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixturesConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_questions_dir")]
    pub questions_dir: String,
    #[serde(default = "default_answers_dir")]
    pub answers_dir: String,
    /// Empty means every file in the questions directory
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from("tests")
}

fn default_questions_dir() -> String {
    DEFAULT_QUESTIONS_DIR.to_string()
}

fn default_answers_dir() -> String {
    DEFAULT_ANSWERS_DIR.to_string()
}

fn default_repeat() -> usize {
    1
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            questions_dir: default_questions_dir(),
            answers_dir: default_answers_dir(),
            ids: Vec::new(),
            repeat: default_repeat(),
        }
    }
}

impl FixturesConfig {
    pub fn source(&self) -> FixtureSource {
        FixtureSource::new(&self.root)
            .questions_dir(&self.questions_dir)
            .answers_dir(&self.answers_dir)
            .ids(self.ids.iter().cloned())
            .repeat(self.repeat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Harness-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessSettings {
    /// Placeholder setting; read and stored, nothing acts on it yet
    #[serde(default)]
    pub hello: Option<String>,
}

pub fn get_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

/// Path of the config file to use
pub fn get_config_file() -> Result<PathBuf> {
    // AISSERT_CONFIG_PATH overrides every other location
    if let Ok(path) = std::env::var("AISSERT_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    Ok(get_config_dir()?.join(CONFIG_FILE))
}

pub fn load_config() -> Result<HarnessConfig> {
    load_config_from(&get_config_file()?)
}

pub fn load_config_from(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        return Ok(HarnessConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn save_config_to(config: &HarnessConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

pub fn get_config_value(config: &HarnessConfig, key: &str) -> Option<String> {
    match key {
        "fixtures.root" => Some(config.fixtures.root.display().to_string()),
        "fixtures.questions_dir" => Some(config.fixtures.questions_dir.clone()),
        "fixtures.answers_dir" => Some(config.fixtures.answers_dir.clone()),
        "fixtures.ids" => Some(config.fixtures.ids.join(",")),
        "fixtures.repeat" => Some(config.fixtures.repeat.to_string()),
        "gate.threshold" => Some(config.gate.threshold.to_string()),
        "harness.hello" => config.harness.hello.clone(),
        _ => None,
    }
}

pub fn set_config_value(config: &mut HarnessConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "fixtures.root" => config.fixtures.root = PathBuf::from(value),
        "fixtures.questions_dir" => config.fixtures.questions_dir = value.to_string(),
        "fixtures.answers_dir" => config.fixtures.answers_dir = value.to_string(),
        "fixtures.ids" => {
            config.fixtures.ids = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        "fixtures.repeat" => {
            config.fixtures.repeat = value
                .parse()
                .with_context(|| format!("Invalid repeat count: {value}"))?
        }
        "gate.threshold" => {
            config.gate.threshold = value
                .parse()
                .with_context(|| format!("Invalid threshold: {value}"))?
        }
        "harness.hello" => config.harness.hello = Some(value.to_string()),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}
