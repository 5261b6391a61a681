//! Application configuration for Quizsmith.
//!
//! User config lives at `~/.quizsmith/quizsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuizsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "quizsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".quizsmith";

/// Env var that overrides the content database path.
pub const DB_PATH_ENV: &str = "QUIZSMITH_DB";

// ---------------------------------------------------------------------------
// Config structs (matching quizsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generation backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Remote job polling settings.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// The content catalog this deployment covers.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the content database.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum items requested per bucket in one planning pass.
    #[serde(default = "default_per_run_cap")]
    pub per_run_cap: u32,

    /// Delay between consecutive generation items, in milliseconds.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            per_run_cap: default_per_run_cap(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

fn default_db_path() -> String {
    "~/.quizsmith/content.db".into()
}
fn default_per_run_cap() -> u32 {
    5
}
fn default_item_delay_ms() -> u64 {
    1000
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the generation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for generation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Output-length budget per generation request, in tokens.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Temperature for open-ended content generation (higher for variety).
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    /// Temperature for calibration-style scoring (low for determinism).
    #[serde(default = "default_calibration_temperature")]
    pub calibration_temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            generation_temperature: default_generation_temperature(),
            calibration_temperature: default_calibration_temperature(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8089".into()
}
fn default_api_key_env() -> String {
    "QUIZSMITH_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_generation_temperature() -> f32 {
    0.9
}
fn default_calibration_temperature() -> f32 {
    0.1
}

/// `[jobs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Interval between status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wall-clock budget per job before the client reports a timeout.
    #[serde(default = "default_job_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_job_timeout_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_job_timeout_secs() -> u64 {
    180
}

/// `[catalog]` section — the enumerable domains of the coverage model.
///
/// Loaded configuration rather than compiled-in lists, so deployments can
/// reshape the curriculum without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Leaf topics in the curriculum taxonomy.
    #[serde(default)]
    pub skill_nodes: Vec<SkillNodeEntry>,

    /// Content language codes.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Target item count per coverage bucket.
    #[serde(default = "default_target_per_bucket")]
    pub target_per_bucket: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            skill_nodes: Vec::new(),
            languages: default_languages(),
            target_per_bucket: default_target_per_bucket(),
        }
    }
}

fn default_languages() -> Vec<String> {
    vec!["en".into()]
}
fn default_target_per_bucket() -> u32 {
    10
}

/// `[[catalog.skill_nodes]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillNodeEntry {
    /// Stable identifier used on content rows (e.g., `algebra-linear-equations`).
    pub id: String,
    /// Human-readable title used in prompts.
    pub title: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.quizsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QuizsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.quizsmith/quizsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QuizsmithError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        QuizsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QuizsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QuizsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QuizsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the backend API key env var is set and non-empty, returning the key.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.backend.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(QuizsmithError::config(format!(
            "generation backend API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Resolve the content database path: `QUIZSMITH_DB` env var wins, then the
/// config value, with a leading `~` expanded against the user's home.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = match std::env::var(DB_PATH_ENV) {
        Ok(val) if !val.is_empty() => val,
        _ => config.defaults.db_path.clone(),
    };

    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| QuizsmithError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}
