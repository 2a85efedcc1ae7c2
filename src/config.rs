//! Runtime configuration.
//!
//! Resolution chain for every setting: environment variable > JSON config file
//! > built-in default. Config files are looked up at
//! `$XDG_CONFIG_HOME/mealplanner/config.json` (falling back to
//! `~/.config/mealplanner/config.json`) and then the legacy
//! `~/.mealplanner/config.json`. The first file that parses wins.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENROUTER_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_MODEL: &str = "MEALPLANNER_LLM_MODEL";
pub const ENV_PROVIDER: &str = "MEALPLANNER_LLM_PROVIDER";
pub const ENV_DATA_DIR: &str = "MEALPLANNER_DATA_DIR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Settings handed to the generative provider at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn resolve() -> Self {
        Self::resolve_with(|key| std::env::var(key).ok(), load_config_file())
    }

    pub fn resolve_with(env: impl Fn(&str) -> Option<String>, file: ConfigFile) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let llm = LlmSettings {
            provider: env(ENV_PROVIDER)
                .or(file.provider)
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
                .to_lowercase(),
            model: env(ENV_MODEL)
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_api_key: env(ENV_OPENAI_KEY).or(file.openai_api_key),
            openrouter_api_key: env(ENV_OPENROUTER_KEY).or(file.openrouter_api_key),
        };
        let data_dir = env(ENV_DATA_DIR)
            .map(PathBuf::from)
            .or(file.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self { llm, data_dir }
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.data_dir.join("recipes.json")
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join("user_prefs.json")
    }
}

pub fn config_paths() -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let xdg = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home.join(".config"));
    vec![
        xdg.join("mealplanner").join("config.json"),
        home.join(".mealplanner").join("config.json"),
    ]
}

/// First readable, well-formed config file; empty config when none is found.
pub fn load_config_file() -> ConfigFile {
    for path in config_paths() {
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str::<ConfigFile>(&text).map_err(anyhow::Error::from))
        {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config file");
                return config;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config file"),
        }
    }
    ConfigFile::default()
}
