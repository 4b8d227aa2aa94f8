use crate::health::{MergeEngine, MergeSet, NO_PROBLEM_TEXT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let mut value = value.trim();
            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            pairs.push((key.trim(), value));
        }
    }
    pairs
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("merge sensor key {0:?} must be a non-empty slug of [a-z0-9_]")]
    InvalidSlug(String),

    #[error("merge sensor {0:?} has no health_sensors")]
    NoChildren(String),

    #[error("no configuration path given and no config directory available")]
    NoConfigPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Child states are read from `{state_prefix}/{child_id}`.
    pub state_prefix: String,
    /// Merged states are published to `{output_prefix}/{merge_id}`.
    pub output_prefix: String,
}

/// Merge sensors keyed by their slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_no_problem_text")]
    pub no_problem_text: String,
    #[serde(default)]
    pub sensors: BTreeMap<String, MergeSetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSetConfig {
    #[serde(default)]
    pub friendly_name: Option<String>,
    pub health_sensors: Vec<String>,
}

fn default_no_problem_text() -> String {
    NO_PROBLEM_TEXT.to_string()
}

fn is_slug(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl MergeConfig {
    /// Parse merge sensor definitions from JSON without validating them.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load and validate merge sensor definitions from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, set) in &self.sensors {
            if !is_slug(key) {
                return Err(ConfigError::InvalidSlug(key.clone()));
            }
            if set.health_sensors.is_empty() {
                return Err(ConfigError::NoChildren(key.clone()));
            }
        }
        Ok(())
    }

    /// Build the merge sets in key order.
    pub fn merge_sets(&self) -> Vec<MergeSet> {
        self.sensors
            .iter()
            .map(|(key, set)| {
                MergeSet::new(
                    key.clone(),
                    set.friendly_name.clone(),
                    set.health_sensors.iter().cloned(),
                )
            })
            .collect()
    }

    pub fn engine(&self) -> MergeEngine {
        MergeEngine::with_no_problem_text(self.no_problem_text.clone())
    }

    /// Every child id watched by any merge set, deduplicated and sorted.
    pub fn watched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sensors
            .values()
            .flat_map(|set| set.health_sensors.iter().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            no_problem_text: default_no_problem_text(),
            sensors: BTreeMap::new(),
        }
    }
}

/// Default location of the merge sensor definitions.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("health-merge").join("config.json"))
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "10.0.0.2".to_string(),
            broker_port: 1883,
            client_id: "health-merge".to_string(),
            username: None,
            password: None,
            state_prefix: "health/state".to_string(),
            output_prefix: "health/merged".to_string(),
        }
    }
}

impl Config {
    /// MQTT settings from the environment, merge sensors from `path`.
    ///
    /// Falls back to `HEALTH_MERGE_CONFIG` and then [`default_config_path`]
    /// when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("HEALTH_MERGE_CONFIG")
                .map(PathBuf::from)
                .ok()
                .or_else(default_config_path)
                .ok_or(ConfigError::NoConfigPath)?,
        };

        Ok(Self {
            mqtt: MqttConfig::from_env(),
            merge: MergeConfig::load(&path)?,
        })
    }
}

impl MqttConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.password = Some(password);
        }
        if let Ok(prefix) = std::env::var("HEALTH_STATE_PREFIX") {
            config.state_prefix = prefix.trim_end_matches('/').to_string();
        }
        if let Ok(prefix) = std::env::var("HEALTH_OUTPUT_PREFIX") {
            config.output_prefix = prefix.trim_end_matches('/').to_string();
        }

        config
    }
}
