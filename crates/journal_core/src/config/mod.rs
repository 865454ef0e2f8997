use crate::error::AppError;
use crate::session::DEFAULT_SESSION_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "journal";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "JOURNAL_CONFIG_PATH";

pub const REMOTE_FIELDS: [&str; 7] = [
    "api_key",
    "auth_domain",
    "project_id",
    "storage_bucket",
    "messaging_sender_id",
    "app_id",
    "endpoint",
];

/// Connection settings for the hosted document database.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub messaging_sender_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl RemoteConfig {
    fn field_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "api_key" => Some(&mut self.api_key),
            "auth_domain" => Some(&mut self.auth_domain),
            "project_id" => Some(&mut self.project_id),
            "storage_bucket" => Some(&mut self.storage_bucket),
            "messaging_sender_id" => Some(&mut self.messaging_sender_id),
            "app_id" => Some(&mut self.app_id),
            "endpoint" => Some(&mut self.endpoint),
            _ => None,
        }
    }

    /// Service endpoint: the configured one, else derived from the project.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.clone().or_else(|| {
            self.project_id
                .as_deref()
                .map(|project| format!("https://firestore.googleapis.com/v1/projects/{project}"))
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session_timeout_ms: Option<u64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    /// `session_timeout_ms = 0` waits for the identity provider indefinitely.
    pub fn session_timeout(&self) -> Option<Duration> {
        match self.session_timeout_ms {
            None => Some(DEFAULT_SESSION_TIMEOUT),
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub session_timeout_ms: Option<u64>,
    pub user_id: Option<String>,
    pub remote: BTreeMap<String, String>,
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize_config(config))
}

fn normalize_config(mut config: Config) -> Config {
    config.user_id = normalize_value(config.user_id);
    for name in REMOTE_FIELDS {
        if let Some(field) = config.remote.field_mut(name) {
            *field = normalize_value(field.take());
        }
    }
    config
}

fn normalize_value(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Result<Config, AppError> {
    let mut merged = base.clone();
    if let Some(timeout) = overrides.session_timeout_ms {
        merged.session_timeout_ms = Some(timeout);
    }

    if let Some(user_id) = normalize_value(overrides.user_id.clone()) {
        merged.user_id = Some(user_id);
    }

    for (name, value) in overrides.remote.iter() {
        let field = merged
            .remote
            .field_mut(name)
            .ok_or_else(|| AppError::invalid_argument(format!("unknown remote field '{name}'")))?;
        *field = normalize_value(Some(value.clone()));
    }

    Ok(merged)
}
