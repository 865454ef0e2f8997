use crate::config;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
const LOCAL_FILE_NAME: &str = "local.json";
const LOCAL_ENV_VAR: &str = "JOURNAL_LOCAL_PATH";

/// String key/value storage in the style of browser local storage.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), AppError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStorage {
    items: HashMap<String, String>,
}

impl MemoryKeyValueStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryKeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredItems {
    schema_version: u32,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

pub fn local_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(LOCAL_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(config::config_dir()?.join(LOCAL_FILE_NAME))
}

/// Key/value storage persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStorage {
    path: PathBuf,
}

impl FileKeyValueStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredItems, AppError> {
        if !self.path.exists() {
            return Ok(StoredItems {
                schema_version: SCHEMA_VERSION,
                items: BTreeMap::new(),
            });
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|err| AppError::io(err.to_string()))?;
        let stored: StoredItems =
            serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

        if stored.schema_version != SCHEMA_VERSION {
            return Err(AppError::invalid_data("schema_version mismatch"));
        }

        Ok(stored)
    }

    fn save(&self, stored: &StoredItems) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
        }

        let content = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, content).map_err(|err| AppError::io(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, permissions)
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        Ok(())
    }
}

impl KeyValueStorage for FileKeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.load()?.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        let mut stored = self.load()?;
        stored.items.insert(key.to_string(), value.to_string());
        self.save(&stored)
    }
}
