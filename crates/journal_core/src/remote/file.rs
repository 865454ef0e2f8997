//! Document store kept in a single JSON file.
//!
//! This is the offline cache the command-line front-end syncs against. Every
//! operation reads the whole file, applies the change and writes it back.

use super::{Document, DocumentStore};
use crate::config::{self, Config};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "store.json";
const STORE_ENV_VAR: &str = "JOURNAL_STORE_PATH";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCollections {
    schema_version: u32,
    #[serde(default)]
    collections: BTreeMap<String, Vec<StoredDocument>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl From<StoredDocument> for Document {
    fn from(stored: StoredDocument) -> Self {
        Document {
            id: stored.id,
            fields: stored.fields,
        }
    }
}

/// Store file location: `$JOURNAL_STORE_PATH`, else the config directory,
/// namespaced by the configured project when there is one.
pub fn store_path(config: &Config) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let dir = config::config_dir()?;
    Ok(match config.remote.project_id.as_deref() {
        Some(project) => dir.join(project).join(STORE_FILE_NAME),
        None => dir.join(STORE_FILE_NAME),
    })
}

#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    path: PathBuf,
}

impl FileDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredCollections, AppError> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|err| AppError::io(err.to_string()))?
        {
            return Ok(StoredCollections {
                schema_version: SCHEMA_VERSION,
                collections: BTreeMap::new(),
            });
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| AppError::io(format!("{}: {}", self.path.display(), err)))?;
        let stored: StoredCollections = serde_json::from_str(&content)
            .map_err(|err| AppError::invalid_data(format!("{}: {}", self.path.display(), err)))?;

        if stored.schema_version != SCHEMA_VERSION {
            return Err(AppError::invalid_data("schema_version mismatch"));
        }

        Ok(stored)
    }

    async fn save(&self, stored: &StoredCollections) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        let content = serde_json::to_string_pretty(stored)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|err| AppError::io(err.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, permissions)
                .await
                .map_err(|err| AppError::io(err.to_string()))?;
        }

        Ok(())
    }
}

/// File-level failures surface as remote failures.
fn remote_failure(err: AppError) -> AppError {
    match err {
        AppError::RemoteOperationFailed(_) => err,
        other => AppError::remote(other.to_string()),
    }
}

fn generate_id(existing: &[StoredDocument]) -> String {
    let mut nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    loop {
        let candidate = format!("doc-{nanos:x}");
        if !existing.iter().any(|doc| doc.id == candidate) {
            return candidate;
        }
        nanos += 1;
    }
}

impl DocumentStore for FileDocumentStore {
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, AppError> {
        let mut stored = self.load().await.map_err(remote_failure)?;
        Ok(stored
            .collections
            .remove(collection)
            .unwrap_or_default()
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(value))
            .map(Document::from)
            .collect())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        let mut stored = self.load().await.map_err(remote_failure)?;
        Ok(stored
            .collections
            .remove(collection)
            .unwrap_or_default()
            .into_iter()
            .map(Document::from)
            .collect())
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> Result<String, AppError> {
        let mut stored = self.load().await.map_err(remote_failure)?;
        let documents = stored.collections.entry(collection.to_string()).or_default();
        let id = generate_id(documents);
        documents.push(StoredDocument {
            id: id.clone(),
            fields,
        });
        self.save(&stored).await.map_err(remote_failure)?;
        tracing::debug!(collection, id = %id, path = %self.path.display(), "document added");
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let mut stored = self.load().await.map_err(remote_failure)?;
        let document = stored
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| AppError::remote(format!("no document {collection}/{id}")))?;
        document.fields = fields;
        self.save(&stored).await.map_err(remote_failure)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let mut stored = self.load().await.map_err(remote_failure)?;
        if let Some(documents) = stored.collections.get_mut(collection) {
            documents.retain(|doc| doc.id != id);
        }
        self.save(&stored).await.map_err(remote_failure)
    }
}
