use super::{OWNER_FIELD, StoreFailure};
use crate::error::AppError;
use crate::remote::{AuthProvider, Document, DocumentStore};
use crate::session::SessionResolver;
use serde_json::Value;
use std::sync::Arc;

/// A record kind kept in one remote collection and owned through `userId`.
pub(crate) trait StoredRecord: Sized {
    const KIND: &'static str;
    const COLLECTION: &'static str;
    const LOAD_ACTION: &'static str;

    fn record_id(&self) -> Option<&str>;

    fn owner(&self) -> Option<&str>;

    fn decode(document: Document) -> Result<Self, serde_json::Error>;
}

/// State shared by the task and goal stores: the user-scoped records, the
/// last recorded failure and the loading flag.
pub(crate) struct RecordMirror<S, A, T> {
    pub(super) remote: Arc<S>,
    pub(super) session: SessionResolver<A>,
    pub(super) records: Vec<T>,
    pub(super) error: Option<StoreFailure>,
    pub(super) is_loading: bool,
}

impl<S: DocumentStore, A: AuthProvider, T: StoredRecord> RecordMirror<S, A, T> {
    pub(super) fn new(remote: Arc<S>, session: SessionResolver<A>) -> Self {
        Self {
            remote,
            session,
            records: Vec::new(),
            error: None,
            is_loading: false,
        }
    }

    pub(super) fn find(&self, id: &str) -> Option<&T> {
        let id = id.trim();
        self.records
            .iter()
            .find(|record| record.record_id() == Some(id))
    }

    pub(super) fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.record_id() == Some(id))
    }

    pub(super) fn not_found(id: &str) -> AppError {
        AppError::not_found(format!("{} {} not found", T::KIND, id.trim()))
    }

    /// Succeeds only when `id` names a record of `uid`: one mirrored for that
    /// user, or else one the user-scoped remote query returns.
    pub(super) async fn ensure_owned(&self, id: &str, uid: &str) -> Result<(), AppError> {
        if self
            .find(id)
            .is_some_and(|record| record.owner() == Some(uid))
        {
            return Ok(());
        }

        let documents = self.query(uid).await?;
        if documents.iter().any(|document| document.id == id) {
            Ok(())
        } else {
            tracing::warn!(kind = T::KIND, id, "refusing to touch a record outside the session");
            Err(Self::not_found(id))
        }
    }

    pub(super) async fn reload(&mut self) {
        self.records.clear();
        self.is_loading = true;
        let result = self.fetch().await;
        self.is_loading = false;

        match result {
            Ok(records) => {
                tracing::info!(kind = T::KIND, count = records.len(), "records loaded");
                self.records = records;
            }
            Err(err) => self.record(T::LOAD_ACTION, err),
        }
    }

    pub(super) async fn recover(&mut self, action: &'static str, err: AppError) {
        self.record(action, err);
        self.reload().await;
    }

    pub(super) fn record(&mut self, action: &'static str, err: AppError) {
        let failure = StoreFailure {
            action,
            source: err,
        };
        tracing::error!(kind = T::KIND, error = %failure, "store action failed");
        self.error = Some(failure);
    }

    async fn fetch(&self) -> Result<Vec<T>, AppError> {
        let user = self.session.wait_for_user().await?;
        let documents = self.query(&user.uid).await?;
        Ok(documents.into_iter().filter_map(decode::<T>).collect())
    }

    async fn query(&self, uid: &str) -> Result<Vec<Document>, AppError> {
        self.remote
            .query_eq(T::COLLECTION, OWNER_FIELD, &Value::String(uid.to_string()))
            .await
    }
}

fn decode<T: StoredRecord>(document: Document) -> Option<T> {
    let id = document.id.clone();
    match T::decode(document) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!(kind = T::KIND, id = %id, error = %err, "skipping malformed record");
            None
        }
    }
}
