//! Seams to the remote document database and the identity provider.
//!
//! The stores only talk to these traits. [`memory::MemoryDocumentStore`] and
//! [`file::FileDocumentStore`] implement [`DocumentStore`] without a network;
//! [`auth::LocalAuth`] is an in-process [`AuthProvider`].

pub mod auth;
pub mod file;
pub mod memory;

use crate::error::AppError;
use serde_json::{Map, Value};
use std::future::Future;

pub use auth::{AuthState, AuthSubscription, LocalAuth};

/// Authenticated identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
        }
    }
}

/// A stored document: the store-assigned identifier plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Per-collection document operations.
///
/// `update` replaces the whole field set of the document; it does not merge.
pub trait DocumentStore: Send + Sync {
    /// Documents of `collection` whose `field` equals `value`, in store order.
    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> impl Future<Output = Result<Vec<Document>, AppError>> + Send;

    fn get_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<Document>, AppError>> + Send;

    /// Stores a new document and returns its generated identifier.
    fn add(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Fails with [`AppError::RemoteOperationFailed`] when `id` does not exist.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Deleting a missing document is not an error.
    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Source of the signed-in identity.
pub trait AuthProvider: Send + Sync {
    /// The identity if the provider has already resolved one.
    fn current_user(&self) -> Option<User>;

    /// Registers a state-change listener. The listener is removed when the
    /// returned subscription is dropped.
    fn subscribe(&self) -> AuthSubscription;
}
