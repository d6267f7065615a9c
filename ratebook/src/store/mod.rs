//! The document store the notebook talks to.
//!
//! Data lives in collections of documents addressed by slash separated paths:
//! a collection path has an odd number of segments
//! (`artifacts/app/users/u/restaurants`), a document path an even number
//! (`artifacts/app/users/u/restaurants/abc`). A document can own
//! sub-collections, but deleting it leaves them where they are.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::MemoryStore;

pub type Fields = serde_json::Map<String, Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("no document at {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("listener on {0} was closed")]
    SubscriptionClosed(String),
}

/// One stored document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub fields: Fields,
}

impl Document {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }
}

/// Everything in a collection at one moment, oldest document first.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub collection: String,
    pub documents: Vec<Document>,
}

type Delivery = Result<Snapshot, StoreError>;

struct Release(Option<Box<dyn FnOnce() + Send + Sync>>);

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

/// A live listener on one collection.
///
/// Yields the current snapshot straight away, then a fresh one after every
/// change. After an error nothing more arrives. Dropping the subscription
/// unregisters it from the store.
pub struct Subscription {
    collection: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    _release: Release,
}

impl Subscription {
    /// `release` runs exactly once, when the subscription is dropped.
    pub fn new<F>(
        collection: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<Delivery>,
        release: F,
    ) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            collection: collection.into(),
            receiver,
            _release: Release(Some(Box::new(release))),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl Stream for Subscription {
    type Item = Delivery;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Start listening on a collection.
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    /// Create a document with a store assigned id and creation time.
    async fn add(&self, collection: &str, fields: Fields) -> Result<Document, StoreError>;

    /// Merge `fields` into an existing document. Other fields are kept.
    async fn update(&self, document: &str, fields: Fields) -> Result<(), StoreError>;

    /// Remove a document. Missing documents are not an error.
    /// Sub-collections are not touched.
    async fn delete(&self, document: &str) -> Result<(), StoreError>;
}

fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

pub(crate) fn check_collection(path: &str) -> Result<(), StoreError> {
    match segments(path)?.len() % 2 {
        1 => Ok(()),
        _ => Err(StoreError::InvalidPath(path.to_string())),
    }
}

/// Split a document path into its collection path and id.
pub(crate) fn split_document(path: &str) -> Result<(&str, &str), StoreError> {
    if segments(path)?.len() % 2 != 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    path.rsplit_once('/')
        .ok_or_else(|| StoreError::InvalidPath(path.to_string()))
}
