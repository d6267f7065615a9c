use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{
    check_collection, split_document, Document, DocumentStore, Fields, Snapshot, StoreError,
    Subscription,
};
use crate::{common::random_id, config::StoreConfig};

struct Listener {
    collection: String,
    sender: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    last_created: Option<DateTime<Utc>>,
    writes_failing: bool,
}

impl State {
    fn snapshot(&self, collection: &str) -> Snapshot {
        let mut documents: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Snapshot {
            collection: collection.to_string(),
            documents,
        }
    }

    fn notify(&mut self, collection: &str) {
        let snapshot = self.snapshot(collection);
        self.listeners.retain(|_, listener| {
            /* a send only fails once the receiving end is gone */
            listener.collection != collection || listener.sender.send(Ok(snapshot.clone())).is_ok()
        });
    }

    /// Creation times only ever move forward, even if the clock doesn't.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created = match self.last_created {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(created);
        created
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.writes_failing {
            Err(StoreError::Unavailable("writes are failing".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A [`DocumentStore`] kept in process memory.
///
/// Clones share the same data. Nothing is written to disk.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Bring up a store from its configuration.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        if config.offline {
            return Err(StoreError::Unavailable("store is configured offline".to_string()));
        }
        if let Some(project) = &config.project_id {
            if project.trim().is_empty() {
                return Err(StoreError::Rejected("project id is empty".to_string()));
            }
        }
        info!(project = ?config.project_id, "in-memory document store ready");
        Ok(Self::default())
    }

    /// Make every add, update and delete fail until switched back.
    pub fn set_writes_failing(&self, failing: bool) {
        lock(&self.state).writes_failing = failing;
    }

    /// Send an error to every listener on `collection` and close them.
    /// Returns how many listeners were hit.
    pub fn fail_subscriptions(&self, collection: &str, message: &str) -> usize {
        let mut state = lock(&self.state);
        let before = state.listeners.len();
        state.listeners.retain(|_, listener| {
            if listener.collection == collection {
                let _ = listener
                    .sender
                    .send(Err(StoreError::Unavailable(message.to_string())));
                false
            } else {
                true
            }
        });
        before - state.listeners.len()
    }

    /// Number of live listeners on a collection.
    pub fn listener_count(&self, collection: &str) -> usize {
        lock(&self.state)
            .listeners
            .values()
            .filter(|l| l.collection == collection)
            .count()
    }

    pub fn document(&self, path: &str) -> Option<Document> {
        let (collection, id) = split_document(path).ok()?;
        lock(&self.state)
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.state).snapshot(collection).documents
    }
}

fn release_listener(state: Weak<Mutex<State>>, id: u64) -> impl FnOnce() + Send + Sync + 'static {
    move || {
        if let Some(state) = state.upgrade() {
            lock(&state).listeners.remove(&id);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        check_collection(collection)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_listener;
            state.next_listener += 1;
            /* first delivery is whatever is there right now */
            sender
                .send(Ok(state.snapshot(collection)))
                .map_err(|_| StoreError::SubscriptionClosed(collection.to_string()))?;
            state.listeners.insert(
                id,
                Listener {
                    collection: collection.to_string(),
                    sender,
                },
            );
            id
        };

        debug!(collection, listener = id, "listener registered");
        Ok(Subscription::new(
            collection,
            receiver,
            release_listener(Arc::downgrade(&self.state), id),
        ))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<Document, StoreError> {
        check_collection(collection)?;

        let mut state = lock(&self.state);
        state.check_writable()?;

        let id = random_id();
        let document = Document {
            path: format!("{}/{}", collection, id),
            id: id.clone(),
            created_at: state.next_created_at(),
            fields,
        };
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, document.clone());
        state.notify(collection);

        Ok(document)
    }

    async fn update(&self, document: &str, fields: Fields) -> Result<(), StoreError> {
        let (collection, id) = split_document(document)?;

        let mut state = lock(&self.state);
        state.check_writable()?;

        let existing = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(document.to_string()))?;
        existing.fields.extend(fields);
        state.notify(collection);

        Ok(())
    }

    async fn delete(&self, document: &str) -> Result<(), StoreError> {
        let (collection, id) = split_document(document)?;

        let mut state = lock(&self.state);
        state.check_writable()?;

        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            state.notify(collection);
        }

        Ok(())
    }
}
