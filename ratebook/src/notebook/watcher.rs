use futures::StreamExt;
use ratebook_core::{recompute, RatingSummary};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::Event;
use crate::{
    schemas::{
        rating::Rating,
        restaurant::{summary_fields, Restaurant},
    },
    session::Paths,
    store::DocumentStore,
};

/// Keeps one restaurant's ratings live and its cached summary current.
///
/// Dropping the watcher stops it: no more events, no more write-backs.
pub(crate) struct RatingsWatcher {
    task: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for RatingsWatcher {
    fn drop(&mut self) {
        self.task.abort();
        self.writer.abort();
    }
}

impl RatingsWatcher {
    pub(crate) fn spawn(
        store: Arc<dyn DocumentStore>,
        paths: &Paths,
        restaurant: &Restaurant,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let (pending_tx, pending_rx) = watch::channel(restaurant.summary);
        let (stored_tx, stored_rx) = watch::channel(restaurant.summary);
        let writer = tokio::spawn(write_back(
            store.clone(),
            paths.restaurant(&restaurant.id),
            pending_rx,
            stored_tx,
        ));
        let task = tokio::spawn(listen(
            store,
            restaurant.id.clone(),
            paths.ratings(&restaurant.id),
            pending_tx,
            stored_rx,
            events,
        ));
        Self { task, writer }
    }
}

async fn listen(
    store: Arc<dyn DocumentStore>,
    restaurant_id: String,
    ratings_path: String,
    pending: watch::Sender<RatingSummary>,
    stored: watch::Receiver<RatingSummary>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut subscription = match store.subscribe(&ratings_path).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(collection = %ratings_path, error = %e, "could not listen to ratings");
            let _ = events.send(Event::SubscriptionFailed {
                collection: ratings_path,
                message: e.to_string(),
            });
            return;
        }
    };

    while let Some(delivery) = subscription.next().await {
        let snapshot = match delivery {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(collection = %ratings_path, error = %e, "ratings listener failed");
                let _ = events.send(Event::SubscriptionFailed {
                    collection: ratings_path,
                    message: e.to_string(),
                });
                return;
            }
        };

        let ratings = Rating::from_snapshot(&snapshot);
        let summary = recompute(ratings.iter().map(|r| r.score));

        /* the summary the store has confirmed: the cached one at first, then each successful write */
        let known = *stored.borrow();
        if summary == known {
            debug!(restaurant = %restaurant_id, ?summary, "summary unchanged, not writing");
        } else {
            let _ = pending.send(summary);
        }

        let event = Event::Ratings {
            restaurant_id: restaurant_id.clone(),
            ratings,
            summary,
        };
        if events.send(event).is_err() {
            /* notebook is gone */
            return;
        }
    }
}

/// Writes summaries onto the restaurant document, one at a time, newest last.
/// Summaries that pile up during a slow write collapse into the latest one.
/// Only successful writes are published to `stored`; failures are logged and
/// the next snapshot tries again.
async fn write_back(
    store: Arc<dyn DocumentStore>,
    restaurant_path: String,
    mut pending: watch::Receiver<RatingSummary>,
    stored: watch::Sender<RatingSummary>,
) {
    while pending.changed().await.is_ok() {
        let summary = *pending.borrow();
        match store.update(&restaurant_path, summary_fields(&summary)).await {
            Ok(()) => {
                debug!(restaurant = %restaurant_path, ?summary, "summary written back");
                let _ = stored.send(summary);
            }
            Err(e) => warn!(
                restaurant = %restaurant_path,
                error = %e,
                "could not write back rating summary"
            ),
        }
    }
}
