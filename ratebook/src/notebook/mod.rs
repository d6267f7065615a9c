//! The live notebook: every restaurant the user has saved, each with its
//! ratings, kept up to date as the store changes.

mod watcher;

use futures::StreamExt;
use ratebook_core::RatingSummary;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use self::watcher::RatingsWatcher;
use crate::{
    error::Error,
    schemas::{
        rating::{Rating, RatingDraft},
        restaurant::{Restaurant, RestaurantDraft},
    },
    session::{Paths, Session},
    store::{DocumentStore, Snapshot, StoreError, Subscription},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The restaurant list changed.
    Restaurants(Vec<Restaurant>),

    /// One restaurant's ratings changed. `summary` is freshly worked out from `ratings`.
    Ratings {
        restaurant_id: String,
        ratings: Vec<Rating>,
        summary: RatingSummary,
    },

    /// A list stopped updating. The rest of the notebook carries on.
    SubscriptionFailed { collection: String, message: String },
}

/// The last ratings seen for a restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingsView {
    pub ratings: Vec<Rating>,
    pub summary: RatingSummary,
}

pub struct Notebook {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
    restaurants: Option<Subscription>,
    listed: Vec<Restaurant>,
    watchers: HashMap<String, RatingsWatcher>,
    /// Restaurants whose ratings listener failed. Not watched again while listed.
    stopped: HashSet<String>,
    ratings: HashMap<String, RatingsView>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

enum Step {
    Restaurants(Option<Result<Snapshot, StoreError>>),
    Watcher(Event),
}

async fn next_delivery(
    subscription: &mut Option<Subscription>,
) -> Option<Result<Snapshot, StoreError>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => futures::future::pending().await,
    }
}

impl Notebook {
    pub async fn open(session: &Session) -> Result<Self, Error> {
        let paths = session.paths().clone();
        let collection = paths.restaurants();
        let restaurants = session
            .store()
            .subscribe(&collection)
            .await
            .map_err(|source| Error::Subscription { collection, source })?;

        info!(user = %session.user_id(), "notebook opened");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            store: session.store().clone(),
            paths,
            restaurants: Some(restaurants),
            listed: Vec::new(),
            watchers: HashMap::new(),
            stopped: HashSet::new(),
            ratings: HashMap::new(),
            events_tx,
            events_rx,
        })
    }

    /// Wait for the next change.
    ///
    /// Has to be polled for the notebook to make progress. Returns `None`
    /// once nothing is being watched any more. Cancel safe.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.restaurants.is_none() && self.watchers.is_empty() {
                return None;
            }

            let step = tokio::select! {
                delivery = next_delivery(&mut self.restaurants) => Step::Restaurants(delivery),
                Some(event) = self.events_rx.recv() => Step::Watcher(event),
            };

            match step {
                Step::Restaurants(Some(Ok(snapshot))) => {
                    let listed = Restaurant::from_snapshot(&snapshot);
                    self.sync_watchers(&listed);
                    self.listed = listed.clone();
                    return Some(Event::Restaurants(listed));
                }
                Step::Restaurants(Some(Err(e))) => {
                    let collection = self.paths.restaurants();
                    warn!(%collection, error = %e, "restaurant listener failed");
                    self.restaurants = None;
                    return Some(Event::SubscriptionFailed {
                        collection,
                        message: e.to_string(),
                    });
                }
                Step::Restaurants(None) => {
                    self.restaurants = None;
                }
                Step::Watcher(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
            }
        }
    }

    /// Record a watcher's event, or drop it if that restaurant is no longer watched.
    fn accept(&mut self, event: Event) -> Option<Event> {
        match &event {
            Event::Ratings {
                restaurant_id,
                ratings,
                summary,
            } => {
                if !self.watchers.contains_key(restaurant_id) {
                    return None;
                }
                self.ratings.insert(
                    restaurant_id.clone(),
                    RatingsView {
                        ratings: ratings.clone(),
                        summary: *summary,
                    },
                );
            }
            Event::SubscriptionFailed { collection, .. } => {
                let failed = self
                    .watchers
                    .keys()
                    .find(|id| &self.paths.ratings(id) == collection)
                    .cloned();
                match failed {
                    Some(id) => {
                        self.watchers.remove(&id);
                        self.stopped.insert(id);
                    }
                    None => return None,
                }
            }
            Event::Restaurants(_) => {}
        }
        Some(event)
    }

    /// Start watching new restaurants and stop watching removed ones.
    fn sync_watchers(&mut self, listed: &[Restaurant]) {
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();

        self.watchers.retain(|id, _| ids.contains(&id.as_str()));
        self.stopped.retain(|id| ids.contains(&id.as_str()));
        self.ratings.retain(|id, _| ids.contains(&id.as_str()));

        for restaurant in listed {
            let live = self.watchers.contains_key(&restaurant.id);
            if !live && !self.stopped.contains(&restaurant.id) {
                let watcher = RatingsWatcher::spawn(
                    self.store.clone(),
                    &self.paths,
                    restaurant,
                    self.events_tx.clone(),
                );
                self.watchers.insert(restaurant.id.clone(), watcher);
            }
        }
    }

    /// Restaurants as of the last restaurant event.
    pub fn restaurants(&self) -> &[Restaurant] {
        &self.listed
    }

    pub fn ratings(&self, restaurant_id: &str) -> Option<&RatingsView> {
        self.ratings.get(restaurant_id)
    }

    /// Whether the restaurant's ratings are still live.
    pub fn is_watching(&self, restaurant_id: &str) -> bool {
        self.watchers.contains_key(restaurant_id)
    }

    /// Find a listed restaurant by id or by a unique id prefix.
    pub fn resolve(&self, id_or_prefix: &str) -> Result<&Restaurant, Error> {
        if let Some(exact) = self.listed.iter().find(|r| r.id == id_or_prefix) {
            return Ok(exact);
        }
        let mut matches = self
            .listed
            .iter()
            .filter(|r| !id_or_prefix.is_empty() && r.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(restaurant), None) => Ok(restaurant),
            (Some(_), Some(_)) => Err(Error::Validation(format!(
                "more than one restaurant matches {:?}",
                id_or_prefix
            ))),
            (None, _) => Err(Error::Validation(format!(
                "no restaurant matches {:?}",
                id_or_prefix
            ))),
        }
    }

    pub async fn add_restaurant(&self, draft: &RestaurantDraft) -> Result<String, Error> {
        let document = self
            .store
            .add(&self.paths.restaurants(), draft.to_fields())
            .await
            .map_err(Error::write("add restaurant"))?;
        info!(restaurant = %document.id, name = %draft.name(), "restaurant added");
        Ok(document.id)
    }

    /// Rate a restaurant that is currently listed.
    pub async fn add_rating(&self, restaurant_id: &str, draft: &RatingDraft) -> Result<String, Error> {
        let restaurant = self.resolve(restaurant_id)?;
        let document = self
            .store
            .add(&self.paths.ratings(&restaurant.id), draft.to_fields())
            .await
            .map_err(Error::write("add rating"))?;
        info!(restaurant = %restaurant.id, rating = %document.id, score = %draft.score(), "rating added");
        Ok(document.id)
    }

    /// Delete a restaurant document.
    ///
    /// Its ratings are left behind in the store. Nothing reads them again,
    /// since ratings are only reached through a listed restaurant.
    pub async fn delete_restaurant(&self, restaurant_id: &str) -> Result<(), Error> {
        self.store
            .delete(&self.paths.restaurant(restaurant_id))
            .await
            .map_err(Error::write("delete restaurant"))?;
        info!(restaurant = %restaurant_id, "restaurant deleted");
        Ok(())
    }

    /// Stop every listener.
    pub fn close(self) {
        info!(watchers = self.watchers.len(), "notebook closed");
    }
}

#[cfg(test)]
mod tests {
    use ratebook_core::{RatingSummary, Score};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    use super::{Event, Notebook};
    use crate::{
        common::fields,
        config::Config,
        error::Error,
        schemas::{rating::RatingDraft, restaurant::RestaurantDraft},
        session::Session,
        store::{DocumentStore, MemoryStore},
    };

    async fn open() -> (Session, MemoryStore, Notebook) {
        let (session, store) = Session::in_memory(&Config::default()).unwrap();
        let notebook = Notebook::open(&session).await.unwrap();
        (session, store, notebook)
    }

    async fn wait_for<F>(notebook: &mut Notebook, mut wanted: F) -> Event
    where
        F: FnMut(&Event) -> bool,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                let event = notebook.next_event().await.expect("notebook ended");
                if wanted(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn draft(score: f64, comment: &str) -> RatingDraft {
        RatingDraft::new(Score::new(score).unwrap(), comment).unwrap()
    }

    #[tokio::test]
    async fn test_first_event_is_empty_list() {
        let (_session, _store, mut notebook) = open().await;
        assert_eq!(
            notebook.next_event().await,
            Some(Event::Restaurants(Vec::new()))
        );
    }

    #[tokio::test]
    async fn test_rating_is_written_back() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Noodle Bar").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Restaurants(list) if list.len() == 1)).await;

        notebook.add_rating(&id, &draft(4.0, "good")).await.unwrap();
        let event = wait_for(&mut notebook, |e| {
            matches!(e, Event::Ratings { summary, .. } if summary.count == 1)
        })
        .await;
        match event {
            Event::Ratings { ratings, .. } => assert_eq!(ratings[0].comment, "good"),
            _ => unreachable!(),
        }

        wait_for(&mut notebook, |e| {
            matches!(e, Event::Restaurants(list) if list[0].summary.count == 1)
        })
        .await;
        let stored = store.document(&session.paths().restaurant(&id)).unwrap();
        assert_eq!(stored.get_f64("averageRating"), Some(4.0));
        assert_eq!(stored.get_u64("ratingCount"), Some(1));
        assert_eq!(stored.get_str("name"), Some("Noodle Bar"));

        let view = notebook.ratings(&id).unwrap();
        assert_eq!(view.summary, RatingSummary { count: 1, average: 4.0 });
    }

    #[tokio::test]
    async fn test_unchanged_summary_is_not_written() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Quiet").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        /* an empty rating set matches the zeroed cache, so no write-back and no new restaurant event */
        let extra = timeout(Duration::from_millis(50), notebook.next_event()).await;
        assert!(extra.is_err(), "unexpected event {:?}", extra);

        let stored = store.document(&session.paths().restaurant(&id)).unwrap();
        assert_eq!(stored.get_u64("ratingCount"), Some(0));
    }

    #[tokio::test]
    async fn test_failed_write_back_keeps_list_live() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Flaky").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        /* the rating itself lands, then the store starts refusing writes */
        store
            .add(&session.paths().ratings(&id), draft(5.0, "great").to_fields())
            .await
            .unwrap();
        store.set_writes_failing(true);

        let event = wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;
        assert!(matches!(event, Event::Ratings { summary, .. } if summary.count == 1));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stored = store.document(&session.paths().restaurant(&id)).unwrap();
        assert_eq!(stored.get_u64("ratingCount"), Some(0));
    }

    #[tokio::test]
    async fn test_write_back_recovers_after_failure() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Flaky").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        notebook.add_rating(&id, &draft(5.0, "great")).await.unwrap();
        store.set_writes_failing(true);
        wait_for(&mut notebook, |e| {
            matches!(e, Event::Ratings { summary, .. } if summary.count == 1)
        })
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let path = session.paths().restaurant(&id);
        assert_eq!(store.document(&path).unwrap().get_u64("ratingCount"), Some(0));

        /* the next snapshot works out the same summary, which still has to be written */
        store.set_writes_failing(false);
        store
            .add(
                &session.paths().ratings(&id),
                fields(json!({ "comment": "no score" })),
            )
            .await
            .unwrap();
        wait_for(&mut notebook, |e| {
            matches!(e, Event::Restaurants(list) if list[0].summary.count == 1)
        })
        .await;

        let stored = store.document(&path).unwrap();
        assert_eq!(stored.get_u64("ratingCount"), Some(1));
        assert_eq!(stored.get_f64("averageRating"), Some(5.0));
    }

    #[tokio::test]
    async fn test_write_errors_are_reported() {
        let (_session, store, mut notebook) = open().await;
        notebook.next_event().await;

        store.set_writes_failing(true);
        let draft = RestaurantDraft::new("Later").unwrap();
        let err = notebook.add_restaurant(&draft).await.unwrap_err();
        assert!(matches!(err, Error::Write { action: "add restaurant", .. }));
        assert!(!err.is_fatal());

        /* the same draft goes through once the store recovers */
        store.set_writes_failing(false);
        assert!(notebook.add_restaurant(&draft).await.is_ok());
    }

    #[tokio::test]
    async fn test_rating_unknown_restaurant() {
        let (_session, _store, mut notebook) = open().await;
        notebook.next_event().await;
        assert!(matches!(
            notebook.add_rating("nope", &draft(3.0, "hm")).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_prefix() {
        let (_session, _store, mut notebook) = open().await;
        let a = notebook
            .add_restaurant(&RestaurantDraft::new("A").unwrap())
            .await
            .unwrap();
        let b = notebook
            .add_restaurant(&RestaurantDraft::new("B").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Restaurants(list) if list.len() == 2)).await;

        assert_eq!(notebook.resolve(&a).unwrap().name, "A");
        assert_eq!(notebook.resolve(&b).unwrap().name, "B");
        assert!(notebook.resolve("").is_err());
        assert!(notebook.resolve("not-hex").is_err());

        /* a prefix shared by both ids is ambiguous */
        let shared: String = a
            .chars()
            .zip(b.chars())
            .take_while(|(x, y)| x == y)
            .map(|(x, _)| x)
            .collect();
        if !shared.is_empty() {
            assert!(notebook.resolve(&shared).is_err());
        }
    }

    #[tokio::test]
    async fn test_ratings_listener_failure_is_contained() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Broken").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        let ratings_path = session.paths().ratings(&id);
        assert_eq!(store.fail_subscriptions(&ratings_path, "denied"), 1);
        let event = wait_for(&mut notebook, |e| matches!(e, Event::SubscriptionFailed { .. })).await;
        assert_eq!(
            event,
            Event::SubscriptionFailed {
                collection: ratings_path,
                message: "store unavailable: denied".to_string(),
            }
        );

        /* the restaurant list still updates */
        notebook
            .add_restaurant(&RestaurantDraft::new("Other").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Restaurants(list) if list.len() == 2)).await;
    }

    #[tokio::test]
    async fn test_restaurant_listener_failure_keeps_ratings_live() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Steady").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        let restaurants_path = session.paths().restaurants();
        assert_eq!(store.fail_subscriptions(&restaurants_path, "denied"), 1);
        let event = wait_for(&mut notebook, |e| matches!(e, Event::SubscriptionFailed { .. })).await;
        assert_eq!(
            event,
            Event::SubscriptionFailed {
                collection: restaurants_path,
                message: "store unavailable: denied".to_string(),
            }
        );

        /* ratings for an already listed restaurant keep coming */
        notebook.add_rating(&id, &draft(3.5, "fine")).await.unwrap();
        let event = wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;
        assert!(matches!(
            event,
            Event::Ratings { summary, .. } if summary == (RatingSummary { count: 1, average: 3.5 })
        ));
        assert!(notebook.is_watching(&id));
    }

    #[tokio::test]
    async fn test_ends_once_every_listener_failed() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Lonely").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;

        store.fail_subscriptions(&session.paths().ratings(&id), "denied");
        wait_for(&mut notebook, |e| matches!(e, Event::SubscriptionFailed { .. })).await;
        assert!(!notebook.is_watching(&id));

        store.fail_subscriptions(&session.paths().restaurants(), "denied");
        wait_for(&mut notebook, |e| matches!(e, Event::SubscriptionFailed { .. })).await;

        let end = timeout(Duration::from_secs(2), notebook.next_event()).await;
        assert!(matches!(end, Ok(None)), "notebook did not end: {:?}", end);
    }

    #[tokio::test]
    async fn test_close_releases_listeners() {
        let (session, store, mut notebook) = open().await;
        let id = notebook
            .add_restaurant(&RestaurantDraft::new("Gone").unwrap())
            .await
            .unwrap();
        wait_for(&mut notebook, |e| matches!(e, Event::Ratings { .. })).await;
        assert_eq!(store.listener_count(&session.paths().ratings(&id)), 1);

        notebook.close();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.listener_count(&session.paths().restaurants()), 0);
        assert_eq!(store.listener_count(&session.paths().ratings(&id)), 0);
    }
}
