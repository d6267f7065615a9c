use std::sync::Arc;
use tracing::info;

use crate::{
    common::random_id,
    config::Config,
    error::Error,
    store::{DocumentStore, MemoryStore},
};

/// How the user got their identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    Anonymous,
    CustomToken,
}

/// Where one user's data lives in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    app_id: String,
    user_id: String,
}

impl Paths {
    fn user_root(&self) -> String {
        format!("artifacts/{}/users/{}", self.app_id, self.user_id)
    }

    /// Collection of restaurants.
    pub fn restaurants(&self) -> String {
        format!("{}/restaurants", self.user_root())
    }

    /// One restaurant document.
    pub fn restaurant(&self, restaurant_id: &str) -> String {
        format!("{}/{}", self.restaurants(), restaurant_id)
    }

    /// Collection of one restaurant's ratings.
    pub fn ratings(&self, restaurant_id: &str) -> String {
        format!("{}/ratings", self.restaurant(restaurant_id))
    }
}

fn check_segment(what: &str, value: &str) -> Result<(), Error> {
    if value.is_empty() || value.contains('/') {
        Err(Error::Init(format!("{} {:?} is not usable in a path", what, value)))
    } else {
        Ok(())
    }
}

/// Everything that lives for as long as the user is signed in: who they are
/// and which store they talk to. Passed explicitly to whatever needs it.
pub struct Session {
    store: Arc<dyn DocumentStore>,
    paths: Paths,
    sign_in: SignIn,
}

impl Session {
    pub fn start(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self, Error> {
        check_segment("app id", &config.app_id)?;

        let (user_id, sign_in) = match &config.auth_token {
            Some(token) => {
                check_segment("auth token", token)?;
                (token.clone(), SignIn::CustomToken)
            }
            None => (random_id(), SignIn::Anonymous),
        };

        info!(app = %config.app_id, user = %user_id, ?sign_in, "session started");

        Ok(Self {
            store,
            paths: Paths {
                app_id: config.app_id.clone(),
                user_id,
            },
            sign_in,
        })
    }

    /// Bring up an in-memory store from `config` and start a session on it.
    /// The store handle is returned too, for inspection and fault injection.
    pub fn in_memory(config: &Config) -> Result<(Self, MemoryStore), Error> {
        let store = MemoryStore::connect(&config.store)
            .map_err(|e| Error::Init(format!("document store: {}", e)))?;
        let session = Self::start(config, Arc::new(store.clone()))?;
        Ok((session, store))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn user_id(&self) -> &str {
        &self.paths.user_id
    }

    pub fn app_id(&self) -> &str {
        &self.paths.app_id
    }

    pub fn sign_in(&self) -> &SignIn {
        &self.sign_in
    }

    /// Sign out. Any notebook opened on this session should be closed first.
    pub fn end(self) {
        info!(user = %self.paths.user_id, "session ended");
    }
}
