use ratebook_core::ScoreError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    /// The store or the session could not be set up. Nothing else works after this.
    #[error("could not start session: {0}")]
    Init(String),

    /// A live list stopped updating.
    #[error("subscription to {collection} failed: {source}")]
    Subscription {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// An add, update or delete was refused. Safe to retry by hand.
    #[error("could not {action}: {source}")]
    Write {
        action: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("invalid input: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn write(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Write { action, source }
    }

    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Init(_))
    }
}

impl From<ScoreError> for Error {
    fn from(e: ScoreError) -> Self {
        Self::Validation(e.to_string())
    }
}
