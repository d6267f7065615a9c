//! A personal restaurant rating notebook.
//!
//! Restaurants and their ratings live in a [`store::DocumentStore`]. A
//! [`notebook::Notebook`] listens to them, keeps each restaurant's rating list
//! current and writes the recomputed average back onto the restaurant.
//!
//! ```no_run
//! # async fn demo() -> Result<(), ratebook::Error> {
//! use ratebook::{Config, Notebook, RestaurantDraft, Session};
//!
//! let (session, _store) = Session::in_memory(&Config::default())?;
//! let mut notebook = Notebook::open(&session).await?;
//! notebook.add_restaurant(&RestaurantDraft::new("Golden Dragon")?).await?;
//! while let Some(event) = notebook.next_event().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod notebook;
pub mod schemas;
pub mod session;
pub mod store;

pub use chrono;
pub use ratebook_core::{decompose, recompute, RatingSummary, Score, ScoreError, StarBreakdown};

pub use config::{Config, StoreConfig};
pub use error::Error;
pub use notebook::{Event, Notebook, RatingsView};
pub use schemas::{
    rating::{Rating, RatingDraft},
    restaurant::{Restaurant, RestaurantDraft},
};
pub use session::{Paths, Session, SignIn};
