use anyhow::Context;
use ratebook_core::RatingSummary;
use serde::Serialize;
use serde_json::json;

use super::common::{AVERAGE_RATING, NAME, RATING_COUNT};
use crate::{
    common::{clean_text, fields},
    error::Error,
    store::{Document, Fields, Snapshot},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    /// Cached on the document; may lag behind the ratings themselves.
    pub summary: RatingSummary,
}

impl TryFrom<&Document> for Restaurant {
    type Error = anyhow::Error;
    fn try_from(document: &Document) -> anyhow::Result<Self> {
        let name = document
            .get_str(NAME)
            .filter(|name| !name.is_empty())
            .with_context(|| format!("restaurant {} has no name", document.id))?;
        Ok(Self {
            id: document.id.clone(),
            name: name.to_string(),
            summary: RatingSummary::from_cached(
                document.get_f64(AVERAGE_RATING),
                document.get_u64(RATING_COUNT),
            ),
        })
    }
}

impl Restaurant {
    /// All usable restaurants in a snapshot, sorted by name.
    pub fn from_snapshot(snapshot: &Snapshot) -> Vec<Self> {
        let mut restaurants: Vec<Self> = snapshot
            .documents
            .iter()
            .filter_map(|doc| Self::try_from(doc).ok())
            .collect();
        restaurants.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        restaurants
    }
}

/// Fields written back onto a restaurant after its ratings change.
pub fn summary_fields(summary: &RatingSummary) -> Fields {
    fields(json!({
        AVERAGE_RATING: summary.average,
        RATING_COUNT: summary.count,
    }))
}

/// A restaurant that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantDraft {
    name: String,
}

impl RestaurantDraft {
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = clean_text(name);
        if name.is_empty() {
            return Err(Error::Validation("restaurant name is empty".to_string()));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_fields(&self) -> Fields {
        let mut out = summary_fields(&RatingSummary::EMPTY);
        out.insert(NAME.to_string(), json!(self.name));
        out
    }
}
