use anyhow::Context;
use chrono::{DateTime, Utc};
use ratebook_core::{decompose, Score, StarBreakdown};
use serde::Serialize;
use serde_json::json;

use super::common::{COMMENT, NO_COMMENT, RATING};
use crate::{
    common::{clean_text, fields},
    error::Error,
    store::{Document, Fields, Snapshot},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub score: Score,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Document> for Rating {
    type Error = anyhow::Error;
    fn try_from(document: &Document) -> anyhow::Result<Self> {
        let value = document
            .get_f64(RATING)
            .with_context(|| format!("rating {} has no value", document.id))?;
        let score = Score::new(value)
            .with_context(|| format!("rating {} has an unusable value", document.id))?;
        let comment = document
            .get_str(COMMENT)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(NO_COMMENT);
        Ok(Self {
            id: document.id.clone(),
            score,
            comment: comment.to_string(),
            created_at: document.created_at,
        })
    }
}

impl Rating {
    /// All usable ratings in a snapshot, newest first.
    pub fn from_snapshot(snapshot: &Snapshot) -> Vec<Self> {
        let mut ratings: Vec<Self> = snapshot
            .documents
            .iter()
            .filter_map(|doc| Self::try_from(doc).ok())
            .collect();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ratings
    }

    pub fn stars(&self) -> StarBreakdown {
        decompose(self.score.value())
    }
}

/// A rating that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingDraft {
    score: Score,
    comment: String,
}

impl RatingDraft {
    pub fn new(score: Score, comment: &str) -> Result<Self, Error> {
        let comment = clean_text(comment);
        if comment.is_empty() {
            return Err(Error::Validation("comment is empty".to_string()));
        }
        Ok(Self { score, comment })
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn to_fields(&self) -> Fields {
        fields(json!({
            RATING: self.score,
            COMMENT: self.comment,
        }))
    }
}
