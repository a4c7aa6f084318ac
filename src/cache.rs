//! Memo of gated field-score lookups.
//!
//! Entries remember the assessment's response count at computation time.
//! Responses are append-only, so a changed count is the only way an entry
//! goes stale; a lookup under a different count evicts the entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::analysis::ScoreOutcome;
use crate::model::{AssessmentMode, RespondentType};

/// Identifies one cached lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScoreCacheKey {
    /// Assessment the scores belong to.
    pub assessment_id: String,
    /// Analyzed unit.
    pub unit_id: String,
    /// Stream filter, `None` for all streams.
    pub respondent_type: Option<RespondentType>,
    /// Disclosure mode of the assessment.
    pub mode: AssessmentMode,
}

impl ScoreCacheKey {
    /// Create a key
    pub fn new(
        assessment_id: impl Into<String>,
        unit_id: impl Into<String>,
        respondent_type: Option<RespondentType>,
        mode: AssessmentMode,
    ) -> Self {
        Self {
            assessment_id: assessment_id.into(),
            unit_id: unit_id.into(),
            respondent_type,
            mode,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response_count: usize,
    outcome: ScoreOutcome,
}

/// Shareable score cache. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct ScoreCache {
    entries: Arc<RwLock<HashMap<ScoreCacheKey, CacheEntry>>>,
}

impl ScoreCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry computed under `response_count`.
    pub async fn get(&self, key: &ScoreCacheKey, response_count: usize) -> Option<ScoreOutcome> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.response_count == response_count => {
                    return Some(entry.outcome.clone())
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check under the write lock; another task may have refreshed it.
        if let Some(entry) = entries.get(key) {
            if entry.response_count == response_count {
                return Some(entry.outcome.clone());
            }
            debug!(
                assessment_id = %key.assessment_id,
                unit_id = %key.unit_id,
                cached_count = entry.response_count,
                response_count,
                "Evicting stale score cache entry"
            );
            entries.remove(key);
        }
        None
    }

    /// Store an outcome computed under `response_count`.
    pub async fn insert(&self, key: ScoreCacheKey, response_count: usize, outcome: ScoreOutcome) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                response_count,
                outcome,
            },
        );
    }

    /// Drop every entry of an assessment.
    pub async fn invalidate_assessment(&self, assessment_id: &str) {
        self.entries
            .write()
            .await
            .retain(|key, _| key.assessment_id != assessment_id);
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
