//! Storage-backed analysis service.
//!
//! [`AnalysisService`] loads one assessment's inputs, builds a
//! [`FrictionEngine`] from the stored configuration tables and runs it.
//! The engine itself never touches storage.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{
    AnalysisOptions, AnalysisOutcome, AssessmentDataset, FrictionEngine, KccMapping,
    ScoreOutcome, SubstitutionRuleSet,
};
use crate::cache::{ScoreCache, ScoreCacheKey};
use crate::config::AnalysisConfig;
use crate::error::{AppResult, StorageError};
use crate::model::{Assessment, AssessmentStatus, QuestionCatalog, RespondentType};
use crate::storage::{SqliteStorage, Storage};
use crate::tree::UnitTree;

/// Rows written by [`AnalysisService::seed_defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    /// KCC mapping rows written, 0 if the table was kept.
    pub kcc_rows: usize,
    /// Substitution rule rows written, 0 if the table was kept.
    pub substitution_rows: usize,
}

/// Async façade over storage and the friction engine.
#[derive(Clone)]
pub struct AnalysisService<S: Storage = SqliteStorage> {
    storage: S,
    config: AnalysisConfig,
    cache: Option<ScoreCache>,
}

impl<S: Storage> AnalysisService<S> {
    /// Create a service; the score cache follows `config.cache_enabled`.
    pub fn new(storage: S, config: AnalysisConfig) -> Self {
        let cache = config.cache_enabled.then(ScoreCache::new);
        Self {
            storage,
            config,
            cache,
        }
    }

    /// Get the storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Get the score cache, if enabled
    pub fn cache(&self) -> Option<&ScoreCache> {
        self.cache.as_ref()
    }

    /// Run the full analysis of a unit.
    pub async fn analyze(
        &self,
        assessment_id: &str,
        unit_id: &str,
        options: AnalysisOptions,
    ) -> AppResult<AnalysisOutcome> {
        let start = Instant::now();
        let engine = self.load_engine().await?;
        let dataset = self.load_dataset(assessment_id).await?;

        let outcome = engine.analyze(&dataset, unit_id, &options)?;

        info!(
            assessment_id = %assessment_id,
            unit_id = %unit_id,
            disclosed = outcome.report().is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis request served"
        );
        Ok(outcome)
    }

    /// Gated field scores of a unit, served from the cache when current.
    pub async fn field_scores(
        &self,
        assessment_id: &str,
        unit_id: &str,
        respondent_type: Option<RespondentType>,
    ) -> AppResult<ScoreOutcome> {
        let assessment = self.require_assessment(assessment_id).await?;
        let response_count = self.storage.count_assessment_responses(assessment_id).await?;
        let key = ScoreCacheKey::new(assessment_id, unit_id, respondent_type, assessment.mode);

        if let Some(cache) = &self.cache {
            if let Some(outcome) = cache.get(&key, response_count).await {
                info!(
                    assessment_id = %assessment_id,
                    unit_id = %unit_id,
                    response_count,
                    "Field scores served from cache"
                );
                return Ok(outcome);
            }
        }

        let dataset = self.build_dataset(assessment).await?;
        let outcome = FrictionEngine::default().field_scores(&dataset, unit_id, respondent_type)?;

        // Key on the rows actually read; a concurrent append makes the next lookup miss.
        if let Some(cache) = &self.cache {
            cache
                .insert(key, dataset.responses().len(), outcome.clone())
                .await;
        }

        info!(
            assessment_id = %assessment_id,
            unit_id = %unit_id,
            response_count = dataset.responses().len(),
            "Field scores computed"
        );
        Ok(outcome)
    }

    /// Apply a validated status change and persist it.
    pub async fn transition_status(
        &self,
        assessment_id: &str,
        next: AssessmentStatus,
    ) -> AppResult<Assessment> {
        let mut assessment = self.require_assessment(assessment_id).await?;
        let previous = assessment.status;
        assessment.transition(next)?;
        self.storage
            .update_assessment_status(assessment_id, next)
            .await?;

        if let Some(cache) = &self.cache {
            cache.invalidate_assessment(assessment_id).await;
        }

        info!(
            assessment_id = %assessment_id,
            from = %previous,
            to = %next,
            "Assessment status changed"
        );
        Ok(assessment)
    }

    /// Write the default configuration tables.
    ///
    /// Non-empty tables are left alone unless `force` is set.
    pub async fn seed_defaults(&self, force: bool) -> AppResult<SeedSummary> {
        let mut summary = SeedSummary::default();

        if force || self.storage.get_kcc_mapping().await?.is_empty() {
            let records = KccMapping::default_records();
            self.storage.replace_kcc_mapping(&records).await?;
            summary.kcc_rows = records.len();
        }

        if force || self.storage.get_substitution_rules().await?.is_empty() {
            let records = SubstitutionRuleSet::default_records();
            self.storage.replace_substitution_rules(&records).await?;
            summary.substitution_rows = records.len();
        }

        info!(
            force,
            kcc_rows = summary.kcc_rows,
            substitution_rows = summary.substitution_rows,
            "Default configuration seeded"
        );
        Ok(summary)
    }

    /// Build an engine from the stored tables.
    ///
    /// An empty table falls back to the built-in defaults; a malformed one
    /// is a configuration error naming the offending row.
    pub async fn load_engine(&self) -> AppResult<FrictionEngine> {
        let kcc_records = self.storage.get_kcc_mapping().await?;
        let kcc = if kcc_records.is_empty() {
            warn!("KCC mapping table is empty, using defaults");
            KccMapping::default()
        } else {
            KccMapping::from_records(&kcc_records)?
        };

        let rule_records = self.storage.get_substitution_rules().await?;
        let rules = if rule_records.is_empty() {
            warn!("Substitution rule table is empty, using defaults");
            SubstitutionRuleSet::default()
        } else {
            SubstitutionRuleSet::from_records(&rule_records)?
        };

        Ok(FrictionEngine::new(&self.config, kcc, rules))
    }

    async fn load_dataset(&self, assessment_id: &str) -> AppResult<AssessmentDataset> {
        let assessment = self.require_assessment(assessment_id).await?;
        self.build_dataset(assessment).await
    }

    async fn build_dataset(&self, assessment: Assessment) -> AppResult<AssessmentDataset> {
        let tree = UnitTree::new(self.storage.list_units().await?)?;
        let questions = QuestionCatalog::new(self.storage.list_questions().await?);
        let responses = self
            .storage
            .get_assessment_responses(&assessment.id)
            .await?;

        Ok(AssessmentDataset::new(assessment, tree, questions, responses)?)
    }

    async fn require_assessment(&self, assessment_id: &str) -> AppResult<Assessment> {
        self.storage
            .get_assessment(assessment_id)
            .await?
            .ok_or_else(|| {
                StorageError::AssessmentNotFound {
                    assessment_id: assessment_id.to_string(),
                }
                .into()
            })
    }
}
