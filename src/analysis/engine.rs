//! Analysis entry points.
//!
//! [`FrictionEngine::analyze`] resolves the unit's leaves, passes the
//! anonymity gate, aggregates each enabled respondent stream and runs the
//! requested sub-analyses. Any error aborts the whole call; a report never
//! carries a silently missing section.

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    AnonymityGate, AssessmentDataset, Disclosure, FieldScoreSet, KccMapping, KccProjector,
    KccScore, MisalignmentAnalyzer, MisalignmentReport, ScoreAggregator, SubstitutionDetector,
    SubstitutionFinding, SubstitutionRuleSet, Withheld,
};
use crate::config::AnalysisConfig;
use crate::error::AnalysisResult;
use crate::model::{AssessmentMode, RespondentType};

/// Which sub-analyses to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Run the misalignment analyzer.
    pub misalignment: bool,
    /// Run the substitution detector.
    pub substitution: bool,
    /// Run the KCC projection.
    pub kcc: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            misalignment: true,
            substitution: true,
            kcc: true,
        }
    }
}

impl AnalysisOptions {
    /// Only field scores, no sub-analyses
    pub fn scores_only() -> Self {
        Self {
            misalignment: false,
            substitution: false,
            kcc: false,
        }
    }

    /// Enable or disable misalignment analysis
    pub fn with_misalignment(mut self, enabled: bool) -> Self {
        self.misalignment = enabled;
        self
    }

    /// Enable or disable substitution detection
    pub fn with_substitution(mut self, enabled: bool) -> Self {
        self.substitution = enabled;
        self
    }

    /// Enable or disable KCC projection
    pub fn with_kcc(mut self, enabled: bool) -> Self {
        self.kcc = enabled;
        self
    }
}

/// Disclosed analysis of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Analyzed assessment.
    pub assessment_id: String,
    /// Analyzed unit.
    pub unit_id: String,
    /// Disclosure mode of the assessment.
    pub mode: AssessmentMode,
    /// Leaf units under the analyzed unit.
    pub leaf_count: usize,
    /// Response rows across all streams under the unit.
    pub response_count: usize,
    /// Employee responses counted by the anonymity gate.
    pub employee_response_count: usize,
    /// One set per collected respondent stream, employee first.
    pub field_scores: Vec<FieldScoreSet>,
    /// Leader/employee gaps, `None` when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub misalignment: Option<MisalignmentReport>,
    /// Substitution findings, `None` when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitutions: Option<Vec<SubstitutionFinding>>,
    /// Employee KCC projection, `None` when not requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kcc: Option<Vec<KccScore>>,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Field scores of one respondent stream
    pub fn scores_for(&self, respondent_type: RespondentType) -> Option<&FieldScoreSet> {
        self.field_scores
            .iter()
            .find(|s| s.respondent_type == Some(respondent_type))
    }
}

/// Result of [`FrictionEngine::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Results disclosed.
    Report(AnalysisReport),
    /// Results withheld by the anonymity gate.
    Withheld(Withheld),
}

impl AnalysisOutcome {
    /// The report, if disclosed
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Report(r) => Some(r),
            AnalysisOutcome::Withheld(_) => None,
        }
    }

    /// The shortfall, if withheld
    pub fn withheld(&self) -> Option<&Withheld> {
        match self {
            AnalysisOutcome::Withheld(w) => Some(w),
            AnalysisOutcome::Report(_) => None,
        }
    }
}

/// Result of [`FrictionEngine::field_scores`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// Scores disclosed.
    Scores(FieldScoreSet),
    /// Scores withheld by the anonymity gate.
    Withheld(Withheld),
}

/// Stateless analysis pipeline configured with thresholds and rule tables.
#[derive(Debug, Clone, Default)]
pub struct FrictionEngine {
    misalignment: MisalignmentAnalyzer,
    substitution: SubstitutionDetector,
    kcc: KccProjector,
}

impl FrictionEngine {
    /// Create an engine from configuration and validated tables
    pub fn new(config: &AnalysisConfig, kcc: KccMapping, rules: SubstitutionRuleSet) -> Self {
        Self {
            misalignment: MisalignmentAnalyzer::from_config(config),
            substitution: SubstitutionDetector::new(rules),
            kcc: KccProjector::new(kcc),
        }
    }

    /// Analyze a unit of the dataset's assessment.
    pub fn analyze(
        &self,
        dataset: &AssessmentDataset,
        unit_id: &str,
        options: &AnalysisOptions,
    ) -> AnalysisResult<AnalysisOutcome> {
        let start = Instant::now();
        let assessment = dataset.assessment();

        let leaf_ids = dataset.tree().leaf_ids(unit_id)?;
        let leaves: HashSet<&str> = leaf_ids.iter().map(String::as_str).collect();

        let employee_response_count = match AnonymityGate::check(dataset, unit_id, &leaves) {
            Disclosure::Permitted { response_count } => response_count,
            Disclosure::Withheld(withheld) => {
                warn!(
                    assessment_id = %assessment.id,
                    unit_id = %unit_id,
                    response_count = withheld.response_count,
                    missing = withheld.missing,
                    "Analysis withheld below anonymity threshold"
                );
                return Ok(AnalysisOutcome::Withheld(withheld));
            }
        };

        let aggregator = ScoreAggregator::new(dataset);
        let mut field_scores = Vec::new();
        for respondent_type in RespondentType::ALL {
            if assessment.collects(respondent_type) {
                field_scores.push(aggregator.aggregate_leaves(&leaves, Some(respondent_type))?);
            }
        }

        // Employee scores are always collected and come first.
        let employee = &field_scores[0];
        // A leader stream only takes part in comparisons when it has data.
        let leader_stream = |rt: RespondentType| {
            field_scores
                .iter()
                .find(|s| s.respondent_type == Some(rt))
                .filter(|s| s.has_data())
        };
        let leader_assess = leader_stream(RespondentType::LeaderAssess);
        let leader_self = leader_stream(RespondentType::LeaderSelf);

        let misalignment = options
            .misalignment
            .then(|| self.misalignment.analyze(Some(employee), leader_assess, leader_self));
        let substitutions = options
            .substitution
            .then(|| self.substitution.detect(employee, leader_assess));
        let kcc = options.kcc.then(|| self.kcc.project(employee));

        let response_count = dataset
            .responses()
            .iter()
            .filter(|r| leaves.contains(r.unit_id.as_str()))
            .count();

        info!(
            assessment_id = %assessment.id,
            unit_id = %unit_id,
            leaf_count = leaves.len(),
            response_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis completed"
        );

        Ok(AnalysisOutcome::Report(AnalysisReport {
            assessment_id: assessment.id.clone(),
            unit_id: unit_id.to_string(),
            mode: assessment.mode,
            leaf_count: leaves.len(),
            response_count,
            employee_response_count,
            field_scores,
            misalignment,
            substitutions,
            kcc,
            generated_at: Utc::now(),
        }))
    }

    /// Gated field scores for a unit, optionally for one stream.
    pub fn field_scores(
        &self,
        dataset: &AssessmentDataset,
        unit_id: &str,
        respondent_type: Option<RespondentType>,
    ) -> AnalysisResult<ScoreOutcome> {
        let leaf_ids = dataset.tree().leaf_ids(unit_id)?;
        let leaves: HashSet<&str> = leaf_ids.iter().map(String::as_str).collect();

        if let Disclosure::Withheld(withheld) = AnonymityGate::check(dataset, unit_id, &leaves) {
            return Ok(ScoreOutcome::Withheld(withheld));
        }

        Ok(ScoreOutcome::Scores(
            ScoreAggregator::new(dataset).aggregate_leaves(&leaves, respondent_type)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::dataset;
    use crate::model::{Assessment, FrictionField, RespondentType::*};

    #[test]
    fn test_withheld_outcome_serializes_with_status() {
        let ds = dataset(Assessment::new("x", "root"), &[("a", "q-safety", 3, Employee)]);
        let outcome = FrictionEngine::default()
            .analyze(&ds, "root", &AnalysisOptions::default())
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "withheld");
        assert_eq!(json["missing"], 4);
    }

    #[test]
    fn test_options_skip_sections() {
        let rows: Vec<_> = (0..5).map(|_| ("a", "q-safety", 3, Employee)).collect();
        let ds = dataset(Assessment::new("x", "root"), &rows);
        let outcome = FrictionEngine::default()
            .analyze(&ds, "root", &AnalysisOptions::default().with_kcc(false))
            .unwrap();
        let report = outcome.report().unwrap();
        assert!(report.kcc.is_none());
        assert!(report.misalignment.is_some());
        assert_eq!(report.substitutions.as_deref(), Some(&[][..]));
        assert_eq!(report.field_scores.len(), 1);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "report");
        assert!(json.get("kcc").is_none());
    }

    #[test]
    fn test_empty_leader_stream_is_not_compared() {
        let rows: Vec<_> = (0..5).map(|_| ("a", "q-meaning", 2, Employee)).collect();
        let ds = dataset(
            Assessment::new("x", "root").with_leader_streams(true, true),
            &rows,
        );
        let outcome = FrictionEngine::default()
            .analyze(&ds, "a", &AnalysisOptions::default())
            .unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.field_scores.len(), 3);
        assert!(report.misalignment.as_ref().unwrap().is_empty());
        assert_eq!(
            report.scores_for(Employee).unwrap().average(FrictionField::Meaning),
            Some(2.0)
        );
    }

    #[test]
    fn test_field_scores_are_gated() {
        let ds = dataset(Assessment::new("x", "root"), &[("a", "q-safety", 3, Employee)]);
        let outcome = FrictionEngine::default().field_scores(&ds, "a", None).unwrap();
        assert!(matches!(outcome, ScoreOutcome::Withheld(_)));
    }
}
