//! Friction analysis engine.
//!
//! This module provides the analysis pipeline:
//! - `ScoreAggregator`: per-field averages with reverse-item correction (crate-internal)
//! - [`AnonymityGate`]: minimum-response disclosure check
//! - [`MisalignmentAnalyzer`]: employee vs. leader perception gaps
//! - [`SubstitutionDetector`]: rule-table heuristic for misattributed friction
//! - [`KccProjector`]: weighted projection onto Direction/Alignment/Commitment
//! - [`FrictionEngine`]: runs the pipeline for one unit and merges the results
//!
//! Everything here is synchronous and pure over an [`AssessmentDataset`].

mod aggregator;
mod anonymity;
mod engine;
mod kcc;
mod misalignment;
mod substitution;

pub use aggregator::*;
pub use anonymity::*;
pub use engine::*;
pub use kcc::*;
pub use misalignment::*;
pub use substitution::*;

use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{Assessment, QuestionCatalog, Response};
use crate::tree::UnitTree;

/// Tolerance for threshold comparisons on averaged scores.
pub(crate) const EPSILON: f64 = 1e-9;

/// Everything the engine reads for one assessment.
///
/// Construction checks the cross-references between responses, units and
/// questions, so the analyzers can rely on them.
#[derive(Debug, Clone)]
pub struct AssessmentDataset {
    assessment: Assessment,
    tree: UnitTree,
    questions: QuestionCatalog,
    responses: Vec<Response>,
}

impl AssessmentDataset {
    /// Assemble and validate a dataset.
    ///
    /// Every response must belong to `assessment`, sit on a leaf unit of
    /// `tree`, reference an active question and satisfy the assessment mode's
    /// response invariants. Violations are data-integrity errors.
    pub fn new(
        assessment: Assessment,
        tree: UnitTree,
        questions: QuestionCatalog,
        responses: Vec<Response>,
    ) -> AnalysisResult<Self> {
        for response in &responses {
            if response.assessment_id != assessment.id {
                return Err(AnalysisError::integrity(format!(
                    "response '{}' belongs to assessment '{}', expected '{}'",
                    response.id, response.assessment_id, assessment.id
                )));
            }
            if tree.get(&response.unit_id).is_none() {
                return Err(AnalysisError::integrity(format!(
                    "response '{}' references unknown unit '{}'",
                    response.id, response.unit_id
                )));
            }
            if !tree.is_leaf(&response.unit_id) {
                return Err(AnalysisError::integrity(format!(
                    "response '{}' is attached to non-leaf unit '{}'",
                    response.id, response.unit_id
                )));
            }
            questions.resolve(&response.question_id)?;
            response.validate(assessment.mode).map_err(|e| {
                AnalysisError::integrity(format!("response '{}' is invalid: {}", response.id, e))
            })?;
        }

        Ok(Self {
            assessment,
            tree,
            questions,
            responses,
        })
    }

    /// The assessment being analyzed
    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    /// The unit tree
    pub fn tree(&self) -> &UnitTree {
        &self.tree
    }

    /// The question catalog
    pub fn questions(&self) -> &QuestionCatalog {
        &self.questions
    }

    /// All responses of the assessment
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }
}
