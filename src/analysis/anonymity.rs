//! Anonymity gate.
//!
//! In anonymous assessments aggregated results are disclosed only when
//! enough employees answered. Leader streams never count toward the
//! threshold. A shortfall is a normal outcome, returned as [`Withheld`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AssessmentDataset;
use crate::model::{Assessment, AssessmentMode, RespondentType};

/// Disclosure refused for lack of employee responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withheld {
    /// Assessment that was queried.
    pub assessment_id: String,
    /// Unit that was queried.
    pub unit_id: String,
    /// Employee responses found under the unit.
    pub response_count: usize,
    /// Threshold configured on the assessment.
    pub min_required: usize,
    /// Responses still needed before disclosure.
    pub missing: usize,
}

/// Result of the gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disclosure {
    /// Results may be shown.
    Permitted {
        /// Employee responses found under the unit.
        response_count: usize,
    },
    /// Results must not be shown.
    Withheld(Withheld),
}

impl Disclosure {
    /// Whether results may be shown
    pub fn is_permitted(&self) -> bool {
        matches!(self, Disclosure::Permitted { .. })
    }
}

/// Stateless gate evaluated before any aggregate leaves the engine.
pub struct AnonymityGate;

impl AnonymityGate {
    /// Decide disclosure for a known employee response count.
    pub fn evaluate(assessment: &Assessment, unit_id: &str, response_count: usize) -> Disclosure {
        if assessment.mode == AssessmentMode::Identified {
            return Disclosure::Permitted { response_count };
        }

        let min_required = assessment.min_responses as usize;
        if response_count >= min_required {
            Disclosure::Permitted { response_count }
        } else {
            Disclosure::Withheld(Withheld {
                assessment_id: assessment.id.clone(),
                unit_id: unit_id.to_string(),
                response_count,
                min_required,
                missing: min_required.saturating_sub(response_count),
            })
        }
    }

    /// Count employee responses over a leaf set and decide disclosure.
    pub fn check(dataset: &AssessmentDataset, unit_id: &str, leaves: &HashSet<&str>) -> Disclosure {
        let response_count = count_employee_responses(dataset, leaves);
        let disclosure = Self::evaluate(dataset.assessment(), unit_id, response_count);
        debug!(
            assessment_id = %dataset.assessment().id,
            unit_id = %unit_id,
            response_count,
            permitted = disclosure.is_permitted(),
            "Anonymity gate evaluated"
        );
        disclosure
    }
}

/// Employee responses under a leaf set. Rows sharing a submission id count
/// once; rows without one count individually.
pub fn count_employee_responses(dataset: &AssessmentDataset, leaves: &HashSet<&str>) -> usize {
    let mut submissions = HashSet::new();
    let mut loose = 0usize;
    for response in dataset.responses() {
        if response.respondent_type != RespondentType::Employee
            || !leaves.contains(response.unit_id.as_str())
        {
            continue;
        }
        match &response.submission_id {
            Some(id) => {
                submissions.insert(id.as_str());
            }
            None => loose += 1,
        }
    }
    submissions.len() + loose
}
