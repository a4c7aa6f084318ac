//! Per-field score aggregation.
//!
//! Aggregation over an internal unit is always computed from the flattened
//! responses of its leaves, never from child averages.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AssessmentDataset;
use crate::error::AnalysisResult;
use crate::model::{FrictionField, RespondentType};

/// Average and count for one field and respondent stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    /// Friction field.
    pub field: FrictionField,
    /// Respondent stream, `None` when all streams were pooled.
    pub respondent_type: Option<RespondentType>,
    /// Mean adjusted score, `None` when there are no responses.
    pub average: Option<f64>,
    /// Number of responses behind the average.
    pub count: usize,
}

/// Field scores for all four fields, in [`FrictionField::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScoreSet {
    /// Respondent stream, `None` when all streams were pooled.
    pub respondent_type: Option<RespondentType>,
    /// One entry per field.
    pub scores: Vec<FieldScore>,
}

impl FieldScoreSet {
    /// A set with no data for any field.
    pub fn empty(respondent_type: Option<RespondentType>) -> Self {
        Self {
            respondent_type,
            scores: FrictionField::ALL
                .iter()
                .map(|&field| FieldScore {
                    field,
                    respondent_type,
                    average: None,
                    count: 0,
                })
                .collect(),
        }
    }

    /// Build a set from known averages; fields not listed have no data.
    ///
    /// Handy for callers that already hold aggregated numbers.
    pub fn from_averages(
        respondent_type: Option<RespondentType>,
        averages: &[(FrictionField, f64)],
    ) -> Self {
        let mut set = Self::empty(respondent_type);
        for &(field, average) in averages {
            let score = &mut set.scores[field.index()];
            score.average = Some(average);
            score.count = 1;
        }
        set
    }

    /// Score for a field
    pub fn get(&self, field: FrictionField) -> &FieldScore {
        &self.scores[field.index()]
    }

    /// Average for a field, `None` without data
    pub fn average(&self, field: FrictionField) -> Option<f64> {
        self.get(field).average
    }

    /// Total responses across fields
    pub fn response_count(&self) -> usize {
        self.scores.iter().map(|s| s.count).sum()
    }

    /// Whether any field has data
    pub fn has_data(&self) -> bool {
        self.response_count() > 0
    }
}

/// Aggregates responses of one dataset.
///
/// Ungated: callers outside the crate get scores through
/// [`FrictionEngine`](super::FrictionEngine), which runs the anonymity gate first.
pub(crate) struct ScoreAggregator<'a> {
    dataset: &'a AssessmentDataset,
}

impl<'a> ScoreAggregator<'a> {
    /// Create an aggregator over a dataset
    pub(crate) fn new(dataset: &'a AssessmentDataset) -> Self {
        Self { dataset }
    }

    /// Aggregate a unit (leaf or internal), optionally for one stream.
    pub(crate) fn aggregate(
        &self,
        unit_id: &str,
        respondent_type: Option<RespondentType>,
    ) -> AnalysisResult<FieldScoreSet> {
        let leaf_ids = self.dataset.tree().leaf_ids(unit_id)?;
        let leaves: HashSet<&str> = leaf_ids.iter().map(String::as_str).collect();
        self.aggregate_leaves(&leaves, respondent_type)
    }

    /// Aggregate an already-resolved leaf set.
    pub(crate) fn aggregate_leaves(
        &self,
        leaves: &HashSet<&str>,
        respondent_type: Option<RespondentType>,
    ) -> AnalysisResult<FieldScoreSet> {
        let assessment_id = &self.dataset.assessment().id;
        let mut sums = [0.0f64; 4];
        let mut counts = [0usize; 4];

        for response in self.dataset.responses() {
            if &response.assessment_id != assessment_id
                || !leaves.contains(response.unit_id.as_str())
                || respondent_type.is_some_and(|rt| rt != response.respondent_type)
            {
                continue;
            }
            let question = self.dataset.questions().resolve(&response.question_id)?;
            let i = question.field.index();
            sums[i] += question.adjusted_score(response.score);
            counts[i] += 1;
        }

        let scores = FrictionField::ALL
            .iter()
            .map(|&field| {
                let i = field.index();
                FieldScore {
                    field,
                    respondent_type,
                    average: (counts[i] > 0).then(|| sums[i] / counts[i] as f64),
                    count: counts[i],
                }
            })
            .collect();

        debug!(
            assessment_id = %assessment_id,
            leaf_count = leaves.len(),
            respondent_type = ?respondent_type,
            response_count = counts.iter().sum::<usize>(),
            "Aggregated field scores"
        );

        Ok(FieldScoreSet {
            respondent_type,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::dataset;
    use crate::model::Assessment;
    use RespondentType::*;

    #[test]
    fn test_empty_fields_report_none() {
        let ds = dataset(
            Assessment::new("x", "root"),
            &[("a", "q-safety", 4, Employee)],
        );
        let set = ScoreAggregator::new(&ds).aggregate("a", Some(Employee)).unwrap();
        assert_eq!(set.average(FrictionField::Safety), Some(4.0));
        let meaning = set.get(FrictionField::Meaning);
        assert_eq!(meaning.average, None);
        assert_eq!(meaning.count, 0);
    }

    #[test]
    fn test_reverse_scored_question_is_inverted() {
        let ds = dataset(
            Assessment::new("x", "root"),
            &[("a", "q-safety-rev", 1, Employee)],
        );
        let set = ScoreAggregator::new(&ds).aggregate("a", None).unwrap();
        assert_eq!(set.average(FrictionField::Safety), Some(5.0));
    }

    #[test]
    fn test_mixed_reverse_and_plain_items() {
        let ds = dataset(
            Assessment::new("x", "root"),
            &[
                ("a", "q-safety", 2, Employee),
                ("a", "q-safety-rev", 2, Employee), // adjusted 4
            ],
        );
        let set = ScoreAggregator::new(&ds).aggregate("a", None).unwrap();
        assert_eq!(set.average(FrictionField::Safety), Some(3.0));
        assert_eq!(set.get(FrictionField::Safety).count, 2);
    }

    #[test]
    fn test_respondent_filter() {
        let ds = dataset(
            Assessment::new("x", "root").with_leader_streams(true, false),
            &[
                ("a", "q-meaning", 2, Employee),
                ("a", "q-meaning", 4, LeaderAssess),
            ],
        );
        let agg = ScoreAggregator::new(&ds);
        assert_eq!(
            agg.aggregate("a", Some(Employee)).unwrap().average(FrictionField::Meaning),
            Some(2.0)
        );
        assert_eq!(
            agg.aggregate("a", Some(LeaderAssess)).unwrap().average(FrictionField::Meaning),
            Some(4.0)
        );
        assert_eq!(
            agg.aggregate("a", None).unwrap().average(FrictionField::Meaning),
            Some(3.0)
        );
    }

    #[test]
    fn test_internal_unit_pools_leaf_responses() {
        let ds = dataset(
            Assessment::new("x", "root"),
            &[
                ("a", "q-effort", 1, Employee),
                ("b", "q-effort", 4, Employee),
                ("b", "q-effort", 4, Employee),
            ],
        );
        let set = ScoreAggregator::new(&ds).aggregate("root", None).unwrap();
        assert_eq!(set.average(FrictionField::Effort), Some(3.0));
        assert_eq!(set.response_count(), 3);
    }

    #[test]
    fn test_from_averages() {
        let set = FieldScoreSet::from_averages(Some(Employee), &[(FrictionField::Safety, 1.9)]);
        assert_eq!(set.average(FrictionField::Safety), Some(1.9));
        assert_eq!(set.average(FrictionField::Effort), None);
        assert!(set.has_data());
        assert!(!FieldScoreSet::empty(None).has_data());
    }
}
