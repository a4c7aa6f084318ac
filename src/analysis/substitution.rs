//! Substitution detection.
//!
//! Respondents sometimes name a socially safer field than the one actually
//! hurting them ("the system is cumbersome" instead of "I don't feel safe
//! raising it"). Candidate `(reported, actual)` pairs live in a rule table;
//! the detector evaluates each rule independently and explains every hit.
//!
//! All comparisons use friction-adjusted averages, where lower means worse.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FieldScoreSet, EPSILON};
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{FrictionField, SCORE_MAX, SCORE_MIN};

const TABLE: &str = "substitution_rules";

/// Widest possible gap on the 1-5 scale.
const SCALE_SPAN: f64 = (SCORE_MAX - SCORE_MIN) as f64;

/// A substitution rule as stored in the configuration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRuleRecord {
    /// Field respondents name.
    pub reported_field: String,
    /// Field suspected to be the real driver.
    pub actual_field: String,
    /// Adjusted averages at or below this are in the high-friction band.
    pub high_friction_max: f64,
    /// Minimum leader-over-employee disagreement on the reported field.
    pub min_leader_gap: f64,
    /// Disabled rows are kept in the table but not evaluated.
    pub enabled: bool,
}

impl SubstitutionRuleRecord {
    /// Create an enabled record with default thresholds
    pub fn new(reported_field: impl Into<String>, actual_field: impl Into<String>) -> Self {
        Self {
            reported_field: reported_field.into(),
            actual_field: actual_field.into(),
            high_friction_max: SubstitutionRule::DEFAULT_HIGH_FRICTION_MAX,
            min_leader_gap: SubstitutionRule::DEFAULT_MIN_LEADER_GAP,
            enabled: true,
        }
    }
}

/// A validated substitution rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    /// Field respondents name.
    pub reported: FrictionField,
    /// Field suspected to be the real driver.
    pub actual: FrictionField,
    /// Upper bound of the high-friction band (adjusted scale).
    pub high_friction_max: f64,
    /// Minimum leader disagreement on the reported field.
    pub min_leader_gap: f64,
}

impl SubstitutionRule {
    /// Default upper bound of the high-friction band.
    pub const DEFAULT_HIGH_FRICTION_MAX: f64 = 2.0;
    /// Default leader disagreement required.
    pub const DEFAULT_MIN_LEADER_GAP: f64 = 1.5;

    /// Create a rule with default thresholds
    pub fn new(reported: FrictionField, actual: FrictionField) -> Self {
        Self {
            reported,
            actual,
            high_friction_max: Self::DEFAULT_HIGH_FRICTION_MAX,
            min_leader_gap: Self::DEFAULT_MIN_LEADER_GAP,
        }
    }

    fn from_record(row: usize, record: &SubstitutionRuleRecord) -> AnalysisResult<Self> {
        let reported: FrictionField = record
            .reported_field
            .parse()
            .map_err(|e: String| AnalysisError::configuration(TABLE, row, e))?;
        let actual: FrictionField = record
            .actual_field
            .parse()
            .map_err(|e: String| AnalysisError::configuration(TABLE, row, e))?;
        if reported == actual {
            return Err(AnalysisError::configuration(
                TABLE,
                row,
                format!("reported and actual field are both {}", reported),
            ));
        }
        let max = record.high_friction_max;
        if !(max > SCORE_MIN as f64 && max <= SCORE_MAX as f64) {
            return Err(AnalysisError::configuration(
                TABLE,
                row,
                format!("high_friction_max must be within (1, 5], got {}", max),
            ));
        }
        let gap = record.min_leader_gap;
        if !(0.0..=SCALE_SPAN).contains(&gap) {
            return Err(AnalysisError::configuration(
                TABLE,
                row,
                format!("min_leader_gap must be within [0, 4], got {}", gap),
            ));
        }
        Ok(Self {
            reported,
            actual,
            high_friction_max: max,
            min_leader_gap: gap,
        })
    }

    /// Evaluate the rule against employee and leader-assessment scores.
    pub fn evaluate(
        &self,
        employee: &FieldScoreSet,
        leader_assess: &FieldScoreSet,
    ) -> Option<SubstitutionFinding> {
        let emp_reported = employee.average(self.reported)?;
        let emp_actual = employee.average(self.actual)?;
        let leader_reported = leader_assess.average(self.reported)?;

        let adj_reported = self.reported.friction_adjusted(emp_reported);
        let adj_actual = self.actual.friction_adjusted(emp_actual);
        let adj_leader = self.reported.friction_adjusted(leader_reported);
        let leader_gap = adj_leader - adj_reported;

        let in_band = |adjusted: f64| adjusted <= self.high_friction_max + EPSILON;
        if !in_band(adj_reported) || !in_band(adj_actual) {
            return None;
        }
        if leader_gap + EPSILON < self.min_leader_gap {
            return None;
        }

        let band_depth = self.high_friction_max - SCORE_MIN as f64;
        let deltas = [
            (self.high_friction_max - adj_reported) / band_depth,
            (self.high_friction_max - adj_actual) / band_depth,
            leader_gap / SCALE_SPAN,
        ];
        let confidence = (deltas.iter().sum::<f64>() / deltas.len() as f64).clamp(0.0, 1.0);

        Some(SubstitutionFinding {
            reported_field: self.reported,
            actual_field: self.actual,
            confidence,
            reasoning: format!(
                "Employees report high friction in {reported} (avg {emp_reported:.2}) while \
                 leaders rate it {leader_reported:.2}, a {leader_gap:.2}-point disagreement; \
                 {actual} is also in the high-friction band (avg {emp_actual:.2}). \
                 Friction reported as {reported} may be masking a {actual} problem.",
                reported = self.reported,
                actual = self.actual,
            ),
            employee_reported_average: emp_reported,
            employee_actual_average: emp_actual,
            leader_reported_average: leader_reported,
        })
    }
}

/// Ordered, validated rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRuleSet {
    rules: Vec<SubstitutionRule>,
}

impl Default for SubstitutionRuleSet {
    /// EFFORT reported while SAFETY is the driver.
    fn default() -> Self {
        Self {
            rules: vec![SubstitutionRule::new(
                FrictionField::Effort,
                FrictionField::Safety,
            )],
        }
    }
}

impl SubstitutionRuleSet {
    /// Create a set from validated rules
    pub fn new(rules: Vec<SubstitutionRule>) -> Self {
        Self { rules }
    }

    /// Validate table records; disabled rows are skipped.
    pub fn from_records(records: &[SubstitutionRuleRecord]) -> AnalysisResult<Self> {
        let mut rules = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let rule = SubstitutionRule::from_record(row, record)?;
            if record.enabled {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// The default table as storable records.
    pub fn default_records() -> Vec<SubstitutionRuleRecord> {
        Self::default()
            .rules
            .iter()
            .map(|r| SubstitutionRuleRecord {
                reported_field: r.reported.to_string(),
                actual_field: r.actual.to_string(),
                high_friction_max: r.high_friction_max,
                min_leader_gap: r.min_leader_gap,
                enabled: true,
            })
            .collect()
    }

    /// Rules in table order
    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }
}

/// One suspected misattribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionFinding {
    /// Field respondents named.
    pub reported_field: FrictionField,
    /// Field inferred to be the driver.
    pub actual_field: FrictionField,
    /// Normalized strength of the signal (0.0-1.0).
    pub confidence: f64,
    /// Explanation citing the inputs.
    pub reasoning: String,
    /// Employee average of the reported field.
    pub employee_reported_average: f64,
    /// Employee average of the actual field.
    pub employee_actual_average: f64,
    /// Leader-assessment average of the reported field.
    pub leader_reported_average: f64,
}

/// Evaluates every rule of a [`SubstitutionRuleSet`].
#[derive(Debug, Clone, Default)]
pub struct SubstitutionDetector {
    rules: SubstitutionRuleSet,
}

impl SubstitutionDetector {
    /// Create a detector for a rule set
    pub fn new(rules: SubstitutionRuleSet) -> Self {
        Self { rules }
    }

    /// Evaluate all rules.
    ///
    /// Without leader-assessment scores no rule can trigger. Findings are
    /// ordered by confidence, ties by rule order; none suppresses another.
    pub fn detect(
        &self,
        employee: &FieldScoreSet,
        leader_assess: Option<&FieldScoreSet>,
    ) -> Vec<SubstitutionFinding> {
        let Some(leader_assess) = leader_assess else {
            return Vec::new();
        };

        let mut findings: Vec<SubstitutionFinding> = self
            .rules
            .rules()
            .iter()
            .filter_map(|rule| rule.evaluate(employee, leader_assess))
            .collect();
        // stable sort keeps rule order among equal confidences
        findings.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        debug!(
            rules = self.rules.rules().len(),
            findings = findings.len(),
            "Substitution rules evaluated"
        );

        findings
    }
}
