//! Misalignment between how employees experience a field and how their
//! leader believes they experience it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FieldScoreSet, EPSILON};
use crate::config::AnalysisConfig;
use crate::model::FrictionField;

/// Severity of a leader/employee gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisalignmentSeverity {
    /// Within tolerance.
    None,
    /// Noticeable disagreement.
    Moderate,
    /// Leader and team see the field very differently.
    Critical,
}

impl std::fmt::Display for MisalignmentSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MisalignmentSeverity::None => write!(f, "none"),
            MisalignmentSeverity::Moderate => write!(f, "moderate"),
            MisalignmentSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Which way the leader's view deviates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapDirection {
    /// Leader scores higher than the team.
    LeaderOverestimates,
    /// Leader scores lower than the team.
    LeaderUnderestimates,
    /// No difference.
    Aligned,
}

impl GapDirection {
    fn of(gap: f64) -> Self {
        if gap > 0.0 {
            GapDirection::LeaderOverestimates
        } else if gap < 0.0 {
            GapDirection::LeaderUnderestimates
        } else {
            GapDirection::Aligned
        }
    }

    /// Sentence shown next to the gap.
    pub fn interpretation(self) -> &'static str {
        match self {
            GapDirection::LeaderOverestimates => {
                "leader overestimates team experience in this field"
            }
            GapDirection::LeaderUnderestimates => {
                "leader underestimates team experience in this field"
            }
            GapDirection::Aligned => "leader and team agree in this field",
        }
    }
}

/// Gap bands on the 1-5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    /// Smallest absolute gap rated moderate.
    pub moderate: f64,
    /// Smallest absolute gap rated critical.
    pub critical: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            moderate: 0.5,
            critical: 1.0,
        }
    }
}

impl SeverityBands {
    /// Classify a signed gap.
    pub fn classify(&self, gap: f64) -> MisalignmentSeverity {
        let magnitude = gap.abs() + EPSILON;
        if magnitude >= self.critical {
            MisalignmentSeverity::Critical
        } else if magnitude >= self.moderate {
            MisalignmentSeverity::Moderate
        } else {
            MisalignmentSeverity::None
        }
    }
}

/// Comparison of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisalignmentEntry {
    /// Compared field.
    pub field: FrictionField,
    /// Employee average.
    pub employee_average: f64,
    /// Leader-assessment average.
    pub leader_assess_average: f64,
    /// `leader_assess_average - employee_average`.
    pub gap: f64,
    /// Band of `|gap|`.
    pub severity: MisalignmentSeverity,
    /// Sign of the gap.
    pub direction: GapDirection,
    /// Human-readable direction.
    pub interpretation: String,
}

/// A field in which the leader is constrained themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedField {
    /// Blocked field.
    pub field: FrictionField,
    /// Leader self-assessment average.
    pub self_average: f64,
}

/// Output of the misalignment analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MisalignmentReport {
    /// One entry per field present in both compared streams.
    pub entries: Vec<MisalignmentEntry>,
    /// Fields where the leader's own score is below the blocker threshold.
    pub blocked_fields: Vec<BlockedField>,
}

impl MisalignmentReport {
    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.blocked_fields.is_empty()
    }

    /// Highest severity across entries
    pub fn worst_severity(&self) -> MisalignmentSeverity {
        self.entries
            .iter()
            .map(|e| e.severity)
            .max()
            .unwrap_or(MisalignmentSeverity::None)
    }
}

/// Compares employee, leader-assessment and leader-self field scores.
#[derive(Debug, Clone)]
pub struct MisalignmentAnalyzer {
    bands: SeverityBands,
    blocker_threshold: f64,
}

impl Default for MisalignmentAnalyzer {
    fn default() -> Self {
        Self::new(SeverityBands::default(), 2.5)
    }
}

impl MisalignmentAnalyzer {
    /// Create an analyzer with explicit thresholds
    pub fn new(bands: SeverityBands, blocker_threshold: f64) -> Self {
        Self {
            bands,
            blocker_threshold,
        }
    }

    /// Create an analyzer from configuration
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            SeverityBands {
                moderate: config.moderate_gap,
                critical: config.critical_gap,
            },
            config.blocker_threshold,
        )
    }

    /// Compare the supplied streams.
    ///
    /// With fewer than two streams the report is empty. Fields missing from
    /// either compared stream are left out.
    pub fn analyze(
        &self,
        employee: Option<&FieldScoreSet>,
        leader_assess: Option<&FieldScoreSet>,
        leader_self: Option<&FieldScoreSet>,
    ) -> MisalignmentReport {
        let present = [employee, leader_assess, leader_self]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if present < 2 {
            return MisalignmentReport::default();
        }

        let mut report = MisalignmentReport::default();

        if let (Some(employee), Some(leader)) = (employee, leader_assess) {
            for field in FrictionField::ALL {
                let (Some(emp), Some(lead)) = (employee.average(field), leader.average(field))
                else {
                    continue;
                };
                let gap = lead - emp;
                let direction = GapDirection::of(gap);
                report.entries.push(MisalignmentEntry {
                    field,
                    employee_average: emp,
                    leader_assess_average: lead,
                    gap,
                    severity: self.bands.classify(gap),
                    direction,
                    interpretation: direction.interpretation().to_string(),
                });
            }
        }

        if let Some(leader_self) = leader_self {
            for field in FrictionField::ALL {
                if let Some(avg) = leader_self.average(field) {
                    if field.friction_adjusted(avg) < self.blocker_threshold {
                        report.blocked_fields.push(BlockedField {
                            field,
                            self_average: avg,
                        });
                    }
                }
            }
        }

        debug!(
            entries = report.entries.len(),
            blocked = report.blocked_fields.len(),
            worst = %report.worst_severity(),
            "Misalignment analyzed"
        );

        report
    }
}
