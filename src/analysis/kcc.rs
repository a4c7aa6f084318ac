//! KCC projection (Kurs/Koordinering/Commitment).
//!
//! Each dimension is a weighted sum of field averages, as configured in the
//! mapping table. Weights are trusted, not normalized, and every term is
//! exposed so the calculation can be audited.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FieldScoreSet;
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::FrictionField;

const TABLE: &str = "kcc_mapping";

/// Higher-order organizational dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KccDimension {
    /// Kurs: shared sense of direction.
    Direction,
    /// Koordinering: alignment of effort.
    Alignment,
    /// Commitment.
    Commitment,
}

impl KccDimension {
    /// All dimensions in reporting order.
    pub const ALL: [KccDimension; 3] = [
        KccDimension::Direction,
        KccDimension::Alignment,
        KccDimension::Commitment,
    ];
}

impl std::fmt::Display for KccDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KccDimension::Direction => write!(f, "direction"),
            KccDimension::Alignment => write!(f, "alignment"),
            KccDimension::Commitment => write!(f, "commitment"),
        }
    }
}

impl std::str::FromStr for KccDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direction" => Ok(KccDimension::Direction),
            "alignment" => Ok(KccDimension::Alignment),
            "commitment" => Ok(KccDimension::Commitment),
            _ => Err(format!("Unknown KCC dimension: {}", s)),
        }
    }
}

/// A mapping row as stored in the configuration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KccMappingRecord {
    /// Target dimension name.
    pub dimension: String,
    /// Source field name.
    pub field: String,
    /// Multiplier applied to the field average.
    pub weight: f64,
}

impl KccMappingRecord {
    /// Create a record
    pub fn new(dimension: impl Into<String>, field: impl Into<String>, weight: f64) -> Self {
        Self {
            dimension: dimension.into(),
            field: field.into(),
            weight,
        }
    }
}

/// A validated mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KccWeight {
    /// Target dimension.
    pub dimension: KccDimension,
    /// Source field.
    pub field: FrictionField,
    /// Multiplier.
    pub weight: f64,
}

/// Ordered, validated mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KccMapping {
    rows: Vec<KccWeight>,
}

impl Default for KccMapping {
    fn default() -> Self {
        use FrictionField::*;
        use KccDimension::*;
        let row = |dimension, field, weight| KccWeight {
            dimension,
            field,
            weight,
        };
        Self {
            rows: vec![
                row(Direction, Meaning, 1.0),
                row(Alignment, Safety, 0.6),
                row(Alignment, Capability, 0.4),
                row(Commitment, Effort, 1.0),
            ],
        }
    }
}

impl KccMapping {
    /// Validate table records.
    ///
    /// Rejects unknown names, negative or non-finite weights, duplicate
    /// `(dimension, field)` pairs and dimensions without any row.
    pub fn from_records(records: &[KccMappingRecord]) -> AnalysisResult<Self> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            let dimension: KccDimension = record
                .dimension
                .parse()
                .map_err(|e: String| AnalysisError::configuration(TABLE, row, e))?;
            let field: FrictionField = record
                .field
                .parse()
                .map_err(|e: String| AnalysisError::configuration(TABLE, row, e))?;
            if !record.weight.is_finite() || record.weight < 0.0 {
                return Err(AnalysisError::configuration(
                    TABLE,
                    row,
                    format!("weight must be a non-negative number, got {}", record.weight),
                ));
            }
            if !seen.insert((dimension, field)) {
                return Err(AnalysisError::configuration(
                    TABLE,
                    row,
                    format!("duplicate mapping {} <- {}", dimension, field),
                ));
            }
            rows.push(KccWeight {
                dimension,
                field,
                weight: record.weight,
            });
        }

        for dimension in KccDimension::ALL {
            if !rows.iter().any(|r| r.dimension == dimension) {
                return Err(AnalysisError::IncompleteTable {
                    table: TABLE.to_string(),
                    message: format!("no mapping rows for dimension {}", dimension),
                });
            }
        }

        Ok(Self { rows })
    }

    /// The default table as storable records.
    pub fn default_records() -> Vec<KccMappingRecord> {
        Self::default()
            .rows
            .iter()
            .map(|r| KccMappingRecord::new(r.dimension.to_string(), r.field.to_string(), r.weight))
            .collect()
    }

    /// Rows in table order
    pub fn rows(&self) -> &[KccWeight] {
        &self.rows
    }

    /// Rows of one dimension, in table order
    pub fn rows_for(&self, dimension: KccDimension) -> impl Iterator<Item = &KccWeight> {
        self.rows.iter().filter(move |r| r.dimension == dimension)
    }
}

/// One weighted term of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KccTerm {
    /// Source field.
    pub field: FrictionField,
    /// Configured weight.
    pub weight: f64,
    /// Field average, `None` without data.
    pub field_average: Option<f64>,
    /// `field_average * weight`, `None` without data.
    pub contribution: Option<f64>,
}

/// Projected value of one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KccScore {
    /// Dimension.
    pub dimension: KccDimension,
    /// Sum of contributions; `None` if any source field lacks data.
    pub value: Option<f64>,
    /// Contributing terms in table order.
    pub terms: Vec<KccTerm>,
}

impl KccScore {
    /// Human-readable calculation, e.g. `1.90×0.60 + 3.20×0.40 = 2.42`.
    pub fn calculation(&self) -> String {
        let terms = self
            .terms
            .iter()
            .map(|t| match t.field_average {
                Some(avg) => format!("{:.2}×{:.2}", avg, t.weight),
                None => format!("{}(n/a)×{:.2}", t.field, t.weight),
            })
            .collect::<Vec<_>>()
            .join(" + ");
        match self.value {
            Some(v) => format!("{} = {:.2}", terms, v),
            None => format!("{} = n/a", terms),
        }
    }
}

/// Applies a [`KccMapping`] to field scores.
#[derive(Debug, Clone, Default)]
pub struct KccProjector {
    mapping: KccMapping,
}

impl KccProjector {
    /// Create a projector for a mapping
    pub fn new(mapping: KccMapping) -> Self {
        Self { mapping }
    }

    /// Project one field-score set onto every dimension.
    pub fn project(&self, scores: &FieldScoreSet) -> Vec<KccScore> {
        let projected: Vec<KccScore> = KccDimension::ALL
            .iter()
            .map(|&dimension| {
                let terms: Vec<KccTerm> = self
                    .mapping
                    .rows_for(dimension)
                    .map(|row| {
                        let field_average = scores.average(row.field);
                        KccTerm {
                            field: row.field,
                            weight: row.weight,
                            field_average,
                            contribution: field_average.map(|avg| avg * row.weight),
                        }
                    })
                    .collect();
                let value = terms
                    .iter()
                    .map(|t| t.contribution)
                    .sum::<Option<f64>>();
                KccScore {
                    dimension,
                    value,
                    terms,
                }
            })
            .collect();

        debug!(
            respondent_type = ?scores.respondent_type,
            complete = projected.iter().filter(|s| s.value.is_some()).count(),
            "KCC projected"
        );

        projected
    }
}
