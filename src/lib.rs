//! # Friction Engine
//!
//! Turns Likert-scale (1-5) survey responses about four workplace friction
//! fields (safety, meaning, capability, effort) into per-unit signals for a
//! hierarchical organization.
//!
//! ## Features
//!
//! - **Hierarchical rollup**: leaf responses aggregated over any subtree,
//!   with reverse-scored question correction
//! - **Anonymity gate**: results withheld below an assessment's minimum
//!   number of employee responses
//! - **Misalignment**: employee vs. leader perception gaps with severity bands
//! - **Substitution heuristic**: flags friction likely reported under the
//!   wrong field, driven by an editable rule table
//! - **KCC projection**: weighted Direction/Alignment/Commitment scores with
//!   every term exposed
//!
//! ## Architecture
//!
//! ```text
//! CLI → AnalysisService → Storage (SQLite)
//!              ↓
//!        FrictionEngine (pure, synchronous)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use friction_engine::{AnalysisOptions, AnalysisService, Config};
//! use friction_engine::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let service = AnalysisService::new(storage, config.analysis);
//!     let outcome = service
//!         .analyze("assessment-id", "unit-id", AnalysisOptions::default())
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Analysis pipeline: aggregation, gating, misalignment, substitution, KCC.
pub mod analysis;
/// Score cache for gated field-score lookups.
pub mod cache;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Friction fields, questions, assessments and responses.
pub mod model;
/// Storage-backed analysis service.
pub mod service;
/// SQLite storage layer for assessment data.
pub mod storage;
/// Organizational unit tree.
pub mod tree;

pub use analysis::{AnalysisOptions, AnalysisOutcome, AnalysisReport, FrictionEngine, ScoreOutcome};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use service::AnalysisService;
