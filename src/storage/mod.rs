//! Storage layer for assessment data.
//!
//! Units, questions, assessments and responses are written by external
//! collaborators; the engine only reads them. The KCC mapping and
//! substitution rule tables are configuration data edited without
//! redeploying. Write methods exist for collaborators, seeding and tests.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::analysis::{KccMappingRecord, SubstitutionRuleRecord};
use crate::error::StorageResult;
use crate::model::{Assessment, AssessmentStatus, OrganizationalUnit, Question, Response};

/// Storage trait for assessment inputs and configuration tables.
#[async_trait]
pub trait Storage: Send + Sync {
    // ========================================================================
    // Organizational units
    // ========================================================================

    /// Insert a unit.
    async fn create_unit(&self, unit: &OrganizationalUnit) -> StorageResult<()>;
    /// List all units in insertion order.
    async fn list_units(&self) -> StorageResult<Vec<OrganizationalUnit>>;

    // ========================================================================
    // Questions
    // ========================================================================

    /// Insert a question.
    async fn create_question(&self, question: &Question) -> StorageResult<()>;
    /// List the full catalog, including inactive questions.
    async fn list_questions(&self) -> StorageResult<Vec<Question>>;

    // ========================================================================
    // Assessments
    // ========================================================================

    /// Insert an assessment.
    async fn create_assessment(&self, assessment: &Assessment) -> StorageResult<()>;
    /// Get an assessment by ID.
    async fn get_assessment(&self, id: &str) -> StorageResult<Option<Assessment>>;
    /// Persist a status change.
    async fn update_assessment_status(
        &self,
        id: &str,
        status: AssessmentStatus,
    ) -> StorageResult<()>;

    // ========================================================================
    // Responses (append-only)
    // ========================================================================

    /// Append a response.
    async fn create_response(&self, response: &Response) -> StorageResult<()>;
    /// All responses of an assessment in creation order.
    async fn get_assessment_responses(&self, assessment_id: &str) -> StorageResult<Vec<Response>>;
    /// Number of responses of an assessment.
    async fn count_assessment_responses(&self, assessment_id: &str) -> StorageResult<usize>;

    // ========================================================================
    // Configuration tables
    // ========================================================================

    /// KCC mapping rows in table order.
    async fn get_kcc_mapping(&self) -> StorageResult<Vec<KccMappingRecord>>;
    /// Replace the KCC mapping table.
    async fn replace_kcc_mapping(&self, records: &[KccMappingRecord]) -> StorageResult<()>;
    /// Substitution rule rows in table order.
    async fn get_substitution_rules(&self) -> StorageResult<Vec<SubstitutionRuleRecord>>;
    /// Replace the substitution rule table.
    async fn replace_substitution_rules(
        &self,
        records: &[SubstitutionRuleRecord],
    ) -> StorageResult<()>;
}
