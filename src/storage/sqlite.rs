use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::Storage;
use crate::analysis::{KccMappingRecord, SubstitutionRuleRecord};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::model::{Assessment, AssessmentStatus, OrganizationalUnit, Question, Response};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory instance; a single connection keeps one database.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_unit(&self, unit: &OrganizationalUnit) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizational_units (id, parent_id, name, path, depth, employee_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.parent_id)
        .bind(&unit.name)
        .bind(&unit.path)
        .bind(unit.depth as i64)
        .bind(unit.employee_count as i64)
        .bind(unit.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_units(&self) -> StorageResult<Vec<OrganizationalUnit>> {
        let rows: Vec<UnitRow> = sqlx::query_as(
            r#"
            SELECT id, parent_id, name, path, depth, employee_count, created_at
            FROM organizational_units
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrganizationalUnit::try_from).collect()
    }

    async fn create_question(&self, question: &Question) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, field, reverse_scored, active, text)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&question.id)
        .bind(question.field.to_string())
        .bind(question.reverse_scored)
        .bind(question.active)
        .bind(&question.text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_questions(&self) -> StorageResult<Vec<Question>> {
        let rows: Vec<QuestionRow> = sqlx::query_as(
            r#"
            SELECT id, field, reverse_scored, active, text
            FROM questions
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn create_assessment(&self, assessment: &Assessment) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assessments (id, name, target_unit_id, mode, min_responses,
                include_leader_assessment, include_leader_self, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&assessment.id)
        .bind(&assessment.name)
        .bind(&assessment.target_unit_id)
        .bind(assessment.mode.to_string())
        .bind(assessment.min_responses as i64)
        .bind(assessment.include_leader_assessment)
        .bind(assessment.include_leader_self)
        .bind(assessment.status.to_string())
        .bind(assessment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_assessment(&self, id: &str) -> StorageResult<Option<Assessment>> {
        let row: Option<AssessmentRow> = sqlx::query_as(
            r#"
            SELECT id, name, target_unit_id, mode, min_responses,
                include_leader_assessment, include_leader_self, status, created_at
            FROM assessments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Assessment::try_from).transpose()
    }

    async fn update_assessment_status(
        &self,
        id: &str,
        status: AssessmentStatus,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE assessments SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AssessmentNotFound {
                assessment_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn create_response(&self, response: &Response) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO responses (id, assessment_id, unit_id, question_id, score,
                respondent_type, respondent_name, submission_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&response.id)
        .bind(&response.assessment_id)
        .bind(&response.unit_id)
        .bind(&response.question_id)
        .bind(response.score as i64)
        .bind(response.respondent_type.to_string())
        .bind(&response.respondent_name)
        .bind(&response.submission_id)
        .bind(response.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_assessment_responses(&self, assessment_id: &str) -> StorageResult<Vec<Response>> {
        let rows: Vec<ResponseRow> = sqlx::query_as(
            r#"
            SELECT id, assessment_id, unit_id, question_id, score,
                respondent_type, respondent_name, submission_id, created_at
            FROM responses
            WHERE assessment_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Response::try_from).collect()
    }

    async fn count_assessment_responses(&self, assessment_id: &str) -> StorageResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE assessment_id = ?")
            .bind(assessment_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    async fn get_kcc_mapping(&self) -> StorageResult<Vec<KccMappingRecord>> {
        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT dimension, field, weight FROM kcc_mapping ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(dimension, field, weight)| KccMappingRecord {
                dimension,
                field,
                weight,
            })
            .collect())
    }

    async fn replace_kcc_mapping(&self, records: &[KccMappingRecord]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kcc_mapping")
            .execute(&mut *tx)
            .await?;
        for (position, record) in records.iter().enumerate() {
            sqlx::query(
                "INSERT INTO kcc_mapping (position, dimension, field, weight) VALUES (?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&record.dimension)
            .bind(&record.field)
            .bind(record.weight)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(rows = records.len(), "KCC mapping table replaced");
        Ok(())
    }

    async fn get_substitution_rules(&self) -> StorageResult<Vec<SubstitutionRuleRecord>> {
        let rows: Vec<SubstitutionRuleRow> = sqlx::query_as(
            r#"
            SELECT reported_field, actual_field, high_friction_max, min_leader_gap, enabled
            FROM substitution_rules
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn replace_substitution_rules(
        &self,
        records: &[SubstitutionRuleRecord],
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM substitution_rules")
            .execute(&mut *tx)
            .await?;
        for (position, record) in records.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO substitution_rules
                    (position, reported_field, actual_field, high_friction_max, min_leader_gap, enabled)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position as i64)
            .bind(&record.reported_field)
            .bind(&record.actual_field)
            .bind(record.high_friction_max)
            .bind(record.min_leader_gap)
            .bind(record.enabled)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(rows = records.len(), "Substitution rule table replaced");
        Ok(())
    }
}

// Internal row types for SQLx mapping

fn parse_timestamp(table: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidRow {
            table: table.to_string(),
            message: format!("invalid created_at '{}': {}", raw, e),
        })
}

fn parse_column<T: FromStr<Err = String>>(table: &str, raw: &str) -> StorageResult<T> {
    raw.parse().map_err(|message| StorageError::InvalidRow {
        table: table.to_string(),
        message,
    })
}

fn non_negative(table: &str, column: &str, value: i64) -> StorageResult<u32> {
    u32::try_from(value).map_err(|_| StorageError::InvalidRow {
        table: table.to_string(),
        message: format!("{} out of range: {}", column, value),
    })
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: String,
    parent_id: Option<String>,
    name: String,
    path: String,
    depth: i64,
    employee_count: i64,
    created_at: String,
}

impl TryFrom<UnitRow> for OrganizationalUnit {
    type Error = StorageError;

    fn try_from(row: UnitRow) -> StorageResult<Self> {
        Ok(Self {
            depth: non_negative("organizational_units", "depth", row.depth)?,
            employee_count: non_negative("organizational_units", "employee_count", row.employee_count)?,
            created_at: parse_timestamp("organizational_units", &row.created_at)?,
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            path: row.path,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: String,
    field: String,
    reverse_scored: bool,
    active: bool,
    text: String,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StorageError;

    fn try_from(row: QuestionRow) -> StorageResult<Self> {
        Ok(Self {
            field: parse_column("questions", &row.field)?,
            id: row.id,
            reverse_scored: row.reverse_scored,
            active: row.active,
            text: row.text,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: String,
    name: String,
    target_unit_id: String,
    mode: String,
    min_responses: i64,
    include_leader_assessment: bool,
    include_leader_self: bool,
    status: String,
    created_at: String,
}

impl TryFrom<AssessmentRow> for Assessment {
    type Error = StorageError;

    fn try_from(row: AssessmentRow) -> StorageResult<Self> {
        Ok(Self {
            mode: parse_column("assessments", &row.mode)?,
            status: parse_column("assessments", &row.status)?,
            min_responses: non_negative("assessments", "min_responses", row.min_responses)?,
            created_at: parse_timestamp("assessments", &row.created_at)?,
            id: row.id,
            name: row.name,
            target_unit_id: row.target_unit_id,
            include_leader_assessment: row.include_leader_assessment,
            include_leader_self: row.include_leader_self,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: String,
    assessment_id: String,
    unit_id: String,
    question_id: String,
    score: i64,
    respondent_type: String,
    respondent_name: Option<String>,
    submission_id: Option<String>,
    created_at: String,
}

impl TryFrom<ResponseRow> for Response {
    type Error = StorageError;

    fn try_from(row: ResponseRow) -> StorageResult<Self> {
        // Range is checked by the engine; only representability matters here.
        let score = u8::try_from(row.score).map_err(|_| StorageError::InvalidRow {
            table: "responses".to_string(),
            message: format!("score out of range: {}", row.score),
        })?;

        Ok(Self {
            respondent_type: parse_column("responses", &row.respondent_type)?,
            score,
            created_at: parse_timestamp("responses", &row.created_at)?,
            id: row.id,
            assessment_id: row.assessment_id,
            unit_id: row.unit_id,
            question_id: row.question_id,
            respondent_name: row.respondent_name,
            submission_id: row.submission_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubstitutionRuleRow {
    reported_field: String,
    actual_field: String,
    high_friction_max: f64,
    min_leader_gap: f64,
    enabled: bool,
}

impl From<SubstitutionRuleRow> for SubstitutionRuleRecord {
    fn from(row: SubstitutionRuleRow) -> Self {
        Self {
            reported_field: row.reported_field,
            actual_field: row.actual_field,
            high_friction_max: row.high_friction_max,
            min_leader_gap: row.min_leader_gap,
            enabled: row.enabled,
        }
    }
}
