//! Domain model for friction assessments.
//!
//! Units, questions, assessments and responses are owned by external
//! collaborators (org editor, survey dispatch) and are read-only to the engine.
//! The types here carry the invariants the engine relies on.

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisResult};

/// Lowest value on the Likert scale.
pub const SCORE_MIN: u8 = 1;
/// Highest value on the Likert scale.
pub const SCORE_MAX: u8 = 5;
/// Default anonymity threshold for anonymous assessments.
pub const DEFAULT_MIN_RESPONSES: u32 = 5;

/// Invert a score on the 1-5 scale (`6 - s`).
#[inline]
pub fn reverse_score(score: f64) -> f64 {
    (SCORE_MIN + SCORE_MAX) as f64 - score
}

// ============================================================================
// Enumerations
// ============================================================================

/// One of the four measured friction fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrictionField {
    /// Psychological safety (Tryghed).
    Safety,
    /// Sense of meaning (Mening).
    Meaning,
    /// Capability and opportunity (Kan/Mulighed).
    Capability,
    /// Hassle and effort (Besvær).
    Effort,
}

impl FrictionField {
    /// All fields in reporting order.
    pub const ALL: [FrictionField; 4] = [
        FrictionField::Safety,
        FrictionField::Meaning,
        FrictionField::Capability,
        FrictionField::Effort,
    ];

    /// Whether a higher average means more friction for this field.
    pub fn higher_is_worse(self) -> bool {
        matches!(self, FrictionField::Effort)
    }

    /// Map an average onto a scale where lower always means more friction.
    pub fn friction_adjusted(self, average: f64) -> f64 {
        if self.higher_is_worse() {
            reverse_score(average)
        } else {
            average
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            FrictionField::Safety => 0,
            FrictionField::Meaning => 1,
            FrictionField::Capability => 2,
            FrictionField::Effort => 3,
        }
    }
}

impl std::fmt::Display for FrictionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrictionField::Safety => write!(f, "safety"),
            FrictionField::Meaning => write!(f, "meaning"),
            FrictionField::Capability => write!(f, "capability"),
            FrictionField::Effort => write!(f, "effort"),
        }
    }
}

impl std::str::FromStr for FrictionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safety" => Ok(FrictionField::Safety),
            "meaning" => Ok(FrictionField::Meaning),
            "capability" => Ok(FrictionField::Capability),
            "effort" => Ok(FrictionField::Effort),
            _ => Err(format!("Unknown friction field: {}", s)),
        }
    }
}

/// Who answered a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondentType {
    /// A team member describing their own experience.
    Employee,
    /// A leader estimating the team's experience.
    LeaderAssess,
    /// A leader describing their own experience.
    LeaderSelf,
}

impl RespondentType {
    /// All respondent types in reporting order.
    pub const ALL: [RespondentType; 3] = [
        RespondentType::Employee,
        RespondentType::LeaderAssess,
        RespondentType::LeaderSelf,
    ];
}

impl std::fmt::Display for RespondentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RespondentType::Employee => write!(f, "employee"),
            RespondentType::LeaderAssess => write!(f, "leader_assess"),
            RespondentType::LeaderSelf => write!(f, "leader_self"),
        }
    }
}

impl std::str::FromStr for RespondentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "employee" => Ok(RespondentType::Employee),
            "leader_assess" => Ok(RespondentType::LeaderAssess),
            "leader_self" => Ok(RespondentType::LeaderSelf),
            _ => Err(format!("Unknown respondent type: {}", s)),
        }
    }
}

/// Disclosure regime of an assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    /// Results gated by the minimum-response threshold.
    #[default]
    Anonymous,
    /// Consent-based, per-person results; never gated.
    Identified,
}

impl std::fmt::Display for AssessmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessmentMode::Anonymous => write!(f, "anonymous"),
            AssessmentMode::Identified => write!(f, "identified"),
        }
    }
}

impl std::str::FromStr for AssessmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anonymous" => Ok(AssessmentMode::Anonymous),
            "identified" => Ok(AssessmentMode::Identified),
            _ => Err(format!("Unknown assessment mode: {}", s)),
        }
    }
}

/// Lifecycle of a measurement round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Created, not yet dispatched.
    #[default]
    Scheduled,
    /// Dispatched to respondents.
    Sent,
    /// Closed for responses.
    Completed,
}

impl AssessmentStatus {
    /// Whether `next` is a legal forward transition from this status.
    pub fn can_transition_to(self, next: AssessmentStatus) -> bool {
        matches!(
            (self, next),
            (AssessmentStatus::Scheduled, AssessmentStatus::Sent)
                | (AssessmentStatus::Scheduled, AssessmentStatus::Completed)
                | (AssessmentStatus::Sent, AssessmentStatus::Completed)
        )
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessmentStatus::Scheduled => write!(f, "scheduled"),
            AssessmentStatus::Sent => write!(f, "sent"),
            AssessmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for AssessmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(AssessmentStatus::Scheduled),
            "sent" => Ok(AssessmentStatus::Sent),
            "completed" => Ok(AssessmentStatus::Completed),
            _ => Err(format!("Unknown assessment status: {}", s)),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A node of the organizational hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    /// Unique unit identifier.
    pub id: String,
    /// Parent unit, `None` for a root.
    pub parent_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Materialized path of ancestor names.
    pub path: String,
    /// Number of ancestors.
    pub depth: u32,
    /// Headcount as registered by the org editor.
    pub employee_count: u32,
    /// When the unit was created.
    pub created_at: DateTime<Utc>,
}

impl OrganizationalUnit {
    /// Create a root unit.
    pub fn root(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            path: name.clone(),
            name,
            depth: 0,
            employee_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Create a child of `parent`, deriving path and depth from it.
    pub fn child_of(parent: &OrganizationalUnit, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: Some(parent.id.clone()),
            path: format!("{}/{}", parent.path, name),
            name,
            depth: parent.depth + 1,
            employee_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the headcount
    pub fn with_employee_count(mut self, count: u32) -> Self {
        self.employee_count = count;
        self
    }

    /// Set the creation time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A catalog question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question identifier.
    pub id: String,
    /// Friction field this question measures.
    pub field: FrictionField,
    /// Whether a raw score must be inverted before aggregation.
    pub reverse_scored: bool,
    /// Whether the question is part of the live catalog.
    pub active: bool,
    /// Question wording.
    pub text: String,
}

impl Question {
    /// Create an active, normally-scored question
    pub fn new(field: FrictionField, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            field,
            reverse_scored: false,
            active: true,
            text: text.into(),
        }
    }

    /// Set the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Mark as reverse-scored
    pub fn reversed(mut self) -> Self {
        self.reverse_scored = true;
        self
    }

    /// Mark as retired from the catalog
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Score as it enters aggregation.
    pub fn adjusted_score(&self, raw: u8) -> f64 {
        let raw = raw as f64;
        if self.reverse_scored {
            reverse_score(raw)
        } else {
            raw
        }
    }
}

/// Read-only lookup of questions by id.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    questions: HashMap<String, Question>,
}

impl QuestionCatalog {
    /// Build a catalog from a question list
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        Self {
            questions: questions.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    /// Look up a question by id
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    /// Resolve a question that a response refers to.
    ///
    /// Unknown and inactive questions are both integrity violations.
    pub fn resolve(&self, id: &str) -> AnalysisResult<&Question> {
        match self.questions.get(id) {
            Some(q) if q.active => Ok(q),
            Some(_) => Err(AnalysisError::integrity(format!(
                "response references inactive question '{}'",
                id
            ))),
            None => Err(AnalysisError::integrity(format!(
                "response references unknown question '{}'",
                id
            ))),
        }
    }

    /// Number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// One measurement round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Unique assessment identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Unit the assessment was sent to.
    pub target_unit_id: String,
    /// Disclosure regime.
    pub mode: AssessmentMode,
    /// Minimum employee responses for disclosure (anonymous mode only).
    pub min_responses: u32,
    /// Whether leaders estimate their team's experience.
    pub include_leader_assessment: bool,
    /// Whether leaders answer about themselves.
    pub include_leader_self: bool,
    /// Lifecycle status.
    pub status: AssessmentStatus,
    /// When the assessment was created.
    pub created_at: DateTime<Utc>,
}

impl Assessment {
    /// Create an anonymous assessment with the default threshold and both
    /// leader streams disabled.
    pub fn new(name: impl Into<String>, target_unit_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            target_unit_id: target_unit_id.into(),
            mode: AssessmentMode::Anonymous,
            min_responses: DEFAULT_MIN_RESPONSES,
            include_leader_assessment: false,
            include_leader_self: false,
            status: AssessmentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    /// Set the identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the disclosure mode
    pub fn with_mode(mut self, mode: AssessmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the anonymity threshold
    pub fn with_min_responses(mut self, min_responses: u32) -> Self {
        self.min_responses = min_responses;
        self
    }

    /// Enable or disable the leader streams
    pub fn with_leader_streams(mut self, assessment: bool, self_assessment: bool) -> Self {
        self.include_leader_assessment = assessment;
        self.include_leader_self = self_assessment;
        self
    }

    /// Whether a respondent stream is collected for this assessment.
    pub fn collects(&self, respondent_type: RespondentType) -> bool {
        match respondent_type {
            RespondentType::Employee => true,
            RespondentType::LeaderAssess => self.include_leader_assessment,
            RespondentType::LeaderSelf => self.include_leader_self,
        }
    }

    /// Apply a status transition.
    pub fn transition(&mut self, next: AssessmentStatus) -> AnalysisResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AnalysisError::validation(
                "status",
                format!("cannot move assessment from {} to {}", self.status, next),
            ));
        }
        self.status = next;
        Ok(())
    }
}

/// A single answered question. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Unique response identifier.
    pub id: String,
    /// Assessment the response belongs to.
    pub assessment_id: String,
    /// Leaf unit of the respondent.
    pub unit_id: String,
    /// Answered question.
    pub question_id: String,
    /// Raw score in 1..=5.
    pub score: u8,
    /// Respondent stream.
    pub respondent_type: RespondentType,
    /// Respondent name, identified mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respondent_name: Option<String>,
    /// Groups the rows of one questionnaire submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    /// When the response was recorded.
    pub created_at: DateTime<Utc>,
}

impl Response {
    /// Create a response for `assessment`, validating the score range.
    pub fn new(
        assessment: &Assessment,
        unit_id: impl Into<String>,
        question_id: impl Into<String>,
        score: u8,
        respondent_type: RespondentType,
    ) -> AnalysisResult<Self> {
        let response = Self {
            id: Uuid::new_v4().to_string(),
            assessment_id: assessment.id.clone(),
            unit_id: unit_id.into(),
            question_id: question_id.into(),
            score,
            respondent_type,
            respondent_name: None,
            submission_id: None,
            created_at: Utc::now(),
        };
        response.validate(assessment.mode)?;
        Ok(response)
    }

    /// Attach a respondent name; only legal in identified mode.
    pub fn with_respondent_name(
        mut self,
        mode: AssessmentMode,
        name: impl Into<String>,
    ) -> AnalysisResult<Self> {
        self.respondent_name = Some(name.into());
        self.validate(mode)?;
        Ok(self)
    }

    /// Attach a submission id
    pub fn with_submission(mut self, submission_id: impl Into<String>) -> Self {
        self.submission_id = Some(submission_id.into());
        self
    }

    /// Check the score range and the mode-dependent name rule.
    pub fn validate(&self, mode: AssessmentMode) -> AnalysisResult<()> {
        if !(SCORE_MIN..=SCORE_MAX).contains(&self.score) {
            return Err(AnalysisError::validation(
                "score",
                format!(
                    "must be between {} and {}, got {}",
                    SCORE_MIN, SCORE_MAX, self.score
                ),
            ));
        }
        match (&self.respondent_name, mode) {
            (Some(_), AssessmentMode::Anonymous) => Err(AnalysisError::validation(
                "respondent_name",
                "not allowed in anonymous assessments",
            )),
            (Some(name), AssessmentMode::Identified) if name.trim().is_empty() => Err(
                AnalysisError::validation("respondent_name", "cannot be empty"),
            ),
            _ => Ok(()),
        }
    }
}
