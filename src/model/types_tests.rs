//! Unit tests for model types and builder patterns.
//!
//! Tests enum string forms, reverse scoring, status transitions and the
//! mode-dependent response invariants.

use super::*;

// ============================================================================
// Reverse scoring
// ============================================================================

#[test]
fn test_reverse_score_is_involution() {
    for s in SCORE_MIN..=SCORE_MAX {
        let s = s as f64;
        assert_eq!(reverse_score(reverse_score(s)), s);
    }
}

#[test]
fn test_reversed_question_adjusts_score() {
    let q = Question::new(FrictionField::Safety, "I hesitate to raise problems").reversed();
    assert_eq!(q.adjusted_score(1), 5.0);
    assert_eq!(q.adjusted_score(5), 1.0);
    assert_eq!(q.adjusted_score(3), 3.0);

    let plain = Question::new(FrictionField::Safety, "I can raise problems");
    assert_eq!(plain.adjusted_score(1), 1.0);
}

#[test]
fn test_friction_adjusted_only_flips_effort() {
    assert_eq!(FrictionField::Effort.friction_adjusted(4.2), 6.0 - 4.2);
    assert_eq!(FrictionField::Safety.friction_adjusted(1.8), 1.8);
    assert_eq!(FrictionField::Meaning.friction_adjusted(2.1), 2.1);
    assert_eq!(FrictionField::Capability.friction_adjusted(3.0), 3.0);
}

// ============================================================================
// Enum string forms
// ============================================================================

#[test]
fn test_friction_field_display_and_parse() {
    for field in FrictionField::ALL {
        assert_eq!(field.to_string().parse::<FrictionField>().unwrap(), field);
    }
    assert_eq!("SAFETY".parse::<FrictionField>().unwrap(), FrictionField::Safety);
    let err = "trust".parse::<FrictionField>().unwrap_err();
    assert!(err.contains("Unknown friction field"));
}

#[test]
fn test_respondent_type_display() {
    assert_eq!(RespondentType::Employee.to_string(), "employee");
    assert_eq!(RespondentType::LeaderAssess.to_string(), "leader_assess");
    assert_eq!(RespondentType::LeaderSelf.to_string(), "leader_self");
    assert!("manager".parse::<RespondentType>().is_err());
}

#[test]
fn test_respondent_type_serde_matches_display() {
    let json = serde_json::to_string(&RespondentType::LeaderAssess).unwrap();
    assert_eq!(json, "\"leader_assess\"");
}

#[test]
fn test_assessment_mode_from_str() {
    assert_eq!(
        "identified".parse::<AssessmentMode>().unwrap(),
        AssessmentMode::Identified
    );
    assert_eq!(
        "Anonymous".parse::<AssessmentMode>().unwrap(),
        AssessmentMode::Anonymous
    );
}

// ============================================================================
// Assessment tests
// ============================================================================

#[test]
fn test_assessment_new_defaults() {
    let a = Assessment::new("Q3 pulse", "unit-root");
    assert!(!a.id.is_empty());
    assert_eq!(a.mode, AssessmentMode::Anonymous);
    assert_eq!(a.min_responses, DEFAULT_MIN_RESPONSES);
    assert_eq!(a.status, AssessmentStatus::Scheduled);
    assert!(a.collects(RespondentType::Employee));
    assert!(!a.collects(RespondentType::LeaderAssess));
    assert!(!a.collects(RespondentType::LeaderSelf));
}

#[test]
fn test_assessment_leader_streams_are_independent() {
    let a = Assessment::new("x", "u").with_leader_streams(false, true);
    assert!(!a.collects(RespondentType::LeaderAssess));
    assert!(a.collects(RespondentType::LeaderSelf));
}

#[test]
fn test_status_transitions_forward_only() {
    let mut a = Assessment::new("x", "u");
    a.transition(AssessmentStatus::Sent).unwrap();
    assert_eq!(a.status, AssessmentStatus::Sent);
    a.transition(AssessmentStatus::Completed).unwrap();

    let err = a.transition(AssessmentStatus::Sent).unwrap_err();
    assert!(err.to_string().contains("cannot move assessment from completed to sent"));
    assert!(!AssessmentStatus::Sent.can_transition_to(AssessmentStatus::Sent));
}

// ============================================================================
// Response tests
// ============================================================================

#[test]
fn test_response_rejects_out_of_range_scores() {
    let a = Assessment::new("x", "u");
    assert!(Response::new(&a, "leaf", "q1", 0, RespondentType::Employee).is_err());
    assert!(Response::new(&a, "leaf", "q1", 6, RespondentType::Employee).is_err());
    assert!(Response::new(&a, "leaf", "q1", 1, RespondentType::Employee).is_ok());
    assert!(Response::new(&a, "leaf", "q1", 5, RespondentType::Employee).is_ok());
}

#[test]
fn test_respondent_name_requires_identified_mode() {
    let anon = Assessment::new("x", "u");
    let r = Response::new(&anon, "leaf", "q1", 3, RespondentType::Employee).unwrap();
    let err = r.with_respondent_name(anon.mode, "Kim").unwrap_err();
    assert!(matches!(err, AnalysisError::Validation { .. }));

    let ident = Assessment::new("x", "u").with_mode(AssessmentMode::Identified);
    let r = Response::new(&ident, "leaf", "q1", 3, RespondentType::Employee)
        .unwrap()
        .with_respondent_name(ident.mode, "Kim")
        .unwrap();
    assert_eq!(r.respondent_name.as_deref(), Some("Kim"));
}

#[test]
fn test_blank_respondent_name_rejected() {
    let ident = Assessment::new("x", "u").with_mode(AssessmentMode::Identified);
    let r = Response::new(&ident, "leaf", "q1", 3, RespondentType::LeaderSelf).unwrap();
    assert!(r.with_respondent_name(ident.mode, "  ").is_err());
}

// ============================================================================
// Catalog and unit tests
// ============================================================================

#[test]
fn test_catalog_resolve() {
    let catalog = QuestionCatalog::new(vec![
        Question::new(FrictionField::Meaning, "My work matters").with_id("q1"),
        Question::new(FrictionField::Effort, "Old question").with_id("q2").inactive(),
    ]);
    assert_eq!(catalog.len(), 2);
    assert!(catalog.resolve("q1").is_ok());

    let err = catalog.resolve("q2").unwrap_err();
    assert!(err.to_string().contains("inactive question 'q2'"));

    let err = catalog.resolve("q9").unwrap_err();
    assert!(err.to_string().contains("unknown question 'q9'"));
}

#[test]
fn test_child_unit_derives_path_and_depth() {
    let root = OrganizationalUnit::root("Acme");
    let sales = OrganizationalUnit::child_of(&root, "Sales");
    let north = OrganizationalUnit::child_of(&sales, "North");
    assert_eq!(north.path, "Acme/Sales/North");
    assert_eq!(north.depth, 2);
    assert_eq!(north.parent_id.as_deref(), Some(sales.id.as_str()));
}
