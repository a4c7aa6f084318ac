//! Integration tests for the SQLite storage layer and the analysis service
//!
//! Tests database operations using in-memory SQLite databases, plus one
//! on-disk database in a temporary directory.

use friction_engine::analysis::{
    KccMapping, ScoreOutcome, SubstitutionRuleRecord, SubstitutionRuleSet,
};
use friction_engine::config::{AnalysisConfig, DatabaseConfig};
use friction_engine::error::{AnalysisError, StorageError};
use friction_engine::model::{
    Assessment, AssessmentMode, AssessmentStatus, FrictionField, OrganizationalUnit, Question,
    RespondentType, Response,
};
use friction_engine::storage::{SqliteStorage, Storage};
use friction_engine::{AnalysisOptions, AnalysisService, AppError};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

/// Acme → {Ops → {A, B}, Sales}, the five catalog questions and one
/// anonymous assessment with the leader-assessment stream enabled.
async fn seed_org(storage: &SqliteStorage) -> Assessment {
    let root = OrganizationalUnit::root("Acme").with_id("root");
    let ops = OrganizationalUnit::child_of(&root, "Ops").with_id("ops");
    let team_a = OrganizationalUnit::child_of(&ops, "A").with_id("team-a");
    let team_b = OrganizationalUnit::child_of(&ops, "B").with_id("team-b");
    let sales = OrganizationalUnit::child_of(&root, "Sales")
        .with_id("sales")
        .with_employee_count(12);
    for unit in [&root, &ops, &team_a, &team_b, &sales] {
        storage.create_unit(unit).await.unwrap();
    }

    let questions = [
        Question::new(FrictionField::Safety, "I can speak up").with_id("q-safety"),
        Question::new(FrictionField::Safety, "Mistakes are held against me")
            .with_id("q-safety-rev")
            .reversed(),
        Question::new(FrictionField::Meaning, "My work matters").with_id("q-meaning"),
        Question::new(FrictionField::Capability, "I have what I need").with_id("q-capability"),
        Question::new(FrictionField::Effort, "Getting things done is hard").with_id("q-effort"),
    ];
    for question in &questions {
        storage.create_question(question).await.unwrap();
    }

    let assessment = Assessment::new("Q3 pulse", "root")
        .with_id("asm-1")
        .with_leader_streams(true, false);
    storage.create_assessment(&assessment).await.unwrap();
    assessment
}

async fn respond(
    storage: &SqliteStorage,
    assessment: &Assessment,
    unit: &str,
    respondent: RespondentType,
    submission: &str,
    answers: &[(&str, u8)],
) {
    for (question, score) in answers {
        let response = Response::new(assessment, unit, *question, *score, respondent)
            .unwrap()
            .with_submission(submission);
        storage.create_response(&response).await.unwrap();
    }
}

/// Five employees under team-a reporting effort friction with low safety,
/// and a leader who thinks effort is fine.
async fn seed_substitution_case(storage: &SqliteStorage, assessment: &Assessment) {
    let employees = [(5, 2), (5, 2), (4, 2), (4, 2), (3, 1)];
    for (i, (effort, safety)) in employees.iter().enumerate() {
        respond(
            storage,
            assessment,
            "team-a",
            RespondentType::Employee,
            &format!("emp-{}", i),
            &[("q-effort", *effort), ("q-safety", *safety), ("q-meaning", 3)],
        )
        .await;
    }
    respond(
        storage,
        assessment,
        "team-a",
        RespondentType::LeaderAssess,
        "lead-1",
        &[("q-effort", 2), ("q-safety", 4), ("q-meaning", 5)],
    )
    .await;
}

// ============================================================================
// Storage round trips
// ============================================================================

#[cfg(test)]
mod storage_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_units_round_trip_in_insertion_order() {
        let storage = create_test_storage().await;
        seed_org(&storage).await;

        let units = storage.list_units().await.unwrap();
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "ops", "team-a", "team-b", "sales"]);

        let sales = units.iter().find(|u| u.id == "sales").unwrap();
        assert_eq!(sales.parent_id.as_deref(), Some("root"));
        assert_eq!(sales.path, "Acme/Sales");
        assert_eq!(sales.depth, 1);
        assert_eq!(sales.employee_count, 12);
    }

    #[tokio::test]
    async fn test_questions_keep_flags() {
        let storage = create_test_storage().await;
        seed_org(&storage).await;
        storage
            .create_question(
                &Question::new(FrictionField::Meaning, "old")
                    .with_id("q-old")
                    .inactive(),
            )
            .await
            .unwrap();

        let questions = storage.list_questions().await.unwrap();
        assert_eq!(questions.len(), 6);
        let reversed = questions.iter().find(|q| q.id == "q-safety-rev").unwrap();
        assert!(reversed.reverse_scored);
        assert_eq!(reversed.field, FrictionField::Safety);
        assert!(!questions.iter().find(|q| q.id == "q-old").unwrap().active);
    }

    #[tokio::test]
    async fn test_assessment_round_trip() {
        let storage = create_test_storage().await;
        let assessment = seed_org(&storage).await;

        let loaded = storage.get_assessment("asm-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, assessment.name);
        assert_eq!(loaded.mode, AssessmentMode::Anonymous);
        assert_eq!(loaded.min_responses, 5);
        assert!(loaded.include_leader_assessment);
        assert!(!loaded.include_leader_self);
        assert_eq!(loaded.status, AssessmentStatus::Scheduled);

        assert!(storage.get_assessment("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_of_missing_assessment() {
        let storage = create_test_storage().await;
        let err = storage
            .update_assessment_status("missing", AssessmentStatus::Sent)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AssessmentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unparsable_timestamp_is_an_invalid_row() {
        let storage = create_test_storage().await;
        let assessment = seed_org(&storage).await;
        respond(
            &storage,
            &assessment,
            "sales",
            RespondentType::Employee,
            "s-1",
            &[("q-safety", 4)],
        )
        .await;

        sqlx::query("UPDATE organizational_units SET created_at = 'yesterday' WHERE id = 'sales'")
            .execute(storage.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE responses SET created_at = '' WHERE assessment_id = 'asm-1'")
            .execute(storage.pool())
            .await
            .unwrap();

        match storage.list_units().await {
            Err(StorageError::InvalidRow { table, message }) => {
                assert_eq!(table, "organizational_units");
                assert!(message.contains("yesterday"));
            }
            other => panic!("expected invalid row, got {:?}", other),
        }
        match storage.get_assessment_responses("asm-1").await {
            Err(StorageError::InvalidRow { table, .. }) => assert_eq!(table, "responses"),
            other => panic!("expected invalid row, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_responses_round_trip_and_count() {
        let storage = create_test_storage().await;
        let assessment = seed_org(&storage).await;
        respond(
            &storage,
            &assessment,
            "sales",
            RespondentType::Employee,
            "s-1",
            &[("q-safety", 4), ("q-effort", 2)],
        )
        .await;

        let responses = storage.get_assessment_responses("asm-1").await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].question_id, "q-safety");
        assert_eq!(responses[0].score, 4);
        assert_eq!(responses[0].respondent_type, RespondentType::Employee);
        assert_eq!(responses[0].submission_id.as_deref(), Some("s-1"));
        assert_eq!(responses[0].respondent_name, None);
        assert_eq!(storage.count_assessment_responses("asm-1").await.unwrap(), 2);
        assert_eq!(storage.count_assessment_responses("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_response_requires_existing_assessment() {
        let storage = create_test_storage().await;
        let orphan = Assessment::new("ghost", "root");
        let response =
            Response::new(&orphan, "sales", "q-safety", 3, RespondentType::Employee).unwrap();
        assert!(storage.create_response(&response).await.is_err());
    }

    #[tokio::test]
    async fn test_config_tables_replace_in_order() {
        let storage = create_test_storage().await;
        assert!(storage.get_kcc_mapping().await.unwrap().is_empty());

        storage
            .replace_kcc_mapping(&KccMapping::default_records())
            .await
            .unwrap();
        assert_eq!(
            storage.get_kcc_mapping().await.unwrap(),
            KccMapping::default_records()
        );

        let rules = vec![
            SubstitutionRuleRecord::new("effort", "safety"),
            SubstitutionRuleRecord::new("capability", "meaning"),
        ];
        storage.replace_substitution_rules(&rules).await.unwrap();
        storage.replace_substitution_rules(&rules[1..]).await.unwrap();
        assert_eq!(storage.get_substitution_rules().await.unwrap(), rules[1..].to_vec());
    }

    #[tokio::test]
    async fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("friction.db"),
            max_connections: 2,
        };

        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            seed_org(&storage).await;
        }

        let reopened = SqliteStorage::new(&config).await.unwrap();
        assert_eq!(reopened.list_units().await.unwrap().len(), 5);
        assert!(reopened.get_assessment("asm-1").await.unwrap().is_some());
    }
}

// ============================================================================
// Service end to end
// ============================================================================

#[cfg(test)]
mod service_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn service() -> (AnalysisService, Assessment) {
        let storage = create_test_storage().await;
        let assessment = seed_org(&storage).await;
        (AnalysisService::new(storage, AnalysisConfig::default()), assessment)
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let (service, assessment) = service().await;
        seed_substitution_case(service.storage(), &assessment).await;

        let outcome = service
            .analyze("asm-1", "ops", AnalysisOptions::default())
            .await
            .unwrap();
        let report = outcome.report().expect("five employees should disclose");

        assert_eq!(report.leaf_count, 2);
        assert_eq!(report.employee_response_count, 5);
        assert_eq!(report.response_count, 18);
        assert_eq!(report.field_scores.len(), 2);

        let findings = report.substitutions.as_ref().unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].reported_field, FrictionField::Effort);
        assert_eq!(findings[0].actual_field, FrictionField::Safety);

        let misalignment = report.misalignment.as_ref().unwrap();
        let meaning = misalignment
            .entries
            .iter()
            .find(|e| e.field == FrictionField::Meaning)
            .unwrap();
        assert!((meaning.gap - 2.0).abs() < 1e-9);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "report");
        assert_eq!(json["unit_id"], "ops");
    }

    #[tokio::test]
    async fn test_analyze_withheld_below_threshold() {
        let (service, assessment) = service().await;
        respond(
            service.storage(),
            &assessment,
            "sales",
            RespondentType::Employee,
            "s-1",
            &[("q-safety", 3)],
        )
        .await;

        let outcome = service
            .analyze("asm-1", "sales", AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.withheld().unwrap().missing, 4);
    }

    #[tokio::test]
    async fn test_unknown_assessment() {
        let (service, _) = service().await;
        let err = service
            .analyze("nope", "root", AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Storage(StorageError::AssessmentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stored_rules_drive_detection() {
        let (service, assessment) = service().await;
        seed_substitution_case(service.storage(), &assessment).await;

        let mut disabled = SubstitutionRuleRecord::new("effort", "safety");
        disabled.enabled = false;
        service
            .storage()
            .replace_substitution_rules(&[disabled])
            .await
            .unwrap();

        let outcome = service
            .analyze("asm-1", "ops", AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.report().unwrap().substitutions.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_invalid_kcc_table_fails_the_call() {
        let (service, assessment) = service().await;
        seed_substitution_case(service.storage(), &assessment).await;

        let mut records = KccMapping::default_records();
        records[3].weight = -1.0;
        service.storage().replace_kcc_mapping(&records).await.unwrap();

        let err = service
            .analyze("asm-1", "ops", AnalysisOptions::default())
            .await
            .unwrap_err();
        match err {
            AppError::Analysis(AnalysisError::Configuration { table, row, .. }) => {
                assert_eq!(table, "kcc_mapping");
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_field_scores_cached_until_new_response() {
        let (service, assessment) = service().await;
        seed_substitution_case(service.storage(), &assessment).await;

        let first = service
            .field_scores("asm-1", "team-a", Some(RespondentType::Employee))
            .await
            .unwrap();
        let ScoreOutcome::Scores(scores) = &first else {
            panic!("expected disclosed scores");
        };
        assert!((scores.average(FrictionField::Effort).unwrap() - 4.2).abs() < 1e-9);
        assert_eq!(service.cache().unwrap().len().await, 1);

        let again = service
            .field_scores("asm-1", "team-a", Some(RespondentType::Employee))
            .await
            .unwrap();
        assert_eq!(again, first);

        respond(
            service.storage(),
            &assessment,
            "team-a",
            RespondentType::Employee,
            "emp-late",
            &[("q-effort", 1)],
        )
        .await;

        let refreshed = service
            .field_scores("asm-1", "team-a", Some(RespondentType::Employee))
            .await
            .unwrap();
        let ScoreOutcome::Scores(scores) = refreshed else {
            panic!("expected disclosed scores");
        };
        // (21 + 1) / 6
        assert!((scores.average(FrictionField::Effort).unwrap() - 22.0 / 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cache_can_be_disabled() {
        let storage = create_test_storage().await;
        seed_org(&storage).await;
        let config = AnalysisConfig {
            cache_enabled: false,
            ..AnalysisConfig::default()
        };
        let service = AnalysisService::new(storage, config);
        assert!(service.cache().is_none());

        let outcome = service.field_scores("asm-1", "sales", None).await.unwrap();
        assert!(matches!(outcome, ScoreOutcome::Withheld(_)));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (service, _) = service().await;

        let sent = service
            .transition_status("asm-1", AssessmentStatus::Sent)
            .await
            .unwrap();
        assert_eq!(sent.status, AssessmentStatus::Sent);

        let err = service
            .transition_status("asm-1", AssessmentStatus::Scheduled)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Analysis(AnalysisError::Validation { .. })));

        let stored = service.storage().get_assessment("asm-1").await.unwrap().unwrap();
        assert_eq!(stored.status, AssessmentStatus::Sent);
    }

    #[tokio::test]
    async fn test_seed_defaults_respects_existing_tables() {
        let (service, _) = service().await;

        let first = service.seed_defaults(false).await.unwrap();
        assert_eq!(first.kcc_rows, 4);
        assert_eq!(first.substitution_rows, 1);

        let custom = vec![SubstitutionRuleRecord::new("capability", "meaning")];
        service
            .storage()
            .replace_substitution_rules(&custom)
            .await
            .unwrap();

        let second = service.seed_defaults(false).await.unwrap();
        assert_eq!(second.kcc_rows, 0);
        assert_eq!(second.substitution_rows, 0);
        assert_eq!(service.storage().get_substitution_rules().await.unwrap(), custom);

        let forced = service.seed_defaults(true).await.unwrap();
        assert_eq!(forced.substitution_rows, 1);
        assert_eq!(
            service.storage().get_substitution_rules().await.unwrap(),
            SubstitutionRuleSet::default_records()
        );
    }

    #[tokio::test]
    async fn test_engine_defaults_when_tables_empty() {
        let (service, _) = service().await;
        let engine = service.load_engine().await;
        assert!(engine.is_ok());
    }
}
