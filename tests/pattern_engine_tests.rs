// tests/pattern_engine_tests.rs

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use agentic_lib::config::PatternConfig;
use agentic_lib::models::{FeedbackKind, UserInteraction};
use agentic_lib::patterns::{Pattern, PatternContext, PatternLearningEngine, PatternType, PatternValue};
use agentic_lib::stores::{InMemoryInteractionLog, InMemoryPatternStore, PatternStore};
use agentic_lib::workers::PatternEngineHandle;
use agentic_lib::AgenticError;

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

struct Fixture {
    log: Arc<InMemoryInteractionLog>,
    store: Arc<InMemoryPatternStore>,
    handle: PatternEngineHandle,
}

fn fixture(config: PatternConfig) -> Fixture {
    let log = Arc::new(InMemoryInteractionLog::default());
    let store = Arc::new(InMemoryPatternStore::new());
    let engine = PatternLearningEngine::new(config, store.clone(), log.clone());
    Fixture {
        log,
        store,
        handle: PatternEngineHandle::spawn(engine),
    }
}

impl Fixture {
    async fn observe(&self, interaction: UserInteraction) -> Vec<Uuid> {
        self.log.push(interaction.clone()).await;
        self.handle.record_interaction(interaction).await.unwrap()
    }
}

// Store that is down for both reads and writes
struct OfflineStore;

#[async_trait]
impl PatternStore for OfflineStore {
    async fn load_all(&self) -> Result<Vec<Pattern>> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn upsert(&self, _pattern: &Pattern) -> Result<()> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

#[tokio::test]
async fn test_temporal_habit_is_adopted_and_grows() {
    let fx = fixture(PatternConfig::default());

    for i in 0..10 {
        let touched = fx
            .observe(UserInteraction::new("document_view", morning() + Duration::minutes(i)))
            .await;
        // Five same-bucket interactions are needed before a temporal pattern appears
        if i < 4 {
            assert!(touched.is_empty(), "pattern appeared early at {}", i);
        } else {
            assert_eq!(touched.len(), 1);
        }
    }

    let patterns = fx.handle.patterns().await.unwrap();
    assert_eq!(patterns.len(), 1);
    let habit = &patterns[0];
    assert_eq!(habit.pattern_type, PatternType::TimeOfDay);
    assert_eq!(habit.value, PatternValue::Text("document_view".to_string()));
    assert_eq!(habit.occurrences, 10);
    assert!((habit.confidence - 1.0).abs() < 1e-9);

    let stored = fx.store.get(habit.id).await.unwrap();
    assert_eq!(stored.occurrences, 10);

    let context = PatternContext {
        document_type: Some("SF-1449".to_string()),
        ..Default::default()
    };
    let preferences = fx.handle.learned_preferences(context).await.unwrap();
    assert_eq!(preferences.patterns.len(), 1);
    assert_eq!(preferences.suggestions.len(), 1);
    assert!((preferences.confidence - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_weak_patterns_are_not_preferences() {
    let fx = fixture(PatternConfig::default());
    for i in 0..5 {
        fx.observe(UserInteraction::new("search", morning() + Duration::minutes(i)))
            .await;
    }

    // Adopted at 0.62, below the preference threshold
    assert_eq!(fx.handle.patterns().await.unwrap().len(), 1);
    let preferences = fx
        .handle
        .learned_preferences(PatternContext::default())
        .await
        .unwrap();
    assert!(preferences.patterns.is_empty());
    assert_eq!(preferences.confidence, 0.0);
}

#[tokio::test]
async fn test_repeated_field_value_becomes_smart_default() {
    let fx = fixture(PatternConfig::default());
    for i in 0..3 {
        fx.observe(
            UserInteraction::new("field_input", morning() + Duration::seconds(i * 20))
                .with_meta("formType", "SF-1449")
                .with_meta("fieldName", "vendorName")
                .with_meta("value", "Acme Federal Services"),
        )
        .await;
    }

    let default = fx
        .handle
        .smart_default("SF-1449", "vendorName")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        default.value,
        PatternValue::Text("Acme Federal Services".to_string())
    );
    assert!((default.confidence - 1.0).abs() < 1e-9);

    assert!(fx
        .handle
        .smart_default("SF-1449", "contractNumber")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_repeated_workflow_predicts_next_step() {
    let fx = fixture(PatternConfig::default());
    let steps = ["requirements", "market_research", "solicitation"];
    for i in 0..9 {
        fx.observe(
            UserInteraction::new("workflow_step", morning() + Duration::minutes(i as i64))
                .with_meta("stepName", steps[i % steps.len()]),
        )
        .await;
    }

    let prediction = fx
        .handle
        .predict_next_action("market_research")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prediction.action, "solicitation");
    assert!(prediction.confidence >= 0.5 && prediction.confidence <= 1.0);

    // Last step of the sequence has no successor
    assert!(fx
        .handle
        .predict_next_action("solicitation")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_positive_feedback_never_lowers_confidence() {
    let fx = fixture(PatternConfig::default());
    for i in 0..5 {
        fx.observe(UserInteraction::new("document_view", morning() + Duration::minutes(i)))
            .await;
    }
    let id = fx.handle.patterns().await.unwrap()[0].id;

    let mut previous = fx.handle.pattern_confidence(id).await.unwrap().unwrap();
    for _ in 0..20 {
        assert!(fx.handle.apply_feedback(id, FeedbackKind::Positive).await.unwrap());
        let current = fx.handle.pattern_confidence(id).await.unwrap().unwrap();
        assert!(current >= previous);
        assert!(current <= 1.0);
        previous = current;
    }
    assert!((previous - 1.0).abs() < 1e-9);

    assert!(!fx
        .handle
        .apply_feedback(Uuid::new_v4(), FeedbackKind::Positive)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_session_patterns_adopted_above_threshold() {
    let config = PatternConfig {
        preference_threshold: 0.5,
        ..PatternConfig::default()
    };
    let fx = fixture(config);

    assert_eq!(fx.handle.end_session().await.unwrap(), None);

    fx.handle.start_session("user-1", "acquisition").await.unwrap();
    let at = morning();
    let session_interactions = vec![
        UserInteraction::new("navigation", at).with_meta("destination", "dashboard"),
        UserInteraction::new("navigation", at + Duration::seconds(5)).with_meta("destination", "forms"),
        UserInteraction::new("navigation", at + Duration::seconds(9)).with_meta("destination", "sf1449"),
        UserInteraction::new("error", at + Duration::seconds(30))
            .with_meta("errorType", "missing_uei")
            .with_meta("formType", "SF-1449"),
        UserInteraction::new("correction", at + Duration::seconds(45)).with_meta("correctionType", "lookup_sam"),
        UserInteraction::new("workflow_step", at + Duration::seconds(60)).with_meta("stepName", "requirements"),
        UserInteraction::new("workflow_step", at + Duration::seconds(90)).with_meta("stepName", "market_research"),
    ];
    for interaction in session_interactions {
        fx.observe(interaction).await;
    }

    // navigation path, workflow completion and one error correction
    assert_eq!(fx.handle.end_session().await.unwrap(), Some(3));

    let patterns = fx.handle.patterns().await.unwrap();
    assert!(patterns.iter().any(|p| p.pattern_type == PatternType::NavigationPath));
    assert!(patterns.iter().any(|p| p.pattern_type == PatternType::ErrorCorrection
        && p.value
            == PatternValue::ErrorCorrection {
                error: "missing_uei".to_string(),
                correction: "lookup_sam".to_string(),
            }));
    assert_eq!(fx.store.len().await, patterns.len());
}

#[tokio::test]
async fn test_default_threshold_keeps_session_patterns_out() {
    let fx = fixture(PatternConfig::default());
    fx.handle.start_session("user-1", "acquisition").await.unwrap();
    for (i, destination) in ["a", "b", "c", "d"].iter().enumerate() {
        fx.observe(
            UserInteraction::new("navigation", morning() + Duration::seconds(i as i64))
                .with_meta("destination", *destination),
        )
        .await;
    }
    assert_eq!(fx.handle.end_session().await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_stored_patterns_are_loaded_on_start() {
    let seeded = Pattern::new(
        PatternType::FieldValues,
        PatternValue::Text("Net 30".to_string()),
        PatternContext {
            form_type: Some("SF-1449".to_string()),
            ..Default::default()
        },
        12,
        0.9,
        morning(),
    )
    .with_meta("formType", "SF-1449")
    .with_meta("fieldName", "paymentTerms");

    let store = Arc::new(InMemoryPatternStore::with_patterns(vec![seeded.clone()]));
    let engine = PatternLearningEngine::new(
        PatternConfig::default(),
        store,
        Arc::new(InMemoryInteractionLog::default()),
    );
    let handle = PatternEngineHandle::spawn(engine);

    let patterns = handle.patterns().await.unwrap();
    assert_eq!(patterns, vec![seeded]);
    let default = handle
        .smart_default("SF-1449", "paymentTerms")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(default.value, PatternValue::Text("Net 30".to_string()));
}

#[tokio::test]
async fn test_offline_store_starts_empty_and_surfaces_write_errors() {
    let log = Arc::new(InMemoryInteractionLog::default());
    let engine = PatternLearningEngine::new(PatternConfig::default(), Arc::new(OfflineStore), log.clone());
    let handle = PatternEngineHandle::spawn(engine);

    assert!(handle.patterns().await.unwrap().is_empty());

    let mut last = Ok(Vec::new());
    for i in 0..5 {
        let interaction = UserInteraction::new("document_view", morning() + Duration::minutes(i));
        log.push(interaction.clone()).await;
        last = handle.record_interaction(interaction).await;
    }
    assert!(matches!(last, Err(AgenticError::Store(_))));
}
