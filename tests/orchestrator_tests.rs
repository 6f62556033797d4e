// tests/orchestrator_tests.rs

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use agentic_lib::config::{BanditConfig, EngineConfig, OrchestratorConfig};
use agentic_lib::models::{
    ActionType, AgenticOutcome, DecisionFeedback, DecisionFeedbackType, DecisionRequest,
    DecisionTier, FeedbackKind, RiskLevel, UserFeedback,
};
use agentic_lib::patterns::{LearnedPreferences, PatternContext};
use agentic_lib::reinforcement::orchestrator::{assess_risk, decision_tier};
use agentic_lib::stores::{InMemoryInteractionLog, InMemoryPatternStore, PreferenceStore};
use agentic_lib::DecisionOrchestrator;
use uuid::Uuid;

fn seeded_config() -> EngineConfig {
    EngineConfig {
        bandit: BanditConfig {
            seed: Some(7),
            ..BanditConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn start(config: &EngineConfig) -> DecisionOrchestrator {
    DecisionOrchestrator::start(
        config,
        Arc::new(InMemoryInteractionLog::default()),
        Arc::new(InMemoryPatternStore::new()),
    )
}

fn planning_request(document_type: &str) -> DecisionRequest {
    let mut request = DecisionRequest::new("form_completion");
    request.document_type = Some(document_type.to_string());
    request.workflow_phase = Some("planning".to_string());
    request.completed_steps = vec!["requirements".to_string()];
    request.pending_steps = vec!["market_research".to_string(), "approval".to_string()];
    request
}

// Preference store that always reports a strong learned preference
struct ConfidentPreferences;

#[async_trait]
impl PreferenceStore for ConfidentPreferences {
    async fn learned_preferences(&self, _context: &PatternContext) -> Result<LearnedPreferences> {
        Ok(LearnedPreferences {
            patterns: Vec::new(),
            suggestions: Vec::new(),
            confidence: 1.0,
        })
    }
}

struct BrokenPreferences;

#[async_trait]
impl PreferenceStore for BrokenPreferences {
    async fn learned_preferences(&self, _context: &PatternContext) -> Result<LearnedPreferences> {
        Err(anyhow::anyhow!("preference backend offline"))
    }
}

#[test]
fn test_contract_with_estimated_value_is_high_risk() {
    let mut request = planning_request("Contract");
    request
        .context
        .insert("estimatedValue".to_string(), json!(1_200_000));
    assert_eq!(assess_risk(&request), RiskLevel::High);
}

#[test]
fn test_risk_gates_autonomy() {
    let config = OrchestratorConfig::default();
    assert_eq!(decision_tier(&config, 0.86, RiskLevel::Medium), DecisionTier::Autonomous);
    assert_eq!(decision_tier(&config, 0.86, RiskLevel::High), DecisionTier::Assisted);
}

#[test]
fn test_tier_is_monotonic_in_confidence() {
    let config = OrchestratorConfig::default();
    for risk in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
        let mut previous = DecisionTier::Manual;
        for step in 0..=100 {
            let tier = decision_tier(&config, step as f64 / 100.0, risk);
            assert!(tier >= previous, "tier dropped at {} for {:?}", step, risk);
            previous = tier;
        }
    }
}

#[tokio::test]
async fn test_fresh_engine_asks_for_manual_input() {
    let mut orchestrator = start(&seeded_config());

    let decision = orchestrator
        .process_decision_request(planning_request("SF-1449"))
        .await
        .unwrap();

    // Without learned preferences the combined confidence stays below the assisted threshold
    assert_eq!(decision.tier, DecisionTier::Manual);
    assert_eq!(
        decision.recommendation.action.action_type,
        ActionType::RequestManualInput
    );
    assert!(decision
        .reasoning
        .starts_with("Manual input recommended due to: low confidence"));
    assert!(decision.confidence >= 0.0 && decision.confidence < 0.65);
    assert!(!decision.recommendation.alternatives.is_empty());

    let stats = orchestrator.decision_statistics();
    assert_eq!(stats.total_decisions, 1);
    assert_eq!(stats.manual_decisions, 1);
    assert!((stats.average_confidence - decision.confidence).abs() < 1e-9);
}

#[tokio::test]
async fn test_strong_preferences_lift_decision_out_of_manual() {
    let config = seeded_config();
    let mut orchestrator = start(&config).with_preference_store(Arc::new(ConfidentPreferences));

    // Train the agent until every planning action is trusted
    let mut last = None;
    for _ in 0..30 {
        let decision = orchestrator
            .process_decision_request(planning_request("SF-1449"))
            .await
            .unwrap();
        orchestrator
            .apply_feedback(DecisionFeedback::new(decision.id, DecisionFeedbackType::Accepted))
            .await
            .unwrap();
        last = Some(decision);
    }

    let decision = last.unwrap();
    assert_ne!(decision.tier, DecisionTier::Manual);
    assert!(decision.confidence >= config.orchestrator.assisted_threshold);
    // The outbound recommendation reports the decision's own confidence and reasoning
    assert_eq!(decision.recommendation.confidence, decision.confidence);
    assert_eq!(decision.recommendation.reasoning, decision.reasoning);
}

#[tokio::test]
async fn test_accepted_feedback_records_success() {
    let mut orchestrator = start(&seeded_config());
    let decision = orchestrator
        .process_decision_request(planning_request("SF-1449"))
        .await
        .unwrap();

    let applied = orchestrator
        .apply_feedback(DecisionFeedback::new(decision.id, DecisionFeedbackType::Accepted))
        .await
        .unwrap();
    assert!(applied);

    let entry = orchestrator.history().find(|a| a.id == decision.id).unwrap();
    assert_eq!(entry.outcome, Some(AgenticOutcome::Success { reward: 1.0 }));

    let metrics = orchestrator.performance_metrics().await.unwrap();
    assert_eq!(metrics.total_decisions, 1);
    assert!((metrics.success_rate - 1.0).abs() < 1e-9);
    assert!((metrics.manual_rate - 1.0).abs() < 1e-9);

    let average = orchestrator
        .feedback()
        .average_reward(decision.id)
        .await
        .unwrap();
    assert_eq!(average, Some(1.0));

    let analytics = orchestrator.agent().analytics().await.unwrap();
    assert_eq!(analytics.total_decisions, 1);
    assert!((analytics.total_reward - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_metrics_cover_only_the_recent_window() {
    let mut config = seeded_config();
    config.orchestrator.metrics_window = 2;
    let mut orchestrator = start(&config);

    let mut ids = Vec::new();
    for _ in 0..4 {
        let decision = orchestrator
            .process_decision_request(planning_request("SF-1449"))
            .await
            .unwrap();
        ids.push(decision.id);
    }
    // Only the oldest decision succeeded, and it falls outside the window
    orchestrator
        .apply_feedback(DecisionFeedback::new(ids[0], DecisionFeedbackType::Accepted))
        .await
        .unwrap();

    let metrics = orchestrator.performance_metrics().await.unwrap();
    assert_eq!(metrics.total_decisions, 2);
    assert_eq!(metrics.success_rate, 0.0);
    assert_eq!(orchestrator.history().count(), 4);
}

#[tokio::test]
async fn test_feedback_for_unknown_decision_is_ignored() {
    let mut orchestrator = start(&seeded_config());
    let applied = orchestrator
        .apply_feedback(DecisionFeedback::new(Uuid::new_v4(), DecisionFeedbackType::Error))
        .await
        .unwrap();
    assert!(!applied);

    let analytics = orchestrator.agent().analytics().await.unwrap();
    assert_eq!(analytics.total_decisions, 0);
}

#[tokio::test]
async fn test_history_is_capped() {
    let mut config = seeded_config();
    config.orchestrator.history_cap = 3;
    let mut orchestrator = start(&config);

    let mut ids = Vec::new();
    for _ in 0..5 {
        let decision = orchestrator
            .process_decision_request(planning_request("RFP"))
            .await
            .unwrap();
        ids.push(decision.id);
    }

    let kept: Vec<Uuid> = orchestrator.history().map(|a| a.id).collect();
    assert_eq!(kept, ids[2..].to_vec());
    assert_eq!(orchestrator.decision_statistics().total_decisions, 5);

    // Evicted decisions can no longer receive feedback
    let applied = orchestrator
        .apply_feedback(DecisionFeedback::new(ids[0], DecisionFeedbackType::Accepted))
        .await
        .unwrap();
    assert!(!applied);
}

#[tokio::test]
async fn test_reset_clears_history_and_agent() {
    let mut orchestrator = start(&seeded_config());
    for _ in 0..3 {
        let decision = orchestrator
            .process_decision_request(planning_request("SF-1449"))
            .await
            .unwrap();
        orchestrator
            .apply_feedback(DecisionFeedback::new(decision.id, DecisionFeedbackType::Modified))
            .await
            .unwrap();
    }

    orchestrator.reset_learning_state().await.unwrap();

    assert_eq!(orchestrator.history().count(), 0);
    assert_eq!(orchestrator.decision_statistics().total_decisions, 0);
    let analytics = orchestrator.agent().analytics().await.unwrap();
    assert_eq!(analytics.total_decisions, 0);
    assert_eq!(orchestrator.agent().learning_progress().await.unwrap(), 0.0);

    let metrics = orchestrator.performance_metrics().await.unwrap();
    assert_eq!(metrics.total_decisions, 0);
}

#[tokio::test]
async fn test_preference_failure_does_not_block_decisions() {
    let mut orchestrator = start(&seeded_config()).with_preference_store(Arc::new(BrokenPreferences));
    let decision = orchestrator
        .process_decision_request(planning_request("Contract"))
        .await
        .unwrap();
    assert_eq!(decision.tier, DecisionTier::Manual);
}

#[tokio::test]
async fn test_pattern_feedback_reaches_feedback_loop() {
    let orchestrator = start(&seeded_config());
    orchestrator
        .submit_pattern_feedback(
            UserFeedback::new(Some(Uuid::new_v4()), FeedbackKind::Positive)
                .with_context("automatic_suggestion_accepted"),
        )
        .await
        .unwrap();

    let metrics = orchestrator.feedback().metrics().await.unwrap();
    assert_eq!(metrics.total_feedback_processed, 1);
    assert_eq!(metrics.positive_feedback_count, 1);
}
