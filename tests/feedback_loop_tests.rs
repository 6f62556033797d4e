// tests/feedback_loop_tests.rs

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use agentic_lib::config::{FeedbackConfig, PatternConfig};
use agentic_lib::models::{FeedbackKind, UserFeedback, UserInteraction};
use agentic_lib::patterns::PatternLearningEngine;
use agentic_lib::reinforcement::{FeedbackContext, FeedbackLoop, LearningType, TrendDirection};
use agentic_lib::stores::{InMemoryInteractionLog, InMemoryPatternStore};
use agentic_lib::workers::{FeedbackLoopHandle, PatternEngineHandle};

struct Fixture {
    patterns: PatternEngineHandle,
    feedback: FeedbackLoopHandle,
    pattern_id: Uuid,
}

/// Pattern engine holding one temporal pattern at confidence 0.62, plus a feedback loop wired to it.
async fn fixture() -> Fixture {
    let log = Arc::new(InMemoryInteractionLog::default());
    let engine = PatternLearningEngine::new(
        PatternConfig::default(),
        Arc::new(InMemoryPatternStore::new()),
        log.clone(),
    );
    let patterns = PatternEngineHandle::spawn(engine);

    let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap();
    for i in 0..5 {
        let interaction = UserInteraction::new("document_view", start + Duration::minutes(i));
        log.push(interaction.clone()).await;
        patterns.record_interaction(interaction).await.unwrap();
    }
    let pattern_id = patterns.patterns().await.unwrap()[0].id;

    let feedback = FeedbackLoopHandle::spawn(FeedbackLoop::new(&FeedbackConfig::default()), patterns.clone());
    Fixture {
        patterns,
        feedback,
        pattern_id,
    }
}

#[tokio::test]
async fn test_explicit_feedback_adjusts_pattern_confidence() {
    let fx = fixture().await;
    let before = fx.patterns.pattern_confidence(fx.pattern_id).await.unwrap().unwrap();
    assert!((before - 0.62).abs() < 1e-9);

    fx.feedback
        .process_feedback(UserFeedback::new(Some(fx.pattern_id), FeedbackKind::Positive))
        .await
        .unwrap();
    // Commands are handled in order, so this reply means the feedback above was processed
    let rate = fx.feedback.learning_rate().await.unwrap();
    assert!((rate - 0.11).abs() < 1e-9);

    let after = fx.patterns.pattern_confidence(fx.pattern_id).await.unwrap().unwrap();
    assert!((after - 0.72).abs() < 1e-9);

    fx.feedback
        .process_feedback(UserFeedback::new(Some(fx.pattern_id), FeedbackKind::Negative))
        .await
        .unwrap();
    let metrics = fx.feedback.metrics().await.unwrap();
    assert_eq!(metrics.total_feedback_processed, 2);
    assert_eq!(metrics.positive_feedback_count, 1);
    assert_eq!(metrics.negative_feedback_count, 1);

    let lowered = fx.patterns.pattern_confidence(fx.pattern_id).await.unwrap().unwrap();
    assert!((lowered - 0.61).abs() < 1e-9);

    // Contradicting feedback on the same pattern slows learning down
    let rate = fx.feedback.learning_rate().await.unwrap();
    assert!((rate - 0.099).abs() < 1e-9);
}

#[tokio::test]
async fn test_implicit_rejection_counts_against_pattern() {
    let fx = fixture().await;
    fx.feedback
        .process_feedback(
            UserFeedback::new(Some(fx.pattern_id), FeedbackKind::Positive)
                .with_context("automatic_suggestion_rejected"),
        )
        .await
        .unwrap();
    let metrics = fx.feedback.metrics().await.unwrap();
    assert_eq!(metrics.negative_feedback_count, 1);

    let after = fx.patterns.pattern_confidence(fx.pattern_id).await.unwrap().unwrap();
    assert!((after - 0.57).abs() < 1e-9);
}

#[tokio::test]
async fn test_feedback_for_unknown_pattern_is_still_recorded() {
    let fx = fixture().await;
    fx.feedback
        .process_feedback(UserFeedback::new(Some(Uuid::new_v4()), FeedbackKind::Positive))
        .await
        .unwrap();
    fx.feedback
        .process_feedback(UserFeedback::new(None, FeedbackKind::Neutral))
        .await
        .unwrap();

    let metrics = fx.feedback.metrics().await.unwrap();
    assert_eq!(metrics.total_feedback_processed, 2);
    assert_eq!(metrics.neutral_feedback_count, 1);

    let untouched = fx.patterns.pattern_confidence(fx.pattern_id).await.unwrap().unwrap();
    assert!((untouched - 0.62).abs() < 1e-9);
}

#[tokio::test]
async fn test_session_learnings_feed_reinforcement() {
    let fx = fixture().await;
    let other = Uuid::new_v4();

    let session = fx
        .feedback
        .start_session(FeedbackContext::new("user-1", "smart_defaults"))
        .await
        .unwrap();
    for kind in [
        FeedbackKind::Positive,
        FeedbackKind::Positive,
        FeedbackKind::Positive,
        FeedbackKind::Negative,
    ] {
        assert!(fx
            .feedback
            .add_to_session(session, UserFeedback::new(Some(fx.pattern_id), kind))
            .await
            .unwrap());
    }
    for kind in [FeedbackKind::Negative, FeedbackKind::Negative, FeedbackKind::Negative] {
        assert!(fx
            .feedback
            .add_to_session(session, UserFeedback::new(Some(other), kind))
            .await
            .unwrap());
    }

    let summary = fx.feedback.end_session(session).await.unwrap().unwrap();
    assert_eq!(summary.total_feedback, 7);
    assert_eq!(summary.positive_count, 3);
    assert_eq!(summary.negative_count, 4);
    assert_eq!(summary.key_learnings.len(), 2);
    assert_eq!(summary.recommendations.len(), 2);

    let reinforced = summary
        .key_learnings
        .iter()
        .find(|l| l.pattern_id == fx.pattern_id)
        .unwrap();
    assert_eq!(reinforced.learning_type, LearningType::Reinforce);
    assert!((reinforced.strength - 0.75).abs() < 1e-9);

    let average = fx.feedback.average_reward(fx.pattern_id).await.unwrap().unwrap();
    assert!((average - 0.75).abs() < 1e-9);
    let suppressed = fx.feedback.average_reward(other).await.unwrap().unwrap();
    assert!((suppressed + 1.0).abs() < 1e-9);

    // Closed sessions accept nothing more
    assert!(!fx
        .feedback
        .add_to_session(session, UserFeedback::new(None, FeedbackKind::Positive))
        .await
        .unwrap());
    assert!(fx.feedback.end_session(session).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reinforcement_tracks_average_reward() {
    let fx = fixture().await;
    for reward in [1.0, 0.5, -0.5] {
        fx.feedback
            .apply_reinforcement(fx.pattern_id, reward)
            .await
            .unwrap();
    }
    let average = fx.feedback.average_reward(fx.pattern_id).await.unwrap().unwrap();
    assert!((average - 1.0 / 3.0).abs() < 1e-9);

    let metrics = fx.feedback.metrics().await.unwrap();
    assert_eq!(metrics.total_reinforcements, 3);
    assert!((metrics.average_reward - 1.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_effectiveness_and_trends() {
    let fx = fixture().await;
    assert!((fx.feedback.learning_effectiveness().await.unwrap() - 0.5).abs() < 1e-9);

    for kind in [FeedbackKind::Positive, FeedbackKind::Positive, FeedbackKind::Negative, FeedbackKind::Positive] {
        fx.feedback
            .process_feedback(UserFeedback::new(Some(fx.pattern_id), kind))
            .await
            .unwrap();
    }

    let effectiveness = fx.feedback.learning_effectiveness().await.unwrap();
    assert!(effectiveness > 0.7 && effectiveness <= 0.75);

    let trends = fx.feedback.feedback_trends(Duration::days(30)).await.unwrap();
    assert_eq!(trends.daily.len(), 1);
    assert_eq!(trends.daily[0].total_feedback, 4);
    assert!((trends.moving_average_7_day - 0.75).abs() < 1e-9);
    assert_eq!(trends.direction, TrendDirection::Stable);
}
