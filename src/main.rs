// src/main.rs
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

use agentic_lib::{
    config::EngineConfig,
    models::{DecisionFeedback, DecisionFeedbackType, DecisionRequest, DecisionTier, FeedbackKind, UserFeedback, UserInteraction},
    stores::{InMemoryInteractionLog, InMemoryPatternStore},
    DecisionOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting agentic decision engine simulation");
    let start_time = Instant::now();

    let config = EngineConfig::from_env().context("Failed to load engine configuration")?;

    let log = Arc::new(InMemoryInteractionLog::default());
    let store = Arc::new(InMemoryPatternStore::new());
    let mut orchestrator = DecisionOrchestrator::start(&config, log.clone(), store.clone());

    // Phase 1: observe a user working through acquisition forms
    info!("Phase 1: Recording simulated interactions");
    let recorded = record_simulated_interactions(&orchestrator, &log).await?;
    info!(
        "Recorded {} interactions, {} patterns stored",
        recorded,
        store.len().await
    );

    // Phase 2: decisions with feedback
    info!("Phase 2: Processing decision requests");
    let scenarios = [
        ("SF-1449", "planning", false),
        ("SF-1449", "execution", false),
        ("Contract", "review", true),
        ("RFP", "solicitation", false),
        ("SF-1449", "planning", false),
    ];

    for round in 0..4 {
        for (document_type, phase, sensitive) in scenarios.iter() {
            let mut request = DecisionRequest::new("form_completion");
            request.document_type = Some(document_type.to_string());
            request.form_type = Some(document_type.to_string());
            request.workflow_phase = Some(phase.to_string());
            request.completed_steps = vec!["requirements".to_string(), "market_research".to_string()];
            request.pending_steps = vec!["approval".to_string()];
            request
                .context
                .insert("fieldCount".to_string(), serde_json::json!(12));
            if *sensitive {
                request
                    .context
                    .insert("estimatedValue".to_string(), serde_json::json!(250_000));
            }

            let decision = orchestrator.process_decision_request(request).await?;
            info!(
                "Round {}: {} / {} -> {} ({:.2})",
                round + 1,
                document_type,
                phase,
                decision.tier.as_str(),
                decision.confidence
            );

            // Simulated user: accepts most suggestions, edits the sensitive ones
            let feedback_type = match (decision.tier, *sensitive) {
                (_, true) => DecisionFeedbackType::Modified,
                (DecisionTier::Manual, _) => DecisionFeedbackType::Rejected,
                _ => DecisionFeedbackType::Accepted,
            };
            if !orchestrator
                .apply_feedback(DecisionFeedback::new(decision.id, feedback_type))
                .await?
            {
                warn!("Decision {} was not found in history", decision.id);
            }
        }
    }

    // Phase 3: explicit feedback on learned patterns
    info!("Phase 3: Submitting pattern feedback");
    for pattern in orchestrator.patterns().patterns().await?.iter().take(3) {
        let feedback = UserFeedback::new(Some(pattern.id), FeedbackKind::Positive)
            .with_context("automatic_suggestion_accepted");
        orchestrator.submit_pattern_feedback(feedback).await?;
    }

    let metrics = orchestrator.performance_metrics().await?;
    let statistics = orchestrator.decision_statistics();
    let analytics = orchestrator.agent().analytics().await?;
    let effectiveness = orchestrator.feedback().learning_effectiveness().await?;

    info!(
        "Performance: {}",
        serde_json::to_string_pretty(&metrics).context("Failed to serialize performance metrics")?
    );
    info!(
        "Statistics: {}",
        serde_json::to_string_pretty(&statistics).context("Failed to serialize decision statistics")?
    );
    info!(
        "Agent analytics: {}",
        serde_json::to_string_pretty(&analytics).context("Failed to serialize agent analytics")?
    );
    info!("Feedback loop effectiveness: {:.3}", effectiveness);

    info!("Simulation completed in {:.2?}", start_time.elapsed());
    Ok(())
}

async fn record_simulated_interactions(
    orchestrator: &DecisionOrchestrator,
    log: &InMemoryInteractionLog,
) -> Result<usize> {
    let base = Utc::now() - Duration::hours(2);
    let vendors = ["Acme Federal Services", "Acme Federal Services", "Acme Federal Services LLC"];
    let steps = ["requirements", "market_research", "solicitation"];
    let mut count = 0;

    let session = orchestrator
        .patterns()
        .start_session("simulated-user", "acquisition")
        .await?;
    info!("Learning session {} started", session);

    for i in 0..12 {
        let at = base + Duration::seconds(i * 10);

        let field = UserInteraction::new("field_input", at)
            .with_meta("formType", "SF-1449")
            .with_meta("fieldName", "vendorName")
            .with_meta("value", vendors[i as usize % vendors.len()]);
        let step = UserInteraction::new("workflow_step", at + Duration::seconds(5))
            .with_meta("stepName", steps[i as usize % steps.len()])
            .with_meta("documentType", "SF-1449")
            .with_meta("phase", "planning");

        for interaction in [field, step] {
            log.push(interaction.clone()).await;
            orchestrator
                .patterns()
                .record_interaction(interaction)
                .await
                .context("Failed to record interaction")?;
            count += 1;
        }
    }

    match orchestrator.patterns().end_session().await? {
        Some(adopted) => info!("Learning session ended, {} session patterns adopted", adopted),
        None => warn!("No learning session was active"),
    }

    if let Some(default) = orchestrator
        .patterns()
        .smart_default("SF-1449", "vendorName")
        .await?
    {
        info!(
            "Smart default for vendorName: {:?} ({:.2})",
            default.value, default.confidence
        );
    }
    if let Some(next) = orchestrator
        .patterns()
        .predict_next_action("market_research")
        .await?
    {
        info!("Predicted step after market_research: {} ({:.2})", next.action, next.confidence);
    }

    Ok(count)
}
