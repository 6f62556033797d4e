// src/reinforcement/orchestrator.rs
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use super::agent::LocalAgent;
use super::feedback_processor::FeedbackLoop;
use super::types::{document_complexity, RlContext, RlRecommendation, RlState};
use crate::config::{fixed_offset, EngineConfig, OrchestratorConfig};
use crate::error::AgenticResult;
use crate::models::{
    Action, ActionParameters, ActionType, AgenticAction, AgenticDecision, AgenticOutcome,
    AgenticRecommendation, DecisionFeedback, DecisionRequest, DecisionTier, RiskLevel, TimeOfDay,
    UserFeedback, UserInteraction,
};
use crate::patterns::{LearnedPreferences, Pattern, PatternContext, PatternLearningEngine, PatternType};
use crate::stores::{InteractionSource, PatternStore, PreferenceStore};
use crate::workers::{AgentHandle, FeedbackLoopHandle, PatternEngineHandle};

/// Request context keys that mark a decision as financially or contractually sensitive.
const HIGH_RISK_KEYS: [&str; 4] = ["estimatedValue", "fundingSource", "contractType", "vendorUEI"];

const BASE_CONTEXT_BONUS: f64 = 0.5;
const TIME_PATTERN_BONUS: f64 = 0.1;
const WORKFLOW_PATTERN_BONUS: f64 = 0.15;
const RISK_BONUS_PENALTY: f64 = 0.1;

/// Lifetime counters over every decision made since the last reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionStatistics {
    pub total_decisions: usize,
    pub autonomous_decisions: usize,
    pub assisted_decisions: usize,
    pub manual_decisions: usize,
    pub average_confidence: f64,
    pub last_decision_at: Option<DateTime<Utc>>,
}

impl DecisionStatistics {
    fn record(&mut self, tier: DecisionTier, confidence: f64, at: DateTime<Utc>) {
        match tier {
            DecisionTier::Autonomous => self.autonomous_decisions += 1,
            DecisionTier::Assisted => self.assisted_decisions += 1,
            DecisionTier::Manual => self.manual_decisions += 1,
        }
        self.total_decisions += 1;
        // Running mean
        self.average_confidence +=
            (confidence - self.average_confidence) / self.total_decisions as f64;
        self.last_decision_at = Some(at);
    }
}

/// Rates over the most recent decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub autonomous_rate: f64,
    pub assisted_rate: f64,
    pub manual_rate: f64,
    pub success_rate: f64,
    pub average_confidence: f64,
    pub total_decisions: usize,
    pub learning_progress: f64,
}

/// Complexity of a request: document base plus form size and workflow length contributions.
pub fn assess_complexity(request: &DecisionRequest) -> f64 {
    let base = document_complexity(request.document_type.as_deref());
    let fields = (request.field_count() as f64 / 100.0).min(0.3);
    let steps = (request.step_count() as f64 / 20.0).min(0.2);
    (base + fields + steps).clamp(0.0, 1.0)
}

pub fn assess_risk(request: &DecisionRequest) -> RiskLevel {
    if HIGH_RISK_KEYS.iter().any(|key| request.context.contains_key(*key)) {
        RiskLevel::High
    } else if request.document_type.as_deref() == Some("Contract") {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Bonus for contexts where time-of-day or workflow habits are known, damped by risk.
pub fn contextual_bonus(preferences: &LearnedPreferences, insights: &[Pattern], risk: RiskLevel) -> f64 {
    let seen = |pattern_type: PatternType| {
        preferences.has_pattern_type(pattern_type)
            || insights.iter().any(|p| p.pattern_type == pattern_type)
    };

    let mut bonus = BASE_CONTEXT_BONUS;
    if seen(PatternType::TimeOfDay) {
        bonus += TIME_PATTERN_BONUS;
    }
    if seen(PatternType::WorkflowSequence) {
        bonus += WORKFLOW_PATTERN_BONUS;
    }
    (bonus * (1.0 - risk.weight() * RISK_BONUS_PENALTY)).clamp(0.0, 1.0)
}

pub fn combined_confidence(
    config: &OrchestratorConfig,
    bandit_confidence: f64,
    pattern_confidence: f64,
    bonus: f64,
) -> f64 {
    (config.bandit_weight * bandit_confidence
        + config.pattern_weight * pattern_confidence
        + config.context_weight * bonus)
        .clamp(0.0, 1.0)
}

/// Autonomy requires both high confidence and at most medium risk.
pub fn decision_tier(config: &OrchestratorConfig, confidence: f64, risk: RiskLevel) -> DecisionTier {
    if confidence >= config.autonomous_threshold && risk <= RiskLevel::Medium {
        DecisionTier::Autonomous
    } else if confidence >= config.assisted_threshold {
        DecisionTier::Assisted
    } else {
        DecisionTier::Manual
    }
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn autonomous_reasoning(rl_confidence: f64, pattern_count: usize, risk: RiskLevel) -> String {
    let mut reasoning = format!(
        "Autonomous decision based on:\n• High confidence RL recommendation ({})",
        percent(rl_confidence)
    );
    if pattern_count > 0 {
        reasoning.push_str(&format!(
            "\n• Consistent with {} historical patterns",
            pattern_count
        ));
    }
    if risk == RiskLevel::Low {
        reasoning.push_str("\n• Low risk context allows autonomous execution");
    }
    reasoning
}

pub struct DecisionOrchestrator {
    config: OrchestratorConfig,
    agent: AgentHandle,
    patterns: PatternEngineHandle,
    feedback: FeedbackLoopHandle,
    preferences: Arc<dyn PreferenceStore>,
    history: VecDeque<AgenticAction>,
    stats: DecisionStatistics,
}

impl DecisionOrchestrator {
    /// Spawns the agent, pattern engine and feedback loop workers and wires them together.
    pub fn start(
        config: &EngineConfig,
        source: Arc<dyn InteractionSource>,
        store: Arc<dyn PatternStore>,
    ) -> Self {
        let engine = PatternLearningEngine::new(config.patterns.clone(), store, source);
        let patterns = PatternEngineHandle::spawn(engine);
        let feedback = FeedbackLoopHandle::spawn(FeedbackLoop::new(&config.feedback), patterns.clone());
        let agent = AgentHandle::spawn(LocalAgent::new(&config.bandit));

        info!(
            "Decision orchestrator started (autonomous >= {:.2}, assisted >= {:.2}, strategy {:?})",
            config.orchestrator.autonomous_threshold,
            config.orchestrator.assisted_threshold,
            config.bandit.strategy
        );

        Self::new(config.orchestrator.clone(), agent, patterns, feedback)
    }

    /// Preferences are answered by the pattern engine unless replaced with `with_preference_store`.
    pub fn new(
        config: OrchestratorConfig,
        agent: AgentHandle,
        patterns: PatternEngineHandle,
        feedback: FeedbackLoopHandle,
    ) -> Self {
        Self {
            config,
            preferences: Arc::new(patterns.clone()),
            agent,
            patterns,
            feedback,
            history: VecDeque::new(),
            stats: DecisionStatistics::default(),
        }
    }

    pub fn with_preference_store(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn agent(&self) -> &AgentHandle {
        &self.agent
    }

    pub fn patterns(&self) -> &PatternEngineHandle {
        &self.patterns
    }

    pub fn feedback(&self) -> &FeedbackLoopHandle {
        &self.feedback
    }

    pub fn history(&self) -> impl Iterator<Item = &AgenticAction> {
        self.history.iter()
    }

    pub async fn process_decision_request(
        &mut self,
        request: DecisionRequest,
    ) -> AgenticResult<AgenticDecision> {
        let complexity = assess_complexity(&request);
        let risk = assess_risk(&request);
        let time_context =
            TimeOfDay::from_timestamp(request.timestamp, fixed_offset(self.config.utc_offset_minutes));

        let pattern_context = PatternContext {
            form_type: request.form_type.clone(),
            document_type: request.document_type.clone(),
            workflow_phase: request.workflow_phase.clone(),
            time_of_day: Some(time_context),
        };
        let preferences = match self.preferences.learned_preferences(&pattern_context).await {
            Ok(preferences) => preferences,
            Err(e) => {
                warn!("Learned preferences unavailable, continuing without: {:?}", e);
                LearnedPreferences::empty()
            }
        };

        let state = RlState::from_request(&request);
        let context = RlContext {
            patterns: preferences,
            complexity,
            risk,
            time_context,
        };

        let recommend = self.agent.recommend(state, context.clone());
        let insights = self.patterns.insights(
            self.context_interaction(&request, complexity, risk),
            self.history_interactions(),
            self.config.history_window,
        );
        let (recommendation, insights) = futures::join!(recommend, insights);
        let recommendation = recommendation?;
        let insights = insights.unwrap_or_else(|e| {
            warn!("Pattern insights unavailable for request {}: {}", request.id, e);
            Vec::new()
        });

        let bonus = contextual_bonus(&context.patterns, &insights, risk);
        let confidence = combined_confidence(
            &self.config,
            recommendation.confidence,
            context.patterns.confidence,
            bonus,
        );
        let tier = decision_tier(&self.config, confidence, risk);

        debug!(
            "Request {}: rl {:.3}, patterns {:.3}, bonus {:.3} -> {:.3} ({})",
            request.id,
            recommendation.confidence,
            context.patterns.confidence,
            bonus,
            confidence,
            tier.as_str()
        );

        let (recommendation, reasoning) =
            self.shape_recommendation(tier, recommendation, &context, confidence, complexity)?;

        let decision = AgenticDecision {
            id: request.id,
            tier,
            recommendation,
            confidence,
            reasoning,
            timestamp: Utc::now(),
            request,
        };

        self.remember(&decision);
        info!(
            "Decision {} made: {} with {} confidence",
            decision.id,
            tier.as_str(),
            percent(confidence)
        );
        Ok(decision)
    }

    fn shape_recommendation(
        &self,
        tier: DecisionTier,
        rl: RlRecommendation,
        context: &RlContext,
        confidence: f64,
        complexity: f64,
    ) -> AgenticResult<(AgenticRecommendation, String)> {
        let pattern_count = context.patterns.patterns.len();

        let reasoning = match tier {
            DecisionTier::Autonomous => autonomous_reasoning(rl.confidence, pattern_count, context.risk),
            DecisionTier::Assisted => format!(
                "Assisted recommendation:\n\
                 • RL suggestion: {}\n\
                 • Confidence: {}\n\
                 • Risk level: {}\n\
                 • Based on {} similar patterns",
                rl.action.description,
                percent(confidence),
                context.risk,
                pattern_count
            ),
            DecisionTier::Manual => format!(
                "Manual input recommended due to: low confidence ({}), high complexity ({}), \
                 or insufficient historical data",
                percent(confidence),
                percent(complexity)
            ),
        };

        if tier != DecisionTier::Manual {
            let recommendation = AgenticRecommendation {
                action: rl.action,
                parameters: rl.parameters,
                reasoning: reasoning.clone(),
                confidence,
                alternatives: rl.alternatives,
            };
            return Ok((recommendation, reasoning));
        }

        let parameters = ActionParameters::RequestManualInput {
            reason: reasoning.clone(),
            alternatives: std::iter::once(rl.action.action_type)
                .chain(rl.alternatives.iter().map(|a| a.action_type))
                .collect(),
        };
        let action = Action::with_parameters(ActionType::RequestManualInput, parameters.clone())?;
        let mut alternatives = vec![rl.action];
        alternatives.extend(rl.alternatives);

        let recommendation = AgenticRecommendation {
            action,
            parameters,
            reasoning: reasoning.clone(),
            confidence,
            alternatives,
        };
        Ok((recommendation, reasoning))
    }

    fn remember(&mut self, decision: &AgenticDecision) {
        self.stats
            .record(decision.tier, decision.confidence, decision.timestamp);

        self.history.push_back(AgenticAction {
            id: decision.id,
            decision: decision.clone(),
            timestamp: decision.timestamp,
            confidence: decision.confidence,
            outcome: None,
        });
        while self.history.len() > self.config.history_cap {
            self.history.pop_front();
        }
    }

    fn context_interaction(&self, request: &DecisionRequest, complexity: f64, risk: RiskLevel) -> UserInteraction {
        UserInteraction::new("decision_context", request.timestamp)
            .with_meta("complexity", format!("{:.3}", complexity))
            .with_meta("risk", risk.as_str())
            .with_meta(
                "documentType",
                request.document_type.as_deref().unwrap_or("unknown"),
            )
            .with_meta(
                "workflowPhase",
                request.workflow_phase.as_deref().unwrap_or("unknown"),
            )
    }

    /// Recent decisions replayed as interactions so the pattern engine sees them.
    fn history_interactions(&self) -> Vec<UserInteraction> {
        let skip = self.history.len().saturating_sub(self.config.history_window);
        self.history
            .iter()
            .skip(skip)
            .map(|entry| {
                let request = &entry.decision.request;
                UserInteraction::new("agentic_decision", entry.timestamp)
                    .with_meta("decisionType", entry.decision.tier.as_str())
                    .with_meta("confidence", format!("{:.3}", entry.confidence))
                    .with_meta(
                        "documentType",
                        request.document_type.as_deref().unwrap_or("unknown"),
                    )
                    .with_meta(
                        "workflowPhase",
                        request.workflow_phase.as_deref().unwrap_or("unknown"),
                    )
            })
            .collect()
    }

    /// Attaches the outcome to the decision and teaches the agent and feedback loop.
    /// Returns false when the decision is no longer in history.
    pub async fn apply_feedback(&mut self, feedback: DecisionFeedback) -> AgenticResult<bool> {
        let Some(entry) = self
            .history
            .iter_mut()
            .find(|entry| entry.id == feedback.decision_id)
        else {
            warn!(
                "Feedback {} refers to unknown decision {}; ignoring",
                feedback.id, feedback.decision_id
            );
            return Ok(false);
        };

        entry.outcome = Some(feedback.feedback_type.outcome());
        let reward = feedback.feedback_type.reward();
        let state = RlState::from_request(&entry.decision.request);
        let action = entry.decision.recommendation.action.clone();

        self.agent
            .learn(state, action, reward, feedback.resulting_state.clone())
            .await?;
        self.feedback
            .apply_reinforcement(feedback.pattern_id.unwrap_or(feedback.decision_id), reward)
            .await?;

        info!(
            "Applied {:?} feedback to decision {} (reward {:.2})",
            feedback.feedback_type, feedback.decision_id, reward
        );
        Ok(true)
    }

    /// Nudges the referenced pattern directly, then queues the feedback for the feedback loop.
    pub async fn submit_pattern_feedback(&self, feedback: UserFeedback) -> AgenticResult<()> {
        if let Some(pattern_id) = feedback.pattern_id {
            if !self.patterns.apply_feedback(pattern_id, feedback.kind).await? {
                debug!("Pattern {} not known to the pattern engine", pattern_id);
            }
        }
        self.feedback.process_feedback(feedback).await
    }

    pub async fn performance_metrics(&self) -> AgenticResult<PerformanceMetrics> {
        let learning_progress = self.agent.learning_progress().await?;

        let skip = self.history.len().saturating_sub(self.config.metrics_window);
        let recent: Vec<&AgenticAction> = self.history.iter().skip(skip).collect();
        if recent.is_empty() {
            return Ok(PerformanceMetrics {
                autonomous_rate: 0.0,
                assisted_rate: 0.0,
                manual_rate: 0.0,
                success_rate: 0.0,
                average_confidence: 0.0,
                total_decisions: 0,
                learning_progress,
            });
        }

        let total = recent.len() as f64;
        let rate = |tier: DecisionTier| {
            recent.iter().filter(|a| a.decision.tier == tier).count() as f64 / total
        };
        let successes = recent
            .iter()
            .filter(|a| matches!(a.outcome, Some(AgenticOutcome::Success { .. })))
            .count();

        Ok(PerformanceMetrics {
            autonomous_rate: rate(DecisionTier::Autonomous),
            assisted_rate: rate(DecisionTier::Assisted),
            manual_rate: rate(DecisionTier::Manual),
            success_rate: successes as f64 / total,
            average_confidence: recent.iter().map(|a| a.confidence).sum::<f64>() / total,
            total_decisions: recent.len(),
            learning_progress,
        })
    }

    pub fn decision_statistics(&self) -> DecisionStatistics {
        self.stats.clone()
    }

    /// Clears decision history and statistics and resets the agent. Learned patterns are kept.
    pub async fn reset_learning_state(&mut self) -> AgenticResult<()> {
        self.agent.reset().await?;
        self.history.clear();
        self.stats = DecisionStatistics::default();
        info!("Learning state reset");
        Ok(())
    }
}
