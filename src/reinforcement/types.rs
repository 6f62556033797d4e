// src/reinforcement/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Action, ActionParameters, DecisionRequest, RiskLevel, TimeOfDay};
use crate::patterns::LearnedPreferences;

/// Base complexity contributed by the document type.
pub fn document_complexity(document_type: Option<&str>) -> f64 {
    match document_type {
        Some("SF-1449") => 0.3,
        Some("Contract") => 0.7,
        Some("RFP") => 0.8,
        _ => 0.4,
    }
}

/// Workflow snapshot at decision time. Built fresh per request and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlState {
    pub phase: String,
    pub document_type: Option<String>,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    pub complexity: f64,
    pub user_experience: f64,
}

impl RlState {
    pub fn from_request(request: &DecisionRequest) -> Self {
        let steps = request.step_count() as f64;
        let complexity = (document_complexity(request.document_type.as_deref())
            + (steps / 20.0).min(0.3))
        .min(1.0);

        Self {
            phase: request
                .workflow_phase
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            document_type: request.document_type.clone(),
            completed_steps: request.completed_steps.clone(),
            pending_steps: request.pending_steps.clone(),
            complexity,
            // No per-user experience signal yet; neutral estimate.
            user_experience: 0.5,
        }
    }
}

/// State plus everything the orchestrator learned about the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlContext {
    pub patterns: LearnedPreferences,
    pub complexity: f64,
    pub risk: RiskLevel,
    pub time_context: TimeOfDay,
}

impl RlContext {
    pub fn empty() -> Self {
        Self {
            patterns: LearnedPreferences::empty(),
            complexity: 0.0,
            risk: RiskLevel::Low,
            time_context: TimeOfDay::Morning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlRecommendation {
    pub action: Action,
    pub confidence: f64,
    /// Raw confidence reported by the bandit before contextual adjustments.
    pub bandit_confidence: f64,
    pub parameters: ActionParameters,
    pub reasoning: String,
    pub alternatives: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub state: RlState,
    pub action: Action,
    pub reward: f64,
    pub next_state: Option<RlState>,
    pub timestamp: DateTime<Utc>,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlAnalytics {
    pub total_decisions: usize,
    pub total_reward: f64,
    pub average_reward: f64,
    pub recent_average_reward: f64,
    pub learning_progress: f64,
    pub action_distribution: HashMap<String, f64>,
    pub state_performance: HashMap<String, f64>,
    pub exploration_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub name: String,
    pub description: String,
    pub min_value: f64,
    pub max_value: f64,
}
