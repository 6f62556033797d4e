// src/reinforcement/agent.rs
use chrono::Utc;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};

use super::bandit::ContextualBandit;
use super::feature_extraction::encode_features;
use super::types::{LearningRecord, RlAnalytics, RlContext, RlRecommendation, RlState};
use crate::config::{BanditConfig, LEARNING_HISTORY_CAP, RECENT_PERFORMANCE_WINDOW};
use crate::error::AgenticResult;
use crate::models::{Action, ActionParameters, ActionType, CheckLevel, TemplateKind};
use crate::patterns::{PatternType, PatternValue};

// Rewards considered by the confidence adjustment and by the improvement trend
const ADJUSTMENT_WINDOW: usize = 10;
const MAX_ALTERNATIVES: usize = 3;

/// Reinforcement-learning agent: picks an action for a workflow state and learns from rewards.
#[derive(Debug)]
pub struct LocalAgent {
    bandit: ContextualBandit,
    learning_history: VecDeque<LearningRecord>,
    recent_performance: VecDeque<f64>,
    history_cap: usize,
    recent_window: usize,
    total_reward: f64,
    total_decisions: usize,
}

impl LocalAgent {
    pub fn new(config: &BanditConfig) -> Self {
        Self {
            bandit: ContextualBandit::new(config),
            learning_history: VecDeque::new(),
            recent_performance: VecDeque::new(),
            history_cap: LEARNING_HISTORY_CAP,
            recent_window: RECENT_PERFORMANCE_WINDOW,
            total_reward: 0.0,
            total_decisions: 0,
        }
    }

    pub fn total_decisions(&self) -> usize {
        self.total_decisions
    }

    pub fn history_len(&self) -> usize {
        self.learning_history.len()
    }

    /// Actions that make sense for the workflow phase. Manual input and compliance
    /// validation are always on the table.
    pub fn available_actions(state: &RlState) -> Vec<Action> {
        let phase = state.phase.to_lowercase();
        let mut types = vec![ActionType::RequestManualInput, ActionType::ValidateCompliance];

        match phase.as_str() {
            "planning" | "requirements" => {
                types.push(ActionType::GenerateDocument);
                types.push(ActionType::SuggestNextStep);
            }
            "execution" | "implementation" => {
                types.push(ActionType::FillField);
                types.push(ActionType::OptimizeWorkflow);
            }
            "review" | "approval" => {}
            _ => {
                types.push(ActionType::FillField);
                types.push(ActionType::SuggestNextStep);
            }
        }

        types.into_iter().map(Action::new).collect()
    }

    pub fn recommend(
        &mut self,
        state: &RlState,
        context: &RlContext,
    ) -> AgenticResult<RlRecommendation> {
        let features = encode_features(state, context);
        let available = Self::available_actions(state);

        let selected = self.bandit.select(&features, &available)?;
        let bandit_confidence = self.bandit.confidence(&selected, &features);
        let confidence = self.adjust_confidence(bandit_confidence, context);

        let alternatives = self.alternatives(&selected, &available, &features);
        let parameters = Self::parameters_for(&selected, state, context, &alternatives);
        let reasoning = Self::reasoning(&selected, confidence, context);

        debug!(
            "Agent recommends {} (bandit {:.3}, adjusted {:.3}) in phase '{}'",
            selected.action_type, bandit_confidence, confidence, state.phase
        );

        Ok(RlRecommendation {
            action: selected,
            confidence,
            bandit_confidence,
            parameters,
            reasoning,
            alternatives,
        })
    }

    pub fn learn(&mut self, state: &RlState, action: &Action, reward: f64, next_state: Option<RlState>) {
        // Learning encodes without request context; decision-time context is not replayed.
        let features = encode_features(state, &RlContext::empty());
        self.bandit.update(&features, action, reward);

        self.total_reward += reward;
        self.total_decisions += 1;

        self.recent_performance.push_back(reward);
        while self.recent_performance.len() > self.recent_window {
            self.recent_performance.pop_front();
        }

        self.learning_history.push_back(LearningRecord {
            state: state.clone(),
            action: action.clone(),
            reward,
            next_state,
            timestamp: Utc::now(),
            features,
        });
        while self.learning_history.len() > self.history_cap {
            self.learning_history.pop_front();
        }

        debug!(
            "Agent learned {} -> reward {} ({} decisions so far)",
            action.action_type, reward, self.total_decisions
        );
    }

    /// Overall reward level blended with the recent improvement trend, in [0, 1].
    pub fn learning_progress(&self) -> f64 {
        if self.total_decisions == 0 {
            return 0.0;
        }

        let average_reward = self.total_reward / self.total_decisions as f64;
        let normalized = ((average_reward + 1.0) / 2.0).clamp(0.0, 1.0);

        (0.7 * normalized + 0.3 * self.improvement_trend()).clamp(0.0, 1.0)
    }

    pub fn analytics(&self) -> RlAnalytics {
        let average_reward = if self.total_decisions > 0 {
            self.total_reward / self.total_decisions as f64
        } else {
            0.0
        };

        RlAnalytics {
            total_decisions: self.total_decisions,
            total_reward: self.total_reward,
            average_reward,
            recent_average_reward: mean(self.recent_performance.iter().copied()),
            learning_progress: self.learning_progress(),
            action_distribution: self.action_distribution(),
            state_performance: self.state_performance(),
            exploration_rate: self.bandit.exploration_rate(),
        }
    }

    pub fn reset(&mut self) {
        self.bandit.reset();
        self.learning_history.clear();
        self.recent_performance.clear();
        self.total_reward = 0.0;
        self.total_decisions = 0;
        info!("Agent learning state reset");
    }

    fn adjust_confidence(&self, bandit_confidence: f64, context: &RlContext) -> f64 {
        let mut confidence = bandit_confidence;

        if context.patterns.confidence > 0.8 {
            confidence += 0.1;
        }
        if context.complexity > 0.7 {
            confidence -= 0.15;
        }
        if context.risk.weight() > 0.6 {
            confidence -= 0.2;
        }

        if self.total_decisions > ADJUSTMENT_WINDOW {
            let recent = self
                .recent_performance
                .iter()
                .rev()
                .take(ADJUSTMENT_WINDOW)
                .copied();
            let recent_average = mean(recent);
            if recent_average > 0.5 {
                confidence += 0.05;
            } else if recent_average < -0.5 {
                confidence -= 0.05;
            }
        }

        confidence.clamp(0.0, 1.0)
    }

    fn alternatives(&self, selected: &Action, available: &[Action], features: &[f64]) -> Vec<Action> {
        let mut scored: Vec<(f64, &Action)> = available
            .iter()
            .filter(|a| a.id != selected.id)
            .map(|a| (self.bandit.confidence(a, features), a))
            .collect();
        // Stable sort keeps list order among equal confidences.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(MAX_ALTERNATIVES)
            .map(|(_, a)| a.clone())
            .collect()
    }

    fn parameters_for(
        action: &Action,
        state: &RlState,
        context: &RlContext,
        alternatives: &[Action],
    ) -> ActionParameters {
        let patterns = &context.patterns.patterns;

        match action.action_type {
            ActionType::FillField => {
                let suggested_value = patterns
                    .iter()
                    .filter(|p| p.pattern_type == PatternType::FieldValues)
                    .find_map(|p| match &p.value {
                        PatternValue::Text(text) => Some(text.clone()),
                        _ => None,
                    });
                ActionParameters::FillField {
                    suggested_value,
                    based_on_patterns: !patterns.is_empty(),
                    confidence: context.patterns.confidence,
                }
            }
            ActionType::GenerateDocument => ActionParameters::GenerateDocument {
                template: if context.patterns.has_pattern_type(PatternType::FormFilling) {
                    TemplateKind::Learned
                } else {
                    TemplateKind::Standard
                },
            },
            ActionType::SuggestNextStep => {
                let workflow = patterns
                    .iter()
                    .find(|p| p.pattern_type == PatternType::WorkflowSequence);
                match workflow {
                    Some(pattern) => {
                        let next_steps = match &pattern.value {
                            PatternValue::Sequence(steps) => steps.clone(),
                            _ => Vec::new(),
                        };
                        ActionParameters::SuggestNextStep {
                            next_steps,
                            confidence: Some(pattern.confidence),
                        }
                    }
                    None => ActionParameters::SuggestNextStep {
                        next_steps: state.pending_steps.iter().take(1).cloned().collect(),
                        confidence: None,
                    },
                }
            }
            ActionType::RequestManualInput => ActionParameters::RequestManualInput {
                reason: "Low confidence or high complexity scenario".to_string(),
                alternatives: alternatives.iter().map(|a| a.action_type).collect(),
            },
            ActionType::ValidateCompliance => ActionParameters::ValidateCompliance {
                check_level: if context.risk.weight() > 0.5 {
                    CheckLevel::Thorough
                } else {
                    CheckLevel::Standard
                },
            },
            ActionType::OptimizeWorkflow => ActionParameters::default_for(ActionType::OptimizeWorkflow),
        }
    }

    fn reasoning(action: &Action, confidence: f64, context: &RlContext) -> String {
        let mut reasoning = format!(
            "Selected action: {} with {}% confidence. ",
            action.action_type,
            (confidence * 100.0) as i64
        );

        if !context.patterns.patterns.is_empty() {
            reasoning.push_str(&format!(
                "Based on {} learned patterns. ",
                context.patterns.patterns.len()
            ));
        }

        reasoning.push_str(if confidence > 0.8 {
            "High confidence due to consistent historical patterns."
        } else if confidence > 0.6 {
            "Medium confidence, recommend user review."
        } else {
            "Low confidence, manual input suggested."
        });

        reasoning
    }

    fn improvement_trend(&self) -> f64 {
        let n = self.recent_performance.len();
        if n < ADJUSTMENT_WINDOW {
            return 0.5;
        }

        let half = n / 2;
        let first = mean(self.recent_performance.iter().take(half).copied());
        let second = mean(self.recent_performance.iter().skip(n - half).copied());

        (0.5 + (second - first)).clamp(0.0, 1.0)
    }

    fn action_distribution(&self) -> HashMap<String, f64> {
        let total = self.learning_history.len();
        if total == 0 {
            return HashMap::new();
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in &self.learning_history {
            *counts
                .entry(record.action.action_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(k, v)| (k, v as f64 / total as f64))
            .collect()
    }

    fn state_performance(&self) -> HashMap<String, f64> {
        let mut rewards: HashMap<String, Vec<f64>> = HashMap::new();
        for record in &self.learning_history {
            rewards
                .entry(record.state.phase.clone())
                .or_default()
                .push(record.reward);
        }

        rewards
            .into_iter()
            .map(|(phase, values)| (phase, mean(values.into_iter())))
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
