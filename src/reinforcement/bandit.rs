// src/reinforcement/bandit.rs
use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::HashMap;

use super::action_model::ActionModel;
use crate::config::{BanditConfig, BanditStrategy, NoiseModel};
use crate::error::{AgenticError, AgenticResult};
use crate::models::{Action, ActionType};

/// Confidence reported for an action type that has never been rewarded.
pub const UNTRIED_CONFIDENCE: f64 = 0.5;

/// Contextual multi-armed bandit with one reward model per action type.
#[derive(Debug, Clone)]
pub struct ContextualBandit {
    action_models: HashMap<ActionType, ActionModel>,
    strategy: BanditStrategy,
    exploration_rate: f64,
    noise_model: NoiseModel,
    sample_cap: usize,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl ContextualBandit {
    pub fn new(config: &BanditConfig) -> Self {
        Self {
            action_models: HashMap::new(),
            strategy: config.strategy,
            exploration_rate: config.exploration_rate.clamp(0.0, 1.0),
            noise_model: config.noise_model,
            sample_cap: config.sample_cap,
            seed: config.seed,
            rng: Self::make_rng(config.seed),
        }
    }

    fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
        match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    pub fn strategy(&self) -> BanditStrategy {
        self.strategy
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn select(&mut self, features: &[f64], available: &[Action]) -> AgenticResult<Action> {
        if available.is_empty() {
            return Err(AgenticError::EmptyActionSet);
        }

        let index = match self.strategy {
            BanditStrategy::ThompsonSampling => self.thompson_index(features, available),
            BanditStrategy::UpperConfidenceBound => self.ucb_index(features, available),
            BanditStrategy::EpsilonGreedy => self.epsilon_greedy_index(features, available),
        };

        debug!(
            "Bandit ({:?}) selected {} out of {} candidates",
            self.strategy,
            available[index].action_type,
            available.len()
        );

        Ok(available[index].clone())
    }

    pub fn update(&mut self, features: &[f64], action: &Action, reward: f64) {
        let cap = self.sample_cap;
        self.action_models
            .entry(action.action_type)
            .or_insert_with(|| ActionModel::new(cap))
            .update(features, reward);

        debug!(
            "Updated model for {}: reward={}, trials={}",
            action.action_type,
            reward,
            self.trials_for(action.action_type)
        );
    }

    pub fn confidence(&self, action: &Action, features: &[f64]) -> f64 {
        self.action_models
            .get(&action.action_type)
            .map(|m| m.confidence(features))
            .unwrap_or(UNTRIED_CONFIDENCE)
    }

    pub fn trials_for(&self, action_type: ActionType) -> usize {
        self.action_models
            .get(&action_type)
            .map(ActionModel::trial_count)
            .unwrap_or(0)
    }

    pub fn total_trials(&self) -> usize {
        self.action_models.values().map(ActionModel::trial_count).sum()
    }

    /// Clears every model and rewinds the RNG to its initial state.
    pub fn reset(&mut self) {
        self.action_models.clear();
        self.rng = Self::make_rng(self.seed);
    }

    // Stats per action type: (mean reward, trials, confidence)
    pub fn get_stats(&self) -> HashMap<ActionType, (f64, usize, f64)> {
        self.action_models
            .iter()
            .map(|(action_type, model)| {
                (
                    *action_type,
                    (model.mean_reward(&[]), model.trial_count(), model.confidence(&[])),
                )
            })
            .collect()
    }

    fn thompson_index(&mut self, features: &[f64], actions: &[Action]) -> usize {
        let empty = ActionModel::new(1);
        let mut best_idx = 0;
        let mut best_sample = f64::NEG_INFINITY;

        for (i, action) in actions.iter().enumerate() {
            let model = self.action_models.get(&action.action_type).unwrap_or(&empty);
            let sample = model.sample_reward(features, self.noise_model, &mut self.rng);
            // Strictly greater, so ties keep the earliest action.
            if sample > best_sample {
                best_sample = sample;
                best_idx = i;
            }
        }

        best_idx
    }

    fn ucb_score(&self, features: &[f64], action_type: ActionType, total_trials: usize) -> f64 {
        let Some(model) = self.action_models.get(&action_type) else {
            return 1.0;
        };
        if total_trials == 0 || model.trial_count() == 0 {
            return model.mean_reward(features) + 1.0;
        }

        let exploitation = model.mean_reward(features);
        let exploration =
            (2.0 * (total_trials as f64).ln() / model.trial_count() as f64).sqrt();

        exploitation + exploration
    }

    fn ucb_index(&self, features: &[f64], actions: &[Action]) -> usize {
        let total_trials = self.total_trials();

        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, action) in actions.iter().enumerate() {
            let score = self.ucb_score(features, action.action_type, total_trials);
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        best_idx
    }

    fn epsilon_greedy_index(&mut self, features: &[f64], actions: &[Action]) -> usize {
        if self.rng.gen::<f64>() < self.exploration_rate {
            let idx = self.rng.gen_range(0..actions.len());
            debug!("Exploration mode: trying {}", actions[idx].action_type);
            return idx;
        }

        let mut best_idx = 0;
        let mut best_reward = f64::NEG_INFINITY;
        for (i, action) in actions.iter().enumerate() {
            let reward = self
                .action_models
                .get(&action.action_type)
                .map(|m| m.mean_reward(features))
                .unwrap_or(0.0);
            if reward > best_reward {
                best_reward = reward;
                best_idx = i;
            }
        }

        best_idx
    }
}
