// src/reinforcement/action_model.rs
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::NoiseModel;

/// Keeps the sampled standard deviation away from zero for untested or perfectly consistent arms.
const VARIANCE_FLOOR: f64 = 0.1;

/// Trials after which the trial-count half of the confidence saturates.
const CONFIDENT_TRIALS: f64 = 20.0;

#[derive(Serialize, Deserialize, Debug, Clone)]
struct RewardSample {
    features: Vec<f64>,
    reward: f64,
}

/// Reward model for a single action type.
///
/// Samples live in a ring buffer so long-running processes stay bounded; `trials`
/// keeps counting past the cap so exploration bonuses keep shrinking.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActionModel {
    samples: VecDeque<RewardSample>,
    capacity: usize,
    trials: usize,
}

impl ActionModel {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            trials: 0,
        }
    }

    pub fn update(&mut self, features: &[f64], reward: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(RewardSample {
            features: features.to_vec(),
            reward,
        });
        self.trials += 1;
    }

    pub fn trial_count(&self) -> usize {
        self.trials
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Mean reward over retained samples. Features are accepted for a future
    /// similarity-weighted estimate and are currently unused.
    pub fn mean_reward(&self, _features: &[f64]) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.reward).sum::<f64>() / self.samples.len() as f64
    }

    pub fn variance(&self, features: &[f64]) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean_reward(features);
        self.samples
            .iter()
            .map(|s| (s.reward - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64
    }

    /// Average of a trial-count term and a variance term, both in [0, 1].
    pub fn confidence(&self, features: &[f64]) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        let trial_confidence = (self.trials as f64 / CONFIDENT_TRIALS).min(1.0);
        let variance_confidence = 1.0 / (1.0 + self.variance(features));
        ((trial_confidence + variance_confidence) / 2.0).clamp(0.0, 1.0)
    }

    /// Draws a plausible reward for Thompson sampling.
    pub fn sample_reward<R: Rng + ?Sized>(
        &self,
        features: &[f64],
        noise: NoiseModel,
        rng: &mut R,
    ) -> f64 {
        if self.samples.is_empty() {
            return rng.gen_range(-1.0..=1.0);
        }

        let mean = self.mean_reward(features);
        let std_dev = (self.variance(features) + VARIANCE_FLOOR).sqrt();
        let z: f64 = match noise {
            NoiseModel::Gaussian => rng.sample(StandardNormal),
            NoiseModel::Uniform => rng.gen_range(-2.0..=2.0),
        };

        mean + std_dev * z
    }
}
