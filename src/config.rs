// src/config.rs
use anyhow::{Context, Result};
use chrono::FixedOffset;
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

// Decision thresholds
pub const AUTONOMOUS_THRESHOLD: f64 = 0.85;
pub const ASSISTED_THRESHOLD: f64 = 0.65;

// Confidence combination weights (bandit, pattern, context bonus)
pub const BANDIT_WEIGHT: f64 = 0.5;
pub const PATTERN_WEIGHT: f64 = 0.3;
pub const CONTEXT_WEIGHT: f64 = 0.2;

// Histories
pub const DECISION_HISTORY_CAP: usize = 1000;
pub const LEARNING_HISTORY_CAP: usize = 1000;
pub const ACTION_MODEL_SAMPLE_CAP: usize = 500;
pub const RECENT_PERFORMANCE_WINDOW: usize = 100;
pub const METRICS_WINDOW: usize = 100;
pub const PATTERN_HISTORY_WINDOW: usize = 100;

// Exploration rate used by the epsilon-greedy strategy
pub const EXPLORATION_RATE: f64 = 0.15;

// Pattern learning
pub const MIN_PATTERN_OCCURRENCES: usize = 3;
pub const PREFERENCE_CONFIDENCE_THRESHOLD: f64 = 0.75;
pub const INTERACTION_FETCH_LIMIT: usize = 1000;

// Feedback loop learning rate
pub const INITIAL_LEARNING_RATE: f64 = 0.1;
pub const MIN_LEARNING_RATE: f64 = 0.01;
pub const MAX_LEARNING_RATE: f64 = 0.5;

/// How Thompson sampling perturbs a model's mean reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// Standard normal noise.
    Gaussian,
    /// Uniform noise in [-2, 2].
    Uniform,
}

impl FromStr for NoiseModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" | "normal" => Ok(NoiseModel::Gaussian),
            "uniform" => Ok(NoiseModel::Uniform),
            other => Err(anyhow::anyhow!("Unknown noise model: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanditStrategy {
    ThompsonSampling,
    UpperConfidenceBound,
    EpsilonGreedy,
}

impl FromStr for BanditStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "thompson" | "thompson_sampling" => Ok(BanditStrategy::ThompsonSampling),
            "ucb" | "upper_confidence_bound" => Ok(BanditStrategy::UpperConfidenceBound),
            "epsilon" | "epsilon_greedy" => Ok(BanditStrategy::EpsilonGreedy),
            other => Err(anyhow::anyhow!("Unknown bandit strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditConfig {
    pub strategy: BanditStrategy,
    pub exploration_rate: f64,
    pub noise_model: NoiseModel,
    pub sample_cap: usize,
    /// Fixed seed for reproducible selection; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            strategy: BanditStrategy::ThompsonSampling,
            exploration_rate: EXPLORATION_RATE,
            noise_model: NoiseModel::Gaussian,
            sample_cap: ACTION_MODEL_SAMPLE_CAP,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub autonomous_threshold: f64,
    pub assisted_threshold: f64,
    pub bandit_weight: f64,
    pub pattern_weight: f64,
    pub context_weight: f64,
    pub history_cap: usize,
    pub history_window: usize,
    pub metrics_window: usize,
    /// Minutes east of UTC for time-of-day buckets; host local time when absent.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            autonomous_threshold: AUTONOMOUS_THRESHOLD,
            assisted_threshold: ASSISTED_THRESHOLD,
            bandit_weight: BANDIT_WEIGHT,
            pattern_weight: PATTERN_WEIGHT,
            context_weight: CONTEXT_WEIGHT,
            history_cap: DECISION_HISTORY_CAP,
            history_window: PATTERN_HISTORY_WINDOW,
            metrics_window: METRICS_WINDOW,
            utc_offset_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub min_occurrences: usize,
    pub min_support: usize,
    pub similarity_threshold: f64,
    pub preference_threshold: f64,
    pub fetch_limit: usize,
    /// Minutes east of UTC for time-of-day buckets; host local time when absent.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_occurrences: MIN_PATTERN_OCCURRENCES,
            min_support: 3,
            similarity_threshold: 0.8,
            preference_threshold: PREFERENCE_CONFIDENCE_THRESHOLD,
            fetch_limit: INTERACTION_FETCH_LIMIT,
            utc_offset_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub initial_learning_rate: f64,
    pub min_learning_rate: f64,
    pub max_learning_rate: f64,
    pub session_cap: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            initial_learning_rate: INITIAL_LEARNING_RATE,
            min_learning_rate: MIN_LEARNING_RATE,
            max_learning_rate: MAX_LEARNING_RATE,
            session_cap: 500,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub bandit: BanditConfig,
    pub orchestrator: OrchestratorConfig,
    pub patterns: PatternConfig,
    pub feedback: FeedbackConfig,
}

/// Fixed offset for a configured minute count. Out-of-range values yield `None`.
pub fn fixed_offset(utc_offset_minutes: Option<i32>) -> Option<FixedOffset> {
    utc_offset_minutes.and_then(|minutes| FixedOffset::east_opt(minutes.checked_mul(60)?))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Load configuration from `AGENTIC_*` environment variables, falling back to the policy defaults
    pub fn from_env() -> Result<Self> {
        if dotenv::dotenv().is_ok() {
            info!("Loaded environment variables from .env");
        }

        let defaults = EngineConfig::default();

        let seed = match env::var("AGENTIC_SEED") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid value for AGENTIC_SEED: {}", raw))?,
            ),
            Err(_) => None,
        };

        let utc_offset_minutes = match env::var("AGENTIC_UTC_OFFSET_MINUTES") {
            Ok(raw) => {
                let minutes = raw.parse::<i32>().with_context(|| {
                    format!("Invalid value for AGENTIC_UTC_OFFSET_MINUTES: {}", raw)
                })?;
                if fixed_offset(Some(minutes)).is_none() {
                    return Err(anyhow::anyhow!("UTC offset out of range: {} minutes", minutes));
                }
                Some(minutes)
            }
            Err(_) => None,
        };

        let config = EngineConfig {
            bandit: BanditConfig {
                strategy: env_or("AGENTIC_STRATEGY", defaults.bandit.strategy)?,
                exploration_rate: env_or(
                    "AGENTIC_EXPLORATION_RATE",
                    defaults.bandit.exploration_rate,
                )?,
                noise_model: env_or("AGENTIC_NOISE_MODEL", defaults.bandit.noise_model)?,
                sample_cap: env_or("AGENTIC_SAMPLE_CAP", defaults.bandit.sample_cap)?,
                seed,
            },
            orchestrator: OrchestratorConfig {
                autonomous_threshold: env_or(
                    "AGENTIC_AUTONOMOUS_THRESHOLD",
                    defaults.orchestrator.autonomous_threshold,
                )?,
                assisted_threshold: env_or(
                    "AGENTIC_ASSISTED_THRESHOLD",
                    defaults.orchestrator.assisted_threshold,
                )?,
                history_cap: env_or("AGENTIC_HISTORY_CAP", defaults.orchestrator.history_cap)?,
                history_window: env_or(
                    "AGENTIC_HISTORY_WINDOW",
                    defaults.orchestrator.history_window,
                )?,
                utc_offset_minutes,
                ..defaults.orchestrator
            },
            patterns: PatternConfig {
                min_occurrences: env_or(
                    "AGENTIC_MIN_PATTERN_OCCURRENCES",
                    defaults.patterns.min_occurrences,
                )?,
                similarity_threshold: env_or(
                    "AGENTIC_SIMILARITY_THRESHOLD",
                    defaults.patterns.similarity_threshold,
                )?,
                utc_offset_minutes,
                ..defaults.patterns
            },
            feedback: FeedbackConfig {
                initial_learning_rate: env_or(
                    "AGENTIC_LEARNING_RATE",
                    defaults.feedback.initial_learning_rate,
                )?,
                ..defaults.feedback
            },
        };

        if config.orchestrator.assisted_threshold > config.orchestrator.autonomous_threshold {
            return Err(anyhow::anyhow!(
                "Assisted threshold {} exceeds autonomous threshold {}",
                config.orchestrator.assisted_threshold,
                config.orchestrator.autonomous_threshold
            ));
        }

        Ok(config)
    }
}
