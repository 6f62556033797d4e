// src/reinforcement/feedback_processor.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use uuid::Uuid;

use crate::config::{FeedbackConfig, LEARNING_HISTORY_CAP};
use crate::models::{FeedbackKind, UserFeedback};

// Items considered when measuring feedback consistency
const CONSISTENCY_WINDOW: usize = 10;
const REINFORCEMENT_HISTORY_CAP: usize = 100;
const REINFORCEMENT_KEY_CAP: usize = LEARNING_HISTORY_CAP;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Implicit,
    Explicit,
    Behavioral,
}

impl FeedbackCategory {
    /// How much a processed item of this category is trusted.
    pub fn weight(&self) -> f64 {
        match self {
            FeedbackCategory::Implicit => 0.6,
            FeedbackCategory::Explicit => 0.9,
            FeedbackCategory::Behavioral => 0.75,
        }
    }

    /// Category from the feedback's context tag; untagged feedback is explicit.
    pub fn of(feedback: &UserFeedback) -> Self {
        match feedback.context.as_deref() {
            Some(ctx) if ctx.contains("automatic") => FeedbackCategory::Implicit,
            Some(ctx) if ctx.contains("user_action") => FeedbackCategory::Behavioral,
            _ => FeedbackCategory::Explicit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackImpact {
    Positive,
    Negative,
    Neutral,
}

impl FeedbackImpact {
    fn implicit(feedback: &UserFeedback) -> Self {
        let Some(ctx) = feedback.context.as_deref() else {
            return FeedbackImpact::Neutral;
        };
        if ctx.contains("accepted") || ctx.contains("used") {
            FeedbackImpact::Positive
        } else if ctx.contains("rejected") || ctx.contains("ignored") {
            FeedbackImpact::Negative
        } else {
            FeedbackImpact::Neutral
        }
    }

    fn explicit(feedback: &UserFeedback) -> Self {
        match feedback.kind {
            FeedbackKind::Positive => FeedbackImpact::Positive,
            FeedbackKind::Negative => FeedbackImpact::Negative,
            FeedbackKind::Neutral => FeedbackImpact::Neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedFeedback {
    pub id: Uuid,
    pub original: UserFeedback,
    pub category: FeedbackCategory,
    pub impact: FeedbackImpact,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub target_pattern_id: Option<Uuid>,
    pub current_confidence: f64,
    /// Delta to apply to the target pattern; keeps its confidence inside [0, 1].
    pub adjustment: f64,
}

impl ProcessedFeedback {
    pub fn adjusted_confidence(&self) -> f64 {
        (self.current_confidence + self.adjustment).clamp(0.0, 1.0)
    }
}

/// Confidence delta for a (feedback kind, impact) pair at a given learning rate.
pub fn confidence_adjustment(
    current_confidence: f64,
    kind: FeedbackKind,
    impact: FeedbackImpact,
    learning_rate: f64,
) -> f64 {
    let raw = match (kind, impact) {
        (FeedbackKind::Positive, FeedbackImpact::Positive) => learning_rate,
        (FeedbackKind::Negative, FeedbackImpact::Negative) => -learning_rate,
        // contradictory signal
        (FeedbackKind::Positive, FeedbackImpact::Negative)
        | (FeedbackKind::Negative, FeedbackImpact::Positive) => -learning_rate * 0.5,
        _ => 0.0,
    };

    (current_confidence + raw).clamp(0.0, 1.0) - current_confidence
}

/// Learning rate that speeds up while feedback agrees with itself and slows down when it doesn't.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRateController {
    current: f64,
    min: f64,
    max: f64,
}

impl LearningRateController {
    pub fn new(config: &FeedbackConfig) -> Self {
        let min = config.min_learning_rate.min(config.max_learning_rate);
        let max = config.max_learning_rate.max(min);
        Self {
            current: config.initial_learning_rate.clamp(min, max),
            min,
            max,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn adjust(&mut self, consistency: f64) {
        if consistency > 0.8 {
            self.current = (self.current * 1.1).min(self.max);
        } else if consistency < 0.5 {
            self.current = (self.current * 0.9).max(self.min);
        }
    }
}

/// Per-pattern reward history, last 100 rewards each. At most `key_cap` ids are
/// tracked; the least recently reinforced id is evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinforcementEngine {
    history: HashMap<Uuid, RewardTrack>,
    key_cap: usize,
    tick: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RewardTrack {
    rewards: VecDeque<f64>,
    last_reinforced: u64,
}

impl Default for ReinforcementEngine {
    fn default() -> Self {
        Self::with_key_cap(REINFORCEMENT_KEY_CAP)
    }
}

impl ReinforcementEngine {
    pub fn with_key_cap(key_cap: usize) -> Self {
        Self {
            history: HashMap::new(),
            key_cap: key_cap.max(1),
            tick: 0,
        }
    }

    pub fn reinforce(&mut self, pattern_id: Uuid, reward: f64) {
        self.tick += 1;
        if !self.history.contains_key(&pattern_id) && self.history.len() >= self.key_cap {
            self.evict_stalest();
        }

        let track = self.history.entry(pattern_id).or_default();
        track.last_reinforced = self.tick;
        track.rewards.push_back(reward);
        while track.rewards.len() > REINFORCEMENT_HISTORY_CAP {
            track.rewards.pop_front();
        }
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .history
            .iter()
            .min_by_key(|(_, track)| track.last_reinforced)
            .map(|(id, _)| *id);
        if let Some(id) = stalest {
            self.history.remove(&id);
            debug!("Evicted reward history for {}", id);
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.history.len()
    }

    pub fn apply_learning(&mut self, learning: &KeyLearning) {
        let reward = match learning.learning_type {
            LearningType::Reinforce => learning.strength,
            LearningType::Suppress => -learning.strength,
        };
        self.reinforce(learning.pattern_id, reward);
    }

    pub fn average_reward(&self, pattern_id: Uuid) -> Option<f64> {
        let rewards = &self.history.get(&pattern_id)?.rewards;
        if rewards.is_empty() {
            return None;
        }
        Some(rewards.iter().sum::<f64>() / rewards.len() as f64)
    }

    pub fn reward_count(&self, pattern_id: Uuid) -> usize {
        self.history
            .get(&pattern_id)
            .map(|track| track.rewards.len())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackContext {
    pub user_id: String,
    pub feature: String,
    pub metadata: HashMap<String, String>,
}

impl FeedbackContext {
    pub fn new(user_id: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            feature: feature.into(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSession {
    pub id: Uuid,
    pub context: FeedbackContext,
    pub start_time: DateTime<Utc>,
    pub items: Vec<UserFeedback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningType {
    Reinforce,
    Suppress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyLearning {
    pub pattern_id: Uuid,
    pub learning_type: LearningType,
    pub strength: f64,
    pub evidence: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSessionSummary {
    pub session_id: Uuid,
    pub duration_secs: i64,
    pub total_feedback: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub effectiveness: f64,
    pub key_learnings: Vec<KeyLearning>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningMetrics {
    pub total_feedback_processed: usize,
    pub positive_feedback_count: usize,
    pub negative_feedback_count: usize,
    pub neutral_feedback_count: usize,
    pub session_count: usize,
    pub average_session_effectiveness: f64,
    pub total_reinforcements: usize,
    pub average_reward: f64,
    pub last_updated: DateTime<Utc>,
}

impl Default for LearningMetrics {
    fn default() -> Self {
        Self {
            total_feedback_processed: 0,
            positive_feedback_count: 0,
            negative_feedback_count: 0,
            neutral_feedback_count: 0,
            session_count: 0,
            average_session_effectiveness: 0.0,
            total_reinforcements: 0,
            average_reward: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl LearningMetrics {
    /// Positive ratio, decayed by up to 20% as the last update ages towards a day.
    pub fn effectiveness(&self, now: DateTime<Utc>) -> f64 {
        if self.total_feedback_processed == 0 {
            return 0.5;
        }
        let positive_ratio = self.positive_feedback_count as f64 / self.total_feedback_processed as f64;
        let days = (now - self.last_updated).num_seconds() as f64 / 86_400.0;
        let staleness = days.clamp(0.0, 1.0);
        positive_ratio * (1.0 - staleness * 0.2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub total_feedback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTrends {
    pub daily: Vec<DailyTrend>,
    pub moving_average_7_day: f64,
    pub moving_average_30_day: f64,
    pub direction: TrendDirection,
}

impl FeedbackTrends {
    fn from_daily(daily: Vec<DailyTrend>) -> Self {
        let average_of_last = |n: usize| {
            let tail = &daily[daily.len().saturating_sub(n)..];
            if tail.is_empty() {
                0.0
            } else {
                tail.iter().map(|d| d.positive_ratio).sum::<f64>() / tail.len() as f64
            }
        };
        let ma7 = average_of_last(7);
        let ma30 = average_of_last(30);

        let direction = if daily.is_empty() {
            TrendDirection::Stable
        } else if ma7 > ma30 * 1.1 {
            TrendDirection::Improving
        } else if ma7 < ma30 * 0.9 {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        Self {
            daily,
            moving_average_7_day: ma7,
            moving_average_30_day: ma30,
            direction,
        }
    }
}

/// Turns raw user feedback into pattern-confidence adjustments and keeps the
/// metrics needed to judge whether learning is working.
#[derive(Debug)]
pub struct FeedbackLoop {
    history: VecDeque<ProcessedFeedback>,
    history_cap: usize,
    metrics: LearningMetrics,
    rate: LearningRateController,
    reinforcement: ReinforcementEngine,
    sessions: HashMap<Uuid, FeedbackSession>,
    session_cap: usize,
}

impl FeedbackLoop {
    pub fn new(config: &FeedbackConfig) -> Self {
        Self {
            history: VecDeque::new(),
            history_cap: LEARNING_HISTORY_CAP,
            metrics: LearningMetrics::default(),
            rate: LearningRateController::new(config),
            reinforcement: ReinforcementEngine::default(),
            sessions: HashMap::new(),
            session_cap: config.session_cap.max(1),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.rate.current()
    }

    pub fn metrics(&self) -> &LearningMetrics {
        &self.metrics
    }

    pub fn reinforcement(&self) -> &ReinforcementEngine {
        &self.reinforcement
    }

    pub fn history(&self) -> impl Iterator<Item = &ProcessedFeedback> {
        self.history.iter()
    }

    /// Categorises the feedback and computes the pattern adjustment at the current
    /// learning rate. Does not change any state.
    pub fn process(&self, feedback: &UserFeedback, current_confidence: f64) -> ProcessedFeedback {
        let category = FeedbackCategory::of(feedback);
        let impact = match category {
            FeedbackCategory::Implicit => FeedbackImpact::implicit(feedback),
            FeedbackCategory::Explicit => FeedbackImpact::explicit(feedback),
            FeedbackCategory::Behavioral => FeedbackImpact::Neutral,
        };
        let current_confidence = current_confidence.clamp(0.0, 1.0);
        let adjustment = confidence_adjustment(current_confidence, feedback.kind, impact, self.rate.current());

        ProcessedFeedback {
            id: Uuid::new_v4(),
            original: feedback.clone(),
            category,
            impact,
            confidence: category.weight(),
            timestamp: Utc::now(),
            target_pattern_id: feedback.pattern_id,
            current_confidence,
            adjustment,
        }
    }

    /// Folds a processed item into metrics and history, then retunes the learning rate.
    pub fn record(&mut self, processed: ProcessedFeedback) {
        self.metrics.total_feedback_processed += 1;
        match processed.impact {
            FeedbackImpact::Positive => self.metrics.positive_feedback_count += 1,
            FeedbackImpact::Negative => self.metrics.negative_feedback_count += 1,
            FeedbackImpact::Neutral => self.metrics.neutral_feedback_count += 1,
        }
        self.metrics.last_updated = processed.timestamp;

        info!(
            "Processed {:?} feedback ({:?}) with impact {:?}",
            processed.original.kind, processed.category, processed.impact
        );

        self.history.push_back(processed);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }

        let consistency = self.consistency();
        self.rate.adjust(consistency);
        debug!(
            "Feedback consistency {:.2}, learning rate now {:.4}",
            consistency,
            self.rate.current()
        );
    }

    /// Share of same-pattern pairs among the last 10 items that agree on impact.
    fn consistency(&self) -> f64 {
        let recent: Vec<&ProcessedFeedback> = self
            .history
            .iter()
            .skip(self.history.len().saturating_sub(CONSISTENCY_WINDOW))
            .collect();
        if recent.len() < 2 {
            return 1.0;
        }

        let mut total = 0usize;
        let mut consistent = 0usize;
        for i in 0..recent.len() - 1 {
            for j in (i + 1)..recent.len() {
                if recent[i].target_pattern_id == recent[j].target_pattern_id {
                    total += 1;
                    if recent[i].impact == recent[j].impact {
                        consistent += 1;
                    }
                }
            }
        }

        if total == 0 {
            1.0
        } else {
            consistent as f64 / total as f64
        }
    }

    pub fn apply_reinforcement(&mut self, pattern_id: Uuid, reward: f64) {
        self.reinforcement.reinforce(pattern_id, reward);

        self.metrics.total_reinforcements += 1;
        let n = self.metrics.total_reinforcements as f64;
        self.metrics.average_reward = (self.metrics.average_reward * (n - 1.0) + reward) / n;
    }

    pub fn start_session(&mut self, context: FeedbackContext) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            FeedbackSession {
                id,
                context,
                start_time: Utc::now(),
                items: Vec::new(),
            },
        );
        info!("Started feedback session: {}", id);
        id
    }

    /// Adds feedback to an open session. False when the session is unknown or full.
    pub fn add_to_session(&mut self, session_id: Uuid, feedback: UserFeedback) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            warn!("No active feedback session found: {}", session_id);
            return false;
        };
        if session.items.len() >= self.session_cap {
            warn!(
                "Feedback session {} is full ({} items), dropping feedback",
                session_id, self.session_cap
            );
            return false;
        }
        session.items.push(feedback);
        true
    }

    pub fn end_session(&mut self, session_id: Uuid) -> Option<FeedbackSessionSummary> {
        let Some(session) = self.sessions.remove(&session_id) else {
            warn!("No active feedback session found: {}", session_id);
            return None;
        };

        let summary = summarize_session(&session, Utc::now());
        for learning in &summary.key_learnings {
            self.reinforcement.apply_learning(learning);
        }

        self.metrics.session_count += 1;
        let n = self.metrics.session_count as f64;
        self.metrics.average_session_effectiveness =
            (self.metrics.average_session_effectiveness * (n - 1.0) + summary.effectiveness) / n;

        info!(
            "Ended feedback session: {} with {} items",
            session_id, summary.total_feedback
        );
        Some(summary)
    }

    pub fn learning_effectiveness(&self) -> f64 {
        self.metrics.effectiveness(Utc::now())
    }

    /// Daily positive/negative ratios over the trailing `period`, with 7- and 30-day averages.
    pub fn feedback_trends(&self, period: Duration, now: DateTime<Utc>) -> FeedbackTrends {
        let cutoff = now
            .checked_sub_signed(period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut by_day: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();

        for item in self.history.iter().filter(|f| f.timestamp > cutoff) {
            let day = by_day.entry(item.timestamp.date_naive()).or_insert((0, 0, 0));
            match item.impact {
                FeedbackImpact::Positive => day.0 += 1,
                FeedbackImpact::Negative => day.1 += 1,
                FeedbackImpact::Neutral => {}
            }
            day.2 += 1;
        }

        let daily = by_day
            .into_iter()
            .map(|(date, (positive, negative, total))| DailyTrend {
                date,
                positive_ratio: positive as f64 / total.max(1) as f64,
                negative_ratio: negative as f64 / total.max(1) as f64,
                total_feedback: total,
            })
            .collect();

        FeedbackTrends::from_daily(daily)
    }
}

fn summarize_session(session: &FeedbackSession, now: DateTime<Utc>) -> FeedbackSessionSummary {
    let count = |kind: FeedbackKind| session.items.iter().filter(|f| f.kind == kind).count();
    let positive_count = count(FeedbackKind::Positive);
    let negative_count = count(FeedbackKind::Negative);
    let neutral_count = count(FeedbackKind::Neutral);
    let total = session.items.len();

    let key_learnings = key_learnings(&session.items);
    let recommendations = key_learnings
        .iter()
        .map(|l| {
            let verb = match l.learning_type {
                LearningType::Reinforce => "Increase",
                LearningType::Suppress => "Decrease",
            };
            format!(
                "{} confidence for pattern {} by {}%",
                verb,
                l.pattern_id,
                (l.strength * 100.0) as i64
            )
        })
        .collect();

    FeedbackSessionSummary {
        session_id: session.id,
        duration_secs: (now - session.start_time).num_seconds(),
        total_feedback: total,
        positive_count,
        negative_count,
        neutral_count,
        effectiveness: positive_count as f64 / total.max(1) as f64,
        key_learnings,
        recommendations,
    }
}

/// Patterns with a lopsided verdict: more than twice as many positives as negatives, or vice versa.
fn key_learnings(items: &[UserFeedback]) -> Vec<KeyLearning> {
    let mut by_pattern: BTreeMap<Uuid, (usize, usize, usize)> = BTreeMap::new();
    for item in items {
        let Some(pattern_id) = item.pattern_id else {
            continue;
        };
        let entry = by_pattern.entry(pattern_id).or_insert((0, 0, 0));
        match item.kind {
            FeedbackKind::Positive => entry.0 += 1,
            FeedbackKind::Negative => entry.1 += 1,
            FeedbackKind::Neutral => {}
        }
        entry.2 += 1;
    }

    by_pattern
        .into_iter()
        .filter_map(|(pattern_id, (positive, negative, total))| {
            let (learning_type, count) = if positive > negative * 2 {
                (LearningType::Reinforce, positive)
            } else if negative > positive * 2 {
                (LearningType::Suppress, negative)
            } else {
                return None;
            };
            Some(KeyLearning {
                pattern_id,
                learning_type,
                strength: count as f64 / total as f64,
                evidence: total,
            })
        })
        .collect()
}
