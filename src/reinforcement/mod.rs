// src/reinforcement/mod.rs
pub mod action_model;
pub mod agent;
pub mod bandit;
pub mod feature_extraction;
pub mod feedback_processor;
pub mod orchestrator;
pub mod types;

pub use action_model::ActionModel;
pub use agent::LocalAgent;
pub use bandit::ContextualBandit;
pub use feature_extraction::{encode_features, get_feature_metadata, FEATURE_COUNT};
pub use feedback_processor::{
    FeedbackCategory, FeedbackContext, FeedbackImpact, FeedbackLoop, FeedbackSessionSummary,
    FeedbackTrends, KeyLearning, LearningMetrics, LearningType, ProcessedFeedback, TrendDirection,
};
pub use orchestrator::{DecisionOrchestrator, DecisionStatistics, PerformanceMetrics};
pub use types::{FeatureMetadata, LearningRecord, RlAnalytics, RlContext, RlRecommendation, RlState};
