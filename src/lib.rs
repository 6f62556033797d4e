// src/lib.rs
pub mod config;
pub mod error;
pub mod models;
pub mod patterns;
pub mod reinforcement;
pub mod stores;
pub mod workers;

// Re-export common types for easier access
pub use models::{
    Action, ActionParameters, ActionType, AgenticDecision, DecisionFeedback, DecisionFeedbackType,
    DecisionRequest, DecisionTier, FeedbackKind, RiskLevel, UserFeedback, UserInteraction,
};

// Re-export important functionality
pub use config::EngineConfig;
pub use error::{AgenticError, AgenticResult};
pub use reinforcement::DecisionOrchestrator;
pub use stores::{InMemoryInteractionLog, InMemoryPatternStore};
