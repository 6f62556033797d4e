// src/patterns/mod.rs
pub mod algorithms;
pub mod learning_engine;
pub mod recognition;
pub mod types;

pub use learning_engine::PatternLearningEngine;
pub use recognition::{filter_and_rank, PatternRecognizer};
pub use types::{
    DefaultSource, LearnedPreferences, LearningSession, Pattern, PatternContext, PatternType,
    PatternValue, PredictedAction, SmartDefault, Suggestion, SuggestionType,
};
