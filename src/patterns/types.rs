// src/patterns/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{FeedbackKind, TimeOfDay, UserInteraction};

// Namespace for deterministic pattern ids, so re-detecting the same behavior maps to the same pattern.
const PATTERN_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_4c1e_9a53_0d2b_8e71_f4a6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    FormFilling,
    DocumentType,
    WorkflowSequence,
    TimeOfDay,
    FieldValues,
    NavigationPath,
    ErrorCorrection,
    SearchQueries,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::FormFilling => "form_filling",
            PatternType::DocumentType => "document_type",
            PatternType::WorkflowSequence => "workflow_sequence",
            PatternType::TimeOfDay => "time_of_day",
            PatternType::FieldValues => "field_values",
            PatternType::NavigationPath => "navigation_path",
            PatternType::ErrorCorrection => "error_correction",
            PatternType::SearchQueries => "search_queries",
        }
    }
}

/// Payload of a pattern; its shape depends on the pattern type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PatternValue {
    Sequence(Vec<String>),
    Text(String),
    ErrorCorrection { error: String, correction: String },
}

impl PatternValue {
    fn key(&self) -> String {
        match self {
            PatternValue::Sequence(items) => items.join(","),
            PatternValue::Text(text) => text.clone(),
            PatternValue::ErrorCorrection { error, correction } => {
                format!("{}->{}", error, correction)
            }
        }
    }
}

/// Which contexts a pattern applies to. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternContext {
    pub form_type: Option<String>,
    pub document_type: Option<String>,
    pub workflow_phase: Option<String>,
    pub time_of_day: Option<TimeOfDay>,
}

impl PatternContext {
    pub fn matches(&self, other: &PatternContext) -> bool {
        fn compatible(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        compatible(&self.form_type, &other.form_type)
            && compatible(&self.document_type, &other.document_type)
            && compatible(&self.workflow_phase, &other.workflow_phase)
    }

    fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.form_type.as_deref().unwrap_or(""),
            self.document_type.as_deref().unwrap_or(""),
            self.workflow_phase.as_deref().unwrap_or(""),
            self.time_of_day.map(|t| t.as_str()).unwrap_or("")
        )
    }
}

/// A recurring user behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub pattern_type: PatternType,
    pub value: PatternValue,
    pub context: PatternContext,
    pub occurrences: usize,
    pub confidence: f64,
    pub last_occurrence: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Pattern {
    pub fn new(
        pattern_type: PatternType,
        value: PatternValue,
        context: PatternContext,
        occurrences: usize,
        confidence: f64,
        last_occurrence: DateTime<Utc>,
    ) -> Self {
        let id = Self::derive_id(pattern_type, &value, &context);
        Self {
            id,
            pattern_type,
            value,
            context,
            occurrences,
            confidence: confidence.clamp(0.0, 1.0),
            last_occurrence,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn derive_id(pattern_type: PatternType, value: &PatternValue, context: &PatternContext) -> Uuid {
        let key = format!("{}#{}#{}", pattern_type.as_str(), value.key(), context.key());
        Uuid::new_v5(&PATTERN_NAMESPACE, key.as_bytes())
    }

    /// Growth with occurrences. Never lowers confidence.
    pub fn refresh_confidence(&mut self) {
        let from_occurrences = (self.occurrences as f64 / 10.0).min(1.0);
        self.confidence = self.confidence.max(from_occurrences).clamp(0.0, 1.0);
    }

    /// Explicit feedback nudge: x1.1 for positive, x0.9 for negative.
    pub fn apply_feedback(&mut self, kind: FeedbackKind) {
        self.confidence = match kind {
            FeedbackKind::Positive => (self.confidence * 1.1).min(1.0),
            FeedbackKind::Negative => (self.confidence * 0.9).max(0.0),
            FeedbackKind::Neutral => self.confidence,
        };
    }

    pub fn predict_next(&self, current_step: &str) -> Option<PredictedAction> {
        if self.pattern_type != PatternType::WorkflowSequence {
            return None;
        }
        let PatternValue::Sequence(steps) = &self.value else {
            return None;
        };
        let index = steps.iter().position(|s| s == current_step)?;
        let next = steps.get(index + 1)?;

        Some(PredictedAction {
            action: next.clone(),
            confidence: self.confidence,
            alternative_actions: Vec::new(),
        })
    }

    pub fn generate_suggestion(&self, context: &PatternContext) -> Option<Suggestion> {
        if !self.context.matches(context) {
            return None;
        }

        Some(Suggestion {
            id: Uuid::new_v4(),
            pattern_id: self.id,
            suggestion_type: SuggestionType::from(self.pattern_type),
            value: self.value.clone(),
            reason: "Based on your past behavior".to_string(),
            confidence: self.confidence,
            relevance: self.relevance_to(context),
        })
    }

    fn relevance_to(&self, context: &PatternContext) -> f64 {
        let mut relevance = 0.0;
        if self.context.form_type == context.form_type {
            relevance += 0.3;
        }
        if self.context.document_type == context.document_type {
            relevance += 0.3;
        }
        if self.context.workflow_phase == context.workflow_phase {
            relevance += 0.2;
        }
        if self.context.time_of_day == context.time_of_day {
            relevance += 0.2;
        }
        relevance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    FormCompletion,
    DocumentSelection,
    NextStep,
    FieldValue,
    Navigation,
    General,
}

impl From<PatternType> for SuggestionType {
    fn from(pattern_type: PatternType) -> Self {
        match pattern_type {
            PatternType::FormFilling => SuggestionType::FormCompletion,
            PatternType::DocumentType => SuggestionType::DocumentSelection,
            PatternType::WorkflowSequence => SuggestionType::NextStep,
            PatternType::FieldValues => SuggestionType::FieldValue,
            PatternType::NavigationPath => SuggestionType::Navigation,
            _ => SuggestionType::General,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub pattern_id: Uuid,
    pub suggestion_type: SuggestionType,
    pub value: PatternValue,
    pub reason: String,
    pub confidence: f64,
    pub relevance: f64,
}

/// Patterns relevant to a query context plus their aggregate confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedPreferences {
    pub patterns: Vec<Pattern>,
    pub suggestions: Vec<Suggestion>,
    pub confidence: f64,
}

impl LearnedPreferences {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_pattern_type(&self, pattern_type: PatternType) -> bool {
        self.patterns.iter().any(|p| p.pattern_type == pattern_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedAction {
    pub action: String,
    pub confidence: f64,
    pub alternative_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSource {
    Learned,
    Historical,
    Regulation,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartDefault {
    pub value: PatternValue,
    pub confidence: f64,
    pub source: DefaultSource,
    pub last_used: DateTime<Utc>,
}

/// A bounded run of interactions analysed as a whole when it ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSession {
    pub id: Uuid,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub context_type: String,
    pub interactions: Vec<UserInteraction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence_pattern(steps: &[&str]) -> Pattern {
        Pattern::new(
            PatternType::WorkflowSequence,
            PatternValue::Sequence(steps.iter().map(|s| s.to_string()).collect()),
            PatternContext::default(),
            3,
            0.6,
            Utc::now(),
        )
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a = sequence_pattern(&["draft", "review", "sign"]);
        let b = sequence_pattern(&["draft", "review", "sign"]);
        let c = sequence_pattern(&["draft", "sign"]);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_context_matching_ignores_unset_fields() {
        let pattern_ctx = PatternContext {
            form_type: Some("SF-1449".to_string()),
            ..Default::default()
        };
        let query = PatternContext {
            form_type: Some("SF-1449".to_string()),
            document_type: Some("Contract".to_string()),
            ..Default::default()
        };
        assert!(pattern_ctx.matches(&query));

        let other = PatternContext {
            form_type: Some("SF-30".to_string()),
            ..Default::default()
        };
        assert!(!pattern_ctx.matches(&other));
    }

    #[test]
    fn test_feedback_nudges_are_clamped() {
        let mut pattern = sequence_pattern(&["a", "b", "c"]);
        pattern.confidence = 0.95;
        pattern.apply_feedback(FeedbackKind::Positive);
        assert_eq!(pattern.confidence, 1.0);
        pattern.apply_feedback(FeedbackKind::Negative);
        assert!((pattern.confidence - 0.9).abs() < 1e-12);
        pattern.apply_feedback(FeedbackKind::Neutral);
        assert!((pattern.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_never_lowers_confidence() {
        let mut pattern = sequence_pattern(&["a", "b", "c"]);
        pattern.confidence = 0.8;
        pattern.occurrences = 4;
        pattern.refresh_confidence();
        assert_eq!(pattern.confidence, 0.8);
        pattern.occurrences = 9;
        pattern.refresh_confidence();
        assert!((pattern.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_predict_next_step() {
        let pattern = sequence_pattern(&["draft", "review", "sign"]);
        let next = pattern.predict_next("review").expect("next step");
        assert_eq!(next.action, "sign");
        assert!(pattern.predict_next("sign").is_none());
        assert!(pattern.predict_next("unknown").is_none());
    }
}
