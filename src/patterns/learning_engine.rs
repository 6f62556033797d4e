// src/patterns/learning_engine.rs
use anyhow::Context;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::recognition::PatternRecognizer;
use super::types::{
    DefaultSource, LearnedPreferences, LearningSession, Pattern, PatternContext, PatternType,
    PredictedAction, SmartDefault, Suggestion,
};
use crate::config::PatternConfig;
use crate::error::AgenticResult;
use crate::models::{FeedbackKind, UserInteraction};
use crate::stores::{InteractionSource, PatternStore};

/// Keeps the set of discovered patterns and evolves it as interactions arrive.
pub struct PatternLearningEngine {
    config: PatternConfig,
    recognizer: PatternRecognizer,
    patterns: Vec<Pattern>,
    active_session: Option<LearningSession>,
    store: Arc<dyn PatternStore>,
    source: Arc<dyn InteractionSource>,
}

impl PatternLearningEngine {
    pub fn new(
        config: PatternConfig,
        store: Arc<dyn PatternStore>,
        source: Arc<dyn InteractionSource>,
    ) -> Self {
        Self {
            recognizer: PatternRecognizer::new(&config),
            config,
            patterns: Vec::new(),
            active_session: None,
            store,
            source,
        }
    }

    /// Replaces in-memory patterns with the store's contents. A failing store
    /// leaves the engine empty rather than refusing to start.
    pub async fn load(&mut self) {
        match self.store.load_all().await {
            Ok(patterns) => {
                info!("Loaded {} stored patterns", patterns.len());
                self.patterns = patterns;
            }
            Err(e) => {
                warn!("Failed to load stored patterns, starting empty: {:?}", e);
                self.patterns.clear();
            }
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn pattern(&self, id: Uuid) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn start_session(&mut self, user_id: &str, context_type: &str) -> Uuid {
        let session = LearningSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            start_time: Utc::now(),
            context_type: context_type.to_string(),
            interactions: Vec::new(),
        };
        let id = session.id;
        if self.active_session.replace(session).is_some() {
            warn!("Replaced an active learning session that was never ended");
        }
        info!("Started learning session for user {} in context {}", user_id, context_type);
        id
    }

    /// Adds the interaction to the active session (if any) and analyses it against
    /// recent history. Returns the ids of patterns that were updated or adopted.
    pub async fn record_interaction(&mut self, interaction: UserInteraction) -> AgenticResult<Vec<Uuid>> {
        if let Some(session) = self.active_session.as_mut() {
            session.interactions.push(interaction.clone());
        }

        let history = self
            .source
            .fetch_recent(self.config.fetch_limit)
            .await
            .context("Failed to fetch interaction history")?;

        let detected = self.recognizer.analyze(&interaction, &history);
        let mut touched = Vec::new();

        for candidate in detected {
            if let Some(existing) = self.patterns.iter_mut().find(|p| p.id == candidate.id) {
                existing.occurrences += 1;
                existing.last_occurrence = Utc::now();
                existing.refresh_confidence();
                let updated = existing.clone();
                self.persist(&updated).await?;
                touched.push(updated.id);
            } else if candidate.occurrences >= self.config.min_occurrences {
                debug!(
                    "Adopting new {} pattern {} ({} occurrences)",
                    candidate.pattern_type.as_str(),
                    candidate.id,
                    candidate.occurrences
                );
                self.persist(&candidate).await?;
                touched.push(candidate.id);
                self.patterns.push(candidate);
            }
        }

        debug!(
            "Recorded interaction '{}': {} patterns touched",
            interaction.interaction_type,
            touched.len()
        );
        Ok(touched)
    }

    /// Ends the active session, adopting its macro patterns that are confident
    /// enough. Returns the number adopted, or `None` without an active session.
    pub async fn end_session(&mut self) -> AgenticResult<Option<usize>> {
        let Some(session) = self.active_session.take() else {
            return Ok(None);
        };

        let mut adopted = 0;
        for pattern in self.recognizer.analyze_session(&session) {
            if pattern.confidence < self.config.preference_threshold
                || self.patterns.iter().any(|p| p.id == pattern.id)
            {
                continue;
            }
            self.persist(&pattern).await?;
            self.patterns.push(pattern);
            adopted += 1;
        }

        info!(
            "Ended learning session with {} interactions ({} patterns adopted)",
            session.interactions.len(),
            adopted
        );
        Ok(Some(adopted))
    }

    /// Patterns applicable to `context` with confidence at or above the preference threshold.
    pub fn learned_preferences(&self, context: &PatternContext) -> LearnedPreferences {
        let relevant: Vec<Pattern> = self
            .patterns
            .iter()
            .filter(|p| p.context.matches(context) && p.confidence >= self.config.preference_threshold)
            .cloned()
            .collect();

        let mut suggestions: Vec<Suggestion> = relevant
            .iter()
            .filter_map(|p| p.generate_suggestion(context))
            .collect();
        suggestions.sort_by(|a, b| {
            (b.relevance * b.confidence)
                .partial_cmp(&(a.relevance * a.confidence))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let confidence = if relevant.is_empty() {
            0.0
        } else {
            relevant.iter().map(|p| p.confidence).sum::<f64>() / relevant.len() as f64
        };

        LearnedPreferences {
            patterns: relevant,
            suggestions,
            confidence,
        }
    }

    pub fn predict_next_action(&self, current_step: &str) -> Option<PredictedAction> {
        self.patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::WorkflowSequence)
            .find_map(|p| p.predict_next(current_step))
    }

    /// Most confident learned value for a form field.
    pub fn smart_default(&self, form_type: &str, field_name: &str) -> Option<SmartDefault> {
        self.patterns
            .iter()
            .filter(|p| {
                p.pattern_type == PatternType::FieldValues
                    && p.metadata.get("formType").map(String::as_str) == Some(form_type)
                    && p.metadata.get("fieldName").map(String::as_str) == Some(field_name)
            })
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|best| SmartDefault {
                value: best.value.clone(),
                confidence: best.confidence,
                source: DefaultSource::Learned,
                last_used: best.last_occurrence,
            })
    }

    /// Multiplicative nudge from explicit feedback. Returns false for unknown patterns.
    pub async fn apply_feedback(&mut self, pattern_id: Uuid, kind: FeedbackKind) -> AgenticResult<bool> {
        let Some(pattern) = self.patterns.iter_mut().find(|p| p.id == pattern_id) else {
            debug!("Feedback for unknown pattern {}", pattern_id);
            return Ok(false);
        };
        pattern.apply_feedback(kind);
        let updated = pattern.clone();
        self.persist(&updated).await?;
        info!("Applied {:?} feedback to pattern {}", kind, pattern_id);
        Ok(true)
    }

    /// Additive confidence change, clamped. Returns the new confidence.
    pub async fn apply_confidence_adjustment(
        &mut self,
        pattern_id: Uuid,
        delta: f64,
    ) -> AgenticResult<Option<f64>> {
        let Some(pattern) = self.patterns.iter_mut().find(|p| p.id == pattern_id) else {
            return Ok(None);
        };
        pattern.confidence = (pattern.confidence + delta).clamp(0.0, 1.0);
        let updated = pattern.clone();
        self.persist(&updated).await?;
        Ok(Some(updated.confidence))
    }

    /// Read-only analysis: patterns visible for `interaction` given the most
    /// recent `window` interactions plus `extra` history. Nothing is adopted.
    pub async fn insights(
        &self,
        interaction: &UserInteraction,
        extra: &[UserInteraction],
        window: usize,
    ) -> AgenticResult<Vec<Pattern>> {
        let mut history = self
            .source
            .fetch_recent(window)
            .await
            .context("Failed to fetch interaction history for insights")?;
        history.extend_from_slice(extra);
        Ok(self.recognizer.analyze(interaction, &history))
    }

    async fn persist(&self, pattern: &Pattern) -> AgenticResult<()> {
        self.store
            .upsert(pattern)
            .await
            .with_context(|| format!("Failed to store pattern {}", pattern.id))?;
        Ok(())
    }
}
