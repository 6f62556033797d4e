// src/patterns/recognition.rs
use chrono::{DateTime, FixedOffset, Utc};
use log::debug;
use std::collections::{BTreeMap, HashSet};

use super::algorithms::{
    cluster_values, find_repeating_sequences, mine_frequent_sequences, weighted_confidence,
};
use super::types::{LearningSession, Pattern, PatternContext, PatternType, PatternValue};
use crate::config::{fixed_offset, PatternConfig};
use crate::models::{TimeOfDay, UserInteraction};

// A pause longer than this starts a new field sequence
const FIELD_SEQUENCE_GAP_SECS: i64 = 30;
const WORKFLOW_WINDOW: usize = 10;
const MIN_TEMPORAL_INTERACTIONS: usize = 5;
// Fixed timing-consistency term of temporal confidence
const TEMPORAL_CONSISTENCY: f64 = 0.8;
const MIN_CLUSTER_MEMBERS: usize = 3;
const MIN_RANKED_CONFIDENCE: f64 = 0.5;

/// Stateless detector turning interaction history into candidate patterns.
#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    min_support: usize,
    similarity_threshold: f64,
    utc_offset: Option<FixedOffset>,
}

impl PatternRecognizer {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            min_support: config.min_support,
            similarity_threshold: config.similarity_threshold,
            utc_offset: fixed_offset(config.utc_offset_minutes),
        }
    }

    /// Runs every interaction-level analysis for `interaction` against `history`,
    /// then filters and ranks the combined result.
    pub fn analyze(&self, interaction: &UserInteraction, history: &[UserInteraction]) -> Vec<Pattern> {
        let mut detected = Vec::new();
        detected.extend(self.form_filling_patterns(interaction, history));
        detected.extend(self.workflow_patterns(interaction, history));
        detected.extend(self.temporal_patterns(interaction, history));
        detected.extend(self.field_value_patterns(interaction, history));

        let ranked = filter_and_rank(detected);
        debug!(
            "Analyzed '{}' against {} interactions: {} patterns",
            interaction.interaction_type,
            history.len(),
            ranked.len()
        );
        ranked
    }

    /// Macro patterns over a whole session: navigation path, workflow completion
    /// and error/correction pairs.
    pub fn analyze_session(&self, session: &LearningSession) -> Vec<Pattern> {
        let mut patterns = Vec::new();
        patterns.extend(navigation_pattern(session, self.utc_offset));
        patterns.extend(session_workflow_pattern(session));
        patterns.extend(error_correction_patterns(session));
        patterns
    }

    fn form_filling_patterns(&self, interaction: &UserInteraction, history: &[UserInteraction]) -> Vec<Pattern> {
        if interaction.interaction_type != "form_interaction" {
            return Vec::new();
        }

        let form_type = interaction.meta("formType").unwrap_or("");
        let similar: Vec<UserInteraction> = history
            .iter()
            .filter(|h| {
                h.interaction_type == "form_interaction" && h.meta("formType").unwrap_or("") == form_type
            })
            .cloned()
            .collect();

        let sequences = field_sequences(&similar);
        mine_frequent_sequences(&sequences, self.min_support)
            .into_iter()
            .map(|sequence| {
                let confidence =
                    weighted_confidence(sequence.support, similar.len(), &similar, interaction.timestamp);
                Pattern::new(
                    PatternType::FormFilling,
                    PatternValue::Sequence(sequence.items),
                    PatternContext {
                        form_type: Some(form_type.to_string()),
                        ..Default::default()
                    },
                    sequence.support,
                    confidence,
                    interaction.timestamp,
                )
                .with_meta("formType", form_type)
            })
            .collect()
    }

    fn workflow_patterns(&self, interaction: &UserInteraction, history: &[UserInteraction]) -> Vec<Pattern> {
        if interaction.interaction_type != "workflow_step" {
            return Vec::new();
        }

        let mut steps: Vec<&UserInteraction> = history
            .iter()
            .filter(|h| h.interaction_type == "workflow_step")
            .collect();
        steps.sort_by_key(|h| h.timestamp);
        let window: Vec<UserInteraction> = steps
            .iter()
            .skip(steps.len().saturating_sub(WORKFLOW_WINDOW))
            .map(|h| (*h).clone())
            .collect();

        let names: Vec<String> = window
            .iter()
            .map(|h| h.meta("stepName").unwrap_or("").to_string())
            .collect();

        let context = PatternContext {
            document_type: interaction.meta("documentType").map(str::to_string),
            workflow_phase: interaction.meta("phase").map(str::to_string),
            ..Default::default()
        };

        find_repeating_sequences(&names, 3, 2)
            .into_iter()
            .map(|run| {
                let confidence =
                    weighted_confidence(run.occurrences, names.len(), &window, interaction.timestamp);
                let length = run.sequence.len();
                Pattern::new(
                    PatternType::WorkflowSequence,
                    PatternValue::Sequence(run.sequence),
                    context.clone(),
                    run.occurrences,
                    confidence,
                    interaction.timestamp,
                )
                .with_meta("sequenceLength", length.to_string())
            })
            .collect()
    }

    fn temporal_patterns(&self, interaction: &UserInteraction, history: &[UserInteraction]) -> Vec<Pattern> {
        let bucket = TimeOfDay::from_timestamp(interaction.timestamp, self.utc_offset);

        let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
        for h in history {
            if TimeOfDay::from_timestamp(h.timestamp, self.utc_offset) == bucket {
                *by_type.entry(h.interaction_type.as_str()).or_insert(0) += 1;
            }
        }

        by_type
            .into_iter()
            .filter(|(_, count)| *count >= MIN_TEMPORAL_INTERACTIONS)
            .map(|(interaction_type, count)| {
                let frequency = (count as f64 / 10.0).min(1.0);
                Pattern::new(
                    PatternType::TimeOfDay,
                    PatternValue::Text(interaction_type.to_string()),
                    PatternContext {
                        time_of_day: Some(bucket),
                        ..Default::default()
                    },
                    count,
                    0.6 * frequency + 0.4 * TEMPORAL_CONSISTENCY,
                    interaction.timestamp,
                )
                .with_meta("timeOfDay", bucket.as_str())
            })
            .collect()
    }

    fn field_value_patterns(&self, interaction: &UserInteraction, history: &[UserInteraction]) -> Vec<Pattern> {
        if interaction.interaction_type != "field_input" {
            return Vec::new();
        }
        let (Some(field_name), Some(_)) = (interaction.meta("fieldName"), interaction.meta("value")) else {
            return Vec::new();
        };

        let values: Vec<String> = history
            .iter()
            .filter(|h| h.interaction_type == "field_input" && h.meta("fieldName") == Some(field_name))
            .filter_map(|h| h.meta("value").map(str::to_string))
            .collect();

        let form_type = interaction.meta("formType");
        cluster_values(&values, self.similarity_threshold)
            .into_iter()
            .filter(|cluster| cluster.members.len() >= MIN_CLUSTER_MEMBERS)
            .map(|cluster| {
                Pattern::new(
                    PatternType::FieldValues,
                    PatternValue::Text(cluster.centroid),
                    PatternContext {
                        form_type: form_type.map(str::to_string),
                        ..Default::default()
                    },
                    cluster.members.len(),
                    cluster.cohesion,
                    interaction.timestamp,
                )
                .with_meta("fieldName", field_name)
                .with_meta("formType", form_type.unwrap_or(""))
            })
            .collect()
    }
}

/// Field names in time order, split wherever consecutive entries are more than 30 s apart.
fn field_sequences(interactions: &[UserInteraction]) -> Vec<Vec<String>> {
    let mut sorted: Vec<&UserInteraction> = interactions.iter().collect();
    sorted.sort_by_key(|i| i.timestamp);

    let mut sequences = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut last: Option<DateTime<Utc>> = None;

    for interaction in sorted {
        let Some(field_name) = interaction.meta("fieldName") else {
            continue;
        };
        if let Some(previous) = last {
            if (interaction.timestamp - previous).num_seconds() > FIELD_SEQUENCE_GAP_SECS
                && !current.is_empty()
            {
                sequences.push(std::mem::take(&mut current));
            }
        }
        current.push(field_name.to_string());
        last = Some(interaction.timestamp);
    }

    if !current.is_empty() {
        sequences.push(current);
    }
    sequences
}

fn navigation_pattern(session: &LearningSession, utc_offset: Option<FixedOffset>) -> Option<Pattern> {
    let destinations: Vec<String> = session
        .interactions
        .iter()
        .filter(|i| i.interaction_type == "navigation")
        .filter_map(|i| i.meta("destination").map(str::to_string))
        .collect();

    if destinations.len() < 3 {
        return None;
    }

    let length = destinations.len();
    Some(
        Pattern::new(
            PatternType::NavigationPath,
            PatternValue::Sequence(destinations),
            PatternContext {
                workflow_phase: Some(session.context_type.clone()),
                time_of_day: Some(TimeOfDay::from_timestamp(session.start_time, utc_offset)),
                ..Default::default()
            },
            1,
            0.5,
            Utc::now(),
        )
        .with_meta("pathLength", length.to_string()),
    )
}

fn session_workflow_pattern(session: &LearningSession) -> Option<Pattern> {
    let steps: Vec<String> = session
        .interactions
        .iter()
        .filter(|i| i.interaction_type == "workflow_step")
        .filter_map(|i| i.meta("stepName").map(str::to_string))
        .collect();

    if steps.len() < 2 {
        return None;
    }

    let duration = session
        .interactions
        .last()
        .map(|i| (i.timestamp - session.start_time).num_seconds())
        .unwrap_or(0);

    Some(
        Pattern::new(
            PatternType::WorkflowSequence,
            PatternValue::Sequence(steps),
            PatternContext {
                document_type: Some(session.context_type.clone()),
                ..Default::default()
            },
            1,
            0.6,
            Utc::now(),
        )
        .with_meta("totalDuration", duration.to_string()),
    )
}

fn error_correction_patterns(session: &LearningSession) -> Vec<Pattern> {
    session
        .interactions
        .windows(2)
        .filter(|pair| pair[0].interaction_type == "error" && pair[1].interaction_type == "correction")
        .map(|pair| {
            let error = pair[0].meta("errorType").unwrap_or("unknown").to_string();
            let correction = pair[1].meta("correctionType").unwrap_or("unknown").to_string();
            Pattern::new(
                PatternType::ErrorCorrection,
                PatternValue::ErrorCorrection {
                    error: error.clone(),
                    correction: correction.clone(),
                },
                PatternContext {
                    form_type: pair[0].meta("formType").map(str::to_string),
                    ..Default::default()
                },
                1,
                0.7,
                Utc::now(),
            )
            .with_meta("errorType", error)
            .with_meta("correctionType", correction)
        })
        .collect()
}

/// Drops confidences below 0.5, then duplicate ids (first survivor kept), then sorts
/// by confidence then occurrences, both descending.
pub fn filter_and_rank(patterns: Vec<Pattern>) -> Vec<Pattern> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Pattern> = patterns
        .into_iter()
        .filter(|p| p.confidence >= MIN_RANKED_CONFIDENCE)
        .filter(|p| seen.insert(p.id))
        .collect();

    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.occurrences.cmp(&a.occurrences))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn recognizer() -> PatternRecognizer {
        PatternRecognizer::new(&PatternConfig {
            utc_offset_minutes: Some(0),
            ..PatternConfig::default()
        })
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_form_filling_mines_sequences_per_form() {
        let mut history = Vec::new();
        // three sittings, each a quick run of the same three fields
        for sitting in 0..3 {
            let start = at(9, 0) + Duration::hours(sitting);
            for (i, field) in ["vendorName", "vendorUEI", "address"].iter().enumerate() {
                history.push(
                    UserInteraction::new("form_interaction", start + Duration::seconds(5 * i as i64))
                        .with_meta("formType", "SF-1449")
                        .with_meta("fieldName", *field),
                );
            }
        }
        // another form's fields are ignored
        history.push(
            UserInteraction::new("form_interaction", at(9, 1))
                .with_meta("formType", "SF-30")
                .with_meta("fieldName", "vendorName"),
        );

        let current = UserInteraction::new("form_interaction", at(12, 0)).with_meta("formType", "SF-1449");
        let patterns = recognizer().form_filling_patterns(&current, &history);

        assert_eq!(patterns.len(), 3);
        assert!(patterns.iter().all(|p| p.pattern_type == PatternType::FormFilling));
        assert!(patterns.iter().all(|p| p.occurrences == 3));
        assert!(patterns.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
        assert!(patterns
            .iter()
            .any(|p| p.value == PatternValue::Sequence(vec!["vendorName".into(), "vendorUEI".into()])));
    }

    #[test]
    fn test_workflow_repeats_detected() {
        let history: Vec<UserInteraction> = ["draft", "review", "sign", "draft", "review", "sign"]
            .iter()
            .enumerate()
            .map(|(i, step)| {
                UserInteraction::new("workflow_step", at(10, i as u32)).with_meta("stepName", *step)
            })
            .collect();
        let current = UserInteraction::new("workflow_step", at(10, 30))
            .with_meta("documentType", "Contract")
            .with_meta("phase", "execution");

        let patterns = recognizer().workflow_patterns(&current, &history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(
            patterns[0].value,
            PatternValue::Sequence(vec!["draft".into(), "review".into(), "sign".into()])
        );
        assert_eq!(patterns[0].occurrences, 2);
        assert_eq!(patterns[0].context.document_type.as_deref(), Some("Contract"));
    }

    #[test]
    fn test_temporal_bucket_follows_configured_offset() {
        let eastern = PatternRecognizer::new(&PatternConfig {
            utc_offset_minutes: Some(-300),
            ..PatternConfig::default()
        });
        // 14:00 UTC is 09:00 at UTC-5
        let history: Vec<UserInteraction> = (0..5)
            .map(|i| UserInteraction::new("search", at(14, i)))
            .collect();
        let current = UserInteraction::new("search", at(14, 30));

        let patterns = eastern.temporal_patterns(&current, &history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].context.time_of_day, Some(TimeOfDay::Morning));

        let patterns = recognizer().temporal_patterns(&current, &history);
        assert_eq!(patterns[0].context.time_of_day, Some(TimeOfDay::Afternoon));
    }

    #[test]
    fn test_temporal_needs_five_in_bucket() {
        let morning: Vec<UserInteraction> = (0..5)
            .map(|i| UserInteraction::new("search", at(8, i)))
            .collect();
        let current = UserInteraction::new("search", at(9, 0));

        let patterns = recognizer().temporal_patterns(&current, &morning);
        assert_eq!(patterns.len(), 1);
        // 0.6 * 0.5 + 0.4 * 0.8
        assert!((patterns[0].confidence - 0.62).abs() < 1e-12);
        assert_eq!(patterns[0].context.time_of_day, Some(TimeOfDay::Morning));

        let evening = UserInteraction::new("search", at(19, 0));
        assert!(recognizer().temporal_patterns(&evening, &morning).is_empty());
        assert!(recognizer().temporal_patterns(&current, &morning[..4]).is_empty());
    }

    #[test]
    fn test_field_values_cluster_into_defaults() {
        let history: Vec<UserInteraction> = ["Acme Corp", "acme corp", "ACME CORP", "Globex"]
            .iter()
            .enumerate()
            .map(|(i, value)| {
                UserInteraction::new("field_input", at(11, i as u32))
                    .with_meta("fieldName", "vendorName")
                    .with_meta("value", *value)
            })
            .collect();
        let current = UserInteraction::new("field_input", at(11, 30))
            .with_meta("fieldName", "vendorName")
            .with_meta("value", "acme")
            .with_meta("formType", "SF-1449");

        let patterns = recognizer().field_value_patterns(&current, &history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 3);
        assert_eq!(patterns[0].confidence, 1.0);
        assert_eq!(patterns[0].metadata.get("fieldName").map(String::as_str), Some("vendorName"));

        let missing_value = UserInteraction::new("field_input", at(11, 31)).with_meta("fieldName", "vendorName");
        assert!(recognizer().field_value_patterns(&missing_value, &history).is_empty());
    }

    #[test]
    fn test_filter_and_rank() {
        let make = |steps: &[&str], occurrences: usize, confidence: f64| {
            Pattern::new(
                PatternType::WorkflowSequence,
                PatternValue::Sequence(steps.iter().map(|s| s.to_string()).collect()),
                PatternContext::default(),
                occurrences,
                confidence,
                Utc::now(),
            )
        };
        let patterns = vec![
            make(&["a"], 2, 0.7),
            make(&["b"], 5, 0.7),
            make(&["c"], 9, 0.49),
            make(&["a"], 8, 0.95),
            make(&["d"], 1, 0.9),
            make(&["e"], 6, 0.4),
            make(&["e"], 4, 0.8),
        ];
        let ranked = filter_and_rank(patterns);
        let order: Vec<usize> = ranked.iter().map(|p| p.occurrences).collect();
        // duplicate "a" dropped, low-confidence "c" dropped, weak first "e" does not shadow the strong one
        assert_eq!(order, vec![1, 4, 5, 2]);
    }

    #[test]
    fn test_session_analysis() {
        let start = at(14, 0);
        let mut session = LearningSession {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            start_time: start,
            context_type: "Contract".to_string(),
            interactions: Vec::new(),
        };
        for (i, dest) in ["home", "forms", "sf1449"].iter().enumerate() {
            session.interactions.push(
                UserInteraction::new("navigation", start + Duration::seconds(i as i64))
                    .with_meta("destination", *dest),
            );
        }
        session.interactions.push(
            UserInteraction::new("error", start + Duration::seconds(10)).with_meta("errorType", "missing_uei"),
        );
        session.interactions.push(
            UserInteraction::new("correction", start + Duration::seconds(20))
                .with_meta("correctionType", "lookup_uei"),
        );
        session
            .interactions
            .push(UserInteraction::new("workflow_step", start + Duration::seconds(30)).with_meta("stepName", "draft"));

        let patterns = recognizer().analyze_session(&session);
        // one workflow step only: no workflow pattern
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].pattern_type, PatternType::NavigationPath);
        assert_eq!(patterns[0].confidence, 0.5);
        assert_eq!(
            patterns[1].value,
            PatternValue::ErrorCorrection {
                error: "missing_uei".into(),
                correction: "lookup_uei".into()
            }
        );
    }
}
