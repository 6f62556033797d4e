// src/reinforcement/feature_extraction.rs
use super::types::{FeatureMetadata, RlContext, RlState};

const PHASES: [&str; 6] = [
    "planning",
    "requirements",
    "execution",
    "implementation",
    "review",
    "approval",
];

const DOCUMENT_TYPES: [&str; 4] = ["sf-1449", "contract", "rfp", "statement"];

/// Length of every vector produced by [`encode_features`].
pub const FEATURE_COUNT: usize = PHASES.len() + DOCUMENT_TYPES.len() + 8;

fn metadata(name: &str, description: &str, min_value: f64, max_value: f64) -> FeatureMetadata {
    FeatureMetadata {
        name: name.to_string(),
        description: description.to_string(),
        min_value,
        max_value,
    }
}

// Feature metadata, in encoding order
pub fn get_feature_metadata() -> Vec<FeatureMetadata> {
    let mut features = Vec::with_capacity(FEATURE_COUNT);

    // Phase indicators (index 0-5)
    for phase in PHASES {
        features.push(metadata(
            &format!("phase_{}", phase),
            &format!("Workflow phase mentions '{}'.", phase),
            0.0,
            1.0,
        ));
    }

    // Document type indicators (index 6-9)
    for doc in DOCUMENT_TYPES {
        features.push(metadata(
            &format!("document_{}", doc.replace('-', "_")),
            &format!("Document type mentions '{}'.", doc),
            0.0,
            1.0,
        ));
    }

    // State numerics (index 10-13)
    features.push(metadata(
        "state_complexity",
        "Complexity derived from document type and step count.",
        0.0,
        1.0,
    ));
    features.push(metadata(
        "user_experience",
        "Estimated user experience.",
        0.0,
        1.0,
    ));
    features.push(metadata(
        "completed_steps",
        "Number of completed workflow steps.",
        0.0,
        f64::MAX,
    ));
    features.push(metadata(
        "pending_steps",
        "Number of pending workflow steps.",
        0.0,
        f64::MAX,
    ));

    // Context numerics (index 14-17)
    features.push(metadata(
        "pattern_confidence",
        "Aggregate confidence of learned patterns relevant to the request.",
        0.0,
        1.0,
    ));
    features.push(metadata(
        "context_complexity",
        "Complexity including field count and dependencies.",
        0.0,
        1.0,
    ));
    features.push(metadata("risk_weight", "Numeric weight of the risk level.", 0.0, 1.0));
    features.push(metadata(
        "time_of_day",
        "Time-of-day bucket ordinal (morning=0 .. night=3).",
        0.0,
        3.0,
    ));

    features
}

/// Encodes state and context into a fixed-length feature vector. Pure.
pub fn encode_features(state: &RlState, context: &RlContext) -> Vec<f64> {
    let mut features = Vec::with_capacity(FEATURE_COUNT);

    let phase = state.phase.to_lowercase();
    for candidate in PHASES {
        features.push(if phase.contains(candidate) { 1.0 } else { 0.0 });
    }

    let document_type = state.document_type.as_deref().map(str::to_lowercase);
    for candidate in DOCUMENT_TYPES {
        let hit = document_type
            .as_deref()
            .map(|d| d.contains(candidate))
            .unwrap_or(false);
        features.push(if hit { 1.0 } else { 0.0 });
    }

    features.push(state.complexity);
    features.push(state.user_experience);
    features.push(state.completed_steps.len() as f64);
    features.push(state.pending_steps.len() as f64);

    features.push(context.patterns.confidence);
    features.push(context.complexity);
    features.push(context.risk.weight());
    features.push(context.time_context.ordinal() as f64);

    debug_assert_eq!(features.len(), FEATURE_COUNT);
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionRequest, RiskLevel, TimeOfDay};

    #[test]
    fn test_metadata_matches_encoding_length() {
        assert_eq!(get_feature_metadata().len(), FEATURE_COUNT);
        assert_eq!(FEATURE_COUNT, 18);
    }

    #[test]
    fn test_encoding_is_fixed_length() {
        let empty = RlState::from_request(&DecisionRequest::new("x"));
        assert_eq!(encode_features(&empty, &RlContext::empty()).len(), FEATURE_COUNT);

        let mut request = DecisionRequest::new("x");
        request.workflow_phase = Some("Contract Review and Approval".to_string());
        request.document_type = Some("SF-1449".to_string());
        request.completed_steps = (0..40).map(|i| format!("step{}", i)).collect();
        let busy = RlState::from_request(&request);
        let context = RlContext {
            risk: RiskLevel::High,
            time_context: TimeOfDay::Night,
            ..RlContext::empty()
        };
        let features = encode_features(&busy, &context);
        assert_eq!(features.len(), FEATURE_COUNT);
        // review + approval one-hots
        assert_eq!(features[4], 1.0);
        assert_eq!(features[5], 1.0);
        // sf-1449
        assert_eq!(features[6], 1.0);
        assert_eq!(features[12], 40.0);
        assert_eq!(features[16], 0.8);
        assert_eq!(features[17], 3.0);
    }
}
