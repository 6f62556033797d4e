// src/models.rs

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgenticError, AgenticResult};

//------------------------------------------------------------------------------
// ACTIONS
//------------------------------------------------------------------------------

/// The fixed set of things the agent can propose to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FillField,
    GenerateDocument,
    SuggestNextStep,
    RequestManualInput,
    ValidateCompliance,
    OptimizeWorkflow,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::FillField,
        ActionType::GenerateDocument,
        ActionType::SuggestNextStep,
        ActionType::RequestManualInput,
        ActionType::ValidateCompliance,
        ActionType::OptimizeWorkflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::FillField => "fill_field",
            ActionType::GenerateDocument => "generate_document",
            ActionType::SuggestNextStep => "suggest_next_step",
            ActionType::RequestManualInput => "request_manual_input",
            ActionType::ValidateCompliance => "validate_compliance",
            ActionType::OptimizeWorkflow => "optimize_workflow",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionType::FillField => "Auto-fill form field based on patterns",
            ActionType::GenerateDocument => "Generate document from template",
            ActionType::SuggestNextStep => "Suggest next workflow step",
            ActionType::RequestManualInput => "Request manual user input",
            ActionType::ValidateCompliance => "Validate regulatory compliance",
            ActionType::OptimizeWorkflow => "Optimize workflow efficiency",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Learned,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLevel {
    Thorough,
    Standard,
}

/// Parameters an action carries, one variant per action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionParameters {
    FillField {
        suggested_value: Option<String>,
        based_on_patterns: bool,
        confidence: f64,
    },
    GenerateDocument {
        template: TemplateKind,
    },
    SuggestNextStep {
        next_steps: Vec<String>,
        confidence: Option<f64>,
    },
    RequestManualInput {
        reason: String,
        alternatives: Vec<ActionType>,
    },
    ValidateCompliance {
        check_level: CheckLevel,
    },
    OptimizeWorkflow {
        optimization: String,
        expected_improvement: String,
    },
}

impl ActionParameters {
    /// Neutral parameters for a type, used when an action is created without context.
    pub fn default_for(action_type: ActionType) -> Self {
        match action_type {
            ActionType::FillField => ActionParameters::FillField {
                suggested_value: None,
                based_on_patterns: false,
                confidence: 0.0,
            },
            ActionType::GenerateDocument => ActionParameters::GenerateDocument {
                template: TemplateKind::Standard,
            },
            ActionType::SuggestNextStep => ActionParameters::SuggestNextStep {
                next_steps: Vec::new(),
                confidence: None,
            },
            ActionType::RequestManualInput => ActionParameters::RequestManualInput {
                reason: String::new(),
                alternatives: Vec::new(),
            },
            ActionType::ValidateCompliance => ActionParameters::ValidateCompliance {
                check_level: CheckLevel::Standard,
            },
            ActionType::OptimizeWorkflow => ActionParameters::OptimizeWorkflow {
                optimization: "efficiency".to_string(),
                expected_improvement: "15-30%".to_string(),
            },
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            ActionParameters::FillField { .. } => ActionType::FillField,
            ActionParameters::GenerateDocument { .. } => ActionType::GenerateDocument,
            ActionParameters::SuggestNextStep { .. } => ActionType::SuggestNextStep,
            ActionParameters::RequestManualInput { .. } => ActionType::RequestManualInput,
            ActionParameters::ValidateCompliance { .. } => ActionType::ValidateCompliance,
            ActionParameters::OptimizeWorkflow { .. } => ActionType::OptimizeWorkflow,
        }
    }

    fn expected_name(action_type: ActionType) -> &'static str {
        match action_type {
            ActionType::FillField => "FillField parameters",
            ActionType::GenerateDocument => "GenerateDocument parameters",
            ActionType::SuggestNextStep => "SuggestNextStep parameters",
            ActionType::RequestManualInput => "RequestManualInput parameters",
            ActionType::ValidateCompliance => "ValidateCompliance parameters",
            ActionType::OptimizeWorkflow => "OptimizeWorkflow parameters",
        }
    }
}

/// A concrete proposal. Many actions may share a type; the bandit learns per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub action_type: ActionType,
    pub parameters: ActionParameters,
    pub description: String,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            parameters: ActionParameters::default_for(action_type),
            description: action_type.description().to_string(),
        }
    }

    /// Builds an action, rejecting parameters that belong to a different action type.
    pub fn with_parameters(
        action_type: ActionType,
        parameters: ActionParameters,
    ) -> AgenticResult<Self> {
        if parameters.action_type() != action_type {
            return Err(AgenticError::InvalidParameters {
                action_type,
                expected: ActionParameters::expected_name(action_type),
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            action_type,
            parameters,
            description: action_type.description().to_string(),
        })
    }
}

//------------------------------------------------------------------------------
// CONTEXT CLASSIFIERS
//------------------------------------------------------------------------------

/// Ordered risk classification, each level carrying a numeric weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn weight(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.2,
            RiskLevel::Medium => 0.5,
            RiskLevel::High => 0.8,
            RiskLevel::Critical => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,   // 06:00 - 12:00
    Afternoon, // 12:00 - 18:00
    Evening,   // 18:00 - 22:00
    Night,     // 22:00 - 06:00
}

impl TimeOfDay {
    /// Bucket for the wall-clock hour at `offset`, or in the host's local time zone when none is given.
    pub fn from_timestamp(timestamp: DateTime<Utc>, offset: Option<FixedOffset>) -> Self {
        let hour = match offset {
            Some(offset) => timestamp.with_timezone(&offset).hour(),
            None => timestamp.with_timezone(&Local).hour(),
        };
        Self::from_hour(hour)
    }

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            18..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            TimeOfDay::Morning => 0,
            TimeOfDay::Afternoon => 1,
            TimeOfDay::Evening => 2,
            TimeOfDay::Night => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

//------------------------------------------------------------------------------
// INTERACTIONS
//------------------------------------------------------------------------------

/// One observed user interaction, read from the host's interaction history.
///
/// Well-known metadata keys: `formType`, `fieldName`, `value`, `stepName`,
/// `documentType`, `phase`, `destination`, `errorType`, `correctionType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub id: Uuid,
    pub interaction_type: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl UserInteraction {
    pub fn new(interaction_type: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            interaction_type: interaction_type.into(),
            timestamp,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

//------------------------------------------------------------------------------
// DECISIONS
//------------------------------------------------------------------------------

/// Inbound request for a decision from the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub id: Uuid,
    pub request_type: String,
    pub document_type: Option<String>,
    pub form_type: Option<String>,
    pub workflow_phase: Option<String>,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    pub context: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl DecisionRequest {
    pub fn new(request_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_type: request_type.into(),
            document_type: None,
            form_type: None,
            workflow_phase: None,
            completed_steps: Vec::new(),
            pending_steps: Vec::new(),
            context: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// `fieldCount` from the context, accepting integers or numeric strings.
    pub fn field_count(&self) -> usize {
        match self.context.get("fieldCount") {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn step_count(&self) -> usize {
        self.completed_steps.len() + self.pending_steps.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTier {
    Manual,
    Assisted,
    Autonomous,
}

impl DecisionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionTier::Manual => "manual",
            DecisionTier::Assisted => "assisted",
            DecisionTier::Autonomous => "autonomous",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticRecommendation {
    pub action: Action,
    pub parameters: ActionParameters,
    pub reasoning: String,
    pub confidence: f64,
    pub alternatives: Vec<Action>,
}

/// Outbound decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticDecision {
    pub id: Uuid,
    pub tier: DecisionTier,
    pub recommendation: AgenticRecommendation,
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub request: DecisionRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgenticOutcome {
    Success { reward: f64 },
    Partial { reward: f64 },
    Failure { penalty: f64 },
}

/// Entry in the orchestrator's decision history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticAction {
    pub id: Uuid,
    pub decision: AgenticDecision,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub outcome: Option<AgenticOutcome>,
}

//------------------------------------------------------------------------------
// FEEDBACK
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionFeedbackType {
    Accepted,
    Modified,
    Rejected,
    Error,
}

impl DecisionFeedbackType {
    /// Fixed reward policy for each feedback type.
    pub fn reward(&self) -> f64 {
        match self {
            DecisionFeedbackType::Accepted => 1.0,
            DecisionFeedbackType::Modified => 0.5,
            DecisionFeedbackType::Rejected => -0.5,
            DecisionFeedbackType::Error => -1.0,
        }
    }

    pub fn outcome(&self) -> AgenticOutcome {
        let reward = self.reward();
        match self {
            DecisionFeedbackType::Accepted => AgenticOutcome::Success { reward },
            DecisionFeedbackType::Modified => AgenticOutcome::Partial { reward },
            DecisionFeedbackType::Rejected | DecisionFeedbackType::Error => {
                AgenticOutcome::Failure { penalty: reward }
            }
        }
    }
}

/// Feedback about a decision previously returned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionFeedback {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub feedback_type: DecisionFeedbackType,
    pub pattern_id: Option<Uuid>,
    pub resulting_state: Option<crate::reinforcement::RlState>,
    pub timestamp: DateTime<Utc>,
    pub comment: Option<String>,
}

impl DecisionFeedback {
    pub fn new(decision_id: Uuid, feedback_type: DecisionFeedbackType) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_id,
            feedback_type,
            pattern_id: None,
            resulting_state: None,
            timestamp: Utc::now(),
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Negative,
    Neutral,
}

/// Feedback about a learned pattern or suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFeedback {
    pub id: Uuid,
    pub pattern_id: Option<Uuid>,
    pub kind: FeedbackKind,
    pub timestamp: DateTime<Utc>,
    /// Free-form tag describing where the feedback came from, e.g. `automatic_suggestion_accepted`.
    pub context: Option<String>,
}

impl UserFeedback {
    pub fn new(pattern_id: Option<Uuid>, kind: FeedbackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern_id,
            kind,
            timestamp: Utc::now(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
