// src/workers/patterns.rs
use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{request, COMMAND_BUFFER};
use crate::error::AgenticResult;
use crate::models::{FeedbackKind, UserInteraction};
use crate::patterns::{
    LearnedPreferences, Pattern, PatternContext, PatternLearningEngine, PredictedAction, SmartDefault,
};
use crate::stores::PreferenceStore;

const WORKER: &str = "pattern engine";

/// Commands understood by the pattern engine task
pub enum PatternCommand {
    RecordInteraction {
        interaction: UserInteraction,
        reply: oneshot::Sender<AgenticResult<Vec<Uuid>>>,
    },
    StartSession {
        user_id: String,
        context_type: String,
        reply: oneshot::Sender<Uuid>,
    },
    EndSession {
        reply: oneshot::Sender<AgenticResult<Option<usize>>>,
    },
    LearnedPreferences {
        context: PatternContext,
        reply: oneshot::Sender<LearnedPreferences>,
    },
    PredictNext {
        current_step: String,
        reply: oneshot::Sender<Option<PredictedAction>>,
    },
    SmartDefault {
        form_type: String,
        field_name: String,
        reply: oneshot::Sender<Option<SmartDefault>>,
    },
    ApplyFeedback {
        pattern_id: Uuid,
        kind: FeedbackKind,
        reply: oneshot::Sender<AgenticResult<bool>>,
    },
    AdjustConfidence {
        pattern_id: Uuid,
        delta: f64,
        reply: oneshot::Sender<AgenticResult<Option<f64>>>,
    },
    PatternConfidence {
        pattern_id: Uuid,
        reply: oneshot::Sender<Option<f64>>,
    },
    Insights {
        interaction: UserInteraction,
        extra: Vec<UserInteraction>,
        window: usize,
        reply: oneshot::Sender<AgenticResult<Vec<Pattern>>>,
    },
    Patterns {
        reply: oneshot::Sender<Vec<Pattern>>,
    },
}

/// Handle to the pattern engine task
#[derive(Clone)]
pub struct PatternEngineHandle {
    tx: mpsc::Sender<PatternCommand>,
}

impl PatternEngineHandle {
    /// Loads stored patterns inside the new task before the first command is served.
    pub fn spawn(engine: PatternLearningEngine) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(Self::worker_task(engine, rx));
        Self { tx }
    }

    async fn worker_task(mut engine: PatternLearningEngine, mut rx: mpsc::Receiver<PatternCommand>) {
        engine.load().await;
        info!("Pattern engine worker started with {} patterns", engine.patterns().len());

        while let Some(command) = rx.recv().await {
            match command {
                PatternCommand::RecordInteraction { interaction, reply } => {
                    let _ = reply.send(engine.record_interaction(interaction).await);
                }
                PatternCommand::StartSession {
                    user_id,
                    context_type,
                    reply,
                } => {
                    let _ = reply.send(engine.start_session(&user_id, &context_type));
                }
                PatternCommand::EndSession { reply } => {
                    let _ = reply.send(engine.end_session().await);
                }
                PatternCommand::LearnedPreferences { context, reply } => {
                    let _ = reply.send(engine.learned_preferences(&context));
                }
                PatternCommand::PredictNext { current_step, reply } => {
                    let _ = reply.send(engine.predict_next_action(&current_step));
                }
                PatternCommand::SmartDefault {
                    form_type,
                    field_name,
                    reply,
                } => {
                    let _ = reply.send(engine.smart_default(&form_type, &field_name));
                }
                PatternCommand::ApplyFeedback {
                    pattern_id,
                    kind,
                    reply,
                } => {
                    let _ = reply.send(engine.apply_feedback(pattern_id, kind).await);
                }
                PatternCommand::AdjustConfidence {
                    pattern_id,
                    delta,
                    reply,
                } => {
                    let _ = reply.send(engine.apply_confidence_adjustment(pattern_id, delta).await);
                }
                PatternCommand::PatternConfidence { pattern_id, reply } => {
                    let _ = reply.send(engine.pattern(pattern_id).map(|p| p.confidence));
                }
                PatternCommand::Insights {
                    interaction,
                    extra,
                    window,
                    reply,
                } => {
                    let _ = reply.send(engine.insights(&interaction, &extra, window).await);
                }
                PatternCommand::Patterns { reply } => {
                    let _ = reply.send(engine.patterns().to_vec());
                }
            }
        }

        debug!("Pattern engine worker stopped: all handles dropped");
    }

    pub async fn record_interaction(&self, interaction: UserInteraction) -> AgenticResult<Vec<Uuid>> {
        request(&self.tx, WORKER, |reply| PatternCommand::RecordInteraction { interaction, reply }).await?
    }

    pub async fn start_session(&self, user_id: &str, context_type: &str) -> AgenticResult<Uuid> {
        request(&self.tx, WORKER, |reply| PatternCommand::StartSession {
            user_id: user_id.to_string(),
            context_type: context_type.to_string(),
            reply,
        })
        .await
    }

    pub async fn end_session(&self) -> AgenticResult<Option<usize>> {
        request(&self.tx, WORKER, |reply| PatternCommand::EndSession { reply }).await?
    }

    pub async fn learned_preferences(&self, context: PatternContext) -> AgenticResult<LearnedPreferences> {
        request(&self.tx, WORKER, |reply| PatternCommand::LearnedPreferences { context, reply }).await
    }

    pub async fn predict_next_action(&self, current_step: &str) -> AgenticResult<Option<PredictedAction>> {
        request(&self.tx, WORKER, |reply| PatternCommand::PredictNext {
            current_step: current_step.to_string(),
            reply,
        })
        .await
    }

    pub async fn smart_default(&self, form_type: &str, field_name: &str) -> AgenticResult<Option<SmartDefault>> {
        request(&self.tx, WORKER, |reply| PatternCommand::SmartDefault {
            form_type: form_type.to_string(),
            field_name: field_name.to_string(),
            reply,
        })
        .await
    }

    pub async fn apply_feedback(&self, pattern_id: Uuid, kind: FeedbackKind) -> AgenticResult<bool> {
        request(&self.tx, WORKER, |reply| PatternCommand::ApplyFeedback {
            pattern_id,
            kind,
            reply,
        })
        .await?
    }

    pub async fn apply_confidence_adjustment(&self, pattern_id: Uuid, delta: f64) -> AgenticResult<Option<f64>> {
        request(&self.tx, WORKER, |reply| PatternCommand::AdjustConfidence {
            pattern_id,
            delta,
            reply,
        })
        .await?
    }

    pub async fn pattern_confidence(&self, pattern_id: Uuid) -> AgenticResult<Option<f64>> {
        request(&self.tx, WORKER, |reply| PatternCommand::PatternConfidence { pattern_id, reply }).await
    }

    pub async fn insights(
        &self,
        interaction: UserInteraction,
        extra: Vec<UserInteraction>,
        window: usize,
    ) -> AgenticResult<Vec<Pattern>> {
        request(&self.tx, WORKER, |reply| PatternCommand::Insights {
            interaction,
            extra,
            window,
            reply,
        })
        .await?
    }

    pub async fn patterns(&self) -> AgenticResult<Vec<Pattern>> {
        request(&self.tx, WORKER, |reply| PatternCommand::Patterns { reply }).await
    }
}

#[async_trait]
impl PreferenceStore for PatternEngineHandle {
    async fn learned_preferences(&self, context: &PatternContext) -> anyhow::Result<LearnedPreferences> {
        Ok(PatternEngineHandle::learned_preferences(self, context.clone()).await?)
    }
}
