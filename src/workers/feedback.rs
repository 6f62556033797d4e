// src/workers/feedback.rs
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{request, tell, PatternEngineHandle, COMMAND_BUFFER};
use crate::error::AgenticResult;
use crate::models::UserFeedback;
use crate::reinforcement::{FeedbackContext, FeedbackLoop, FeedbackSessionSummary, FeedbackTrends, LearningMetrics};

const WORKER: &str = "feedback loop";

// Confidence assumed for patterns the pattern engine doesn't know
const UNKNOWN_PATTERN_CONFIDENCE: f64 = 0.5;

/// Commands understood by the feedback loop task
pub enum FeedbackCommand {
    /// Fire-and-forget
    Process(UserFeedback),
    ApplyReinforcement {
        pattern_id: Uuid,
        reward: f64,
        reply: oneshot::Sender<()>,
    },
    StartSession {
        context: FeedbackContext,
        reply: oneshot::Sender<Uuid>,
    },
    AddToSession {
        session_id: Uuid,
        feedback: UserFeedback,
        reply: oneshot::Sender<bool>,
    },
    EndSession {
        session_id: Uuid,
        reply: oneshot::Sender<Option<FeedbackSessionSummary>>,
    },
    Effectiveness {
        reply: oneshot::Sender<f64>,
    },
    Trends {
        period: Duration,
        reply: oneshot::Sender<FeedbackTrends>,
    },
    LearningRate {
        reply: oneshot::Sender<f64>,
    },
    Metrics {
        reply: oneshot::Sender<LearningMetrics>,
    },
    AverageReward {
        pattern_id: Uuid,
        reply: oneshot::Sender<Option<f64>>,
    },
}

/// Handle to the feedback loop task
#[derive(Clone)]
pub struct FeedbackLoopHandle {
    tx: mpsc::Sender<FeedbackCommand>,
}

impl FeedbackLoopHandle {
    /// Pattern confidences are read from and written back through `patterns`.
    pub fn spawn(feedback_loop: FeedbackLoop, patterns: PatternEngineHandle) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(Self::worker_task(feedback_loop, patterns, rx));
        Self { tx }
    }

    async fn worker_task(
        mut feedback_loop: FeedbackLoop,
        patterns: PatternEngineHandle,
        mut rx: mpsc::Receiver<FeedbackCommand>,
    ) {
        info!("Feedback loop worker started");

        while let Some(command) = rx.recv().await {
            match command {
                FeedbackCommand::Process(feedback) => {
                    Self::process(&mut feedback_loop, &patterns, feedback).await;
                }
                FeedbackCommand::ApplyReinforcement {
                    pattern_id,
                    reward,
                    reply,
                } => {
                    feedback_loop.apply_reinforcement(pattern_id, reward);
                    let _ = reply.send(());
                }
                FeedbackCommand::StartSession { context, reply } => {
                    let _ = reply.send(feedback_loop.start_session(context));
                }
                FeedbackCommand::AddToSession {
                    session_id,
                    feedback,
                    reply,
                } => {
                    let _ = reply.send(feedback_loop.add_to_session(session_id, feedback));
                }
                FeedbackCommand::EndSession { session_id, reply } => {
                    let _ = reply.send(feedback_loop.end_session(session_id));
                }
                FeedbackCommand::Effectiveness { reply } => {
                    let _ = reply.send(feedback_loop.learning_effectiveness());
                }
                FeedbackCommand::Trends { period, reply } => {
                    let _ = reply.send(feedback_loop.feedback_trends(period, Utc::now()));
                }
                FeedbackCommand::LearningRate { reply } => {
                    let _ = reply.send(feedback_loop.learning_rate());
                }
                FeedbackCommand::Metrics { reply } => {
                    let _ = reply.send(feedback_loop.metrics().clone());
                }
                FeedbackCommand::AverageReward { pattern_id, reply } => {
                    let _ = reply.send(feedback_loop.reinforcement().average_reward(pattern_id));
                }
            }
        }

        debug!("Feedback loop worker stopped: all handles dropped");
    }

    async fn process(feedback_loop: &mut FeedbackLoop, patterns: &PatternEngineHandle, feedback: UserFeedback) {
        let current = match feedback.pattern_id {
            Some(id) => match patterns.pattern_confidence(id).await {
                Ok(confidence) => confidence.unwrap_or(UNKNOWN_PATTERN_CONFIDENCE),
                Err(e) => {
                    warn!("Could not read confidence for pattern {}: {}", id, e);
                    UNKNOWN_PATTERN_CONFIDENCE
                }
            },
            None => UNKNOWN_PATTERN_CONFIDENCE,
        };

        let processed = feedback_loop.process(&feedback, current);

        if let Some(pattern_id) = processed.target_pattern_id {
            if processed.adjustment != 0.0 {
                match patterns
                    .apply_confidence_adjustment(pattern_id, processed.adjustment)
                    .await
                {
                    Ok(Some(confidence)) => debug!(
                        "Adjusted pattern {} by {:+.4} to {:.4}",
                        pattern_id, processed.adjustment, confidence
                    ),
                    Ok(None) => debug!("Adjustment skipped: pattern {} is not known", pattern_id),
                    Err(e) => warn!("Failed to adjust pattern {}: {}", pattern_id, e),
                }
            }
        }

        feedback_loop.record(processed);
    }

    /// Queues feedback for processing and returns immediately.
    pub async fn process_feedback(&self, feedback: UserFeedback) -> AgenticResult<()> {
        tell(&self.tx, WORKER, FeedbackCommand::Process(feedback)).await
    }

    pub async fn apply_reinforcement(&self, pattern_id: Uuid, reward: f64) -> AgenticResult<()> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::ApplyReinforcement {
            pattern_id,
            reward,
            reply,
        })
        .await
    }

    pub async fn start_session(&self, context: FeedbackContext) -> AgenticResult<Uuid> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::StartSession { context, reply }).await
    }

    pub async fn add_to_session(&self, session_id: Uuid, feedback: UserFeedback) -> AgenticResult<bool> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::AddToSession {
            session_id,
            feedback,
            reply,
        })
        .await
    }

    pub async fn end_session(&self, session_id: Uuid) -> AgenticResult<Option<FeedbackSessionSummary>> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::EndSession { session_id, reply }).await
    }

    pub async fn learning_effectiveness(&self) -> AgenticResult<f64> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::Effectiveness { reply }).await
    }

    pub async fn feedback_trends(&self, period: Duration) -> AgenticResult<FeedbackTrends> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::Trends { period, reply }).await
    }

    pub async fn learning_rate(&self) -> AgenticResult<f64> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::LearningRate { reply }).await
    }

    pub async fn metrics(&self) -> AgenticResult<LearningMetrics> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::Metrics { reply }).await
    }

    pub async fn average_reward(&self, pattern_id: Uuid) -> AgenticResult<Option<f64>> {
        request(&self.tx, WORKER, |reply| FeedbackCommand::AverageReward { pattern_id, reply }).await
    }
}
