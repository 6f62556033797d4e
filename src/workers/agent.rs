// src/workers/agent.rs
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};

use super::{request, COMMAND_BUFFER};
use crate::error::AgenticResult;
use crate::models::Action;
use crate::reinforcement::{LocalAgent, RlAnalytics, RlContext, RlRecommendation, RlState};

const WORKER: &str = "agent";

/// Commands understood by the agent task
pub enum AgentCommand {
    Recommend {
        state: RlState,
        context: RlContext,
        reply: oneshot::Sender<AgenticResult<RlRecommendation>>,
    },
    Learn {
        state: RlState,
        action: Action,
        reward: f64,
        next_state: Option<RlState>,
        reply: oneshot::Sender<()>,
    },
    LearningProgress {
        reply: oneshot::Sender<f64>,
    },
    Analytics {
        reply: oneshot::Sender<RlAnalytics>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the agent task
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    /// Moves the agent into a background task and returns a handle to it.
    /// The task stops once every handle is dropped.
    pub fn spawn(agent: LocalAgent) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(Self::worker_task(agent, rx));
        Self { tx }
    }

    async fn worker_task(mut agent: LocalAgent, mut rx: mpsc::Receiver<AgentCommand>) {
        info!("Agent worker started");

        while let Some(command) = rx.recv().await {
            match command {
                AgentCommand::Recommend {
                    state,
                    context,
                    reply,
                } => {
                    let _ = reply.send(agent.recommend(&state, &context));
                }
                AgentCommand::Learn {
                    state,
                    action,
                    reward,
                    next_state,
                    reply,
                } => {
                    agent.learn(&state, &action, reward, next_state);
                    let _ = reply.send(());
                }
                AgentCommand::LearningProgress { reply } => {
                    let _ = reply.send(agent.learning_progress());
                }
                AgentCommand::Analytics { reply } => {
                    let _ = reply.send(agent.analytics());
                }
                AgentCommand::Reset { reply } => {
                    agent.reset();
                    let _ = reply.send(());
                }
            }
        }

        debug!("Agent worker stopped: all handles dropped");
    }

    pub async fn recommend(&self, state: RlState, context: RlContext) -> AgenticResult<RlRecommendation> {
        request(&self.tx, WORKER, |reply| AgentCommand::Recommend {
            state,
            context,
            reply,
        })
        .await?
    }

    pub async fn learn(
        &self,
        state: RlState,
        action: Action,
        reward: f64,
        next_state: Option<RlState>,
    ) -> AgenticResult<()> {
        request(&self.tx, WORKER, |reply| AgentCommand::Learn {
            state,
            action,
            reward,
            next_state,
            reply,
        })
        .await
    }

    pub async fn learning_progress(&self) -> AgenticResult<f64> {
        request(&self.tx, WORKER, |reply| AgentCommand::LearningProgress { reply }).await
    }

    pub async fn analytics(&self) -> AgenticResult<RlAnalytics> {
        request(&self.tx, WORKER, |reply| AgentCommand::Analytics { reply }).await
    }

    pub async fn reset(&self) -> AgenticResult<()> {
        request(&self.tx, WORKER, |reply| AgentCommand::Reset { reply }).await
    }
}
