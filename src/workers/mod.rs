// src/workers/mod.rs
//! Each stateful engine runs as a single tokio task that owns its state and
//! drains a command channel in arrival order. Handles are cheap clones of the
//! sending side; requests carry a oneshot for the reply.

pub mod agent;
pub mod feedback;
pub mod patterns;

pub use agent::AgentHandle;
pub use feedback::FeedbackLoopHandle;
pub use patterns::PatternEngineHandle;

use tokio::sync::{mpsc, oneshot};

use crate::error::{AgenticError, AgenticResult};

/// Capacity of every engine's command channel
pub const COMMAND_BUFFER: usize = 100;

/// Sends a command built around a fresh reply channel and waits for the answer.
pub(crate) async fn request<C, T>(
    tx: &mpsc::Sender<C>,
    worker: &'static str,
    make: impl FnOnce(oneshot::Sender<T>) -> C,
) -> AgenticResult<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(make(reply_tx))
        .await
        .map_err(|_| AgenticError::WorkerUnavailable(worker))?;
    reply_rx
        .await
        .map_err(|_| AgenticError::WorkerUnavailable(worker))
}

/// Sends a command without waiting for it to be handled.
pub(crate) async fn tell<C>(tx: &mpsc::Sender<C>, worker: &'static str, command: C) -> AgenticResult<()> {
    tx.send(command)
        .await
        .map_err(|_| AgenticError::WorkerUnavailable(worker))
}
