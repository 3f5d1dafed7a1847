use super::models::{QueueError, QueueStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

pub(crate) type QueueReply = oneshot::Sender<Result<QueueStatus, QueueError>>;

/// Command sent to the queue worker.
pub(crate) enum QueueCommand {
    Start {
        force_refresh: bool,
        response: QueueReply,
    },
    Pause {
        response: QueueReply,
    },
    Resume {
        response: QueueReply,
    },
    Cancel {
        response: QueueReply,
    },
}

/// Handle to control the enrichment queue from HTTP handlers or any other
/// adapter. Cheap to clone.
#[derive(Clone)]
pub struct QueueHandle {
    command_tx: mpsc::Sender<QueueCommand>,
    status: Arc<RwLock<QueueStatus>>,
}

impl QueueHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<QueueCommand>,
        status: Arc<RwLock<QueueStatus>>,
    ) -> Self {
        Self { command_tx, status }
    }

    /// Start a new session. Fails with [`QueueError::AlreadyRunning`] unless
    /// the queue is idle.
    pub async fn start(&self, force_refresh: bool) -> Result<QueueStatus, QueueError> {
        self.send(|response| QueueCommand::Start {
            force_refresh,
            response,
        })
        .await
    }

    /// Pause after the in-flight item. Pausing a paused queue is a no-op.
    pub async fn pause(&self) -> Result<QueueStatus, QueueError> {
        self.send(|response| QueueCommand::Pause { response }).await
    }

    /// Resume a paused session at the same cursor.
    pub async fn resume(&self) -> Result<QueueStatus, QueueError> {
        self.send(|response| QueueCommand::Resume { response }).await
    }

    /// Stop after the in-flight item and discard the rest of the session.
    pub async fn cancel(&self) -> Result<QueueStatus, QueueError> {
        self.send(|response| QueueCommand::Cancel { response }).await
    }

    pub async fn status(&self) -> QueueStatus {
        self.status.read().await.clone()
    }

    async fn send<F>(&self, command: F) -> Result<QueueStatus, QueueError>
    where
        F: FnOnce(QueueReply) -> QueueCommand,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|_| QueueError::Unavailable)?;
        response_rx.await.map_err(|_| QueueError::Unavailable)?
    }
}
