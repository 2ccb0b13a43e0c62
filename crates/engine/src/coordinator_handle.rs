// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Public client handle for a running connection coordinator.

use crate::coordinator_messages::{CoordinatorControl, QueryMessage, SessionSnapshot};
use castlink_core::events::ViewerEvent;
use castlink_core::session::SessionId;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// A handle to communicate with a running coordinator actor.
#[derive(Clone)]
pub struct CoordinatorHandle {
    control_tx: mpsc::Sender<CoordinatorControl>,
    query_tx: mpsc::Sender<QueryMessage>,
    viewer_tx: broadcast::Sender<ViewerEvent>,
    task: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl CoordinatorHandle {
    pub(super) fn new(
        control_tx: mpsc::Sender<CoordinatorControl>,
        query_tx: mpsc::Sender<QueryMessage>,
        viewer_tx: broadcast::Sender<ViewerEvent>,
        task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self { control_tx, query_tx, viewer_tx, task: Arc::new(tokio::sync::Mutex::new(Some(task))) }
    }

    /// Receives every subsequent viewer notification.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.viewer_tx.subscribe()
    }

    /// Sends a control message to the coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator actor has shut down.
    pub async fn send_control(&self, msg: CoordinatorControl) -> Result<(), String> {
        self.control_tx.send(msg).await.map_err(|_| "Coordinator actor has shut down".to_string())
    }

    /// Requests a new viewing session.
    ///
    /// # Errors
    ///
    /// Returns an error if a session is already in progress or the actor has
    /// shut down.
    pub async fn start(&self) -> Result<SessionId, String> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.send_control(CoordinatorControl::Start { response_tx }).await?;
        response_rx
            .recv()
            .await
            .ok_or_else(|| "Failed to receive response from coordinator".to_string())?
    }

    /// Closes the session and waits for teardown to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has shut down.
    pub async fn close(&self) -> Result<(), String> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.send_control(CoordinatorControl::Close { response_tx }).await?;
        response_rx.recv().await.ok_or_else(|| "Failed to receive response from coordinator".to_string())
    }

    /// Gets a snapshot of the live session.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor has shut down or fails to respond.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, String> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.query_tx
            .send(QueryMessage::GetSnapshot { response_tx })
            .await
            .map_err(|_| "Coordinator actor has shut down".to_string())?;

        response_rx.recv().await.ok_or_else(|| "Failed to receive response from coordinator".to_string())
    }

    /// Sends a shutdown signal and waits for the actor to finish teardown.
    /// Subsequent calls return `Ok(())` without doing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor does not stop within 10 seconds or its
    /// task panicked.
    pub async fn shutdown_and_wait(&self) -> Result<(), String> {
        let join_handle = {
            let mut task_guard = self.task.lock().await;
            task_guard.take()
        };

        let Some(handle) = join_handle else {
            tracing::debug!("shutdown_and_wait called multiple times, coordinator already shut down");
            return Ok(());
        };

        // The actor may already be gone; the join below still reports how it ended.
        let _ = self.control_tx.send(CoordinatorControl::Shutdown).await;

        match tokio::time::timeout(std::time::Duration::from_secs(10), handle).await {
            Ok(Ok(())) => {
                tracing::debug!("Coordinator shut down gracefully");
                Ok(())
            },
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Coordinator task panicked during shutdown");
                Err(format!("Coordinator task panicked: {e}"))
            },
            Err(_) => {
                tracing::warn!("Coordinator did not shut down within 10s timeout");
                Err("Coordinator shutdown timeout".to_string())
            },
        }
    }
}
