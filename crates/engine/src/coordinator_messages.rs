// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Message types for the coordinator actor.

use crate::signaling_client::ChannelStatus;
use crate::timers::TimerSnapshot;
use castlink_core::error::{ConnectionError, ConnectionErrorKind};
use castlink_core::session::{RetryContext, SessionId};
use castlink_core::state::ConnectionState;
use std::time::SystemTime;
use tokio::sync::mpsc;

/// Commands that change the coordinator's state.
pub enum CoordinatorControl {
    /// Begin a new session. Accepted from `Idle`, `Failed` and `Closed`.
    Start { response_tx: mpsc::Sender<Result<SessionId, String>> },
    /// Tear down and move to `Closed`. Always accepted.
    Close { response_tx: mpsc::Sender<()> },
    /// Tear down and stop the actor.
    Shutdown,
}

/// Read-only queries.
pub enum QueryMessage {
    GetSnapshot { response_tx: mpsc::Sender<SessionSnapshot> },
}

/// Point-in-time view of the live session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: ConnectionState,
    pub retry: RetryContext,
    pub last_error: Option<ConnectionError>,
    pub ice_candidates_collected: u32,
    pub transport_connected: bool,
    pub provider_active: bool,
    pub signaling: ChannelStatus,
    /// Remote candidates still waiting for the remote description.
    pub pending_remote_candidates: usize,
    pub pending_timers: Vec<TimerSnapshot>,
    pub created_at: SystemTime,
}

impl SessionSnapshot {
    pub fn last_error_kind(&self) -> Option<ConnectionErrorKind> {
        self.last_error.as_ref().map(ConnectionError::kind)
    }

    pub fn timer(&self, kind: castlink_core::events::TimerKind) -> Option<&TimerSnapshot> {
        self.pending_timers.iter().find(|t| t.kind == kind)
    }
}
