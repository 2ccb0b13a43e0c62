// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The per-attempt session record.
//!
//! A [`ConnectionSession`] is owned by exactly one coordinator and mutated
//! only by its transition handlers. A full reconnect replaces it with a
//! [`ConnectionSession::successor`] carrying the retry context forward; the
//! old record, and every event tagged with its id, is dead from then on.

use crate::error::ConnectionError;
use crate::state::ConnectionState;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;
use tokio::time::Instant;

/// Identity of one viewing attempt. Events carry it so stale ones can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Retry bookkeeping view over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryContext {
    pub retry_count: u32,
    pub is_recovering: bool,
}

/// One viewing attempt.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    pub id: SessionId,
    pub state: ConnectionState,
    pub retry_count: u32,
    pub is_recovering: bool,
    pub last_error: Option<ConnectionError>,
    pub ice_candidates_collected: u32,
    pub created_at: SystemTime,
    /// Provider reported `connection_state = connected`.
    pub transport_connected: bool,
    /// The answer has gone out on the signaling channel.
    pub answer_sent: bool,
    /// The provider reported ICE gathering complete.
    pub gathering_complete: bool,
    /// Deadline for the current recovery chain, carried across successors.
    pub recovery_deadline: Option<Instant>,
}

impl ConnectionSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: ConnectionState::Idle,
            retry_count: 0,
            is_recovering: false,
            last_error: None,
            ice_candidates_collected: 0,
            created_at: SystemTime::now(),
            transport_connected: false,
            answer_sent: false,
            gathering_complete: false,
            recovery_deadline: None,
        }
    }

    /// A fresh record for the next attempt. Only the retry context, the last
    /// error and the recovery deadline survive.
    #[must_use]
    pub fn successor(&self, id: SessionId) -> Self {
        Self {
            state: self.state,
            retry_count: self.retry_count,
            is_recovering: self.is_recovering,
            last_error: self.last_error.clone(),
            recovery_deadline: self.recovery_deadline,
            ..Self::new(id)
        }
    }

    pub const fn retry_context(&self) -> RetryContext {
        RetryContext { retry_count: self.retry_count, is_recovering: self.is_recovering }
    }

    /// Connected and confirmed by the transport: the retry budget is restored.
    pub const fn is_established(&self) -> bool {
        matches!(self.state, ConnectionState::Connected) && self.transport_connected
    }

    pub const fn owns(&self, id: SessionId) -> bool {
        self.id.0 == id.0
    }
}
