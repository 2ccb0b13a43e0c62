// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Connection lifecycle states.
//!
//! ## State Machine
//!
//! ```text
//!       Idle
//!        ↓
//!    Connecting ←──────────┐
//!        ↓                 │
//!   AwaitingOffer          │
//!        ↓                 │
//!    Negotiating ───┐      │
//!        ↓          │      │
//!   IceGathering ───┤      │
//!        ↓          ↓      │
//!    Connected ──→ Recovering
//!                   ↓
//!                 Failed
//!
//!   any state ──→ Closed
//! ```
//!
//! Any of `Connecting`, `AwaitingOffer`, `Negotiating`, `IceGathering` and
//! `Connected` may move to `Recovering` (budget left) or `Failed` (budget
//! spent). `Failed` and `Closed` are terminal until a new start request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Where a viewing session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session has been requested.
    Idle,
    /// The signaling channel is being opened.
    Connecting,
    /// Signaling is open; waiting for the broadcaster's offer.
    AwaitingOffer,
    /// Applying the offer and producing an answer.
    Negotiating,
    /// Answer sent; gathering and exchanging ICE candidates.
    IceGathering,
    /// Media path established (or pending transport confirmation).
    Connected,
    /// Waiting out a backoff delay before a fresh attempt.
    Recovering,
    /// Automatic recovery gave up. Requires an explicit restart.
    Failed,
    /// Closed on request.
    Closed,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingOffer => "awaiting_offer",
            Self::Negotiating => "negotiating",
            Self::IceGathering => "ice_gathering",
            Self::Connected => "connected",
            Self::Recovering => "recovering",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// `Failed` and `Closed`: nothing happens until the next start request.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// States from which a start request is accepted.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Closed)
    }

    /// States in which a live attempt (signaling and possibly a provider) exists.
    pub const fn is_attempting(self) -> bool {
        matches!(
            self,
            Self::Connecting
                | Self::AwaitingOffer
                | Self::Negotiating
                | Self::IceGathering
                | Self::Connected
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-reported ICE connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Provider-reported ICE gathering state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

/// Provider-reported aggregate peer connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerConnectionState {
    /// `Failed` and `Disconnected` both mean the media path is gone.
    pub const fn is_lost(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected)
    }
}
