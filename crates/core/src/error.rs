// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for Castlink.
//!
//! Two layers live here:
//!
//! - [`CastlinkError`]: the general-purpose error used by configuration,
//!   bootstrap and I/O code. It converts to and from `String` so it can cross
//!   actor channels that carry plain messages.
//! - [`ConnectionError`] and its component enums: the taxonomy the
//!   connection coordinator uses to classify failures. Every failure recorded
//!   on a session is one of these, and its [`ConnectionErrorKind`] decides
//!   whether the coordinator retries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

/// Main error type for Castlink operations.
#[derive(Debug, Error)]
pub enum CastlinkError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Malformed signaling URL
    /// - Zero retry budget where one is required
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Runtime error during normal operation.
    ///
    /// Examples:
    /// - Coordinator task stopped
    /// - Command issued from a state that does not accept it
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network-related error (HTTP bootstrap, WebSocket, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// I/O error (config files, log files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A classified connection failure.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Convenience type alias for Results using `CastlinkError`.
pub type Result<T> = std::result::Result<T, CastlinkError>;

impl From<CastlinkError> for String {
    fn from(err: CastlinkError) -> Self {
        err.to_string()
    }
}

// Generic string errors default to Runtime.
impl From<String> for CastlinkError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for CastlinkError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}

/// Failures of the signaling channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// `send` was called while the channel was not open.
    #[error("signaling channel is not open")]
    NotConnected,

    /// The channel never opened.
    #[error("failed to open signaling channel: {0}")]
    ConnectFailed(String),

    /// The channel closed uncleanly after opening.
    #[error("signaling channel dropped (code {code:?}): {reason}")]
    Dropped { code: Option<u16>, reason: String },

    /// The transport reported an error on an open channel.
    #[error("signaling transport error: {0}")]
    Transport(String),
}

/// The SDP step that was executing when negotiation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationStep {
    /// The factory could not produce a peer connection.
    CreatePeer,
    RemoteDescription,
    CreateAnswer,
    LocalDescription,
    SendAnswer,
}

impl NegotiationStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatePeer => "create-peer",
            Self::RemoteDescription => "remote-description",
            Self::CreateAnswer => "create-answer",
            Self::LocalDescription => "local-description",
            Self::SendAnswer => "send-answer",
        }
    }
}

impl fmt::Display for NegotiationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ICE-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IceError {
    #[error("ICE gathering timed out without any candidate")]
    GatheringTimeout,

    #[error("ICE gathering completed with no candidates")]
    NoCandidates,

    /// The ICE agent or the peer connection reported failure or disconnect.
    #[error("ICE connection failed: {0}")]
    Failed(String),
}

/// Failures that end automatic recovery and require a user restart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("connection failed after {attempts} retries: {cause}")]
    RetriesExhausted { attempts: u32, cause: String },

    #[error("recovery did not complete within {timeout_ms}ms")]
    RecoveryTimeout { timeout_ms: u64 },
}

/// A classified connection failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("negotiation failed at {step}: {reason}")]
    Negotiation { step: NegotiationStep, reason: String },

    #[error(transparent)]
    Ice(#[from] IceError),

    /// Track-level failure. Logged, never triggers teardown on its own.
    #[error("media error: {0}")]
    Media(String),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// Serializable tag for [`ConnectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    Signaling,
    Negotiation,
    Ice,
    Media,
    Fatal,
}

impl ConnectionErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signaling => "signaling",
            Self::Negotiation => "negotiation",
            Self::Ice => "ice",
            Self::Media => "media",
            Self::Fatal => "fatal",
        }
    }
}

impl ConnectionError {
    pub const fn kind(&self) -> ConnectionErrorKind {
        match self {
            Self::Signaling(_) => ConnectionErrorKind::Signaling,
            Self::Negotiation { .. } => ConnectionErrorKind::Negotiation,
            Self::Ice(_) => ConnectionErrorKind::Ice,
            Self::Media(_) => ConnectionErrorKind::Media,
            Self::Fatal(_) => ConnectionErrorKind::Fatal,
        }
    }

    /// Whether this failure is handled by tearing down and retrying.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Signaling(_) | Self::Negotiation { .. } | Self::Ice(_))
    }

    pub fn negotiation(step: NegotiationStep, reason: impl Into<String>) -> Self {
        Self::Negotiation { step, reason: reason.into() }
    }
}

/// Error raised by a peer connection provider operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
