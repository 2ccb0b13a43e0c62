// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Signaling wire protocol and the transport boundary beneath it.
//!
//! Messages are JSON objects discriminated by `type`:
//!
//! ```json
//! {"type": "offer", "payload": {"type": "offer", "sdp": "v=0..."}, "from": "broadcaster"}
//! {"type": "answer", "payload": {"type": "answer", "sdp": "v=0..."}}
//! {"type": "ice_candidate", "payload": {"candidate": "candidate:...", "sdpMid": "0"}}
//! {"type": "chat_message", "payload": {"username": "ana", "content": "hi", "type": "normal"}}
//! ```
//!
//! There are no sequence numbers; ordering is whatever the transport gives.

use crate::error::SignalingError;
use crate::types::{ChatMessage, IceCandidate, SessionDescription};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use ts_rs::TS;

/// A message on the signaling channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    Offer {
        payload: SessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        to: Option<String>,
    },
    Answer {
        payload: SessionDescription,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        to: Option<String>,
    },
    #[serde(alias = "ice-candidate")]
    IceCandidate {
        payload: IceCandidate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        to: Option<String>,
    },
    ChatMessage {
        payload: ChatMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        to: Option<String>,
    },
    /// Presence notice from the signaling server.
    PeerJoined {
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        timestamp: Option<String>,
    },
    PeerLeft {
        peer_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        timestamp: Option<String>,
    },
    /// Greeting sent by the server right after it accepts the connection.
    #[serde(rename = "connection-success")]
    ConnectionSuccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        data: Option<String>,
    },
}

impl SignalingMessage {
    pub const fn answer(payload: SessionDescription) -> Self {
        Self::Answer { payload, from: None, to: None }
    }

    pub const fn ice_candidate(payload: IceCandidate) -> Self {
        Self::IceCandidate { payload, from: None, to: None }
    }

    pub const fn chat(payload: ChatMessage) -> Self {
        Self::ChatMessage { payload, from: None, to: None }
    }

    /// Sets the routing fields on peer-to-peer messages. Server messages are
    /// returned unchanged.
    #[must_use]
    pub fn routed(mut self, sender: Option<String>, recipient: Option<String>) -> Self {
        match &mut self {
            Self::Offer { from, to, .. }
            | Self::Answer { from, to, .. }
            | Self::IceCandidate { from, to, .. }
            | Self::ChatMessage { from, to, .. } => {
                *from = sender;
                *to = recipient;
            },
            Self::PeerJoined { .. } | Self::PeerLeft { .. } | Self::ConnectionSuccess { .. } => {},
        }
        self
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::ChatMessage { .. } => "chat_message",
            Self::PeerJoined { .. } => "peer_joined",
            Self::PeerLeft { .. } => "peer_left",
            Self::ConnectionSuccess { .. } => "connection-success",
        }
    }

    /// The sender's peer id, when present.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::IceCandidate { from, .. }
            | Self::ChatMessage { from, .. }
            | Self::ConnectionSuccess { from, .. } => from.as_deref(),
            Self::PeerJoined { peer_id, .. } | Self::PeerLeft { peer_id, .. } => Some(peer_id),
        }
    }

    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an unknown `type`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Where to open a signaling channel for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingTarget {
    pub stream_id: String,
    /// Local peer id, fresh for every session.
    pub peer_id: String,
    pub token: Option<String>,
}

/// A frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFrame {
    Text(String),
    Error(String),
    Closed { code: Option<u16>, was_clean: bool },
}

/// Both directions of an open transport connection.
///
/// Dropping `outbound` asks the transport to close the connection.
#[derive(Debug)]
pub struct SignalingLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkFrame>,
}

/// Opens transport connections to the signaling server.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Resolves once the connection is open.
    async fn open(&self, target: &SignalingTarget) -> Result<SignalingLink, SignalingError>;
}
