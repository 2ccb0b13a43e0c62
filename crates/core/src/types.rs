// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data types exchanged between the viewer, the signaling server and the
//! media stack.
//!
//! - [`SessionDescription`] and [`IceCandidate`]: negotiation payloads
//! - [`ChatMessage`]: chat and superchat events relayed to the UI
//! - [`IceServer`] and [`PeerConfig`]: opaque provider configuration
//! - [`TrackHandle`]: inbound media handed to the renderer

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use ts_rs::TS;

/// SDP role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// An SDP blob with its role, shaped like a browser `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpType::Answer, sdp: sdp.into() }
    }
}

/// A trickled ICE candidate, shaped like a browser `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    /// Browsers signal end-of-candidates with an empty candidate string.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }
}

/// Chat message flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageKind {
    #[default]
    Normal,
    SuperChat,
}

/// A chat or superchat event as carried on the signaling channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub username: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: ChatMessageKind,
    /// Superchat amount in the stream's currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub created_at: Option<String>,
}

impl ChatMessage {
    pub fn normal(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            content: content.into(),
            kind: ChatMessageKind::Normal,
            amount: None,
            id: None,
            stream_id: None,
            user_id: None,
            created_at: None,
        }
    }

    pub fn super_chat(username: impl Into<String>, content: impl Into<String>, amount: f64) -> Self {
        Self { kind: ChatMessageKind::SuperChat, amount: Some(amount), ..Self::normal(username, content) }
    }

    pub const fn is_super_chat(&self) -> bool {
        matches!(self.kind, ChatMessageKind::SuperChat)
    }
}

/// A STUN or TURN endpoint, passed opaquely to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TS)]
#[ts(export)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self { urls: vec![url.into()], username: None, credential: None }
    }
}

/// Google's public STUN pool.
pub const DEFAULT_STUN_URLS: [&str; 5] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

pub const DEFAULT_ICE_CANDIDATE_POOL_SIZE: u8 = 10;

fn default_ice_servers() -> Vec<IceServer> {
    DEFAULT_STUN_URLS.iter().map(|url| IceServer::stun(*url)).collect()
}

const fn default_pool_size() -> u8 {
    DEFAULT_ICE_CANDIDATE_POOL_SIZE
}

/// Configuration handed to a provider factory for each new peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PeerConfig {
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServer>,
    #[serde(default = "default_pool_size")]
    pub ice_candidate_pool_size: u8,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self { ice_servers: default_ice_servers(), ice_candidate_pool_size: default_pool_size() }
    }
}

/// Kind of inbound media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Inbound media forwarded to the renderer.
///
/// The core never inspects the media object; renderers that know the
/// concrete provider can recover it with [`TrackHandle::downcast`].
#[derive(Clone)]
pub struct TrackHandle {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    media: Option<Arc<dyn Any + Send + Sync>>,
}

impl TrackHandle {
    pub fn new(id: impl Into<String>, stream_id: impl Into<String>, kind: TrackKind) -> Self {
        Self { id: id.into(), stream_id: stream_id.into(), kind, media: None }
    }

    #[must_use]
    pub fn with_media(mut self, media: Arc<dyn Any + Send + Sync>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.media.clone().and_then(|m| m.downcast::<T>().ok())
    }
}

impl fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackHandle")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .field("has_media", &self.media.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_uses_browser_field_names() {
        let value = json!({
            "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0
        });
        let candidate: IceCandidate = serde_json::from_value(value).unwrap();
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_m_line_index, Some(0));
        assert!(candidate.username_fragment.is_none());
        assert!(!candidate.is_end_of_candidates());

        let back = serde_json::to_value(&candidate).unwrap();
        assert!(back.get("usernameFragment").is_none());
    }

    #[test]
    fn test_chat_message_kinds() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "username": "ana",
            "content": "hello",
            "type": "super_chat",
            "amount": 5.0,
            "streamId": "s-1"
        }))
        .unwrap();
        assert!(msg.is_super_chat());
        assert_eq!(msg.amount, Some(5.0));
        assert_eq!(msg.stream_id.as_deref(), Some("s-1"));

        let plain: ChatMessage =
            serde_json::from_value(json!({"username": "bo", "content": "hi"})).unwrap();
        assert_eq!(plain.kind, ChatMessageKind::Normal);
    }

    #[test]
    fn test_default_peer_config() {
        let config = PeerConfig::default();
        assert_eq!(config.ice_servers.len(), 5);
        assert_eq!(config.ice_servers[0].urls[0], "stun:stun.l.google.com:19302");
        assert_eq!(config.ice_candidate_pool_size, 10);
    }

    #[test]
    fn test_track_handle_downcast() {
        let track = TrackHandle::new("v0", "stream", TrackKind::Video).with_media(Arc::new(42u32));
        assert_eq!(track.downcast::<u32>().as_deref(), Some(&42));
        assert!(track.downcast::<String>().is_none());
        assert!(TrackHandle::new("a0", "stream", TrackKind::Audio).downcast::<u32>().is_none());
    }
}
