// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! api: The external contract a Castlink viewer talks to.
//!
//! Two surfaces:
//!
//! - The **stream directory** (REST, JSON): consulted once per session start
//!   to resolve stream identity and whether it is live.
//! - The **signaling protocol** (WebSocket, JSON): re-exported from core so
//!   client crates and the TypeScript generator share one definition.

use async_trait::async_trait;
use castlink_core::error::CastlinkError;
use castlink_core::signaling::SignalingTarget;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// Re-export types so client crates can use them
pub use castlink_core::signaling::SignalingMessage;
pub use castlink_core::types::{
    ChatMessage, ChatMessageKind, IceCandidate, IceServer, SdpType, SessionDescription,
};

/// Broadcast lifecycle as reported by the directory.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Scheduled,
    Live,
    Ended,
}

impl StreamStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }
}

const fn default_chat_enabled() -> bool {
    true
}

/// Stream record returned by `GET /streams/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[ts(export)]
pub struct StreamInfo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub description: Option<String>,
    pub status: StreamStatus,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default = "default_chat_enabled")]
    pub chat_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub ended_at: Option<String>,
}

impl StreamInfo {
    pub const fn is_live(&self) -> bool {
        matches!(self.status, StreamStatus::Live)
    }
}

/// Error body returned by the directory on non-2xx responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[ts(export)]
pub struct ApiErrorBody {
    pub detail: String,
}

/// Everything a session needs from the directory, gathered once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerBootstrap {
    pub stream: StreamInfo,
    /// Viewer auth token forwarded to the signaling server.
    pub token: Option<String>,
}

impl ViewerBootstrap {
    pub const fn new(stream: StreamInfo, token: Option<String>) -> Self {
        Self { stream, token }
    }

    /// Signaling target for one session; `peer_id` must be fresh per session.
    pub fn signaling_target(&self, peer_id: impl Into<String>) -> SignalingTarget {
        SignalingTarget {
            stream_id: self.stream.id.clone(),
            peer_id: peer_id.into(),
            token: self.token.clone(),
        }
    }
}

/// Read access to the stream/channel service.
#[async_trait]
pub trait StreamDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns a network error if the service is unreachable, or a
    /// configuration error if the stream does not exist.
    async fn fetch_stream(&self, stream_id: &str) -> Result<StreamInfo, CastlinkError>;

    /// Resolves the bootstrap data for a viewing session.
    ///
    /// # Errors
    ///
    /// Propagates [`StreamDirectory::fetch_stream`] failures.
    async fn bootstrap(
        &self,
        stream_id: &str,
        token: Option<String>,
    ) -> Result<ViewerBootstrap, CastlinkError> {
        let stream = self.fetch_stream(stream_id).await?;
        Ok(ViewerBootstrap::new(stream, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_stream() -> StreamInfo {
        serde_json::from_value(json!({
            "id": "s-42",
            "title": "Friday Night Set",
            "channel_id": "c-1",
            "status": "live",
            "viewer_count": 17
        }))
        .unwrap()
    }

    #[test]
    fn test_stream_info_defaults() {
        let stream = sample_stream();
        assert!(stream.is_live());
        assert!(stream.chat_enabled);
        assert_eq!(stream.viewer_count, 17);
        assert!(stream.description.is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<StreamInfo, _> =
            serde_json::from_value(json!({"id": "x", "title": "t", "status": "paused"}));
        assert!(result.is_err());
    }

    struct FixedDirectory;

    #[async_trait]
    impl StreamDirectory for FixedDirectory {
        async fn fetch_stream(&self, stream_id: &str) -> Result<StreamInfo, CastlinkError> {
            if stream_id == "s-42" {
                Ok(sample_stream())
            } else {
                Err(CastlinkError::Configuration(format!("stream {stream_id} not found")))
            }
        }
    }

    #[tokio::test]
    async fn test_bootstrap_builds_signaling_target() {
        let bootstrap = FixedDirectory.bootstrap("s-42", Some("jwt".into())).await.unwrap();
        let target = bootstrap.signaling_target("viewer-a");
        assert_eq!(target.stream_id, "s-42");
        assert_eq!(target.peer_id, "viewer-a");
        assert_eq!(target.token.as_deref(), Some("jwt"));

        assert!(FixedDirectory.bootstrap("nope", None).await.is_err());
    }
}
