// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! transport: Concrete network backends for the Castlink engine.
//!
//! - [`websocket`]: [`WebSocketConnector`], the signaling transport
//! - [`http`]: [`HttpStreamDirectory`], the stream/channel REST client
//! - [`peer`] (feature `webrtc`): [`WebRtcPeerFactory`], peer connections
//!   backed by webrtc-rs

pub mod http;
pub mod websocket;

#[cfg(feature = "webrtc")]
pub mod peer;

pub use http::HttpStreamDirectory;
pub use websocket::{signaling_url, WebSocketConnector};

#[cfg(feature = "webrtc")]
pub use peer::{WebRtcPeer, WebRtcPeerFactory};
