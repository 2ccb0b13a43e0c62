// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Castlink Core - shared types and capability traits for the viewer-side
//! realtime connection.
//!
//! ## Core Modules
//!
//! - [`backoff`]: Capped exponential retry delays
//! - [`error`]: Error types and the connection failure taxonomy
//! - [`state`]: Connection lifecycle states and provider-reported states
//! - [`session`]: The per-attempt session record and retry context
//! - [`types`]: SDP, ICE candidate, chat and track types
//! - [`signaling`]: Signaling wire messages and the transport connector trait
//! - [`provider`]: Peer connection provider and factory traits
//! - [`events`]: The session-tagged event queue and viewer notifications
//! - [`ice_buffer`]: Holding area for early ICE candidates

// Re-export async_trait for provider and connector implementations
pub use async_trait::async_trait;

pub mod backoff;
pub mod error;
pub mod events;
pub mod ice_buffer;
pub mod provider;
pub mod session;
pub mod signaling;
pub mod state;
pub mod types;

// Error handling
pub use error::{
    CastlinkError, ConnectionError, ConnectionErrorKind, FatalError, IceError, NegotiationStep,
    ProviderError, SignalingError,
};

pub use backoff::BackoffPolicy;

// Session model
pub use session::{ConnectionSession, RetryContext, SessionId};
pub use state::{ConnectionState, IceConnectionState, IceGatheringState, PeerConnectionState};

// Events
pub use events::viewer_helpers;
pub use events::{
    EventSender, NegotiationEvent, PeerEvent, SessionEvent, SignalingEvent, TaggedEvent,
    TimerKind, ViewerEvent,
};

// Capability traits
pub use provider::{PeerConnectionFactory, PeerConnectionProvider};
pub use signaling::{LinkFrame, SignalingConnector, SignalingLink, SignalingMessage, SignalingTarget};

pub use ice_buffer::PendingIceBuffer;
pub use types::{
    ChatMessage, ChatMessageKind, IceCandidate, IceServer, PeerConfig, SessionDescription,
    TrackHandle, TrackKind,
};
