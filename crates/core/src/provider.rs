// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The peer connection capability boundary.
//!
//! The coordinator never touches a media stack directly. It asks a
//! [`PeerConnectionFactory`] for a [`PeerConnectionProvider`] bound to one
//! session, drives the SDP steps through it, and receives every callback
//! (candidates, state changes, tracks) as [`PeerEvent`](crate::events::PeerEvent)s
//! through the session's [`EventSender`].

use crate::error::ProviderError;
use crate::events::EventSender;
use crate::state::{IceConnectionState, IceGatheringState, PeerConnectionState};
use crate::types::{IceCandidate, PeerConfig, SessionDescription};
use async_trait::async_trait;

/// Wrapper around one platform peer connection.
///
/// Implementations must deliver state changes, local candidates and inbound
/// tracks through the [`EventSender`] they were created with, and must
/// tolerate `close` being called more than once.
#[async_trait]
pub trait PeerConnectionProvider: Send + Sync {
    async fn set_remote_description(&self, offer: SessionDescription) -> Result<(), ProviderError>;

    async fn create_answer(&self) -> Result<SessionDescription, ProviderError>;

    async fn set_local_description(&self, answer: SessionDescription) -> Result<(), ProviderError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ProviderError>;

    fn ice_connection_state(&self) -> IceConnectionState;

    fn ice_gathering_state(&self) -> IceGatheringState;

    fn connection_state(&self) -> PeerConnectionState;

    /// Stops every inbound track owned by this connection.
    async fn stop_tracks(&self) -> Result<(), ProviderError>;

    async fn close(&self) -> Result<(), ProviderError>;
}

/// Creates providers, one per session.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        config: &PeerConfig,
        events: EventSender,
    ) -> Result<std::sync::Arc<dyn PeerConnectionProvider>, ProviderError>;
}
