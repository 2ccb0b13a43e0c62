// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: The viewer connection engine for Castlink.
//! This crate runs the connection coordinator actor and the session-scoped
//! machinery it drives: signaling channels, timers, negotiation and teardown.

use castlink_api::ViewerBootstrap;
use castlink_core::provider::PeerConnectionFactory;
use castlink_core::signaling::SignalingConnector;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

// --- Public Modules ---

pub mod chat_relay;
pub mod constants;
pub mod reclaimer;
pub mod signaling_client;
pub mod timers;

mod coordinator;
mod coordinator_config;
mod coordinator_handle;
mod coordinator_messages;
mod negotiation;

// Re-exports
pub use chat_relay::ChatRelay;
pub use coordinator_config::CoordinatorConfig;
pub use coordinator_handle::CoordinatorHandle;
pub use coordinator_messages::{CoordinatorControl, QueryMessage, SessionSnapshot};
pub use reclaimer::{ResourceReclaimer, SessionResources, TeardownReport};
pub use signaling_client::{Channel, ChannelStatus, SignalingClient};
pub use timers::{SessionTimers, TimerSnapshot};

use constants::{DEFAULT_COORDINATOR_CONTROL_CAPACITY, DEFAULT_COORDINATOR_QUERY_CAPACITY};
use coordinator::ConnectionCoordinator;

// --- Engine Structs ---

/// Entry point that binds a signaling transport and a peer connection
/// implementation, and starts coordinators on top of them.
pub struct ViewerEngine {
    connector: Arc<dyn SignalingConnector>,
    factory: Arc<dyn PeerConnectionFactory>,
}

impl ViewerEngine {
    pub fn new(
        connector: Arc<dyn SignalingConnector>,
        factory: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        Self { connector, factory }
    }

    /// Starts a connection coordinator for one stream in the background,
    /// returning a handle to control it and subscribe to its notifications.
    ///
    /// The coordinator starts in `Idle`; call [`CoordinatorHandle::start`] to
    /// begin viewing.
    pub fn start_coordinator(
        &self,
        config: CoordinatorConfig,
        bootstrap: ViewerBootstrap,
    ) -> CoordinatorHandle {
        let (control_tx, control_rx) = mpsc::channel(DEFAULT_COORDINATOR_CONTROL_CAPACITY);
        let (query_tx, query_rx) = mpsc::channel(DEFAULT_COORDINATOR_QUERY_CAPACITY);
        let (viewer_tx, _) = broadcast::channel(config.viewer_event_capacity.max(1));

        tracing::info!(
            stream_id = %bootstrap.stream.id,
            max_retries = config.max_retries,
            ice_gather_timeout_ms = u64::try_from(config.ice_gather_timeout.as_millis()).unwrap_or(u64::MAX),
            recovery_timeout_ms = u64::try_from(config.recovery_timeout.as_millis()).unwrap_or(u64::MAX),
            ice_servers = config.peer.ice_servers.len(),
            control_capacity = DEFAULT_COORDINATOR_CONTROL_CAPACITY,
            query_capacity = DEFAULT_COORDINATOR_QUERY_CAPACITY,
            "Starting connection coordinator"
        );

        let coordinator = ConnectionCoordinator::new(
            config,
            bootstrap,
            self.connector.clone(),
            self.factory.clone(),
            control_rx,
            query_rx,
            viewer_tx.clone(),
        );
        let task = tokio::spawn(coordinator.run());

        CoordinatorHandle::new(control_tx, query_tx, viewer_tx, task)
    }
}

#[cfg(test)]
mod tests;
