// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Session-scoped resources and their teardown.
//!
//! Everything a session acquires (provider, listeners, background tasks,
//! buffered candidates) is recorded in its [`SessionResources`].
//! [`ResourceReclaimer::teardown`] releases all of it, together with the
//! session's timers and signaling channel, and marks the bundle reclaimed so
//! that a second call does nothing.

use crate::signaling_client::SignalingClient;
use crate::timers::SessionTimers;
use castlink_core::events::EventSender;
use castlink_core::ice_buffer::PendingIceBuffer;
use castlink_core::provider::PeerConnectionProvider;
use castlink_core::session::SessionId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Resources owned by one session.
pub struct SessionResources {
    pub session: SessionId,
    /// Local peer id announced on the signaling channel.
    pub local_peer_id: String,
    /// Peer id of the broadcaster, learned from the offer.
    pub remote_peer_id: Option<String>,
    pub events: EventSender,
    pub provider: Option<Arc<dyn PeerConnectionProvider>>,
    /// Remote candidates waiting for the remote description.
    pub inbound_candidates: PendingIceBuffer,
    /// Local candidates waiting for the answer to go out.
    pub outbound_candidates: PendingIceBuffer,
    pub remote_description_applied: bool,
    /// A negotiation task has been spawned for this session.
    pub negotiation_started: bool,
    tasks: Vec<AbortHandle>,
    reclaimed: bool,
}

impl SessionResources {
    pub fn new(events: EventSender, local_peer_id: impl Into<String>) -> Self {
        Self {
            session: events.session(),
            local_peer_id: local_peer_id.into(),
            remote_peer_id: None,
            events,
            provider: None,
            inbound_candidates: PendingIceBuffer::new(),
            outbound_candidates: PendingIceBuffer::new(),
            remote_description_applied: false,
            negotiation_started: false,
            tasks: Vec::new(),
            reclaimed: false,
        }
    }

    /// Records a background task so teardown can abort it.
    pub fn track_task(&mut self, handle: AbortHandle) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(handle);
    }

    pub fn live_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub const fn is_reclaimed(&self) -> bool {
        self.reclaimed
    }
}

/// What a teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub session: Option<SessionId>,
    /// The bundle had already been reclaimed; nothing was done.
    pub already_reclaimed: bool,
    pub tracks_stopped: bool,
    pub provider_closed: bool,
    pub tasks_aborted: usize,
    pub timers_cancelled: usize,
    pub candidates_discarded: usize,
    pub signaling_disconnected: bool,
    /// Cleanup steps that failed. Never fatal; the remaining steps still ran.
    pub errors: Vec<String>,
}

/// Idempotent, infallible teardown.
#[derive(Debug, Clone)]
pub struct ResourceReclaimer {
    step_timeout: Duration,
}

impl ResourceReclaimer {
    pub const fn new(step_timeout: Duration) -> Self {
        Self { step_timeout }
    }

    /// Releases everything `resources` holds, plus the session's timers and
    /// signaling channel. A no-op after the first call.
    pub async fn teardown(
        &self,
        resources: &mut SessionResources,
        timers: &mut SessionTimers,
        signaling: &mut SignalingClient,
    ) -> TeardownReport {
        let mut report = TeardownReport { session: Some(resources.session), ..Default::default() };
        if resources.reclaimed {
            report.already_reclaimed = true;
            return report;
        }
        resources.reclaimed = true;

        // Listeners first, so nothing the steps below trigger reaches the queue.
        resources.events.detach();

        for task in resources.tasks.drain(..) {
            if !task.is_finished() {
                task.abort();
                report.tasks_aborted += 1;
            }
        }

        report.timers_cancelled = timers.cancel_all();

        if let Some(provider) = resources.provider.take() {
            match self.bounded("stop_tracks", provider.stop_tracks()).await {
                Ok(()) => report.tracks_stopped = true,
                Err(e) => report.errors.push(e),
            }
            match self.bounded("close", provider.close()).await {
                Ok(()) => report.provider_closed = true,
                Err(e) => report.errors.push(e),
            }
        }

        report.candidates_discarded =
            resources.inbound_candidates.clear() + resources.outbound_candidates.clear();

        report.signaling_disconnected = signaling.disconnect();

        for error in &report.errors {
            tracing::warn!(session = %resources.session, %error, "Teardown step failed");
        }
        tracing::debug!(
            session = %resources.session,
            provider_closed = report.provider_closed,
            tasks_aborted = report.tasks_aborted,
            timers_cancelled = report.timers_cancelled,
            candidates_discarded = report.candidates_discarded,
            "Session resources reclaimed"
        );
        report
    }

    async fn bounded<F, E>(&self, step: &str, fut: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{step}: {e}")),
            Err(_) => Err(format!("{step}: timed out after {:?}", self.step_timeout)),
        }
    }
}
