// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Events flowing into the coordinator queue and out to the viewer UI.
//!
//! Everything that can change a session (signaling traffic, provider
//! callbacks, negotiation results, timers) is funnelled through one
//! unbounded queue as a [`TaggedEvent`]. The tag is the [`SessionId`] that
//! produced it; the coordinator drops any event whose tag is not the live
//! session.

use crate::error::{ConnectionError, NegotiationStep};
use crate::provider::PeerConnectionProvider;
use crate::session::SessionId;
use crate::signaling::SignalingMessage;
use crate::state::{ConnectionState, IceConnectionState, IceGatheringState, PeerConnectionState};
use crate::types::{ChatMessage, IceCandidate, SessionDescription, TrackHandle};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Low-level signaling channel events.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    Opened,
    Message(SignalingMessage),
    Error(String),
    Closed { code: Option<u16>, was_clean: bool },
}

/// Callbacks from a peer connection provider.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A local candidate to trickle to the remote peer.
    LocalCandidate(IceCandidate),
    IceConnectionStateChanged(IceConnectionState),
    IceGatheringStateChanged(IceGatheringState),
    ConnectionStateChanged(PeerConnectionState),
    Track(TrackHandle),
    MediaError(String),
}

/// Results reported by a session's negotiation task.
pub enum NegotiationEvent {
    /// The factory produced a provider for the session.
    ProviderReady(Arc<dyn PeerConnectionProvider>),
    /// The offer is applied; remote candidates may now be added.
    RemoteDescriptionApplied,
    /// The answer is applied locally and ready to send.
    LocalDescriptionApplied(SessionDescription),
    StepFailed { step: NegotiationStep, reason: String },
}

impl fmt::Debug for NegotiationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderReady(_) => f.write_str("ProviderReady"),
            Self::RemoteDescriptionApplied => f.write_str("RemoteDescriptionApplied"),
            Self::LocalDescriptionApplied(_) => f.write_str("LocalDescriptionApplied"),
            Self::StepFailed { step, reason } => {
                f.debug_struct("StepFailed").field("step", step).field("reason", reason).finish()
            },
        }
    }
}

/// Session-owned timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fires when ICE gathering has run too long.
    IceGatherTimeout,
    /// Backoff delay before re-entering the connect path.
    Backoff,
    /// Deadline for the current recovery chain.
    RecoveryTimeout,
}

impl TimerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IceGatherTimeout => "ice_gather_timeout",
            Self::Backoff => "backoff",
            Self::RecoveryTimeout => "recovery_timeout",
        }
    }
}

/// An event produced on behalf of one session.
#[derive(Debug)]
pub enum SessionEvent {
    Signaling(SignalingEvent),
    Peer(PeerEvent),
    Negotiation(NegotiationEvent),
    Timer { kind: TimerKind, id: u64 },
}

impl SessionEvent {
    /// Short label for logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Signaling(SignalingEvent::Opened) => "signaling_opened",
            Self::Signaling(SignalingEvent::Message(_)) => "signaling_message",
            Self::Signaling(SignalingEvent::Error(_)) => "signaling_error",
            Self::Signaling(SignalingEvent::Closed { .. }) => "signaling_closed",
            Self::Peer(PeerEvent::LocalCandidate(_)) => "local_candidate",
            Self::Peer(PeerEvent::IceConnectionStateChanged(_)) => "ice_connection_state",
            Self::Peer(PeerEvent::IceGatheringStateChanged(_)) => "ice_gathering_state",
            Self::Peer(PeerEvent::ConnectionStateChanged(_)) => "connection_state",
            Self::Peer(PeerEvent::Track(_)) => "track",
            Self::Peer(PeerEvent::MediaError(_)) => "media_error",
            Self::Negotiation(_) => "negotiation",
            Self::Timer { kind, .. } => kind.as_str(),
        }
    }
}

/// A [`SessionEvent`] stamped with the session that produced it.
#[derive(Debug)]
pub struct TaggedEvent {
    pub session: SessionId,
    pub event: SessionEvent,
}

/// Session-scoped sender into the coordinator queue.
///
/// Providers, signaling tasks and timers each get a clone. Once
/// [`EventSender::detach`] is called (during teardown) every clone silently
/// drops further events, which is how listeners are removed.
#[derive(Debug, Clone)]
pub struct EventSender {
    session: SessionId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
    detached: Arc<AtomicBool>,
}

impl EventSender {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { session, tx, detached: Arc::new(AtomicBool::new(false)) }
    }

    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Queues an event. Returns `false` if detached or the coordinator is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        if self.is_detached() {
            return false;
        }
        self.tx.send(TaggedEvent { session: self.session, event }).is_ok()
    }

    pub fn emit_peer(&self, event: PeerEvent) -> bool {
        self.emit(SessionEvent::Peer(event))
    }

    pub fn emit_signaling(&self, event: SignalingEvent) -> bool {
        self.emit(SessionEvent::Signaling(event))
    }

    pub fn emit_negotiation(&self, event: NegotiationEvent) -> bool {
        self.emit(SessionEvent::Negotiation(event))
    }

    /// Stops delivery from this sender and all of its clones.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

/// Notifications delivered to the renderer.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    Track(TrackHandle),
    ConnectionStateChanged(ConnectionState),
    ChatMessageReceived(ChatMessage),
    /// Transient progress ("Reconnecting…").
    Status { message: String, attempt: Option<u32> },
    /// Automatic recovery is over; the user has to restart.
    FatalError { kind: crate::error::ConnectionErrorKind, message: String },
}

/// Helpers for publishing [`ViewerEvent`]s.
///
/// Delivery is best-effort: a renderer that is not subscribed simply misses
/// the event.
pub mod viewer_helpers {
    use super::{ConnectionError, ConnectionState, ViewerEvent};
    use crate::types::{ChatMessage, TrackHandle};
    use tokio::sync::broadcast;

    #[inline]
    pub fn emit(tx: &broadcast::Sender<ViewerEvent>, event: ViewerEvent) {
        let _ = tx.send(event);
    }

    #[inline]
    pub fn emit_state(tx: &broadcast::Sender<ViewerEvent>, state: ConnectionState) {
        emit(tx, ViewerEvent::ConnectionStateChanged(state));
    }

    #[inline]
    pub fn emit_track(tx: &broadcast::Sender<ViewerEvent>, track: TrackHandle) {
        emit(tx, ViewerEvent::Track(track));
    }

    #[inline]
    pub fn emit_chat(tx: &broadcast::Sender<ViewerEvent>, message: ChatMessage) {
        emit(tx, ViewerEvent::ChatMessageReceived(message));
    }

    #[inline]
    pub fn emit_status(tx: &broadcast::Sender<ViewerEvent>, message: impl Into<String>) {
        emit(tx, ViewerEvent::Status { message: message.into(), attempt: None });
    }

    /// Emits a reconnect notice with the attempt number.
    ///
    /// # Example
    /// ```
    /// # use castlink_core::events::{viewer_helpers::emit_reconnecting, ViewerEvent};
    /// # use std::time::Duration;
    /// let (tx, mut rx) = tokio::sync::broadcast::channel(4);
    /// emit_reconnecting(&tx, Duration::from_secs(2), 2, 3);
    /// match rx.try_recv().unwrap() {
    ///     ViewerEvent::Status { message, attempt } => {
    ///         assert_eq!(message, "Reconnecting in 2s (attempt 2 of 3)");
    ///         assert_eq!(attempt, Some(2));
    ///     }
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    #[inline]
    pub fn emit_reconnecting(
        tx: &broadcast::Sender<ViewerEvent>,
        delay: std::time::Duration,
        attempt: u32,
        max_attempts: u32,
    ) {
        let secs = delay.as_secs_f64();
        let message = format!("Reconnecting in {secs}s (attempt {attempt} of {max_attempts})");
        emit(tx, ViewerEvent::Status { message, attempt: Some(attempt) });
    }

    #[inline]
    pub fn emit_fatal(tx: &broadcast::Sender<ViewerEvent>, error: &ConnectionError) {
        emit(tx, ViewerEvent::FatalError { kind: error.kind(), message: error.to_string() });
    }
}
