// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The connection coordinator actor.
//!
//! One task owns the live [`ConnectionSession`], its [`SessionResources`],
//! the signaling client and the session timers. Everything that can change
//! them arrives on one of three channels and is handled to completion before
//! the next message is taken:
//!
//! - control (start / close / shutdown), polled first so a close always
//!   runs ahead of queued session events
//! - queries (snapshots)
//! - the session event queue (signaling, provider callbacks, negotiation
//!   results, timers), each tagged with the session that produced it
//!
//! Slow work (opening signaling, SDP steps, adding remote candidates) runs in
//! session-owned tasks that report back through the queue, so the actor
//! keeps processing while it is in flight.

use crate::chat_relay::ChatRelay;
use crate::coordinator_config::CoordinatorConfig;
use crate::coordinator_messages::{CoordinatorControl, QueryMessage, SessionSnapshot};
use crate::negotiation::negotiate;
use crate::reclaimer::{ResourceReclaimer, SessionResources};
use crate::signaling_client::SignalingClient;
use crate::timers::SessionTimers;
use castlink_api::ViewerBootstrap;
use castlink_core::error::{ConnectionError, FatalError, IceError, NegotiationStep, SignalingError};
use castlink_core::events::{
    viewer_helpers, EventSender, NegotiationEvent, PeerEvent, SessionEvent, SignalingEvent,
    TaggedEvent, TimerKind, ViewerEvent,
};
use castlink_core::provider::{PeerConnectionFactory, PeerConnectionProvider};
use castlink_core::session::{ConnectionSession, SessionId};
use castlink_core::signaling::{SignalingConnector, SignalingMessage};
use castlink_core::state::{
    ConnectionState, IceConnectionState, IceGatheringState, PeerConnectionState,
};
use castlink_core::types::{IceCandidate, SessionDescription};
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

struct CoordinatorMetrics {
    transitions: Counter<u64>,
    recoveries: Counter<u64>,
    fatal_failures: Counter<u64>,
    stale_events: Counter<u64>,
}

impl CoordinatorMetrics {
    fn new() -> Self {
        let meter = global::meter("castlink_engine");
        Self {
            transitions: meter
                .u64_counter("coordinator.state_transitions")
                .with_description("Connection state transitions")
                .build(),
            recoveries: meter
                .u64_counter("coordinator.recovery_attempts")
                .with_description("Reconnect attempts scheduled")
                .build(),
            fatal_failures: meter
                .u64_counter("coordinator.fatal_failures")
                .with_description("Sessions that ended in Failed")
                .build(),
            stale_events: meter
                .u64_counter("coordinator.stale_events")
                .with_description("Events discarded because their session was gone")
                .build(),
        }
    }
}

fn new_peer_id() -> String {
    format!("viewer-{}", uuid::Uuid::new_v4())
}

pub(crate) struct ConnectionCoordinator {
    pub(crate) config: CoordinatorConfig,
    pub(crate) bootstrap: ViewerBootstrap,
    pub(crate) factory: Arc<dyn PeerConnectionFactory>,
    pub(crate) signaling: SignalingClient,
    pub(crate) reclaimer: ResourceReclaimer,
    pub(crate) timers: SessionTimers,
    pub(crate) chat: ChatRelay,
    pub(crate) session: ConnectionSession,
    pub(crate) resources: SessionResources,
    pub(crate) events_tx: mpsc::UnboundedSender<TaggedEvent>,
    pub(crate) events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    pub(crate) control_rx: mpsc::Receiver<CoordinatorControl>,
    pub(crate) query_rx: mpsc::Receiver<QueryMessage>,
    pub(crate) viewer_tx: broadcast::Sender<ViewerEvent>,
    metrics: CoordinatorMetrics,
}

impl ConnectionCoordinator {
    pub(crate) fn new(
        config: CoordinatorConfig,
        bootstrap: ViewerBootstrap,
        connector: Arc<dyn SignalingConnector>,
        factory: Arc<dyn PeerConnectionFactory>,
        control_rx: mpsc::Receiver<CoordinatorControl>,
        query_rx: mpsc::Receiver<QueryMessage>,
        viewer_tx: broadcast::Sender<ViewerEvent>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = ConnectionSession::new(SessionId::new(0));
        let resources =
            SessionResources::new(EventSender::new(session.id, events_tx.clone()), new_peer_id());
        Self {
            reclaimer: ResourceReclaimer::new(config.teardown_step_timeout),
            chat: ChatRelay::new(viewer_tx.clone()),
            config,
            bootstrap,
            factory,
            signaling: SignalingClient::new(connector),
            timers: SessionTimers::new(),
            session,
            resources,
            events_tx,
            events_rx,
            control_rx,
            query_rx,
            viewer_tx,
            metrics: CoordinatorMetrics::new(),
        }
    }

    /// The main actor loop.
    pub(crate) async fn run(mut self) {
        tracing::info!(stream_id = %self.bootstrap.stream.id, "Connection coordinator started");
        loop {
            tokio::select! {
                biased;
                control = self.control_rx.recv() => match control {
                    Some(msg) => {
                        if !self.handle_control(msg).await {
                            break; // Shutdown requested
                        }
                    },
                    None => {
                        tracing::debug!("All coordinator handles dropped");
                        self.shutdown().await;
                        break;
                    },
                },
                Some(query) = self.query_rx.recv() => {
                    self.handle_query(query).await;
                },
                Some(tagged) = self.events_rx.recv() => {
                    self.handle_event(tagged).await;
                },
            }
        }
        tracing::info!("Connection coordinator shutting down");
    }

    // --- Control plane ---

    async fn handle_control(&mut self, msg: CoordinatorControl) -> bool {
        match msg {
            CoordinatorControl::Start { response_tx } => {
                let result = self.start().await;
                let _ = response_tx.send(result).await;
                true
            },
            CoordinatorControl::Close { response_tx } => {
                self.close().await;
                let _ = response_tx.send(()).await;
                true
            },
            CoordinatorControl::Shutdown => {
                self.shutdown().await;
                false
            },
        }
    }

    async fn handle_query(&self, msg: QueryMessage) {
        match msg {
            QueryMessage::GetSnapshot { response_tx } => {
                let _ = response_tx.send(self.snapshot()).await;
            },
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id,
            state: self.session.state,
            retry: self.session.retry_context(),
            last_error: self.session.last_error.clone(),
            ice_candidates_collected: self.session.ice_candidates_collected,
            transport_connected: self.session.transport_connected,
            provider_active: self.resources.provider.is_some(),
            signaling: self.signaling.status(),
            pending_remote_candidates: self.resources.inbound_candidates.len(),
            pending_timers: self.timers.snapshot(),
            created_at: self.session.created_at,
        }
    }

    pub(crate) async fn start(&mut self) -> Result<SessionId, String> {
        let state = self.session.state;
        if !state.can_start() {
            tracing::warn!(session = %self.session.id, %state, "Rejecting start request");
            return Err(format!("Cannot start a session while {state}"));
        }
        self.teardown().await;

        let id = self.session.id.next();
        self.install(ConnectionSession::new(id));
        tracing::info!(session = %id, stream_id = %self.bootstrap.stream.id, "Starting viewing session");
        self.begin_attempt();
        Ok(id)
    }

    pub(crate) async fn close(&mut self) {
        if self.session.state == ConnectionState::Closed {
            tracing::debug!(session = %self.session.id, "Close requested while already closed");
            return;
        }
        self.teardown().await;
        self.session.is_recovering = false;
        self.session.recovery_deadline = None;
        self.transition(ConnectionState::Closed);
    }

    async fn shutdown(&mut self) {
        self.teardown().await;
        if !self.session.state.is_terminal() {
            self.transition(ConnectionState::Closed);
        }
    }

    // --- Session bookkeeping ---

    /// Makes `session` the live session with a fresh resource bundle.
    fn install(&mut self, session: ConnectionSession) {
        let events = EventSender::new(session.id, self.events_tx.clone());
        self.resources = SessionResources::new(events, new_peer_id());
        self.session = session;
    }

    async fn teardown(&mut self) {
        let report =
            self.reclaimer.teardown(&mut self.resources, &mut self.timers, &mut self.signaling).await;
        if !report.already_reclaimed {
            tracing::debug!(session = %self.session.id, ?report, "Session torn down");
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.session.state;
        if from == to {
            return;
        }
        self.session.state = to;
        tracing::info!(session = %self.session.id, %from, %to, "Connection state changed");
        self.metrics.transitions.add(
            1,
            &[KeyValue::new("from", from.as_str()), KeyValue::new("to", to.as_str())],
        );
        viewer_helpers::emit_state(&self.viewer_tx, to);
    }

    /// Enters `Connecting` and opens signaling for the live session.
    fn begin_attempt(&mut self) {
        self.transition(ConnectionState::Connecting);
        let target = self.bootstrap.signaling_target(self.resources.local_peer_id.clone());
        self.signaling.connect(self.session.id, target, self.resources.events.clone());
    }

    // --- Event plane ---

    pub(crate) async fn handle_event(&mut self, tagged: TaggedEvent) {
        if !self.session.owns(tagged.session) || self.resources.is_reclaimed() {
            self.discard_stale(tagged);
            return;
        }

        match tagged.event {
            SessionEvent::Signaling(event) => self.on_signaling(event).await,
            SessionEvent::Peer(event) => self.on_peer(event).await,
            SessionEvent::Negotiation(event) => self.on_negotiation(event).await,
            SessionEvent::Timer { kind, id } => {
                if self.timers.fire(kind, id) {
                    self.on_timer(kind).await;
                } else {
                    tracing::debug!(session = %tagged.session, timer = kind.as_str(), id, "Ignoring superseded timer");
                }
            },
        }
    }

    fn discard_stale(&self, tagged: TaggedEvent) {
        let label = tagged.event.label();
        tracing::debug!(
            event_session = %tagged.session,
            live_session = %self.session.id,
            event = label,
            "Discarding stale event"
        );
        self.metrics.stale_events.add(1, &[KeyValue::new("event", label)]);

        if let SessionEvent::Negotiation(NegotiationEvent::ProviderReady(provider)) = tagged.event {
            // Built for a session that no longer exists; nobody else will close it.
            let session = tagged.session;
            tokio::spawn(async move {
                if let Err(e) = provider.close().await {
                    tracing::warn!(%session, error = %e, "Failed to close stale provider");
                }
            });
        }
    }

    async fn on_signaling(&mut self, event: SignalingEvent) {
        let state = self.session.state;
        match event {
            SignalingEvent::Opened => {
                if state == ConnectionState::Connecting {
                    self.transition(ConnectionState::AwaitingOffer);
                    viewer_helpers::emit_status(&self.viewer_tx, "Connected to stream server");
                } else {
                    tracing::debug!(session = %self.session.id, %state, "Ignoring signaling open");
                }
            },
            SignalingEvent::Message(message) => self.on_signaling_message(message).await,
            SignalingEvent::Error(reason) => {
                let error = if state == ConnectionState::Connecting {
                    SignalingError::ConnectFailed(reason)
                } else {
                    SignalingError::Transport(reason)
                };
                if state.is_attempting() {
                    self.fail(error.into()).await;
                }
            },
            SignalingEvent::Closed { code, was_clean } => {
                if state == ConnectionState::Connected && was_clean {
                    tracing::info!(session = %self.session.id, ?code, "Signaling closed cleanly; media continues");
                    viewer_helpers::emit_status(&self.viewer_tx, "Chat disconnected");
                } else if state.is_attempting() {
                    let reason = if was_clean { "closed by server" } else { "connection lost" };
                    self.fail(SignalingError::Dropped { code, reason: reason.to_string() }.into())
                        .await;
                }
            },
        }
    }

    async fn on_signaling_message(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::Offer { payload, from, .. } => self.on_offer(payload, from),
            SignalingMessage::IceCandidate { payload, .. } => self.on_remote_candidate(payload),
            SignalingMessage::ChatMessage { payload, .. } => self.chat.relay(payload),
            SignalingMessage::Answer { .. } => {
                tracing::debug!(session = %self.session.id, "Ignoring answer; this client only answers");
            },
            SignalingMessage::PeerJoined { peer_id, .. } => {
                tracing::info!(session = %self.session.id, %peer_id, "Peer joined");
            },
            SignalingMessage::PeerLeft { peer_id, .. } => {
                tracing::info!(session = %self.session.id, %peer_id, "Peer left");
            },
            SignalingMessage::ConnectionSuccess { .. } => {
                tracing::debug!(session = %self.session.id, "Signaling server greeting received");
            },
        }
    }

    fn on_offer(&mut self, offer: SessionDescription, from: Option<String>) {
        let state = self.session.state;
        if state != ConnectionState::AwaitingOffer
            || self.resources.provider.is_some()
            || self.resources.negotiation_started
        {
            tracing::debug!(session = %self.session.id, %state, "Ignoring offer");
            return;
        }

        self.resources.remote_peer_id = from;
        self.resources.negotiation_started = true;
        self.transition(ConnectionState::Negotiating);

        let task = tokio::spawn(negotiate(
            self.factory.clone(),
            self.config.peer.clone(),
            offer,
            self.resources.events.clone(),
        ));
        self.resources.track_task(task.abort_handle());
    }

    fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if candidate.is_end_of_candidates() {
            tracing::debug!(session = %self.session.id, "Remote end-of-candidates");
            return;
        }

        if self.resources.remote_description_applied {
            if let Some(provider) = self.resources.provider.clone() {
                self.apply_remote_candidates(provider, vec![candidate]);
                return;
            }
        }

        let state = self.session.state;
        if matches!(state, ConnectionState::AwaitingOffer | ConnectionState::Negotiating) {
            let buffered = self.resources.inbound_candidates.len();
            if self.resources.inbound_candidates.push(candidate) {
                tracing::debug!(session = %self.session.id, buffered = buffered + 1, "Buffered remote ICE candidate");
            } else {
                tracing::debug!(session = %self.session.id, buffered, "Remote ICE buffer full, dropping candidate");
            }
        } else {
            tracing::debug!(session = %self.session.id, %state, "Discarding remote ICE candidate");
        }
    }

    fn apply_remote_candidates(
        &mut self,
        provider: Arc<dyn PeerConnectionProvider>,
        candidates: Vec<IceCandidate>,
    ) {
        let session = self.session.id;
        let task = tokio::spawn(async move {
            for candidate in candidates {
                if let Err(e) = provider.add_ice_candidate(candidate).await {
                    tracing::warn!(%session, error = %e, "Failed to add remote ICE candidate");
                }
            }
        });
        self.resources.track_task(task.abort_handle());
    }

    async fn on_negotiation(&mut self, event: NegotiationEvent) {
        match event {
            NegotiationEvent::ProviderReady(provider) => {
                if self.resources.provider.is_some() {
                    let session = self.session.id;
                    tracing::warn!(%session, "Session already owns a provider; closing the new one");
                    tokio::spawn(async move {
                        if let Err(e) = provider.close().await {
                            tracing::warn!(%session, error = %e, "Failed to close duplicate provider");
                        }
                    });
                } else {
                    tracing::debug!(session = %self.session.id, "Peer connection created");
                    self.resources.provider = Some(provider);
                }
            },
            NegotiationEvent::RemoteDescriptionApplied => {
                self.resources.remote_description_applied = true;
                let pending = self.resources.inbound_candidates.drain();
                if let (false, Some(provider)) = (pending.is_empty(), self.resources.provider.clone())
                {
                    tracing::debug!(session = %self.session.id, count = pending.len(), "Applying buffered remote candidates");
                    self.apply_remote_candidates(provider, pending);
                }
            },
            NegotiationEvent::LocalDescriptionApplied(answer) => {
                self.on_local_description(answer).await;
            },
            NegotiationEvent::StepFailed { step, reason } => {
                self.fail(ConnectionError::negotiation(step, reason)).await;
            },
        }
    }

    async fn on_local_description(&mut self, answer: SessionDescription) {
        if self.session.state != ConnectionState::Negotiating {
            tracing::debug!(session = %self.session.id, state = %self.session.state, "Ignoring late local description");
            return;
        }

        let message = SignalingMessage::answer(answer).routed(
            Some(self.resources.local_peer_id.clone()),
            self.resources.remote_peer_id.clone(),
        );
        if let Err(e) = self.signaling.send(&message) {
            return self.fail(ConnectionError::negotiation(NegotiationStep::SendAnswer, e.to_string())).await;
        }
        self.session.answer_sent = true;
        tracing::info!(session = %self.session.id, "Answer sent");

        for candidate in self.resources.outbound_candidates.drain() {
            self.send_local_candidate(candidate);
        }

        self.transition(ConnectionState::IceGathering);
        self.timers.schedule(
            TimerKind::IceGatherTimeout,
            self.config.ice_gather_timeout,
            &self.resources.events,
        );

        if self.session.transport_connected {
            self.enter_connected();
        } else if self.session.gathering_complete {
            self.evaluate_gathering().await;
        }
    }

    fn send_local_candidate(&mut self, candidate: IceCandidate) {
        let message = SignalingMessage::ice_candidate(candidate).routed(
            Some(self.resources.local_peer_id.clone()),
            self.resources.remote_peer_id.clone(),
        );
        if let Err(e) = self.signaling.send(&message) {
            tracing::warn!(session = %self.session.id, error = %e, "Failed to send local ICE candidate");
        }
    }

    async fn on_peer(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if candidate.is_end_of_candidates() {
                    self.on_gathering_complete().await;
                    return;
                }
                self.session.ice_candidates_collected =
                    self.session.ice_candidates_collected.saturating_add(1);
                if self.session.answer_sent {
                    self.send_local_candidate(candidate);
                } else {
                    if !self.resources.outbound_candidates.push(candidate) {
                        tracing::debug!(session = %self.session.id, "Local ICE buffer full, dropping candidate");
                    }
                }
            },
            PeerEvent::IceGatheringStateChanged(IceGatheringState::Complete) => {
                self.on_gathering_complete().await;
            },
            PeerEvent::IceGatheringStateChanged(IceGatheringState::Gathering) => {
                tracing::debug!(session = %self.session.id, "ICE gathering started");
                viewer_helpers::emit_status(&self.viewer_tx, "Gathering network candidates");
            },
            PeerEvent::IceGatheringStateChanged(state) => {
                tracing::debug!(session = %self.session.id, ?state, "ICE gathering state changed");
            },
            PeerEvent::IceConnectionStateChanged(state) => {
                tracing::debug!(session = %self.session.id, ?state, "ICE connection state changed");
                match state {
                    IceConnectionState::Checking => {
                        viewer_helpers::emit_status(&self.viewer_tx, "Establishing media connection");
                    },
                    IceConnectionState::Failed if self.has_live_provider() => {
                        self.fail(IceError::Failed("ICE connection failed".to_string()).into()).await;
                    },
                    _ => {},
                }
            },
            PeerEvent::ConnectionStateChanged(state) => self.on_connection_state(state).await,
            PeerEvent::Track(track) => {
                tracing::info!(session = %self.session.id, track_id = %track.id, kind = %track.kind, "Inbound track");
                viewer_helpers::emit_track(&self.viewer_tx, track);
            },
            PeerEvent::MediaError(reason) => {
                tracing::warn!(session = %self.session.id, %reason, "Media error");
                self.session.last_error = Some(ConnectionError::Media(reason));
            },
        }
    }

    async fn on_connection_state(&mut self, state: PeerConnectionState) {
        tracing::debug!(session = %self.session.id, ?state, "Peer connection state changed");
        if state == PeerConnectionState::Connected {
            let newly = !self.session.transport_connected;
            self.session.transport_connected = true;
            match self.session.state {
                ConnectionState::IceGathering => self.enter_connected(),
                ConnectionState::Connected if newly => self.maybe_established(),
                _ => {},
            }
        } else if state.is_lost() && self.has_live_provider() {
            self.session.transport_connected = false;
            let reason = format!("peer connection {state:?}").to_lowercase();
            self.fail(IceError::Failed(reason).into()).await;
        }
    }

    fn has_live_provider(&self) -> bool {
        self.resources.provider.is_some()
            && matches!(
                self.session.state,
                ConnectionState::Negotiating
                    | ConnectionState::IceGathering
                    | ConnectionState::Connected
            )
    }

    async fn on_gathering_complete(&mut self) {
        self.session.gathering_complete = true;
        tracing::debug!(
            session = %self.session.id,
            candidates = self.session.ice_candidates_collected,
            "ICE gathering complete"
        );
        if self.session.state == ConnectionState::IceGathering {
            self.evaluate_gathering().await;
        }
    }

    async fn evaluate_gathering(&mut self) {
        if self.session.ice_candidates_collected > 0 {
            self.enter_connected();
        } else {
            self.fail(IceError::NoCandidates.into()).await;
        }
    }

    /// Connected, pending transport confirmation.
    fn enter_connected(&mut self) {
        self.timers.cancel(TimerKind::IceGatherTimeout);
        self.transition(ConnectionState::Connected);
        self.maybe_established();
    }

    /// Restores the retry budget once the transport confirms the connection.
    fn maybe_established(&mut self) {
        if !self.session.is_established() {
            tracing::debug!(session = %self.session.id, "Connected; waiting for transport confirmation");
            return;
        }
        if self.session.retry_count > 0 {
            tracing::info!(session = %self.session.id, retries = self.session.retry_count, "Recovered");
        }
        self.session.retry_count = 0;
        self.session.is_recovering = false;
        self.session.recovery_deadline = None;
        self.timers.cancel(TimerKind::RecoveryTimeout);
        viewer_helpers::emit_status(&self.viewer_tx, "Connected to stream");
    }

    async fn on_timer(&mut self, kind: TimerKind) {
        let state = self.session.state;
        match kind {
            TimerKind::IceGatherTimeout => {
                if state != ConnectionState::IceGathering {
                    return;
                }
                if self.session.ice_candidates_collected > 0 {
                    tracing::info!(
                        session = %self.session.id,
                        candidates = self.session.ice_candidates_collected,
                        "ICE gathering timed out with candidates; proceeding"
                    );
                    self.enter_connected();
                } else {
                    self.fail(IceError::GatheringTimeout.into()).await;
                }
            },
            TimerKind::Backoff => {
                if state == ConnectionState::Recovering {
                    self.session.is_recovering = false;
                    tracing::info!(session = %self.session.id, attempt = self.session.retry_count, "Reconnecting");
                    self.begin_attempt();
                }
            },
            TimerKind::RecoveryTimeout => {
                if !state.is_terminal() && !self.session.is_established() {
                    let timeout_ms =
                        u64::try_from(self.config.recovery_timeout.as_millis()).unwrap_or(u64::MAX);
                    self.fatal(FatalError::RecoveryTimeout { timeout_ms }).await;
                }
            },
        }
    }

    // --- Failure handling ---

    /// Handles a recoverable failure of the live session.
    pub(crate) async fn fail(&mut self, error: ConnectionError) {
        let state = self.session.state;
        if state.is_terminal() {
            tracing::debug!(session = %self.session.id, %state, %error, "Ignoring failure in terminal state");
            return;
        }
        if self.session.is_recovering {
            tracing::debug!(session = %self.session.id, %error, "Already recovering; ignoring failure");
            return;
        }

        tracing::warn!(
            session = %self.session.id,
            %state,
            kind = error.kind().as_str(),
            %error,
            retry_count = self.session.retry_count,
            "Connection attempt failed"
        );
        self.session.last_error = Some(error.clone());
        self.teardown().await;

        if self.session.retry_count < self.config.max_retries {
            self.schedule_recovery();
        } else {
            let attempts = self.session.retry_count;
            self.fatal(FatalError::RetriesExhausted { attempts, cause: error.to_string() }).await;
        }
    }

    /// Replaces the torn-down session with a successor waiting out its backoff.
    fn schedule_recovery(&mut self) {
        let delay = self.config.backoff.delay(self.session.retry_count);
        let now = Instant::now();

        let mut next = self.session.successor(self.session.id.next());
        next.retry_count += 1;
        next.is_recovering = true;
        let deadline = *next.recovery_deadline.get_or_insert(now + self.config.recovery_timeout);
        self.install(next);
        self.transition(ConnectionState::Recovering);

        self.timers.schedule(TimerKind::Backoff, delay, &self.resources.events);
        self.timers.schedule(
            TimerKind::RecoveryTimeout,
            deadline.saturating_duration_since(now),
            &self.resources.events,
        );

        let attempt = self.session.retry_count;
        self.metrics.recoveries.add(1, &[]);
        tracing::info!(
            session = %self.session.id,
            attempt,
            max_retries = self.config.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        viewer_helpers::emit_reconnecting(&self.viewer_tx, delay, attempt, self.config.max_retries);
    }

    /// Ends automatic recovery.
    async fn fatal(&mut self, fatal: FatalError) {
        self.teardown().await;
        let error = ConnectionError::Fatal(fatal);
        tracing::error!(
            session = %self.session.id,
            %error,
            retry_count = self.session.retry_count,
            "Connection failed; restart required"
        );
        self.session.last_error = Some(error.clone());
        self.session.is_recovering = false;
        self.session.recovery_deadline = None;
        self.transition(ConnectionState::Failed);
        self.metrics.fatal_failures.add(1, &[]);
        viewer_helpers::emit_fatal(&self.viewer_tx, &error);
    }
}
