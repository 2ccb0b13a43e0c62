// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Direct tests of coordinator transitions, without the actor loop.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::mocks::{live_bootstrap, MockConnector, MockFactory, ProviderScript, ServerEnd};
use crate::coordinator::ConnectionCoordinator;
use crate::coordinator_messages::{CoordinatorControl, QueryMessage};
use crate::CoordinatorConfig;
use castlink_core::error::IceError;
use castlink_core::events::{
    EventSender, NegotiationEvent, SessionEvent, SignalingEvent, TaggedEvent, TimerKind,
};
use castlink_core::provider::PeerConnectionFactory;
use castlink_core::state::ConnectionState;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

struct Fixture {
    coordinator: ConnectionCoordinator,
    factory: std::sync::Arc<MockFactory>,
    _servers: mpsc::UnboundedReceiver<ServerEnd>,
    _control_tx: mpsc::Sender<CoordinatorControl>,
    _query_tx: mpsc::Sender<QueryMessage>,
}

fn fixture() -> Fixture {
    let (connector, servers) = MockConnector::new(false);
    let factory = MockFactory::new(ProviderScript::healthy());
    let (control_tx, control_rx) = mpsc::channel(4);
    let (query_tx, query_rx) = mpsc::channel(4);
    let (viewer_tx, _) = broadcast::channel(64);
    let coordinator = ConnectionCoordinator::new(
        CoordinatorConfig::default(),
        live_bootstrap(),
        connector,
        factory.clone(),
        control_rx,
        query_rx,
        viewer_tx,
    );
    Fixture { coordinator, factory, _servers: servers, _control_tx: control_tx, _query_tx: query_tx }
}

#[tokio::test(start_paused = true)]
async fn test_second_failure_while_recovering_schedules_nothing() {
    let mut f = fixture();
    let c = &mut f.coordinator;
    c.start().await.unwrap();
    assert_eq!(c.session.state, ConnectionState::Connecting);

    c.fail(IceError::Failed("ice failed".into()).into()).await;
    assert_eq!(c.session.state, ConnectionState::Recovering);
    assert_eq!(c.session.retry_count, 1);
    let timers = c.timers.snapshot();
    assert_eq!(timers.len(), 2);

    c.fail(IceError::Failed("connection lost".into()).into()).await;
    assert_eq!(c.session.retry_count, 1);
    assert_eq!(c.timers.snapshot(), timers);
    assert_eq!(
        c.session.last_error.as_ref().map(ToString::to_string).as_deref(),
        Some("ICE connection failed: ice failed")
    );
}

#[tokio::test(start_paused = true)]
async fn test_events_from_previous_sessions_are_discarded() {
    let mut f = fixture();
    let c = &mut f.coordinator;
    let first = c.start().await.unwrap();
    c.fail(IceError::GatheringTimeout.into()).await;
    let live = c.session.id;
    assert_ne!(first, live);

    c.handle_event(TaggedEvent { session: first, event: SessionEvent::Signaling(SignalingEvent::Opened) })
        .await;
    assert_eq!(c.session.state, ConnectionState::Recovering);

    // A provider that shows up for a dead session is closed, not adopted.
    let events = EventSender::new(first, c.events_tx.clone());
    let provider = f.factory.create(&c.config.peer, events).await.unwrap();
    c.handle_event(TaggedEvent {
        session: first,
        event: SessionEvent::Negotiation(NegotiationEvent::ProviderReady(provider)),
    })
    .await;
    assert!(c.resources.provider.is_none());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(f.factory.last().is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_timer_is_ignored() {
    let mut f = fixture();
    let c = &mut f.coordinator;
    c.start().await.unwrap();
    c.fail(IceError::GatheringTimeout.into()).await;
    let backoff = c.timers.snapshot().into_iter().find(|t| t.kind == TimerKind::Backoff).unwrap();

    let session = c.session.id;
    c.handle_event(TaggedEvent {
        session,
        event: SessionEvent::Timer { kind: TimerKind::Backoff, id: backoff.id + 100 },
    })
    .await;
    assert_eq!(c.session.state, ConnectionState::Recovering);

    c.handle_event(TaggedEvent {
        session,
        event: SessionEvent::Timer { kind: TimerKind::Backoff, id: backoff.id },
    })
    .await;
    assert_eq!(c.session.state, ConnectionState::Connecting);
    assert!(!c.session.is_recovering);
    assert_eq!(c.session.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failures_after_close_are_ignored() {
    let mut f = fixture();
    let c = &mut f.coordinator;
    c.start().await.unwrap();
    c.close().await;
    assert_eq!(c.session.state, ConnectionState::Closed);

    c.fail(IceError::NoCandidates.into()).await;
    assert_eq!(c.session.state, ConnectionState::Closed);
    assert!(c.timers.is_empty());
    assert!(c.session.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_recovery_deadline_is_kept_across_attempts() {
    let mut f = fixture();
    let c = &mut f.coordinator;
    c.start().await.unwrap();
    c.fail(IceError::GatheringTimeout.into()).await;
    let deadline = c.session.recovery_deadline.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    let session = c.session.id;
    let backoff = c.timers.snapshot().into_iter().find(|t| t.kind == TimerKind::Backoff).unwrap();
    c.handle_event(TaggedEvent {
        session,
        event: SessionEvent::Timer { kind: TimerKind::Backoff, id: backoff.id },
    })
    .await;
    c.fail(IceError::GatheringTimeout.into()).await;

    assert_eq!(c.session.retry_count, 2);
    assert_eq!(c.session.recovery_deadline, Some(deadline));
    let remaining = c
        .timers
        .snapshot()
        .into_iter()
        .find(|t| t.kind == TimerKind::RecoveryTimeout)
        .unwrap()
        .delay;
    assert_eq!(remaining, Duration::from_secs(25));
}
