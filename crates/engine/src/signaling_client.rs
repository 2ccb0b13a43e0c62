// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! One logical signaling channel per session.
//!
//! [`SignalingClient::connect`] spawns a channel task that opens the
//! transport through a [`SignalingConnector`], then pumps inbound frames into
//! the coordinator queue as [`SignalingEvent`]s. The client never retries on
//! its own; an unclean close is reported and the coordinator decides.

use castlink_core::error::SignalingError;
use castlink_core::events::{EventSender, SignalingEvent};
use castlink_core::session::SessionId;
use castlink_core::signaling::{
    LinkFrame, SignalingConnector, SignalingLink, SignalingMessage, SignalingTarget,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

const STATUS_CONNECTING: u8 = 0;
const STATUS_OPEN: u8 = 1;
const STATUS_CLOSED: u8 = 2;

/// Observable status of a [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Open,
    Closed,
}

/// Handle to the channel of one session.
#[derive(Debug, Clone)]
pub struct Channel {
    session: SessionId,
    status: Arc<AtomicU8>,
}

impl Channel {
    pub const fn session(&self) -> SessionId {
        self.session
    }

    pub fn status(&self) -> ChannelStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_CONNECTING => ChannelStatus::Connecting,
            STATUS_OPEN => ChannelStatus::Open,
            _ => ChannelStatus::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == ChannelStatus::Open
    }

    fn mark(&self, status: u8) {
        self.status.store(status, Ordering::Release);
    }
}

struct ActiveChannel {
    channel: Channel,
    outbound: Option<mpsc::UnboundedSender<String>>,
    outbound_rx: oneshot::Receiver<mpsc::UnboundedSender<String>>,
    task: AbortHandle,
}

impl ActiveChannel {
    /// The outbound sender, once the channel task has handed it over.
    fn outbound(&mut self) -> Option<&mpsc::UnboundedSender<String>> {
        if self.outbound.is_none() {
            self.outbound = self.outbound_rx.try_recv().ok();
        }
        self.outbound.as_ref()
    }
}

/// Owns the signaling channel of the current session.
pub struct SignalingClient {
    connector: Arc<dyn SignalingConnector>,
    active: Option<ActiveChannel>,
}

impl SignalingClient {
    pub fn new(connector: Arc<dyn SignalingConnector>) -> Self {
        Self { connector, active: None }
    }

    /// Opens the channel for `session`, or returns the existing one.
    ///
    /// A live channel belonging to a different session is disconnected first.
    pub fn connect(
        &mut self,
        session: SessionId,
        target: SignalingTarget,
        events: EventSender,
    ) -> Channel {
        if let Some(active) = &self.active {
            if active.channel.session == session && active.channel.status() != ChannelStatus::Closed
            {
                tracing::debug!(%session, "Signaling channel already exists");
                return active.channel.clone();
            }
        }
        self.disconnect();

        let channel =
            Channel { session, status: Arc::new(AtomicU8::new(STATUS_CONNECTING)) };
        let (outbound_tx, outbound_rx) = oneshot::channel();
        tracing::info!(%session, stream_id = %target.stream_id, peer_id = %target.peer_id, "Opening signaling channel");

        let task = tokio::spawn(run_channel(
            self.connector.clone(),
            target,
            channel.clone(),
            outbound_tx,
            events,
        ));

        self.active = Some(ActiveChannel {
            channel: channel.clone(),
            outbound: None,
            outbound_rx,
            task: task.abort_handle(),
        });
        channel
    }

    /// Serializes and enqueues `message`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalingError::NotConnected`] unless the channel is open.
    pub fn send(&mut self, message: &SignalingMessage) -> Result<(), SignalingError> {
        let active = self.active.as_mut().ok_or(SignalingError::NotConnected)?;
        if !active.channel.is_open() {
            return Err(SignalingError::NotConnected);
        }
        let outbound = active.outbound().ok_or(SignalingError::NotConnected)?;
        let text = message.to_json().map_err(|e| SignalingError::Transport(e.to_string()))?;
        outbound.send(text).map_err(|_| SignalingError::NotConnected)?;
        tracing::debug!(kind = message.kind(), "Signaling message sent");
        Ok(())
    }

    /// Closes the current channel, if any. Returns whether one existed.
    pub fn disconnect(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.task.abort();
        active.channel.mark(STATUS_CLOSED);
        tracing::debug!(session = %active.channel.session, "Signaling channel disconnected");
        // Dropping `active` drops the outbound sender, which closes the transport.
        true
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.active.as_ref().map(|a| &a.channel)
    }

    pub fn status(&self) -> ChannelStatus {
        self.channel().map_or(ChannelStatus::Closed, Channel::status)
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_channel(
    connector: Arc<dyn SignalingConnector>,
    target: SignalingTarget,
    channel: Channel,
    outbound_tx: oneshot::Sender<mpsc::UnboundedSender<String>>,
    events: EventSender,
) {
    let SignalingLink { outbound, mut inbound } = match connector.open(&target).await {
        Ok(link) => link,
        Err(e) => {
            channel.mark(STATUS_CLOSED);
            tracing::warn!(session = %channel.session, error = %e, "Signaling channel failed to open");
            let reason = match e {
                SignalingError::ConnectFailed(reason) => reason,
                other => other.to_string(),
            };
            events.emit_signaling(SignalingEvent::Error(reason));
            return;
        },
    };

    if outbound_tx.send(outbound).is_err() {
        // The client dropped this channel while it was opening.
        channel.mark(STATUS_CLOSED);
        return;
    }
    channel.mark(STATUS_OPEN);
    tracing::info!(session = %channel.session, "Signaling channel open");
    events.emit_signaling(SignalingEvent::Opened);

    while let Some(frame) = inbound.recv().await {
        match frame {
            LinkFrame::Text(text) => match SignalingMessage::from_json(&text) {
                Ok(message) => {
                    tracing::debug!(session = %channel.session, kind = message.kind(), "Signaling message received");
                    events.emit_signaling(SignalingEvent::Message(message));
                },
                Err(e) => {
                    tracing::warn!(session = %channel.session, error = %e, "Skipping unrecognized signaling message");
                },
            },
            LinkFrame::Error(reason) => {
                tracing::warn!(session = %channel.session, %reason, "Signaling transport error");
                events.emit_signaling(SignalingEvent::Error(reason));
            },
            LinkFrame::Closed { code, was_clean } => {
                channel.mark(STATUS_CLOSED);
                tracing::info!(session = %channel.session, ?code, was_clean, "Signaling channel closed");
                events.emit_signaling(SignalingEvent::Closed { code, was_clean });
                return;
            },
        }
    }

    // The transport went away without a close frame.
    channel.mark(STATUS_CLOSED);
    tracing::info!(session = %channel.session, "Signaling transport ended without close frame");
    events.emit_signaling(SignalingEvent::Closed { code: None, was_clean: false });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use castlink_core::events::{SessionEvent, TaggedEvent};
    use castlink_core::types::{IceCandidate, SessionDescription};
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    type ServerEnd = (mpsc::UnboundedSender<LinkFrame>, mpsc::UnboundedReceiver<String>);

    struct LoopbackConnector {
        opens: AtomicU32,
        fail: bool,
        servers: Mutex<Vec<ServerEnd>>,
    }

    impl LoopbackConnector {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { opens: AtomicU32::new(0), fail, servers: Mutex::new(Vec::new()) })
        }

        fn take_server(&self) -> ServerEnd {
            self.servers.lock().unwrap().remove(0)
        }
    }

    #[async_trait]
    impl SignalingConnector for LoopbackConnector {
        async fn open(&self, _target: &SignalingTarget) -> Result<SignalingLink, SignalingError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SignalingError::ConnectFailed("connection refused".into()));
            }
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            self.servers.lock().unwrap().push((in_tx, out_rx));
            Ok(SignalingLink { outbound: out_tx, inbound: in_rx })
        }
    }

    fn target() -> SignalingTarget {
        SignalingTarget { stream_id: "s-1".into(), peer_id: "viewer".into(), token: None }
    }

    fn events(session: u64) -> (EventSender, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender::new(SessionId::new(session), tx), rx)
    }

    async fn next_signaling(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> SignalingEvent {
        match rx.recv().await.unwrap().event {
            SessionEvent::Signaling(event) => event,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let connector = LoopbackConnector::new(false);
        let mut client = SignalingClient::new(connector);
        let msg = SignalingMessage::ice_candidate(IceCandidate::new("candidate:1"));
        assert_eq!(client.send(&msg), Err(SignalingError::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_per_session() {
        let connector = LoopbackConnector::new(false);
        let mut client = SignalingClient::new(connector.clone());
        let (sender, mut rx) = events(1);

        let first = client.connect(SessionId::new(1), target(), sender.clone());
        let second = client.connect(SessionId::new(1), target(), sender);
        assert!(Arc::ptr_eq(&first.status, &second.status));

        assert!(matches!(next_signaling(&mut rx).await, SignalingEvent::Opened));
        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
        assert!(first.is_open());
    }

    #[tokio::test]
    async fn test_round_trip_and_unclean_close() {
        let connector = LoopbackConnector::new(false);
        let mut client = SignalingClient::new(connector.clone());
        let (sender, mut rx) = events(1);
        let channel = client.connect(SessionId::new(1), target(), sender);
        assert!(matches!(next_signaling(&mut rx).await, SignalingEvent::Opened));
        let (to_client, mut from_client) = connector.take_server();

        client.send(&SignalingMessage::answer(SessionDescription::answer("v=0"))).unwrap();
        let sent = from_client.recv().await.unwrap();
        assert!(sent.contains("\"type\":\"answer\""));

        to_client.send(LinkFrame::Text("garbage".into())).unwrap();
        to_client
            .send(LinkFrame::Text(r#"{"type":"ice_candidate","payload":{"candidate":"c"}}"#.into()))
            .unwrap();
        match next_signaling(&mut rx).await {
            SignalingEvent::Message(msg) => assert_eq!(msg.kind(), "ice_candidate"),
            other => panic!("unexpected {other:?}"),
        }

        drop(to_client);
        assert!(matches!(
            next_signaling(&mut rx).await,
            SignalingEvent::Closed { code: None, was_clean: false }
        ));
        assert_eq!(channel.status(), ChannelStatus::Closed);
        assert_eq!(
            client.send(&SignalingMessage::answer(SessionDescription::answer("v=0"))),
            Err(SignalingError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_open_failure_is_reported_once() {
        let connector = LoopbackConnector::new(true);
        let mut client = SignalingClient::new(connector.clone());
        let (sender, mut rx) = events(4);
        client.connect(SessionId::new(4), target(), sender);

        match next_signaling(&mut rx).await {
            SignalingEvent::Error(reason) => assert!(reason.contains("connection refused")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.status(), ChannelStatus::Closed);
        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_closes_transport() {
        let connector = LoopbackConnector::new(false);
        let mut client = SignalingClient::new(connector.clone());
        let (sender, mut rx) = events(2);
        client.connect(SessionId::new(2), target(), sender);
        assert!(matches!(next_signaling(&mut rx).await, SignalingEvent::Opened));
        let (_to_client, mut from_client) = connector.take_server();

        assert!(client.disconnect());
        assert!(!client.disconnect());
        assert!(from_client.recv().await.is_none());
    }
}
