// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Integration test for a full viewing session through the public engine API.
//!
//! A loopback "broadcaster" answers the signaling channel the way the real
//! server does: greeting, offer, a candidate and some chat.

use castlink_api::{StreamInfo, StreamStatus, ViewerBootstrap};
use castlink_core::error::{ProviderError, SignalingError};
use castlink_core::events::{EventSender, PeerEvent, ViewerEvent};
use castlink_core::provider::{PeerConnectionFactory, PeerConnectionProvider};
use castlink_core::signaling::{
    LinkFrame, SignalingConnector, SignalingLink, SignalingMessage, SignalingTarget,
};
use castlink_core::state::{
    ConnectionState, IceConnectionState, IceGatheringState, PeerConnectionState,
};
use castlink_core::types::{
    ChatMessage, IceCandidate, PeerConfig, SessionDescription, TrackHandle, TrackKind,
};
use castlink_core::async_trait;
use castlink_engine::{CoordinatorConfig, ViewerEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Replies to every connection with a greeting, an offer, a remote
/// candidate and a chat message, then records what the viewer sends.
struct LoopbackBroadcaster {
    received: Arc<Mutex<Vec<SignalingMessage>>>,
}

#[async_trait]
impl SignalingConnector for LoopbackBroadcaster {
    async fn open(&self, target: &SignalingTarget) -> Result<SignalingLink, SignalingError> {
        let (to_viewer, inbound) = mpsc::unbounded_channel();
        let (outbound, mut from_viewer) = mpsc::unbounded_channel::<String>();

        let frames = [
            r#"{"type":"connection-success","from":"server","data":"connected"}"#.to_string(),
            SignalingMessage::Offer {
                payload: SessionDescription::offer("v=0\r\n"),
                from: Some("broadcaster".into()),
                to: Some(target.peer_id.clone()),
            }
            .to_json()
            .map_err(|e| SignalingError::Transport(e.to_string()))?,
            r#"{"type":"ice-candidate","payload":{"candidate":"candidate:1 1 udp 1 203.0.113.9 3478 typ srflx","sdpMid":"0","sdpMLineIndex":0},"from":"broadcaster"}"#.to_string(),
            SignalingMessage::chat(ChatMessage::normal("mod", "welcome in"))
                .to_json()
                .map_err(|e| SignalingError::Transport(e.to_string()))?,
        ];
        for frame in frames {
            let _ = to_viewer.send(LinkFrame::Text(frame));
        }

        let received = self.received.clone();
        tokio::spawn(async move {
            // Holding `to_viewer` keeps the channel open until the viewer hangs up.
            let _to_viewer = to_viewer;
            while let Some(text) = from_viewer.recv().await {
                if let Ok(message) = SignalingMessage::from_json(&text) {
                    if let Ok(mut received) = received.lock() {
                        received.push(message);
                    }
                }
            }
        });
        Ok(SignalingLink { outbound, inbound })
    }
}

struct LoopbackPeer {
    events: EventSender,
    candidates: Mutex<Vec<IceCandidate>>,
    closed: AtomicBool,
}

#[async_trait]
impl PeerConnectionProvider for LoopbackPeer {
    async fn set_remote_description(&self, _: SessionDescription) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, ProviderError> {
        Ok(SessionDescription::answer("v=0\r\n"))
    }

    async fn set_local_description(&self, _: SessionDescription) -> Result<(), ProviderError> {
        self.events.emit_peer(PeerEvent::Track(TrackHandle::new("video0", "s", TrackKind::Video)));
        self.events.emit_peer(PeerEvent::LocalCandidate(IceCandidate::new(
            "candidate:0 1 udp 2122260223 192.168.1.20 50000 typ host",
        )));
        self.events.emit_peer(PeerEvent::IceGatheringStateChanged(IceGatheringState::Complete));
        self.events.emit_peer(PeerEvent::ConnectionStateChanged(PeerConnectionState::Connected));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ProviderError> {
        self.candidates.lock().map_err(|e| ProviderError::new(e.to_string()))?.push(candidate);
        Ok(())
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        IceConnectionState::Connected
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        IceGatheringState::Complete
    }

    fn connection_state(&self) -> PeerConnectionState {
        PeerConnectionState::Connected
    }

    async fn stop_tracks(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct LoopbackFactory {
    peers: Mutex<Vec<Arc<LoopbackPeer>>>,
}

#[async_trait]
impl PeerConnectionFactory for LoopbackFactory {
    async fn create(
        &self,
        config: &PeerConfig,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnectionProvider>, ProviderError> {
        assert_eq!(config.ice_servers.len(), 5);
        let peer = Arc::new(LoopbackPeer {
            events,
            candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.peers.lock().map_err(|e| ProviderError::new(e.to_string()))?.push(peer.clone());
        Ok(peer)
    }
}

#[tokio::test]
#[allow(clippy::unwrap_used, clippy::expect_used)]
async fn test_viewer_session_lifecycle() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let received = Arc::new(Mutex::new(Vec::new()));
    let factory = Arc::new(LoopbackFactory::default());
    let engine = ViewerEngine::new(
        Arc::new(LoopbackBroadcaster { received: received.clone() }),
        factory.clone(),
    );

    let stream = StreamInfo {
        id: "s".into(),
        title: "Integration".into(),
        channel_id: None,
        description: None,
        status: StreamStatus::Live,
        viewer_count: 0,
        chat_enabled: true,
        created_at: None,
        started_at: None,
        ended_at: None,
    };
    let handle = engine
        .start_coordinator(CoordinatorConfig::default(), ViewerBootstrap::new(stream, None));
    let mut events = handle.subscribe();
    handle.start().await.expect("start should be accepted");

    let mut saw_track = false;
    let mut saw_chat = false;
    let mut connected = false;
    let collect = async {
        while !(saw_track && saw_chat && connected) {
            match events.recv().await.expect("viewer events closed") {
                ViewerEvent::Track(track) => {
                    assert_eq!(track.kind, TrackKind::Video);
                    saw_track = true;
                },
                ViewerEvent::ChatMessageReceived(message) => {
                    assert_eq!(message.content, "welcome in");
                    saw_chat = true;
                },
                ViewerEvent::ConnectionStateChanged(ConnectionState::Connected) => connected = true,
                ViewerEvent::FatalError { message, .. } => panic!("unexpected fatal error: {message}"),
                _ => {},
            }
        }
    };
    timeout(Duration::from_secs(5), collect).await.expect("session did not connect in time");

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.retry.retry_count, 0);

    // Answer and local candidate reached the broadcaster.
    for _ in 0..100 {
        if received.lock().unwrap().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let kinds: Vec<&str> = received.lock().unwrap().iter().map(SignalingMessage::kind).collect();
    assert_eq!(kinds, vec!["answer", "ice_candidate"]);

    handle.close().await.unwrap();
    assert_eq!(handle.snapshot().await.unwrap().state, ConnectionState::Closed);
    let peers = factory.peers.lock().unwrap().clone();
    assert_eq!(peers.len(), 1);
    assert!(peers[0].closed.load(Ordering::SeqCst));
    assert_eq!(peers[0].candidates.lock().unwrap().len(), 1);

    handle.shutdown_and_wait().await.unwrap();
}
