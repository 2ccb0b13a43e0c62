// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Peer connections backed by webrtc-rs.
//!
//! The factory wires every `RTCPeerConnection` callback to the session's
//! [`EventSender`] before handing the connection out, so nothing the
//! connection reports can race ahead of the coordinator learning about it.

use castlink_core::error::ProviderError;
use castlink_core::events::{EventSender, PeerEvent};
use castlink_core::provider::{PeerConnectionFactory, PeerConnectionProvider};
use castlink_core::state::{IceConnectionState, IceGatheringState, PeerConnectionState};
use castlink_core::types::{
    IceCandidate, PeerConfig, SdpType, SessionDescription, TrackHandle, TrackKind,
};
use std::fmt::Display;
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

fn provider_err(step: &str, e: impl Display) -> ProviderError {
    ProviderError::new(format!("{step}: {e}"))
}

const fn map_ice_connection_state(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        _ => IceConnectionState::New,
    }
}

const fn map_gathering_state(state: RTCIceGatheringState) -> IceGatheringState {
    match state {
        RTCIceGatheringState::Gathering => IceGatheringState::Gathering,
        RTCIceGatheringState::Complete => IceGatheringState::Complete,
        _ => IceGatheringState::New,
    }
}

const fn map_peer_connection_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        _ => PeerConnectionState::New,
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, ProviderError> {
    let SessionDescription { kind, sdp } = description;
    let result = match kind {
        SdpType::Offer => RTCSessionDescription::offer(sdp),
        SdpType::Answer => RTCSessionDescription::answer(sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(sdp),
        SdpType::Rollback => {
            return Err(ProviderError::new("rollback descriptions are not supported"));
        },
    };
    result.map_err(|e| provider_err("parse description", e))
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

fn rtc_configuration(config: &PeerConfig) -> RTCConfiguration {
    let ice_servers = config
        .ice_servers
        .iter()
        .map(|server| RTCIceServer {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        })
        .collect();
    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: config.ice_candidate_pool_size,
        ..Default::default()
    }
}

/// Creates one `RTCPeerConnection` per session.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebRtcPeerFactory;

impl WebRtcPeerFactory {
    pub const fn new() -> Self {
        Self
    }

    fn wire_callbacks(pc: &RTCPeerConnection, events: &EventSender) {
        let session = events.session();

        let ev = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let ev = ev.clone();
            Box::pin(async move {
                match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => {
                            ev.emit_peer(PeerEvent::LocalCandidate(from_rtc_candidate(init)));
                        },
                        Err(e) => {
                            tracing::warn!(%session, error = %e, "Failed to serialize local ICE candidate");
                        },
                    },
                    // The end-of-candidates callback always follows the last candidate,
                    // so it is the reliable completion signal.
                    None => {
                        ev.emit_peer(PeerEvent::IceGatheringStateChanged(IceGatheringState::Complete));
                    },
                }
            })
        }));

        let ev = events.clone();
        pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
            if state == RTCIceGathererState::Gathering {
                ev.emit_peer(PeerEvent::IceGatheringStateChanged(IceGatheringState::Gathering));
            }
            Box::pin(async {})
        }));

        let ev = events.clone();
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            tracing::debug!(%session, %state, "ICE connection state");
            ev.emit_peer(PeerEvent::IceConnectionStateChanged(map_ice_connection_state(state)));
            Box::pin(async {})
        }));

        let ev = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            tracing::debug!(%session, %state, "Peer connection state");
            ev.emit_peer(PeerEvent::ConnectionStateChanged(map_peer_connection_state(state)));
            Box::pin(async {})
        }));

        let ev = events.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let kind = match track.kind() {
                RTPCodecType::Audio => Some(TrackKind::Audio),
                RTPCodecType::Video => Some(TrackKind::Video),
                RTPCodecType::Unspecified => None,
            };
            if let Some(kind) = kind {
                let handle = TrackHandle::new(track.id(), track.stream_id(), kind).with_media(track);
                ev.emit_peer(PeerEvent::Track(handle));
            } else {
                let reason = format!("track {} arrived without a negotiated codec", track.id());
                ev.emit_peer(PeerEvent::MediaError(reason));
            }
            Box::pin(async {})
        }));
    }
}

#[async_trait::async_trait]
impl PeerConnectionFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        config: &PeerConfig,
        events: EventSender,
    ) -> Result<Arc<dyn PeerConnectionProvider>, ProviderError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(|e| provider_err("register codecs", e))?;
        let registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| provider_err("register interceptors", e))?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = api
            .new_peer_connection(rtc_configuration(config))
            .await
            .map_err(|e| provider_err("create peer connection", e))?;
        Self::wire_callbacks(&pc, &events);
        tracing::debug!(
            session = %events.session(),
            ice_servers = config.ice_servers.len(),
            pool_size = config.ice_candidate_pool_size,
            "Peer connection created"
        );
        Ok(Arc::new(WebRtcPeer { pc: Arc::new(pc) }))
    }
}

/// [`PeerConnectionProvider`] over one `RTCPeerConnection`.
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcPeer {
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }
}

#[async_trait::async_trait]
impl PeerConnectionProvider for WebRtcPeer {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), ProviderError> {
        let description = to_rtc_description(description)?;
        self.pc
            .set_remote_description(description)
            .await
            .map_err(|e| provider_err("set remote description", e))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ProviderError> {
        let answer = self.pc.create_answer(None).await.map_err(|e| provider_err("create answer", e))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), ProviderError> {
        let description = to_rtc_description(description)?;
        self.pc
            .set_local_description(description)
            .await
            .map_err(|e| provider_err("set local description", e))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ProviderError> {
        self.pc
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .map_err(|e| provider_err("add ICE candidate", e))
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        map_ice_connection_state(self.pc.ice_connection_state())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        map_gathering_state(self.pc.ice_gathering_state())
    }

    fn connection_state(&self) -> PeerConnectionState {
        map_peer_connection_state(self.pc.connection_state())
    }

    async fn stop_tracks(&self) -> Result<(), ProviderError> {
        let mut failures = Vec::new();
        for transceiver in self.pc.get_transceivers().await {
            if let Err(e) = transceiver.stop().await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::new(format!("stop transceivers: {}", failures.join("; "))))
        }
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.pc.close().await.map_err(|e| provider_err("close", e))
    }
}
