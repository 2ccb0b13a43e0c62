// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WebSocket signaling transport.
//!
//! Each [`SignalingConnector::open`] dials `{base}/signal/{stream_id}` and
//! splits the socket into two pump tasks: one drains the link's outbound
//! queue into the socket, the other turns socket frames into
//! [`LinkFrame`]s. Dropping the outbound sender sends a close frame.

use castlink_core::error::{CastlinkError, SignalingError};
use castlink_core::signaling::{LinkFrame, SignalingConnector, SignalingLink, SignalingTarget};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use url::Url;

/// Builds the signaling URL for `target`.
///
/// `http`/`https` bases are mapped to `ws`/`wss`. The auth token and the
/// local peer id travel as query parameters.
///
/// # Errors
///
/// Returns [`CastlinkError::Configuration`] when `base` is not a
/// `ws`, `wss`, `http` or `https` URL.
pub fn signaling_url(base: &Url, target: &SignalingTarget) -> Result<Url, CastlinkError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CastlinkError::Configuration(format!(
                "unsupported signaling URL scheme '{other}'"
            )))
        },
    };
    url.set_scheme(scheme)
        .map_err(|()| CastlinkError::Configuration(format!("cannot use scheme {scheme} for {base}")))?;

    url.path_segments_mut()
        .map_err(|()| CastlinkError::Configuration(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .push("signal")
        .push(&target.stream_id);

    {
        let mut query = url.query_pairs_mut();
        if let Some(token) = &target.token {
            query.append_pair("token", token);
        }
        query.append_pair("peer_id", &target.peer_id);
    }
    Ok(url)
}

/// Copy of `url` that is safe to log.
fn redacted(url: &Url) -> Url {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "...".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown
}

/// Opens signaling channels over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base: Url,
}

impl WebSocketConnector {
    /// # Errors
    ///
    /// Returns [`CastlinkError::Configuration`] if `base` is not a valid URL.
    pub fn new(base: &str) -> Result<Self, CastlinkError> {
        let base = Url::parse(base)
            .map_err(|e| CastlinkError::Configuration(format!("invalid signaling URL '{base}': {e}")))?;
        Ok(Self { base })
    }

    pub const fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait::async_trait]
impl SignalingConnector for WebSocketConnector {
    async fn open(&self, target: &SignalingTarget) -> Result<SignalingLink, SignalingError> {
        let url = signaling_url(&self.base, target)
            .map_err(|e| SignalingError::ConnectFailed(e.to_string()))?;
        tracing::info!(url = %redacted(&url), "Connecting to signaling server");

        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| SignalingError::ConnectFailed(e.to_string()))?;
        tracing::debug!(status = %response.status(), "Signaling WebSocket established");

        let (mut sink, mut stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(error = %e, "Signaling send failed; writer stopping");
                    return;
                }
            }
            // The client hung up.
            let frame = CloseFrame { code: CloseCode::Normal, reason: "viewer closed".into() };
            let _ = sink.send(Message::Close(Some(frame))).await;
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let frame = match item {
                    Ok(Message::Text(text)) => LinkFrame::Text(text.as_str().to_owned()),
                    Ok(Message::Close(frame)) => {
                        let code = frame.map(|f| u16::from(f.code));
                        let _ = inbound_tx.send(LinkFrame::Closed { code, was_clean: true });
                        return;
                    },
                    // Pings are answered by tungstenite; binary frames are not part of the protocol.
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = inbound_tx.send(LinkFrame::Error(e.to_string()));
                        let _ = inbound_tx.send(LinkFrame::Closed { code: None, was_clean: false });
                        return;
                    },
                };
                if inbound_tx.send(frame).is_err() {
                    // Nobody is listening any more.
                    return;
                }
            }
            let _ = inbound_tx.send(LinkFrame::Closed { code: None, was_clean: false });
        });

        Ok(SignalingLink { outbound: outbound_tx, inbound: inbound_rx })
    }
}
