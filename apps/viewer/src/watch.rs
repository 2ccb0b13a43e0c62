// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The `watch` command: join a stream and print what happens on it.

use anyhow::Context;
use castlink_api::{StreamDirectory, ViewerBootstrap};
use castlink_core::events::ViewerEvent;
use castlink_core::state::ConnectionState;
use castlink_core::types::ChatMessage;
use castlink_engine::ViewerEngine;
use castlink_transport::{HttpStreamDirectory, WebRtcPeerFactory, WebSocketConnector};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::config::Config;

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Automatic recovery is over.
    Stop,
}

/// One line of console output for `event`.
pub fn render(event: &ViewerEvent) -> String {
    match event {
        ViewerEvent::ChatMessageReceived(message) => render_chat(message),
        ViewerEvent::Status { message, .. } => format!("* {message}"),
        ViewerEvent::ConnectionStateChanged(state) => format!("* state: {state}"),
        ViewerEvent::Track(track) => {
            format!("* receiving {} track {} ({})", track.kind, track.id, track.stream_id)
        },
        ViewerEvent::FatalError { kind, message } => {
            format!("! connection lost ({}): {message}", kind.as_str())
        },
    }
}

fn render_chat(message: &ChatMessage) -> String {
    match message.amount {
        Some(amount) if message.is_super_chat() => {
            format!("[${amount:.2}] {}: {}", message.username, message.content)
        },
        _ => format!("{}: {}", message.username, message.content),
    }
}

pub const fn flow_after(event: &ViewerEvent) -> Flow {
    match event {
        ViewerEvent::FatalError { .. } => Flow::Stop,
        _ => Flow::Continue,
    }
}

async fn bootstrap(
    config: &Config,
    stream_id: &str,
    token: Option<String>,
) -> anyhow::Result<ViewerBootstrap> {
    let directory = HttpStreamDirectory::new(&config.server.api_url, token.clone())?;
    let bootstrap = directory
        .bootstrap(stream_id, token)
        .await
        .with_context(|| format!("Failed to look up stream '{stream_id}'"))?;

    let stream = &bootstrap.stream;
    if !stream.is_live() {
        warn!(stream_id = %stream.id, status = stream.status.as_str(), "Stream is not live; waiting for the broadcaster");
    }
    info!(
        stream_id = %stream.id,
        title = %stream.title,
        viewers = stream.viewer_count,
        chat_enabled = stream.chat_enabled,
        "Resolved stream"
    );
    Ok(bootstrap)
}

/// Prints viewer events until ctrl-c or a fatal error.
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
async fn pump_events(mut events: broadcast::Receiver<ViewerEvent>) -> Flow {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                return Flow::Continue;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", render(&event));
                    if flow_after(&event) == Flow::Stop {
                        return Flow::Stop;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console fell behind; some events were dropped");
                },
                Err(RecvError::Closed) => return Flow::Continue,
            }
        }
    }
}

/// Watches `stream_id` until interrupted.
///
/// # Errors
///
/// Returns an error if the stream cannot be resolved, the configured URLs are
/// invalid, or the connection fails beyond recovery.
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
pub async fn run(config: &Config, stream_id: &str, token: Option<String>) -> anyhow::Result<()> {
    let token = token.or_else(|| config.server.token.clone());
    let bootstrap = bootstrap(config, stream_id, token).await?;
    println!("Watching \"{}\"", bootstrap.stream.title);

    let connector = WebSocketConnector::new(&config.server.signaling_url)?;
    let engine = ViewerEngine::new(Arc::new(connector), Arc::new(WebRtcPeerFactory::new()));
    let handle = engine.start_coordinator(config.coordinator_config(), bootstrap);

    // Subscribe before starting so no early event is missed.
    let events = handle.subscribe();
    handle.start().await.map_err(anyhow::Error::msg)?;
    let pumped = pump_events(events).await;

    let last = handle.snapshot().await.ok();
    handle.close().await.map_err(anyhow::Error::msg)?;
    handle.shutdown_and_wait().await.map_err(anyhow::Error::msg)?;

    if pumped == Flow::Stop {
        let reason = last
            .and_then(|s| s.last_error)
            .map_or_else(|| ConnectionState::Failed.to_string(), |e| e.to_string());
        anyhow::bail!("Connection failed: {reason}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use castlink_core::error::ConnectionErrorKind;
    use castlink_core::types::{TrackHandle, TrackKind};

    #[test]
    fn test_render_chat_and_super_chat() {
        let line = render(&ViewerEvent::ChatMessageReceived(ChatMessage::normal("ana", "hi")));
        assert_eq!(line, "ana: hi");

        let line =
            render(&ViewerEvent::ChatMessageReceived(ChatMessage::super_chat("bo", "gg", 5.0)));
        assert_eq!(line, "[$5.00] bo: gg");
    }

    #[test]
    fn test_render_progress() {
        let status = ViewerEvent::Status {
            message: "Reconnecting in 2s (attempt 2 of 3)".into(),
            attempt: Some(2),
        };
        assert_eq!(render(&status), "* Reconnecting in 2s (attempt 2 of 3)");

        let track = ViewerEvent::Track(TrackHandle::new("v0", "s1", TrackKind::Video));
        assert_eq!(render(&track), "* receiving video track v0 (s1)");
    }

    #[test]
    fn test_only_fatal_errors_stop_the_loop() {
        let fatal = ViewerEvent::FatalError {
            kind: ConnectionErrorKind::Fatal,
            message: "recovery timed out".into(),
        };
        assert_eq!(flow_after(&fatal), Flow::Stop);
        assert!(render(&fatal).contains("recovery timed out"));

        let state = ViewerEvent::ConnectionStateChanged(ConnectionState::Recovering);
        assert_eq!(flow_after(&state), Flow::Continue);
    }
}
