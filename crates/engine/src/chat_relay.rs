// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pass-through from signaling chat traffic to the renderer.
//!
//! The relay holds no state of its own. It only sees messages the coordinator
//! accepted for the live session, so it shares that session's signaling
//! lifecycle: once the channel is torn down nothing reaches it.

use castlink_core::events::{viewer_helpers, ViewerEvent};
use castlink_core::types::ChatMessage;
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use tokio::sync::broadcast;

pub struct ChatRelay {
    viewer_tx: broadcast::Sender<ViewerEvent>,
    relayed_counter: Counter<u64>,
}

impl ChatRelay {
    pub fn new(viewer_tx: broadcast::Sender<ViewerEvent>) -> Self {
        let meter = global::meter("castlink_engine");
        Self {
            viewer_tx,
            relayed_counter: meter
                .u64_counter("chat.messages_relayed")
                .with_description("Chat messages forwarded to the renderer")
                .build(),
        }
    }

    pub fn relay(&self, message: ChatMessage) {
        let kind = if message.is_super_chat() { "super_chat" } else { "normal" };
        tracing::debug!(username = %message.username, kind, "Relaying chat message");
        self.relayed_counter.add(1, &[KeyValue::new("kind", kind)]);
        viewer_helpers::emit_chat(&self.viewer_tx, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_forwards_unchanged() {
        let (tx, mut rx) = broadcast::channel(8);
        let relay = ChatRelay::new(tx);
        let message = ChatMessage::super_chat("ana", "great set!", 10.0);
        relay.relay(message.clone());

        match rx.try_recv().unwrap() {
            ViewerEvent::ChatMessageReceived(got) => assert_eq!(got, message),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_relay_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        ChatRelay::new(tx).relay(ChatMessage::normal("bo", "hi"));
    }
}
