// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The answer-side SDP sequence, run as a session-owned task.
//!
//! Each step's outcome is reported back through the session's
//! [`EventSender`]; the coordinator applies it when it dequeues the event.
//! Sending the answer is left to the coordinator, which owns the signaling
//! channel.

use castlink_core::error::NegotiationStep;
use castlink_core::events::{EventSender, NegotiationEvent};
use castlink_core::provider::PeerConnectionFactory;
use castlink_core::types::{PeerConfig, SessionDescription};
use std::sync::Arc;

pub(crate) async fn negotiate(
    factory: Arc<dyn PeerConnectionFactory>,
    config: PeerConfig,
    offer: SessionDescription,
    events: EventSender,
) {
    let session = events.session();
    let fail = |step: NegotiationStep, reason: String| {
        tracing::warn!(%session, %step, %reason, "Negotiation step failed");
        events.emit_negotiation(NegotiationEvent::StepFailed { step, reason });
    };

    let provider = match factory.create(&config, events.clone()).await {
        Ok(provider) => provider,
        Err(e) => return fail(NegotiationStep::CreatePeer, e.to_string()),
    };

    if !events.emit_negotiation(NegotiationEvent::ProviderReady(provider.clone())) {
        // Session torn down while the provider was being built.
        tracing::debug!(%session, "Closing provider created for a retired session");
        if let Err(e) = provider.close().await {
            tracing::warn!(%session, error = %e, "Failed to close orphaned provider");
        }
        return;
    }

    if let Err(e) = provider.set_remote_description(offer).await {
        return fail(NegotiationStep::RemoteDescription, e.to_string());
    }
    events.emit_negotiation(NegotiationEvent::RemoteDescriptionApplied);

    let answer = match provider.create_answer().await {
        Ok(answer) => answer,
        Err(e) => return fail(NegotiationStep::CreateAnswer, e.to_string()),
    };

    if let Err(e) = provider.set_local_description(answer.clone()).await {
        return fail(NegotiationStep::LocalDescription, e.to_string());
    }
    tracing::debug!(%session, "Local description applied");
    events.emit_negotiation(NegotiationEvent::LocalDescriptionApplied(answer));
}
