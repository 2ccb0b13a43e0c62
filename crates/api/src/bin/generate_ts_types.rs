// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

// Allowed: This is a CLI code generation tool.
// Using println! for progress output is appropriate here.
#![allow(clippy::disallowed_macros)]

use castlink_core::error::{ConnectionErrorKind, NegotiationStep};
use castlink_core::state::{
    ConnectionState, IceConnectionState, IceGatheringState, PeerConnectionState,
};
use castlink_core::types::{IceServer, TrackKind};
use std::fs;
use std::path::PathBuf;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let declarations = vec![
        // castlink-core types
        format!("// castlink-core\nexport {}", ConnectionState::decl()),
        format!("export {}", IceConnectionState::decl()),
        format!("export {}", IceGatheringState::decl()),
        format!("export {}", PeerConnectionState::decl()),
        format!("export {}", ConnectionErrorKind::decl()),
        format!("export {}", NegotiationStep::decl()),
        format!("export {}", TrackKind::decl()),
        format!("export {}", IceServer::decl()),
        // castlink-api types
        format!("\n// castlink-api\nexport {}", castlink_api::SdpType::decl()),
        format!("export {}", castlink_api::SessionDescription::decl()),
        format!("export {}", castlink_api::IceCandidate::decl()),
        format!("export {}", castlink_api::ChatMessageKind::decl()),
        format!("export {}", castlink_api::ChatMessage::decl()),
        format!("export {}", castlink_api::SignalingMessage::decl()),
        format!("export {}", castlink_api::StreamStatus::decl()),
        format!("export {}", castlink_api::StreamInfo::decl()),
        format!("export {}", castlink_api::ApiErrorBody::decl()),
    ];

    let output = declarations.join("\n\n");
    let content = format!("// This file is auto-generated. Do not edit it manually.\n\n{output}\n");

    // Optional first argument overrides the output path.
    let output_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            let workspace_root = manifest_dir
                .parent()
                .and_then(|parent| parent.parent())
                .ok_or("Failed to find workspace root from CARGO_MANIFEST_DIR")?
                .to_path_buf();
            workspace_root.join("bindings/castlink-types.ts")
        },
    };

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    println!("Writing TypeScript bindings to: {}", output_path.display());

    fs::write(&output_path, content)?;

    println!("✅ TypeScript bindings generated successfully.");

    Ok(())
}
