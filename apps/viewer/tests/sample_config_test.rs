// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::expect_used)]

use castlink_viewer::config::{LogFormat, LogLevel};
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn samples_castlink_toml_parses_and_converts() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .parent()
        .and_then(|parent| parent.parent())
        .expect("castlink-viewer should live under workspace_root/apps/viewer");
    let sample_path = repo_root.join("samples/castlink.toml");

    let figment = Figment::new().merge(Serialized::defaults(castlink_viewer::Config::default()));
    let config: castlink_viewer::Config = match figment.merge(Toml::file(&sample_path)).extract() {
        Ok(cfg) => cfg,
        Err(e) => panic!("samples/castlink.toml should parse as castlink_viewer::Config: {e}"),
    };

    assert_eq!(config.server.api_url, "http://localhost:8000");
    assert!(config.server.token.is_none());
    assert!(matches!(config.log.file_format, LogFormat::Json));
    assert!(matches!(config.log.file_level, LogLevel::Debug));

    let engine = config.coordinator_config();
    assert_eq!(engine.max_retries, 3);
    assert_eq!(engine.backoff.delay(0), Duration::from_secs(1));
    assert_eq!(engine.backoff.delay(5), Duration::from_secs(10));
    assert_eq!(engine.ice_gather_timeout, Duration::from_secs(12));
    assert_eq!(engine.recovery_timeout, Duration::from_secs(30));
    assert_eq!(engine.peer.ice_candidate_pool_size, 10);
    assert_eq!(engine.peer.ice_servers.len(), 2);
    assert_eq!(engine.peer.ice_servers[0].urls.len(), 2);
    assert_eq!(engine.peer.ice_servers[1].credential.as_deref(), Some("change-me"));
}
