// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Configuration for the connection coordinator.

use crate::constants::{
    DEFAULT_ICE_GATHER_TIMEOUT_MS, DEFAULT_MAX_RETRIES, DEFAULT_RECOVERY_TIMEOUT_MS,
    DEFAULT_TEARDOWN_STEP_TIMEOUT_MS, DEFAULT_VIEWER_EVENT_CAPACITY,
};
use castlink_core::backoff::BackoffPolicy;
use castlink_core::types::PeerConfig;
use std::time::Duration;

/// Configuration for one coordinator actor.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Automatic retries before `Failed` (default: 3)
    pub max_retries: u32,
    /// Delay schedule between retries (default: 1s doubling, capped at 10s)
    pub backoff: BackoffPolicy,
    /// ICE gathering deadline per attempt (default: 12s)
    pub ice_gather_timeout: Duration,
    /// Deadline for a recovery chain, from its first failure (default: 30s)
    pub recovery_timeout: Duration,
    /// Per-step bound on provider cleanup during teardown (default: 5s)
    pub teardown_step_timeout: Duration,
    /// Handed to the provider factory for each new peer connection
    pub peer: PeerConfig,
    /// Broadcast capacity for viewer notifications (default: 256)
    pub viewer_event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: BackoffPolicy::default(),
            ice_gather_timeout: Duration::from_millis(DEFAULT_ICE_GATHER_TIMEOUT_MS),
            recovery_timeout: Duration::from_millis(DEFAULT_RECOVERY_TIMEOUT_MS),
            teardown_step_timeout: Duration::from_millis(DEFAULT_TEARDOWN_STEP_TIMEOUT_MS),
            peer: PeerConfig::default(),
            viewer_event_capacity: DEFAULT_VIEWER_EVENT_CAPACITY,
        }
    }
}
