// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Default timing and capacity constants for the connection coordinator.
//!
//! Viewer config and [`crate::CoordinatorConfig`] both reference these so the
//! defaults live in one place.

// === Retry Policy ===

/// Automatic retries before a session is marked failed.
///
/// The attempt after the last retry does not recover; it goes straight to
/// `Failed` and waits for an explicit restart.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for the first retry (doubles each attempt).
pub const DEFAULT_BACKOFF_BASE_MS: u64 = castlink_core::backoff::DEFAULT_BASE_DELAY_MS;

/// Cap on any single retry delay.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = castlink_core::backoff::DEFAULT_MAX_DELAY_MS;

// === Session Timers ===

/// How long ICE gathering may run before the session is judged.
///
/// With at least one local candidate the session proceeds to `Connected`;
/// with none it fails with a gathering timeout.
pub const DEFAULT_ICE_GATHER_TIMEOUT_MS: u64 = 12_000;

/// Budget for a whole recovery chain, measured from its first failure.
pub const DEFAULT_RECOVERY_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on awaiting a provider's `stop_tracks` or `close` during teardown.
pub const DEFAULT_TEARDOWN_STEP_TIMEOUT_MS: u64 = 5_000;

// === Channel Capacities ===

/// Buffer size for coordinator control messages (start, close, shutdown).
pub const DEFAULT_COORDINATOR_CONTROL_CAPACITY: usize = 16;

/// Buffer size for coordinator queries (snapshots).
pub const DEFAULT_COORDINATOR_QUERY_CAPACITY: usize = 16;

/// Broadcast capacity for viewer notifications.
///
/// A renderer that falls further behind than this skips the oldest events.
/// Chat bursts are the usual reason to raise it.
pub const DEFAULT_VIEWER_EVENT_CAPACITY: usize = 256;
