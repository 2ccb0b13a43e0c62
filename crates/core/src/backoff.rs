// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Capped exponential backoff for reconnect attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Upper bound on any single retry delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Maps a zero-based retry attempt to a delay: `min(base * 2^attempt, max)`.
///
/// The result is never below `base_delay`, even if `max_delay` is configured
/// lower than the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay to wait before retry `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^20 already dwarfs any sane cap; clamping keeps the shift in range.
        let shift = attempt.min(20);
        let factor = 1u32 << shift;
        let raw = self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX);
        raw.min(self.max_delay).max(self.base_delay)
    }
}
