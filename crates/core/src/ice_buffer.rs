// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Holding area for ICE candidates that arrive before they can be used.

use crate::types::IceCandidate;
use std::collections::VecDeque;

/// Most candidates a buffer holds before it starts dropping new ones.
pub const MAX_PENDING_CANDIDATES: usize = 20;

/// Bounded FIFO of candidates waiting for a remote description (inbound) or
/// for the answer to go out (outbound).
#[derive(Debug)]
pub struct PendingIceBuffer {
    queue: VecDeque<IceCandidate>,
    capacity: usize,
}

impl Default for PendingIceBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_PENDING_CANDIDATES)
    }
}

impl PendingIceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { queue: VecDeque::with_capacity(capacity), capacity }
    }

    /// Queues `candidate`. Returns `false`, leaving the buffer unchanged, when
    /// it is already full.
    pub fn push(&mut self, candidate: IceCandidate) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(candidate);
        true
    }

    /// Takes every buffered candidate in arrival order.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.queue.drain(..).collect()
    }

    /// Drops everything. Returns how many candidates were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.queue.len();
        self.queue.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let mut buffer = PendingIceBuffer::new();
        buffer.push(IceCandidate::new("a"));
        buffer.push(IceCandidate::new("b"));
        assert_eq!(buffer.len(), 2);

        let drained: Vec<_> = buffer.drain().into_iter().map(|c| c.candidate).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_full_buffer_keeps_earliest() {
        let mut buffer = PendingIceBuffer::with_capacity(2);
        assert!(buffer.push(IceCandidate::new("a")));
        assert!(buffer.push(IceCandidate::new("b")));
        assert!(!buffer.push(IceCandidate::new("c")));
        assert_eq!(buffer.len(), 2);

        let drained: Vec<_> = buffer.drain().into_iter().map(|c| c.candidate).collect();
        assert_eq!(drained, vec!["a", "b"]);
        assert!(buffer.push(IceCandidate::new("d")));
    }

    #[test]
    fn test_default_capacity() {
        let mut buffer = PendingIceBuffer::new();
        let accepted =
            (0..MAX_PENDING_CANDIDATES + 5).filter(|i| buffer.push(IceCandidate::new(i.to_string()))).count();
        assert_eq!(accepted, MAX_PENDING_CANDIDATES);
    }

    #[test]
    fn test_clear_reports_discarded() {
        let mut buffer = PendingIceBuffer::new();
        buffer.push(IceCandidate::new("a"));
        assert_eq!(buffer.clear(), 1);
        assert_eq!(buffer.clear(), 0);
    }
}
