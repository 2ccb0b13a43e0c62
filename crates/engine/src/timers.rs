// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Abortable session timers.
//!
//! A timer is a spawned sleep that, when it elapses, queues
//! `SessionEvent::Timer { kind, id }` through the owning session's
//! [`EventSender`]. The coordinator only acts on a timer event whose id is
//! still the pending one for that kind, so a timer that was cancelled or
//! replaced after it already queued its event is ignored too.

use castlink_core::events::{EventSender, SessionEvent, TimerKind};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

struct PendingTimer {
    id: u64,
    delay: Duration,
    deadline: Instant,
    handle: AbortHandle,
}

/// A pending timer as shown in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub kind: TimerKind,
    pub id: u64,
    /// The delay it was scheduled with.
    pub delay: Duration,
    pub remaining: Duration,
}

/// At most one pending timer per [`TimerKind`].
#[derive(Default)]
pub struct SessionTimers {
    next_id: u64,
    pending: HashMap<TimerKind, PendingTimer>,
}

impl SessionTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `kind` to fire after `delay`, replacing any pending timer of
    /// the same kind. Returns the new timer id.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration, events: &EventSender) -> u64 {
        self.cancel(kind);
        self.next_id += 1;
        let id = self.next_id;
        let session = events.session();
        let events = events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(SessionEvent::Timer { kind, id });
        });
        tracing::debug!(
            session = %session,
            timer = kind.as_str(),
            id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Timer scheduled"
        );
        self.pending.insert(
            kind,
            PendingTimer { id, delay, deadline: Instant::now() + delay, handle: task.abort_handle() },
        );
        id
    }

    /// Cancels the pending timer of `kind`. Returns whether one existed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        if let Some(timer) = self.pending.remove(&kind) {
            timer.handle.abort();
            true
        } else {
            false
        }
    }

    /// Cancels everything. Returns how many timers were pending.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
        n
    }

    /// Consumes a fired timer. Returns `false` if `id` is not the pending
    /// timer for `kind` (cancelled or superseded).
    pub fn fire(&mut self, kind: TimerKind, id: u64) -> bool {
        match self.pending.get(&kind) {
            Some(timer) if timer.id == id => {
                self.pending.remove(&kind);
                true
            },
            _ => false,
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn snapshot(&self) -> Vec<TimerSnapshot> {
        let now = Instant::now();
        let mut timers: Vec<_> = self
            .pending
            .iter()
            .map(|(kind, timer)| TimerSnapshot {
                kind: *kind,
                id: timer.id,
                delay: timer.delay,
                remaining: timer.deadline.saturating_duration_since(now),
            })
            .collect();
        timers.sort_by_key(|t| t.id);
        timers
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castlink_core::events::TaggedEvent;
    use castlink_core::session::SessionId;
    use tokio::sync::mpsc;

    fn sender() -> (EventSender, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender::new(SessionId::new(1), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_with_its_id() {
        let (events, mut rx) = sender();
        let mut timers = SessionTimers::new();
        let id = timers.schedule(TimerKind::Backoff, Duration::from_millis(1_000), &events);

        let tagged = rx.recv().await.unwrap();
        assert!(matches!(tagged.event, SessionEvent::Timer { kind: TimerKind::Backoff, id: got } if got == id));
        assert!(timers.fire(TimerKind::Backoff, id));
        assert!(!timers.fire(TimerKind::Backoff, id));
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous() {
        let (events, mut rx) = sender();
        let mut timers = SessionTimers::new();
        let first = timers.schedule(TimerKind::IceGatherTimeout, Duration::from_secs(5), &events);
        let second = timers.schedule(TimerKind::IceGatherTimeout, Duration::from_secs(10), &events);
        assert_ne!(first, second);
        assert_eq!(timers.len(), 1);

        let tagged = rx.recv().await.unwrap();
        match tagged.event {
            SessionEvent::Timer { id, .. } => assert_eq!(id, second),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!timers.fire(TimerKind::IceGatherTimeout, first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_prevents_delivery() {
        let (events, mut rx) = sender();
        let mut timers = SessionTimers::new();
        timers.schedule(TimerKind::Backoff, Duration::from_secs(1), &events);
        timers.schedule(TimerKind::RecoveryTimeout, Duration::from_secs(30), &events);
        assert_eq!(timers.cancel_all(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_remaining() {
        let (events, _rx) = sender();
        let mut timers = SessionTimers::new();
        timers.schedule(TimerKind::RecoveryTimeout, Duration::from_secs(30), &events);
        tokio::time::advance(Duration::from_secs(10)).await;

        let snap = timers.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].delay, Duration::from_secs(30));
        assert_eq!(snap[0].remaining, Duration::from_secs(20));
    }
}
