//! One-shot timers feeding the controller loop
//!
//! Each timer kind has at most one armed instance. Arming a kind again aborts
//! the previous task. Firings carry a generation so a firing that raced with
//! a cancel is recognised as stale and ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::events::{EventSender, KioskEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Time-of-day reload chain
    ScheduledReload,
    /// Legacy `reloadInterval` repeat
    LegacyReload,
    /// Re-issue of a failed navigation
    LoadRetry,
    /// Layout injection after load-complete
    LayoutSettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

struct ArmedTimer {
    generation: u64,
    delay: Duration,
    task: JoinHandle<()>,
}

pub struct Timers {
    events: EventSender,
    next_generation: u64,
    armed: HashMap<TimerKind, ArmedTimer>,
}

impl Timers {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            next_generation: 0,
            armed: HashMap::new(),
        }
    }

    /// Arm `kind` to fire once after `delay`, replacing any armed instance
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        self.next_generation += 1;
        let generation = self.next_generation;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the loop already exited.
            let _ = events.send(KioskEvent::Timer(TimerFired { kind, generation }));
        });
        trace!(kind = ?kind, generation, delay_ms = delay.as_millis() as u64, "Armed timer");
        self.armed.insert(kind, ArmedTimer { generation, delay, task });
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.armed.remove(&kind) {
            Some(timer) => {
                timer.task.abort();
                trace!(kind = ?kind, generation = timer.generation, "Cancelled timer");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.armed.drain() {
            timer.task.abort();
        }
    }

    /// Consume a firing; false when it was cancelled or superseded
    pub fn take_if_current(&mut self, fired: TimerFired) -> bool {
        match self.armed.get(&fired.kind) {
            Some(timer) if timer.generation == fired.generation => {
                self.armed.remove(&fired.kind);
                true
            }
            _ => false,
        }
    }

    pub fn armed_delay(&self, kind: TimerKind) -> Option<Duration> {
        self.armed.get(&kind).map(|timer| timer.delay)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
