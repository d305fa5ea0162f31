//! Call statistics collected across dispatches

use crate::listener::ListenerId;
use compact_str::CompactString;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One observed (or scheduled but never observed) listener invocation.
///
/// `duration` is `None` for listeners that were skipped after propagation
/// stopped, never dispatched at all, or registered after the last dispatch.
/// `stopped` is set on the invocation that stopped propagation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerCall {
    pub event_name: CompactString,
    pub listener: CompactString,
    pub priority: i32,
    pub duration: Option<Duration>,
    pub stopped: bool,
}

/// Mutable backing record of one scheduled invocation, shared between the
/// collector and the wrapper that fills it in.
#[derive(Debug)]
pub(crate) struct CallEntry {
    event_name: CompactString,
    listener: CompactString,
    listener_id: ListenerId,
    priority: i32,
    started_at: Option<Instant>,
    duration: Option<Duration>,
    stopped: bool,
}

pub(crate) type SharedCallEntry = Arc<Mutex<CallEntry>>;

impl CallEntry {
    /// Open an entry for a listener about to take part in a dispatch.
    /// `listener_id` is the identity of the original (unwrapped) listener.
    pub(crate) fn open(
        event_name: CompactString,
        listener: CompactString,
        listener_id: ListenerId,
        priority: i32,
    ) -> SharedCallEntry {
        Arc::new(Mutex::new(Self {
            event_name,
            listener,
            listener_id,
            priority,
            started_at: None,
            duration: None,
            stopped: false,
        }))
    }

    /// Record the invocation start, just before the original listener runs
    pub(crate) fn begin(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Record elapsed time since `begin`, on success and on failure alike
    pub(crate) fn finish(&mut self) {
        if let Some(started_at) = self.started_at {
            self.duration = Some(started_at.elapsed());
        }
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.stopped = true;
    }

    pub(crate) fn was_called(&self) -> bool {
        self.started_at.is_some()
    }

    pub(crate) fn listener_name(&self) -> &CompactString {
        &self.listener
    }

    pub(crate) fn record(&self) -> ListenerCall {
        ListenerCall {
            event_name: self.event_name.clone(),
            listener: self.listener.clone(),
            priority: self.priority,
            duration: self.duration,
            stopped: self.stopped,
        }
    }
}

/// Accumulates call entries across dispatches until `reset`.
///
/// Append-only during dispatch; entries are deliberately kept after each
/// dispatch returns so callers can query historical data. No deduplication:
/// a listener dispatched twice produces two entries.
#[derive(Default)]
pub(crate) struct CallTracker {
    entries: Mutex<Vec<SharedCallEntry>>,
}

impl CallTracker {
    pub(crate) fn track_all(&self, new: impl IntoIterator<Item = SharedCallEntry>) {
        self.entries.lock().extend(new);
    }

    pub(crate) fn reset(&self) {
        self.entries.lock().clear();
    }

    /// Entries whose listener actually ran, in dispatch order then priority
    pub(crate) fn called(&self) -> Vec<ListenerCall> {
        self.partition(true)
    }

    /// Entries whose listener never ran
    pub(crate) fn not_called(&self) -> Vec<ListenerCall> {
        self.partition(false)
    }

    fn partition(&self, called: bool) -> Vec<ListenerCall> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.lock().record())
            .filter(|record| record.duration.is_some() == called)
            .collect()
    }

    /// Whether any entry (called or not) exists for this listener identity
    pub(crate) fn has_entry(&self, event_name: &str, listener_id: ListenerId) -> bool {
        self.entries.lock().iter().any(|entry| {
            let entry = entry.lock();
            entry.event_name == event_name && entry.listener_id == listener_id
        })
    }
}
