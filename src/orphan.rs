//! Orphaned event tracking

use compact_str::CompactString;
use parking_lot::Mutex;

/// Records event names that were dispatched while no listener was
/// registered for them. Insertion-ordered set semantics: a name is stored
/// once no matter how often it is dispatched without listeners.
#[derive(Debug, Default)]
pub(crate) struct OrphanTracker {
    events: Mutex<Vec<CompactString>>,
}

impl OrphanTracker {
    pub(crate) fn record(&self, event_name: &str) {
        let mut events = self.events.lock();
        if !events.iter().any(|name| name.as_str() == event_name) {
            events.push(CompactString::from(event_name));
        }
    }

    pub(crate) fn reset(&self) {
        self.events.lock().clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<CompactString> {
        self.events.lock().clone()
    }
}
