//! Bulk listener registration from subscriber objects

use crate::listener::Listener;
use compact_str::CompactString;

/// A type that declares a set of listeners to register as one unit.
///
/// Adding a subscriber registers every [`Subscription`] it declares;
/// removing it removes exactly the listener handles that were registered,
/// even though `subscribed_events` may build fresh closures on every call
/// (the dispatcher remembers the handles from registration time).
pub trait EventSubscriber: Send + Sync {
    /// The listeners this subscriber contributes, with event names and priorities
    fn subscribed_events(&self) -> Vec<Subscription>;
}

/// One (event name, listener, priority) binding declared by a subscriber
#[derive(Debug, Clone)]
pub struct Subscription {
    pub event_name: CompactString,
    pub listener: Listener,
    pub priority: i32,
}

impl Subscription {
    /// Bind a listener at the default priority 0
    pub fn new(event_name: impl Into<CompactString>, listener: Listener) -> Self {
        Self::with_priority(event_name, listener, 0)
    }

    /// Bind a listener at an explicit priority
    pub fn with_priority(
        event_name: impl Into<CompactString>,
        listener: Listener,
        priority: i32,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            listener,
            priority,
        }
    }
}
