//! The dispatcher contract and the synchronous listener registry

use crate::error::EventError;
use crate::event::Event;
use crate::listener::Listener;
use crate::subscriber::EventSubscriber;
use compact_str::CompactString;
use dashmap::DashMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Object-safe contract shared by the plain registry and the traceable
/// facade.
///
/// Listeners are invoked with the dispatcher that ran them as
/// `&dyn Dispatcher`, so code written against this trait behaves the same
/// whether or not it is instrumented.
pub trait Dispatcher: Send + Sync {
    /// Register a listener for an event name at the given priority
    /// (higher runs earlier)
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32);

    /// Remove a previously registered listener. Returns `false` when the
    /// listener was not registered for that event name (no-op).
    fn remove_listener(&self, event_name: &str, listener: &Listener) -> bool;

    /// Register every listener a subscriber declares
    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>);

    /// Remove exactly the listeners that were registered for this subscriber
    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>);

    /// Listeners for an event name with their priorities, ordered by
    /// descending priority; stable for equal priorities.
    fn listeners(&self, event_name: &str) -> Vec<(Listener, i32)>;

    /// Every event name that currently has at least one listener
    fn event_names(&self) -> Vec<CompactString>;

    /// Whether any listener is registered for the event name
    fn has_listeners(&self, event_name: &str) -> bool;

    /// Priority of a registered listener, `None` when not registered
    fn listener_priority(&self, event_name: &str, listener: &Listener) -> Option<i32>;

    /// Invoke the listeners for `event_name` in priority order on the
    /// calling thread.
    ///
    /// The chain halts early when the event reports propagation stopped
    /// (checked before each listener) or when a listener returns an error,
    /// which propagates to the caller unchanged. The caller keeps the
    /// (possibly mutated) event through the `&mut` borrow.
    fn dispatch(&self, event: &mut Event, event_name: &str) -> Result<(), EventError>;
}

#[derive(Clone)]
struct ListenerEntry {
    listener: Listener,
    priority: i32,
}

struct SubscriberBinding {
    subscriber: Arc<dyn EventSubscriber>,
    bound: Vec<(CompactString, Listener)>,
}

/// Synchronous in-process listener registry.
///
/// Listeners are stored per event name in insertion order and sorted by
/// priority on read. The dispatch loop snapshots the sorted chain before
/// invoking anything, so listeners may add or remove listeners (including
/// themselves) reentrantly; such changes take effect from the next
/// dispatch.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: DashMap<CompactString, SmallVec<[ListenerEntry; 4]>>,
    subscribers: Mutex<Vec<SubscriberBinding>>,
}

impl EventDispatcher {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_entries(&self, event_name: &str) -> SmallVec<[ListenerEntry; 4]> {
        let mut entries = self
            .listeners
            .get(event_name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        // stable sort keeps insertion order within equal priorities
        entries.sort_by_key(|entry| Reverse(entry.priority));
        entries
    }
}

impl Dispatcher for EventDispatcher {
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32) {
        debug!(
            event = event_name,
            listener = listener.pretty_name(),
            priority,
            "registered listener"
        );
        self.listeners
            .entry(CompactString::from(event_name))
            .or_default()
            .push(ListenerEntry { listener, priority });
    }

    fn remove_listener(&self, event_name: &str, listener: &Listener) -> bool {
        let mut removed = false;
        if let Some(mut entries) = self.listeners.get_mut(event_name) {
            if let Some(index) = entries.iter().position(|e| e.listener == *listener) {
                entries.remove(index);
                removed = true;
            }
        }
        if removed {
            // drop empty buckets so has_listeners stays accurate
            self.listeners.remove_if(event_name, |_, entries| entries.is_empty());
        }
        removed
    }

    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) {
        let mut bound = Vec::new();
        for subscription in subscriber.subscribed_events() {
            bound.push((subscription.event_name.clone(), subscription.listener.clone()));
            self.add_listener(
                &subscription.event_name,
                subscription.listener,
                subscription.priority,
            );
        }
        self.subscribers.lock().push(SubscriberBinding { subscriber, bound });
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>) {
        let binding = {
            let mut subscribers = self.subscribers.lock();
            subscribers
                .iter()
                .position(|b| Arc::ptr_eq(&b.subscriber, subscriber))
                .map(|index| subscribers.remove(index))
        };
        if let Some(binding) = binding {
            for (event_name, listener) in &binding.bound {
                self.remove_listener(event_name, listener);
            }
        }
    }

    fn listeners(&self, event_name: &str) -> Vec<(Listener, i32)> {
        self.sorted_entries(event_name)
            .into_iter()
            .map(|entry| (entry.listener, entry.priority))
            .collect()
    }

    fn event_names(&self) -> Vec<CompactString> {
        self.listeners.iter().map(|entry| entry.key().clone()).collect()
    }

    fn has_listeners(&self, event_name: &str) -> bool {
        self.listeners
            .get(event_name)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    fn listener_priority(&self, event_name: &str, listener: &Listener) -> Option<i32> {
        let entries = self.listeners.get(event_name)?;
        entries
            .iter()
            .find(|entry| entry.listener == *listener)
            .map(|entry| entry.priority)
    }

    fn dispatch(&self, event: &mut Event, event_name: &str) -> Result<(), EventError> {
        // snapshot: no registry lock is held while listeners run
        let entries = self.sorted_entries(event_name);
        for entry in entries {
            if event.is_propagation_stopped() {
                break;
            }
            entry.listener.call(event, event_name, self)?;
        }
        Ok(())
    }
}
