//! The traceable dispatcher facade

use crate::call_stack::{Activation, CallStackTracker};
use crate::dispatcher::Dispatcher;
use crate::error::EventError;
use crate::event::Event;
use crate::listener::{Listener, ListenerId};
use crate::logging::{DiagnosticLogger, TracingLogger};
use crate::orphan::OrphanTracker;
use crate::stats::{CallEntry, CallTracker, ListenerCall, SharedCallEntry};
use crate::subscriber::EventSubscriber;
use crate::wrapper;
use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One (original, wrapper) substitution currently installed in the registry
struct ActiveWrapper {
    original: Listener,
    wrapper: Listener,
    priority: i32,
}

struct Shared {
    inner: Arc<dyn Dispatcher>,
    logger: Arc<dyn DiagnosticLogger>,
    call_stack: Mutex<CallStackTracker>,
    calls: CallTracker,
    orphans: OrphanTracker,
    /// Per event name, the wrapper roster for the in-flight outermost
    /// activation. Present exactly while listeners for that name are
    /// substituted in the underlying registry.
    wrapped: Mutex<HashMap<CompactString, Vec<ActiveWrapper>>>,
}

/// Instrumentation facade over a listener registry.
///
/// Exposes the same [`Dispatcher`] contract as the registry it wraps.
/// Registration and queries delegate straight through; `dispatch`
/// temporarily substitutes every registered listener for the event name
/// with a timed wrapper at the same priority, delegates to the registry's
/// own dispatch loop, and restores the originals afterwards. Collected
/// call statistics and orphaned event names accumulate until
/// [`reset`](TraceableEventDispatcher::reset).
///
/// The handle is cheap to clone; clones share all state. Dispatch is
/// strictly synchronous, and nested dispatch from inside a listener (for
/// the same or a different event name) is tracked per activation, so
/// reentrant accounting stays independent.
#[derive(Clone)]
pub struct TraceableEventDispatcher {
    shared: Arc<Shared>,
}

impl TraceableEventDispatcher {
    /// Wrap a registry, logging diagnostics through [`TracingLogger`]
    pub fn new(inner: Arc<dyn Dispatcher>) -> Self {
        Self::with_logger(inner, Arc::new(TracingLogger))
    }

    /// Wrap a registry with an explicit diagnostics sink
    pub fn with_logger(inner: Arc<dyn Dispatcher>, logger: Arc<dyn DiagnosticLogger>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner,
                logger,
                call_stack: Mutex::new(CallStackTracker::default()),
                calls: CallTracker::default(),
                orphans: OrphanTracker::default(),
                wrapped: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The wrapped registry
    pub fn inner(&self) -> &Arc<dyn Dispatcher> {
        &self.shared.inner
    }

    /// Clear collected call statistics and orphaned events.
    ///
    /// Registered listeners and in-flight dispatches are unaffected.
    pub fn reset(&self) {
        self.shared.calls.reset();
        self.shared.orphans.reset();
    }

    /// Listener invocations observed since the last reset, in dispatch
    /// order then priority
    pub fn called_listeners(&self) -> Vec<ListenerCall> {
        self.shared.calls.called()
    }

    /// Listeners that did not run: entries skipped after propagation
    /// stopped or a listener failed, plus a synthetic record for every
    /// currently-registered listener with no recorded entry at all.
    pub fn not_called_listeners(&self) -> Vec<ListenerCall> {
        let mut records = self.shared.calls.not_called();
        for event_name in self.shared.inner.event_names() {
            for (listener, priority) in self.listeners(&event_name) {
                if !self.shared.calls.has_entry(&event_name, listener.id()) {
                    records.push(ListenerCall {
                        event_name: event_name.clone(),
                        listener: CompactString::from(listener.pretty_name()),
                        priority,
                        duration: None,
                        stopped: false,
                    });
                }
            }
        }
        records
    }

    /// Event names dispatched with no registered listeners, in first-seen
    /// order
    pub fn orphaned_events(&self) -> Vec<CompactString> {
        self.shared.orphans.snapshot()
    }

    pub(crate) fn diagnostics(&self) -> &dyn DiagnosticLogger {
        self.shared.logger.as_ref()
    }

    /// The call entry for `wrapper_id` in the innermost open activation of
    /// `event_name`, if any
    pub(crate) fn current_entry(
        &self,
        event_name: &str,
        wrapper_id: ListenerId,
    ) -> Option<SharedCallEntry> {
        let call_stack = self.shared.call_stack.lock();
        call_stack.current(event_name)?.entry_for(wrapper_id)
    }

    /// Emit the not-called diagnostic for every listener scheduled after
    /// `wrapper_id` in the innermost activation that has not run
    pub(crate) fn log_not_called_after(&self, event_name: &str, wrapper_id: ListenerId) {
        let skipped = {
            let call_stack = self.shared.call_stack.lock();
            match call_stack.current(event_name) {
                Some(activation) => activation.pending_after(wrapper_id),
                None => Vec::new(),
            }
        };
        for listener in &skipped {
            self.shared.logger.not_called(event_name, listener);
        }
    }

    /// Substitute every listener registered for `event_name` with a timed
    /// wrapper at the same priority. Skipped when an activation for this
    /// name is already open: its listeners are wrapped already, and
    /// wrapping twice would corrupt the identity mapping.
    fn pre_process(&self, event_name: &str) {
        if self.shared.call_stack.lock().depth(event_name) > 0 {
            return;
        }
        let originals = self.shared.inner.listeners(event_name);
        if originals.is_empty() {
            return;
        }
        let mut wrapped = self.shared.wrapped.lock();
        let roster = wrapped.entry(CompactString::from(event_name)).or_default();
        for (original, priority) in originals {
            let wrapper =
                wrapper::wrap(original.clone(), CompactString::from(event_name), self.clone());
            self.shared.inner.remove_listener(event_name, &original);
            self.shared.inner.add_listener(event_name, wrapper.clone(), priority);
            roster.push(ActiveWrapper {
                original,
                wrapper,
                priority,
            });
        }
    }

    /// Open a fresh activation for this dispatch: one call entry per
    /// currently wrapped listener, in priority order. Nested dispatches of
    /// the same name get their own entries, never the outer activation's.
    fn open_activation(&self, event_name: &str) {
        let entries: Vec<(ListenerId, SharedCallEntry)> = {
            let wrapped = self.shared.wrapped.lock();
            wrapped
                .get(event_name)
                .map(|roster| {
                    roster
                        .iter()
                        .map(|active| {
                            let entry = CallEntry::open(
                                CompactString::from(event_name),
                                CompactString::from(active.original.pretty_name()),
                                active.original.id(),
                                active.priority,
                            );
                            (active.wrapper.id(), entry)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        self.shared.calls.track_all(entries.iter().map(|(_, entry)| entry.clone()));
        let activation = Arc::new(Activation::new(entries));
        self.shared
            .call_stack
            .lock()
            .enter(CompactString::from(event_name), activation);
    }

    /// Close the innermost activation. Only the outermost one (depth back
    /// to zero) restores the original listeners; a nested dispatch of the
    /// same name must leave the wrappers in place for the outer activation.
    fn post_process(&self, event_name: &str) {
        let remaining = self.shared.call_stack.lock().exit(event_name);
        if remaining > 0 {
            return;
        }
        let roster = self.shared.wrapped.lock().remove(event_name).unwrap_or_default();
        for active in roster {
            self.shared.inner.remove_listener(event_name, &active.wrapper);
            self.shared.inner.add_listener(event_name, active.original, active.priority);
        }
    }
}

/// Runs the post-processing on every exit path out of `dispatch`,
/// listener failures included
struct DispatchGuard<'a> {
    dispatcher: &'a TraceableEventDispatcher,
    event_name: &'a str,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.post_process(self.event_name);
    }
}

impl Dispatcher for TraceableEventDispatcher {
    fn add_listener(&self, event_name: &str, listener: Listener, priority: i32) {
        self.shared.inner.add_listener(event_name, listener, priority);
    }

    fn remove_listener(&self, event_name: &str, listener: &Listener) -> bool {
        // while a dispatch is in flight the registry holds the wrapper, so
        // removal by the original handle must resolve through the roster
        let wrapper = {
            let mut wrapped = self.shared.wrapped.lock();
            wrapped.get_mut(event_name).and_then(|roster| {
                roster
                    .iter()
                    .position(|active| active.original == *listener)
                    .map(|index| roster.remove(index).wrapper)
            })
        };
        match wrapper {
            Some(wrapper) => self.shared.inner.remove_listener(event_name, &wrapper),
            None => self.shared.inner.remove_listener(event_name, listener),
        }
    }

    fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.shared.inner.add_subscriber(subscriber);
    }

    fn remove_subscriber(&self, subscriber: &Arc<dyn EventSubscriber>) {
        self.shared.inner.remove_subscriber(subscriber);
    }

    fn listeners(&self, event_name: &str) -> Vec<(Listener, i32)> {
        // expose originals, never wrappers
        let wrapped = self.shared.wrapped.lock();
        let roster = wrapped.get(event_name);
        self.shared
            .inner
            .listeners(event_name)
            .into_iter()
            .map(|(listener, priority)| {
                let original = roster
                    .and_then(|roster| roster.iter().find(|active| active.wrapper == listener))
                    .map(|active| active.original.clone());
                (original.unwrap_or(listener), priority)
            })
            .collect()
    }

    fn event_names(&self) -> Vec<CompactString> {
        self.shared.inner.event_names()
    }

    fn has_listeners(&self, event_name: &str) -> bool {
        self.shared.inner.has_listeners(event_name)
    }

    fn listener_priority(&self, event_name: &str, listener: &Listener) -> Option<i32> {
        let wrapper = {
            let wrapped = self.shared.wrapped.lock();
            wrapped.get(event_name).and_then(|roster| {
                roster
                    .iter()
                    .find(|active| active.original == *listener)
                    .map(|active| active.wrapper.clone())
            })
        };
        match wrapper {
            Some(wrapper) => self.shared.inner.listener_priority(event_name, &wrapper),
            None => self.shared.inner.listener_priority(event_name, listener),
        }
    }

    fn dispatch(&self, event: &mut Event, event_name: &str) -> Result<(), EventError> {
        self.pre_process(event_name);
        if !self.shared.inner.has_listeners(event_name) {
            self.shared.orphans.record(event_name);
        }
        self.open_activation(event_name);

        let _guard = DispatchGuard {
            dispatcher: self,
            event_name,
        };
        self.shared.inner.dispatch(event, event_name)
    }
}
