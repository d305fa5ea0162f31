//! Reentrancy bookkeeping for in-flight dispatches

use crate::listener::ListenerId;
use crate::stats::SharedCallEntry;
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::Arc;

/// The roster of one dispatch activation: one shared call entry per wrapped
/// listener, keyed by the wrapper's identity, in invocation order.
#[derive(Debug)]
pub(crate) struct Activation {
    entries: Vec<(ListenerId, SharedCallEntry)>,
}

impl Activation {
    pub(crate) fn new(entries: Vec<(ListenerId, SharedCallEntry)>) -> Self {
        Self { entries }
    }

    /// The call entry belonging to a wrapper within this activation
    pub(crate) fn entry_for(&self, wrapper_id: ListenerId) -> Option<SharedCallEntry> {
        self.entries
            .iter()
            .find(|(id, _)| *id == wrapper_id)
            .map(|(_, entry)| entry.clone())
    }

    /// Pretty names of the listeners scheduled after `wrapper_id` that have
    /// not run yet. Used when a listener stops propagation mid-chain.
    pub(crate) fn pending_after(&self, wrapper_id: ListenerId) -> Vec<CompactString> {
        let Some(position) = self.entries.iter().position(|(id, _)| *id == wrapper_id) else {
            return Vec::new();
        };
        self.entries[position + 1..]
            .iter()
            .filter_map(|(_, entry)| {
                let entry = entry.lock();
                (!entry.was_called()).then(|| entry.listener_name().clone())
            })
            .collect()
    }
}

/// Tracks, per event name, the stack of currently-open dispatch
/// activations.
///
/// The stack length for a name equals the current reentrancy depth for
/// that name; an activation is popped on every dispatch return, the
/// failure path included. Depth reaching zero is what makes the outermost
/// activation responsible for unwrapping.
#[derive(Default)]
pub(crate) struct CallStackTracker {
    stacks: HashMap<CompactString, Vec<Arc<Activation>>>,
}

impl CallStackTracker {
    pub(crate) fn enter(&mut self, event_name: CompactString, activation: Arc<Activation>) {
        self.stacks.entry(event_name).or_default().push(activation);
    }

    /// Pop the innermost activation; returns the remaining depth
    pub(crate) fn exit(&mut self, event_name: &str) -> usize {
        let Some(stack) = self.stacks.get_mut(event_name) else {
            return 0;
        };
        stack.pop();
        let remaining = stack.len();
        if remaining == 0 {
            self.stacks.remove(event_name);
        }
        remaining
    }

    pub(crate) fn depth(&self, event_name: &str) -> usize {
        self.stacks.get(event_name).map(Vec::len).unwrap_or(0)
    }

    /// The innermost open activation for an event name
    pub(crate) fn current(&self, event_name: &str) -> Option<Arc<Activation>> {
        self.stacks.get(event_name).and_then(|stack| stack.last().cloned())
    }
}
