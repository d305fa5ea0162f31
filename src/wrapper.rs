//! Timed stand-ins substituted for listeners during a dispatch

use crate::dispatcher::Dispatcher;
use crate::event::Event;
use crate::listener::{Listener, ListenerId};
use crate::traceable::TraceableEventDispatcher;
use compact_str::CompactString;

/// Build the instrumented stand-in for one registered listener.
///
/// The wrapper is registered in place of `original` for the duration of a
/// dispatch activation and is pass-through except for bookkeeping: it
/// resolves its call entry in the innermost activation for its event name
/// (nested dispatches of the same name each have their own entries),
/// records start and elapsed time around the original, and emits the
/// per-listener diagnostics. The original is invoked with the traceable
/// dispatcher so that reentrant registration and nested dispatch flow
/// through the instrumentation.
///
/// A failing original keeps its elapsed time up to the failure and the
/// error propagates unchanged; the wrapper never masks a listener failure.
pub(crate) fn wrap(
    original: Listener,
    event_name: CompactString,
    dispatcher: TraceableEventDispatcher,
) -> Listener {
    // the wrapper's own identity keys its slot in each activation, so the
    // id must exist before the callback that captures it
    let wrapper_id = ListenerId::generate();
    let pretty_name = CompactString::from(original.pretty_name());
    let pretty_name_label = pretty_name.clone();

    let callback = move |event: &mut Event, name: &str, _registry: &dyn Dispatcher| {
        let slot = dispatcher.current_entry(&event_name, wrapper_id);

        if let Some(entry) = &slot {
            entry.lock().begin();
        }
        let result = original.call(event, name, &dispatcher);
        if let Some(entry) = &slot {
            entry.lock().finish();
        }

        if result.is_ok() {
            if event.is_propagation_stopped() {
                if let Some(entry) = &slot {
                    entry.lock().mark_stopped();
                }
                dispatcher.diagnostics().stopped_propagation(&event_name, &pretty_name);
                dispatcher.log_not_called_after(&event_name, wrapper_id);
            } else {
                dispatcher.diagnostics().notified(&event_name, &pretty_name);
            }
        }

        result
    };

    Listener::with_id(wrapper_id, pretty_name_label, callback)
}
