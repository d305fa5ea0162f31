//! Integration tests for the traceable dispatcher facade

use crate::*;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

fn traceable() -> (Arc<EventDispatcher>, TraceableEventDispatcher) {
    let registry = Arc::new(EventDispatcher::new());
    let dispatcher =
        TraceableEventDispatcher::with_logger(registry.clone(), Arc::new(NullLogger));
    (registry, dispatcher)
}

fn noop() -> Listener {
    Listener::closure(|_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| Ok(()))
}

fn tagging(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Listener {
    Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
        log.lock().push(tag);
        Ok(())
    })
}

fn stopper() -> Listener {
    Listener::closure(|event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
        event.stop_propagation();
        Ok(())
    })
}

#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<(&'static str, String, String)>>,
}

impl RecordingLogger {
    fn lines(&self) -> Vec<(&'static str, String, String)> {
        self.lines.lock().clone()
    }

    fn push(&self, kind: &'static str, event: &str, listener: &str) {
        self.lines.lock().push((kind, event.to_string(), listener.to_string()));
    }
}

impl DiagnosticLogger for RecordingLogger {
    fn notified(&self, event: &str, listener: &str) {
        self.push("notified", event, listener);
    }

    fn stopped_propagation(&self, event: &str, listener: &str) {
        self.push("stopped", event, listener);
    }

    fn not_called(&self, event: &str, listener: &str) {
        self.push("not_called", event, listener);
    }
}

#[test]
fn test_add_remove_listener_delegates_to_registry() {
    let (registry, dispatcher) = traceable();
    let listener = noop();

    dispatcher.add_listener("foo", listener.clone(), 0);
    let registered = registry.listeners("foo");
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].0, listener);

    assert!(dispatcher.remove_listener("foo", &listener));
    assert!(registry.listeners("foo").is_empty());
}

#[test]
fn test_listeners_match_registry() {
    let (registry, dispatcher) = traceable();

    dispatcher.add_listener("foo", noop(), 3);

    assert_eq!(registry.listeners("foo"), dispatcher.listeners("foo"));
    assert_eq!(dispatcher.inner().listeners("foo"), dispatcher.listeners("foo"));
}

#[test]
fn test_has_listeners() {
    let (registry, dispatcher) = traceable();

    assert!(!registry.has_listeners("foo"));
    assert!(!dispatcher.has_listeners("foo"));

    dispatcher.add_listener("foo", noop(), 0);

    assert!(registry.has_listeners("foo"));
    assert!(dispatcher.has_listeners("foo"));
}

#[test]
fn test_priority_preserved_across_dispatch() {
    let (registry, dispatcher) = traceable();
    let listener = noop();

    dispatcher.add_listener("foo", listener.clone(), 123);
    assert_eq!(dispatcher.listener_priority("foo", &listener), Some(123));

    // wrap and unwrap in pre/post-processing must not lose the priority,
    // and the registry must hold the original handle again afterwards
    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(dispatcher.listener_priority("foo", &listener), Some(123));
    assert_eq!(registry.listener_priority("foo", &listener), Some(123));
}

#[test]
fn test_priority_query_while_dispatching() {
    let (_registry, dispatcher) = traceable();
    let observed = Arc::new(Mutex::new(None));
    let handle: Arc<OnceLock<Listener>> = Arc::new(OnceLock::new());

    let listener = {
        let observed = observed.clone();
        let handle = handle.clone();
        Listener::closure(move |_event: &mut Event, _name: &str, dispatcher: &dyn Dispatcher| {
            if let Some(me) = handle.get() {
                *observed.lock() = dispatcher.listener_priority("bar", me);
            }
            Ok(())
        })
    };
    handle.set(listener.clone()).unwrap();

    dispatcher.add_listener("bar", listener, 5);
    dispatcher.dispatch(&mut Event::new(), "bar").unwrap();

    // resolved through the wrapper roster while the registry held the stand-in
    assert_eq!(*observed.lock(), Some(5));
}

struct InvoiceSubscriber;

impl EventSubscriber for InvoiceSubscriber {
    fn subscribed_events(&self) -> Vec<Subscription> {
        vec![Subscription::new(
            "foo",
            Listener::of_method::<Self, _>(
                "on_foo",
                |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| Ok(()),
            ),
        )]
    }
}

#[test]
fn test_add_remove_subscriber() {
    let (registry, dispatcher) = traceable();
    let subscriber: Arc<dyn EventSubscriber> = Arc::new(InvoiceSubscriber);

    dispatcher.add_subscriber(subscriber.clone());
    assert_eq!(registry.listeners("foo").len(), 1);

    dispatcher.remove_subscriber(&subscriber);
    assert!(registry.listeners("foo").is_empty());
}

#[test]
fn test_called_and_not_called_listeners() {
    let (_registry, dispatcher) = traceable();
    dispatcher.add_listener("foo", noop(), 5);

    // before any dispatch: one synthetic not-called record from the registry
    assert!(dispatcher.called_listeners().is_empty());
    let not_called = dispatcher.not_called_listeners();
    assert_eq!(not_called.len(), 1);
    assert_eq!(not_called[0].event_name, "foo");
    assert_eq!(not_called[0].listener, "closure");
    assert_eq!(not_called[0].priority, 5);
    assert!(not_called[0].duration.is_none());

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    let called = dispatcher.called_listeners();
    assert_eq!(called.len(), 1);
    assert!(called[0].duration.is_some());
    assert!(dispatcher.not_called_listeners().is_empty());
}

#[test]
fn test_duration_covers_listener_execution() {
    let (_registry, dispatcher) = traceable();
    dispatcher.add_listener(
        "foo",
        Listener::closure(|_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            std::thread::sleep(Duration::from_millis(10));
            Ok(())
        }),
        0,
    );

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    let called = dispatcher.called_listeners();
    assert!(called[0].duration.unwrap() >= Duration::from_millis(10));
}

#[test]
fn test_reset_clears_history_but_not_listeners() {
    let (_registry, dispatcher) = traceable();
    dispatcher.add_listener("foo", noop(), 5);
    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    dispatcher.reset();

    assert!(dispatcher.called_listeners().is_empty());
    let not_called = dispatcher.not_called_listeners();
    assert_eq!(not_called.len(), 1);
    assert_eq!(not_called[0].priority, 5);
}

#[test]
fn test_dispatch_after_reset_records_again() {
    let (_registry, dispatcher) = traceable();
    dispatcher.add_listener("foo", noop(), 5);

    dispatcher.reset();
    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    let called = dispatcher.called_listeners();
    assert_eq!(called.len(), 1);
    assert_eq!(called[0].event_name, "foo");
}

#[test]
fn test_nested_dispatch_of_other_event() {
    let (_registry, dispatcher) = traceable();
    let nested_called = Arc::new(Mutex::new(false));

    let inner = dispatcher.clone();
    dispatcher.add_listener(
        "foo",
        Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            inner.dispatch(&mut Event::new(), "bar")
        }),
        0,
    );
    let flag = nested_called.clone();
    dispatcher.add_listener(
        "bar",
        Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            *flag.lock() = true;
            Ok(())
        }),
        0,
    );

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert!(*nested_called.lock());
    assert_eq!(dispatcher.called_listeners().len(), 2);
}

#[test]
fn test_nested_dispatch_of_same_event() {
    let (_registry, dispatcher) = traceable();
    let loop_count = Arc::new(Mutex::new(1));
    let dispatched_events = Arc::new(Mutex::new(0));

    let inner = dispatcher.clone();
    let counter = loop_count.clone();
    dispatcher.add_listener(
        "foo",
        Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            let redispatch = {
                let mut count = counter.lock();
                *count += 1;
                *count == 2
            };
            if redispatch {
                inner.dispatch(&mut Event::new(), "foo")?;
            }
            Ok(())
        }),
        0,
    );
    let seen = dispatched_events.clone();
    dispatcher.add_listener(
        "foo",
        Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            *seen.lock() += 1;
            Ok(())
        }),
        0,
    );

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    // both listeners ran in the outer and in the nested activation
    assert_eq!(*dispatched_events.lock(), 2);
    assert_eq!(dispatcher.called_listeners().len(), 4);
}

#[test]
fn test_nested_dispatch_reuses_event_object() {
    let (_registry, dispatcher) = traceable();
    let nested_called = Arc::new(Mutex::new(false));

    let inner = dispatcher.clone();
    dispatcher.add_listener(
        "foo",
        Listener::closure(move |event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            inner.dispatch(event, "bar")
        }),
        0,
    );
    let flag = nested_called.clone();
    dispatcher.add_listener(
        "bar",
        Listener::closure(move |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            *flag.lock() = true;
            Ok(())
        }),
        0,
    );

    assert!(!*nested_called.lock());
    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();
    assert!(*nested_called.lock());
}

#[test]
fn test_stop_inside_nested_dispatch_carries_over() {
    let (_registry, dispatcher) = traceable();
    let log = Arc::new(Mutex::new(Vec::new()));

    // "foo" listener forwards the same event into "bar", whose listener
    // stops propagation; the flag on the shared event must halt the rest
    // of the "foo" chain as well
    let inner = dispatcher.clone();
    dispatcher.add_listener(
        "foo",
        Listener::closure(move |event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            inner.dispatch(event, "bar")
        }),
        20,
    );
    dispatcher.add_listener("foo", tagging(log.clone(), "skipped"), 10);
    dispatcher.add_listener("bar", stopper(), 0);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert!(log.lock().is_empty());
    let called: Vec<_> = dispatcher
        .called_listeners()
        .into_iter()
        .map(|call| (call.event_name.clone(), call.stopped))
        .collect();
    // entries appear in activation-open order: the outer "foo" activation
    // opened before the nested "bar" one
    assert_eq!(
        called,
        vec![("foo".into(), true), ("bar".into(), true)]
    );
}

#[test]
fn test_listener_can_remove_itself_when_executed() {
    let (_registry, dispatcher) = traceable();
    let handle: Arc<OnceLock<Listener>> = Arc::new(OnceLock::new());

    let listener = {
        let handle = handle.clone();
        Listener::closure(move |_event: &mut Event, _name: &str, dispatcher: &dyn Dispatcher| {
            if let Some(me) = handle.get() {
                dispatcher.remove_listener("foo", me);
            }
            Ok(())
        })
    };
    handle.set(listener.clone()).unwrap();

    dispatcher.add_listener("foo", listener, 0);
    dispatcher.add_listener("foo", noop(), 0);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(dispatcher.listeners("foo").len(), 1);
}

#[test]
fn test_orphaned_events() {
    let (_registry, dispatcher) = traceable();
    assert!(dispatcher.orphaned_events().is_empty());

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();
    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();
    assert_eq!(dispatcher.orphaned_events(), vec!["foo"]);

    // a handled event never shows up as orphaned
    dispatcher.add_listener("bar", noop(), 0);
    dispatcher.dispatch(&mut Event::new(), "bar").unwrap();
    assert_eq!(dispatcher.orphaned_events(), vec!["foo"]);

    dispatcher.reset();
    assert!(dispatcher.orphaned_events().is_empty());
}

#[test]
fn test_dispatch_calls_listeners_in_priority_order() {
    let (_registry, dispatcher) = traceable();
    let log = Arc::new(Mutex::new(Vec::new()));

    dispatcher.add_listener("foo", tagging(log.clone(), "foo1"), 10);
    dispatcher.add_listener("foo", tagging(log.clone(), "foo2"), 20);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(*log.lock(), vec!["foo2", "foo1"]);
}

#[test]
fn test_stopping_propagation_partitions_records() {
    let (_registry, dispatcher) = traceable();

    dispatcher.add_listener("foo", stopper(), 20);
    dispatcher.add_listener("foo", noop(), 10);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    let called = dispatcher.called_listeners();
    assert_eq!(called.len(), 1);
    assert_eq!(called[0].priority, 20);
    assert!(called[0].stopped);

    let not_called = dispatcher.not_called_listeners();
    assert_eq!(not_called.len(), 1);
    assert_eq!(not_called[0].priority, 10);
    assert!(!not_called[0].stopped);
}

#[test]
fn test_listener_failure_propagates_after_cleanup() {
    let (registry, dispatcher) = traceable();
    let failing = Listener::closure(
        |_event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
            Err(EventError::listener("inventory lookup failed"))
        },
    );
    let skipped = noop();

    dispatcher.add_listener("foo", failing.clone(), 20);
    dispatcher.add_listener("foo", skipped.clone(), 10);

    let result = dispatcher.dispatch(&mut Event::new(), "foo");
    assert!(matches!(result, Err(EventError::ListenerFailed(_))));

    // partial timing was recorded and the rest of the chain never ran
    let called = dispatcher.called_listeners();
    assert_eq!(called.len(), 1);
    assert!(called[0].duration.is_some());
    assert_eq!(dispatcher.not_called_listeners().len(), 1);

    // the failure path still unwrapped: originals are back at their priorities
    assert_eq!(registry.listener_priority("foo", &failing), Some(20));
    assert_eq!(registry.listener_priority("foo", &skipped), Some(10));
}

#[test_log::test]
fn test_default_tracing_logger_smoke() {
    let dispatcher = TraceableEventDispatcher::new(Arc::new(EventDispatcher::new()));
    dispatcher.add_listener("foo", noop(), 0);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(dispatcher.called_listeners().len(), 1);
}

#[test]
fn test_logger_receives_notified_diagnostics() {
    let logger = Arc::new(RecordingLogger::default());
    let dispatcher =
        TraceableEventDispatcher::with_logger(Arc::new(EventDispatcher::new()), logger.clone());

    dispatcher.add_listener("foo", noop(), 0);
    dispatcher.add_listener("foo", noop(), 0);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(
        logger.lines(),
        vec![
            ("notified", "foo".to_string(), "closure".to_string()),
            ("notified", "foo".to_string(), "closure".to_string()),
        ]
    );
}

#[test]
fn test_logger_receives_stopped_diagnostics() {
    let logger = Arc::new(RecordingLogger::default());
    let dispatcher =
        TraceableEventDispatcher::with_logger(Arc::new(EventDispatcher::new()), logger.clone());

    dispatcher.add_listener("foo", stopper(), 0);
    dispatcher.add_listener("foo", noop(), 0);

    dispatcher.dispatch(&mut Event::new(), "foo").unwrap();

    assert_eq!(
        logger.lines(),
        vec![
            ("stopped", "foo".to_string(), "closure".to_string()),
            ("not_called", "foo".to_string(), "closure".to_string()),
        ]
    );
}
