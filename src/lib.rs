//! # Traceable Event System
//!
//! A synchronous, in-process publish/subscribe event dispatcher with a
//! transparent instrumentation layer. The traceable facade records which
//! listeners ran, at what priority, for how long, and whether they stopped
//! propagation, without altering dispatch order or listener behavior, and
//! flags "orphaned" events dispatched to names nobody listens to.
//!
//! ## Key Features
//!
//! - **Priority dispatch**: listeners run in descending priority order,
//!   halting early when a listener stops propagation
//! - **Transparent instrumentation**: listeners are substituted with timed
//!   wrappers per dispatch; registration, removal and priority queries by
//!   the original handle keep working while a dispatch is in flight
//! - **Reentrancy-safe accounting**: nested dispatch from inside a
//!   listener (same or different event name) is tracked as an independent
//!   activation
//! - **Orphan detection**: event names dispatched with zero listeners are
//!   recorded once each
//! - **Subscriber objects**: bulk registration of listener sets with
//!   identity-stable removal
//!
//! ## Architecture
//!
//! - [`EventDispatcher`]: the plain listener registry and dispatch loop
//! - [`TraceableEventDispatcher`]: the instrumentation facade, exposing
//!   the same [`Dispatcher`] contract
//! - [`Listener`]: cloneable callback handle with a stable identity and a
//!   pretty name for diagnostics
//! - [`Event`]: payload carrier owning the propagation-stop flag
//! - [`DiagnosticLogger`]: seam for the per-listener dispatch diagnostics
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use traceable_event_system::{
//!     Dispatcher, Event, EventDispatcher, Listener, TraceableEventDispatcher,
//! };
//!
//! let registry = Arc::new(EventDispatcher::new());
//! let dispatcher = TraceableEventDispatcher::new(registry);
//!
//! dispatcher.add_listener(
//!     "order.placed",
//!     Listener::closure(|event: &mut Event, _name: &str, _dispatcher: &dyn Dispatcher| {
//!         println!("payload: {}", event.payload());
//!         Ok(())
//!     }),
//!     10,
//! );
//!
//! let mut event = Event::new();
//! dispatcher.dispatch(&mut event, "order.placed")?;
//!
//! assert_eq!(dispatcher.called_listeners().len(), 1);
//! assert!(dispatcher.orphaned_events().is_empty());
//! # Ok::<(), traceable_event_system::EventError>(())
//! ```

mod call_stack;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod logging;
mod orphan;
pub mod stats;
pub mod subscriber;
pub mod traceable;
mod wrapper;

#[cfg(test)]
mod test_integration;

// Re-exports for convenience
pub use dispatcher::{Dispatcher, EventDispatcher};
pub use error::EventError;
pub use event::Event;
pub use listener::{Listener, ListenerCallback, ListenerId};
pub use logging::{DiagnosticLogger, NullLogger, TracingLogger};
pub use stats::ListenerCall;
pub use subscriber::{EventSubscriber, Subscription};
pub use traceable::TraceableEventDispatcher;

/// Result type used throughout the system
pub type Result<T> = std::result::Result<T, EventError>;
