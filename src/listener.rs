//! Listener handles and identity

use crate::dispatcher::Dispatcher;
use crate::error::EventError;
use crate::event::Event;
use compact_str::CompactString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Callback signature shared by every listener.
///
/// Listeners receive the mutable event, the event name it was dispatched
/// under, and the dispatcher that invoked them, so a listener can register,
/// remove or dispatch reentrantly from inside its own invocation.
pub type ListenerCallback =
    dyn Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync;

/// Stable identity of a listener handle.
///
/// Clones of a [`Listener`] share the same id, which is what makes closures
/// removable by handle after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A cloneable handle around a listener callback.
///
/// The handle carries a human-readable pretty name used for diagnostics and
/// call statistics. Since callables cannot be introspected at runtime, the
/// name is fixed at construction: [`Listener::closure`] for anonymous
/// closures, [`Listener::of_method`] and [`Listener::of_type`] for
/// listeners belonging to a named type, or [`Listener::new`] for an
/// explicit name.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    pretty_name: CompactString,
    callback: Arc<ListenerCallback>,
}

impl Listener {
    /// Create a listener with an explicit pretty name
    pub fn new<F>(pretty_name: impl Into<CompactString>, callback: F) -> Self
    where
        F: Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self::with_id(ListenerId::generate(), pretty_name, callback)
    }

    pub(crate) fn with_id<F>(
        id: ListenerId,
        pretty_name: impl Into<CompactString>,
        callback: F,
    ) -> Self
    where
        F: Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self {
            id,
            pretty_name: pretty_name.into(),
            callback: Arc::new(callback),
        }
    }

    /// Create a listener from an anonymous closure, pretty-named "closure"
    pub fn closure<F>(callback: F) -> Self
    where
        F: Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self::new("closure", callback)
    }

    /// Create a listener pretty-named after a method of `T` ("Type::method")
    pub fn of_method<T, F>(method: &str, callback: F) -> Self
    where
        F: Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self::new(format!("{}::{}", short_type_name::<T>(), method), callback)
    }

    /// Create a listener pretty-named after the type `T` itself
    pub fn of_type<T, F>(callback: F) -> Self
    where
        F: Fn(&mut Event, &str, &dyn Dispatcher) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self::new(short_type_name::<T>(), callback)
    }

    /// Identity of this handle, shared by all of its clones
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Human-readable identity used in diagnostics and statistics
    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    /// Invoke the underlying callback
    pub fn call(
        &self,
        event: &mut Event,
        event_name: &str,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), EventError> {
        (self.callback)(event, event_name, dispatcher)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl Hash for Listener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("pretty_name", &self.pretty_name)
            .finish()
    }
}

/// Last path segment of a type name, e.g. "app::billing::Invoicer" -> "Invoicer"
fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
