//! Per-invocation execution state
//!
//! An [`ExecutionContext`] carries the output/error sinks, the services map
//! exposed to scriptlets, and the adapter bookkeeping for one logical run.
//! Contexts use interior mutability so a frozen (enterable) context can be
//! shared behind an `Arc` and entered concurrently when the owning adapter
//! allows it.

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::adapter::AdapterRef;

/// A named service exposed to scriptlets through the context.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Per-invocation/per-thread execution state.
pub struct ExecutionContext {
    output: Mutex<Box<dyn Write + Send>>,
    error: Mutex<Box<dyn Write + Send>>,
    services: RwLock<HashMap<String, Service>>,
    active_adapters: Mutex<Vec<AdapterRef>>,
    last_adapter: Mutex<Option<AdapterRef>>,
    immutable: AtomicBool,
    enterable: AtomicBool,
}

impl ExecutionContext {
    /// Create a context writing to the given output and error sinks.
    pub fn new(output: impl Write + Send + 'static, error: impl Write + Send + 'static) -> Self {
        Self {
            output: Mutex::new(Box::new(output)),
            error: Mutex::new(Box::new(error)),
            services: RwLock::new(HashMap::new()),
            active_adapters: Mutex::new(Vec::new()),
            last_adapter: Mutex::new(None),
            immutable: AtomicBool::new(false),
            enterable: AtomicBool::new(false),
        }
    }

    /// Create a context that discards all output.
    pub fn discarding() -> Self {
        Self::new(io::sink(), io::sink())
    }

    /// Write text verbatim to the output sink.
    pub fn write_output(&self, text: &str) -> io::Result<()> {
        self.output.lock().write_all(text.as_bytes())
    }

    /// Write text verbatim to the error sink.
    pub fn write_error(&self, text: &str) -> io::Result<()> {
        self.error.lock().write_all(text.as_bytes())
    }

    /// Expose a named service to scriptlets, returning any previous value.
    ///
    /// Has no effect once the context is frozen.
    pub fn insert_service(&self, name: impl Into<String>, service: Service) -> Option<Service> {
        if self.is_immutable() {
            tracing::warn!("ignoring service insertion into frozen context");
            return None;
        }
        self.services.write().insert(name.into(), service)
    }

    /// Look up a named service.
    pub fn service(&self, name: &str) -> Option<Service> {
        self.services.read().get(name).cloned()
    }

    /// Look up a named service and downcast it to a concrete type.
    pub fn service_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.service(name).and_then(|svc| svc.downcast::<T>().ok())
    }

    /// Whether the context has been frozen by `make_enterable`.
    pub fn is_immutable(&self) -> bool {
        self.immutable.load(Ordering::Acquire)
    }

    /// Whether the context is registered for entry-point invocation.
    pub fn is_enterable(&self) -> bool {
        self.enterable.load(Ordering::Acquire)
    }

    /// The adapter that most recently executed a program in this context.
    pub fn last_adapter(&self) -> Option<AdapterRef> {
        self.last_adapter.lock().clone()
    }

    /// Every adapter that has executed in this context, in first-touch order.
    pub fn adapters_touched(&self) -> Vec<AdapterRef> {
        self.active_adapters.lock().clone()
    }

    /// Freeze the context after it has been consumed by `make_enterable`.
    pub(crate) fn freeze(&self) {
        self.immutable.store(true, Ordering::Release);
        self.enterable.store(true, Ordering::Release);
    }

    /// Record an adapter as active in this context.
    pub(crate) fn note_adapter(&self, adapter: AdapterRef) {
        let mut active = self.active_adapters.lock();
        if !active.iter().any(|known| known.tag() == adapter.tag()) {
            active.push(adapter.clone());
        }
        *self.last_adapter.lock() = Some(adapter);
    }

    /// Unconditionally install a service, returning the displaced value.
    ///
    /// Engine-internal: used for the per-call self-service swap, which the
    /// execute loop skips entirely on frozen contexts.
    pub(crate) fn swap_service(&self, name: &str, service: Service) -> Option<Service> {
        self.services.write().insert(name.to_string(), service)
    }

    /// Undo a [`swap_service`](Self::swap_service) call.
    pub(crate) fn restore_service(&self, name: &str, previous: Option<Service>) {
        let mut services = self.services.write();
        match previous {
            Some(previous) => {
                services.insert(name.to_string(), previous);
            }
            None => {
                services.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_swap_and_restore_round_trips() {
        let context = ExecutionContext::discarding();
        context.insert_service("caller", Arc::new(1u32));

        let displaced = context.swap_service("caller", Arc::new(2u32));
        assert_eq!(
            context.service_as::<u32>("caller").map(|v| *v),
            Some(2),
            "swap installs the new service"
        );
        context.restore_service("caller", displaced);
        assert_eq!(context.service_as::<u32>("caller").map(|v| *v), Some(1));

        let displaced = context.swap_service("fresh", Arc::new(3u32));
        assert!(displaced.is_none());
        context.restore_service("fresh", None);
        assert!(context.service("fresh").is_none());
    }

    #[test]
    fn frozen_context_ignores_insertions() {
        let context = ExecutionContext::discarding();
        context.freeze();
        assert!(context.is_immutable());
        assert!(context.is_enterable());
        context.insert_service("late", Arc::new(9u32));
        assert!(context.service("late").is_none());
    }
}
