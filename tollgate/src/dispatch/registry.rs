//! Handler registry.
//!
//! Handlers are registered per event kind before the server starts and the
//! registry is read-only afterwards. Lookups resolve to [`Route`], which makes
//! the "no handler for this kind" branch explicit at every call site.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::event::EventKind;

/// Business logic for one event kind.
///
/// Handlers run after the webhook has already been acknowledged. They may be
/// interrupted by shutdown after the event id was recorded, so they must be
/// idempotent or tolerate partial execution.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, kind: &str, payload: &Map<String, Value>) -> anyhow::Result<()>;
}

/// Result of looking up a kind.
pub enum Route {
    Handler(Arc<dyn EventHandler>),
    Unregistered,
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    pub fn register(mut self, kind: impl Into<EventKind>, handler: Arc<dyn EventHandler>) -> Self {
        // Normalize so `Other("payment.succeeded")` lands on the named variant.
        let kind: EventKind = kind.into();
        let kind = EventKind::from(kind.as_str());

        if self.handlers.insert(kind.clone(), handler).is_some() {
            warn!(kind = %kind, "handler_replaced");
        }
        self
    }

    pub fn route(&self, kind: &EventKind) -> Route {
        match self.handlers.get(kind) {
            Some(handler) => Route::Handler(Arc::clone(handler)),
            None => Route::Unregistered,
        }
    }

    pub fn contains(&self, kind: &EventKind) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &EventKind> {
        self.handlers.keys()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl EventHandler for Noop {
        async fn handle(&self, _kind: &str, _payload: &Map<String, Value>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_route_registered_and_unregistered() {
        let registry = HandlerRegistry::new().register(EventKind::PaymentSucceeded, Arc::new(Noop));

        assert!(matches!(
            registry.route(&EventKind::PaymentSucceeded),
            Route::Handler(_)
        ));
        assert!(matches!(
            registry.route(&EventKind::from("refund.issued")),
            Route::Unregistered
        ));
    }

    #[test]
    fn test_register_normalizes_kind() {
        let registry = HandlerRegistry::new()
            .register(EventKind::Other("payment.succeeded".to_string()), Arc::new(Noop))
            .register("custom.kind", Arc::new(Noop));

        assert!(registry.contains(&EventKind::PaymentSucceeded));
        assert!(registry.contains(&EventKind::from("custom.kind")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_replaces() {
        let registry = HandlerRegistry::new()
            .register(EventKind::PaymentFailed, Arc::new(Noop))
            .register("payment.failed", Arc::new(Noop));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.kinds().count(), 0);
    }
}
