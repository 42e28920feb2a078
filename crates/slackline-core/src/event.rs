//! Event model and kind-based dispatch.
//!
//! The stream hands us loosely-typed platform events; each one carries a
//! `kind` discriminator and an arbitrary payload. Handlers register per
//! kind; anything without a handler is logged and dropped.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::debug;

use crate::Result;

/// One event received from the stream, in receipt order.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Handler for a single event kind.
///
/// Failures are the handler's responsibility; whatever escapes here ends
/// the current streaming session and forces a reconnect, nothing more.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: serde_json::Value) -> Result<()>;
}

/// Registry mapping event kinds to handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(kind.into(), handler);
    }

    /// Route an event to its handler, or log and drop it if the kind is
    /// unknown.
    pub async fn dispatch(&self, event: Event) -> Result<()> {
        match self.handlers.get(&event.kind) {
            Some(handler) => handler.handle(event.payload).await,
            None => {
                debug!(kind = %event.kind, payload = %event.payload, "unknown event kind");
                Ok(())
            }
        }
    }
}
