use async_trait::async_trait;

use crate::{event::Event, Result};

/// Hexagonal port for the platform connection the stream manager drives.
///
/// The Slack adapter is the real implementation; tests supply scripted
/// fakes.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Establish the connection, lazily and idempotently. On failure the
    /// source must be left with no half-initialized state.
    async fn connect(&self) -> Result<()>;

    /// Fetch the next batch of events, possibly empty. A stream error
    /// invalidates the connection before it is returned.
    async fn poll(&self) -> Result<Vec<Event>>;

    /// Drop the current connection, if any. The next `connect` rebuilds
    /// from scratch.
    async fn disconnect(&self);
}
