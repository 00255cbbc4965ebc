//! The seam between the driver and whatever carries its messages.
//!
//! The driver never opens sockets itself. An adapter over an event-based,
//! acknowledgment-capable connection (a Socket.IO client, a test double)
//! implements [`Transport`] and is handed to [`crate::RpcClient::new`].

use std::sync::Arc;

use serde_json::Value;

/// Invoked once with the raw response document of an emitted event.
pub type AckHandler = Box<dyn FnOnce(Value) + Send + 'static>;

/// Invoked on connection lifecycle events.
pub type EventHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Connection lifecycle event names.
pub mod events {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CONNECT_ERROR: &str = "connect_error";
}

/// An event-based connection with per-emit acknowledgments.
///
/// Contract:
/// - `emit` must call `ack` at most once; a transport that drops `ack`
///   without calling it fails the pending call.
/// - `on` handlers for [`events::CONNECT`] and [`events::DISCONNECT`] fire
///   when the connection state changes; they may be called from any thread.
pub trait Transport: Send + Sync {
    /// Start connecting to `url`. Completion is signalled via the
    /// [`events::CONNECT`] handler.
    fn connect(&self, url: &str) -> anyhow::Result<()>;

    /// Register a handler for a lifecycle event.
    fn on(&self, event: &str, handler: EventHandler);

    /// Send `payload` under the event name `event`.
    fn emit(&self, event: &str, payload: Value, ack: AckHandler) -> anyhow::Result<()>;

    /// Close the connection.
    fn disconnect(&self) -> anyhow::Result<()>;
}
