//! Connection management and the request/acknowledgment call primitive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use trueno_core::{ComponentType, DriverConfig, Envelope, Status, TruenoError};

use crate::graph::Graph;
use crate::transport::{events, EventHandler, Transport};

/// Errors from driver operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Graph label is required")]
    MissingLabel,

    #[error("{kind} id is required")]
    MissingId { kind: ComponentType },

    #[error("{kind} has no parent graph")]
    MissingGraph { kind: ComponentType },

    #[error("Edge source and target are required")]
    MissingEndpoints,

    #[error("Invalid component type '{found}' for {operation}")]
    InvalidComponent {
        found: ComponentType,
        operation: &'static str,
    },

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Computed property not found: {algorithm}.{property}")]
    ComputedNotFound { algorithm: String, property: String },

    #[error("Meta attribute not found: {0}")]
    MetaNotFound(String),

    #[error("{procedure} failed remotely: {document}")]
    Remote { procedure: String, document: Value },

    #[error("Protocol violation on {procedure}: {reason}")]
    Protocol { procedure: String, reason: String },

    #[error("Not connected, cannot call {procedure}")]
    NotConnected { procedure: String },

    #[error("Transport error on {procedure}: {source}")]
    Transport {
        procedure: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("No acknowledgment for {procedure} within {timeout_ms}ms")]
    Timeout { procedure: String, timeout_ms: u64 },

    #[error("Acknowledgment for {procedure} was dropped unanswered")]
    AckDropped { procedure: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] TruenoError),
}

/// Coarse grouping of [`DriverError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected locally before anything was sent.
    Validation,
    /// The service answered with status `error`.
    Remote,
    /// The service answered with something that is not a valid response.
    Protocol,
    /// No answer could be obtained.
    Connectivity,
}

impl DriverError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingLabel
            | Self::MissingId { .. }
            | Self::MissingGraph { .. }
            | Self::MissingEndpoints
            | Self::InvalidComponent { .. }
            | Self::PropertyNotFound(_)
            | Self::ComputedNotFound { .. }
            | Self::MetaNotFound(_) => ErrorClass::Validation,
            Self::Remote { .. } => ErrorClass::Remote,
            Self::Protocol { .. } | Self::Serialization(_) => ErrorClass::Protocol,
            Self::NotConnected { .. }
            | Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::AckDropped { .. } => ErrorClass::Connectivity,
            Self::Core(TruenoError::MalformedEnvelope(_)) => ErrorClass::Protocol,
            Self::Core(_) => ErrorClass::Validation,
        }
    }

    /// The `{"result": <payload>}` document of a remote failure.
    pub fn remote_document(&self) -> Option<&Value> {
        match self {
            Self::Remote { document, .. } => Some(document),
            _ => None,
        }
    }

    pub(crate) fn protocol(procedure: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            procedure: procedure.to_string(),
            reason: reason.into(),
        }
    }
}

/// Shared RPC client over a [`Transport`].
///
/// Every call gets its own acknowledgment channel, so any number of calls
/// may be in flight and their responses may arrive in any order.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: DriverConfig,
    session: Arc<Session>,
    handlers: Once,
}

/// Connection state shared with the transport's lifecycle handlers.
#[derive(Default)]
struct Session {
    /// Set by `connect()`, cleared by `disconnect()`.
    requested: AtomicBool,
    connected: AtomicBool,
    on_connect: RwLock<Option<EventHandler>>,
    on_disconnect: RwLock<Option<EventHandler>>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>, config: DriverConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                session: Arc::new(Session::default()),
                handlers: Once::new(),
            }),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.session.connected.load(Ordering::SeqCst)
    }

    /// Start connecting to the configured server. `on_connect` runs each
    /// time the connection is established, `on_disconnect` each time it is
    /// lost. Calling `connect` again replaces both callbacks.
    pub fn connect<C, D>(&self, on_connect: C, on_disconnect: D) -> Result<(), DriverError>
    where
        C: Fn() + Send + Sync + 'static,
        D: Fn() + Send + Sync + 'static,
    {
        let session = &self.inner.session;
        let url = self.inner.config.url();

        *session.on_connect.write() = Some(Arc::new(on_connect));
        *session.on_disconnect.write() = Some(Arc::new(on_disconnect));
        self.inner.handlers.call_once(|| self.register_handlers(&url));
        session.requested.store(true, Ordering::SeqCst);

        tracing::debug!(url = %url, "Connecting");
        self.inner.transport.connect(&url).map_err(|source| {
            session.requested.store(false, Ordering::SeqCst);
            DriverError::Transport {
                procedure: events::CONNECT.to_string(),
                source,
            }
        })
    }

    /// Lifecycle handlers go on the transport once per client and forward
    /// to whichever callbacks the latest `connect` installed.
    fn register_handlers(&self, url: &str) {
        let transport = &self.inner.transport;

        let session = Arc::clone(&self.inner.session);
        let connect_url = url.to_string();
        transport.on(
            events::CONNECT,
            Arc::new(move || {
                if !session.requested.load(Ordering::SeqCst) {
                    tracing::debug!(
                        url = %connect_url,
                        "Connection completed after disconnect, ignored"
                    );
                    return;
                }
                session.connected.store(true, Ordering::SeqCst);
                tracing::info!(url = %connect_url, "Connected to Trueno");
                let callback = session.on_connect.read().clone();
                if let Some(callback) = callback {
                    callback();
                }
            }),
        );

        let session = Arc::clone(&self.inner.session);
        transport.on(
            events::DISCONNECT,
            Arc::new(move || {
                session.connected.store(false, Ordering::SeqCst);
                tracing::info!("Disconnected from Trueno");
                let callback = session.on_disconnect.read().clone();
                if let Some(callback) = callback {
                    callback();
                }
            }),
        );

        let session = Arc::clone(&self.inner.session);
        let error_url = url.to_string();
        transport.on(
            events::CONNECT_ERROR,
            Arc::new(move || {
                session.connected.store(false, Ordering::SeqCst);
                tracing::warn!(url = %error_url, "Connection attempt failed");
            }),
        );
    }

    /// Close the connection, or abandon one still being established.
    /// Calling this without a preceding `connect` is a no-op.
    pub fn disconnect(&self) -> Result<(), DriverError> {
        let session = &self.inner.session;
        if !session.requested.swap(false, Ordering::SeqCst) {
            tracing::debug!("Disconnect requested while not connected");
            return Ok(());
        }
        session.connected.store(false, Ordering::SeqCst);
        self.inner
            .transport
            .disconnect()
            .map_err(|source| DriverError::Transport {
                procedure: events::DISCONNECT.to_string(),
                source,
            })
    }

    /// A new graph handle bound to this client.
    pub fn graph(&self, label: impl Into<String>) -> Graph {
        Graph::new(self.clone(), label)
    }

    /// Emit `envelope` under `procedure` and wait for its acknowledgment.
    ///
    /// Resolves to `{"result": <payload>}` when the response status is
    /// `success`. A response with status `error` fails with
    /// [`DriverError::Remote`] carrying the same document shape.
    pub async fn call(&self, procedure: &str, mut envelope: Envelope) -> Result<Value, DriverError> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected {
                procedure: procedure.to_string(),
            });
        }
        if envelope.kind().is_empty() {
            envelope.set_kind(procedure);
        }

        let message = serde_json::to_value(&envelope)?;
        let (tx, rx) = oneshot::channel::<Value>();

        tracing::debug!(procedure, "Emitting call");
        tracing::trace!(procedure, payload = %envelope.payload(), "Call payload");

        self.inner
            .transport
            .emit(
                procedure,
                message,
                Box::new(move |response: Value| {
                    // The caller may have timed out and gone away.
                    let _ = tx.send(response);
                }),
            )
            .map_err(|source| DriverError::Transport {
                procedure: procedure.to_string(),
                source,
            })?;

        let received = match self.inner.config.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(procedure, timeout_ms, "Call timed out");
                    return Err(DriverError::Timeout {
                        procedure: procedure.to_string(),
                        timeout_ms,
                    });
                }
            },
            None => rx.await,
        };

        let raw = received.map_err(|_| DriverError::AckDropped {
            procedure: procedure.to_string(),
        })?;
        settle(procedure, raw)
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.inner.config.url())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Turn a raw acknowledgment into the call outcome.
fn settle(procedure: &str, raw: Value) -> Result<Value, DriverError> {
    let response = Envelope::decode(raw).map_err(|e| {
        tracing::warn!(procedure, error = %e, "Malformed acknowledgment");
        DriverError::protocol(procedure, e.to_string())
    })?;

    let status = response.status();
    let document = json!({ "result": response.into_payload() });
    match status {
        Status::Success => {
            tracing::debug!(procedure, "Call succeeded");
            Ok(document)
        }
        Status::Error => {
            tracing::warn!(procedure, "Call failed remotely");
            Err(DriverError::Remote {
                procedure: procedure.to_string(),
                document,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_success_wraps_payload() {
        let out = settle(
            "ex_count",
            json!({"status": "success", "payload": 12, "type": "ex_count", "meta": {}}),
        )
        .unwrap();
        assert_eq!(out, json!({"result": 12}));
    }

    #[test]
    fn test_settle_error_is_remote() {
        let err = settle("ex_open", json!({"status": "error", "payload": {"reason": "missing"}}))
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Remote);
        assert_eq!(
            err.remote_document(),
            Some(&json!({"result": {"reason": "missing"}}))
        );
    }

    #[test]
    fn test_settle_rejects_unknown_status() {
        let err = settle("ex_open", json!({"status": "maybe", "payload": {}})).unwrap_err();
        assert!(matches!(err, DriverError::Protocol { .. }));
        assert_eq!(err.class(), ErrorClass::Protocol);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(DriverError::MissingLabel.class(), ErrorClass::Validation);
        assert_eq!(
            DriverError::NotConnected {
                procedure: "ex_fetch".into()
            }
            .class(),
            ErrorClass::Connectivity
        );
        assert_eq!(
            DriverError::Core(TruenoError::UnknownAlgorithm("bfs".into())).class(),
            ErrorClass::Validation
        );
    }
}
