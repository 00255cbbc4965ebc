//! Scripted in-memory transport for driver tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use trueno_driver::{AckHandler, DriverConfig, EventHandler, RpcClient, Transport};

type Responder = Box<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// One `emit` seen by the transport.
#[derive(Debug, Clone)]
pub struct Emission {
    pub event: String,
    pub message: Value,
}

impl Emission {
    pub fn payload(&self) -> &Value {
        &self.message["payload"]
    }
}

#[derive(Default)]
struct State {
    emissions: Vec<Emission>,
    held: Vec<Option<AckHandler>>,
    handlers: HashMap<String, Vec<EventHandler>>,
    connects: Vec<String>,
    disconnects: usize,
}

/// Records every emission. The responder decides the acknowledgment: `Some`
/// answers immediately, `None` holds the ack until [`MockTransport::deliver`].
pub struct MockTransport {
    state: Mutex<State>,
    responder: Responder,
    fail_emits: AtomicBool,
    defer_connect: AtomicBool,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            responder: Box::new(responder),
            fail_emits: AtomicBool::new(false),
            defer_connect: AtomicBool::new(false),
        })
    }

    /// Acknowledge every call with `success(payload)`.
    pub fn answering(payload: Value) -> Arc<Self> {
        Self::new(move |_, _| Some(success(payload.clone())))
    }

    /// Never acknowledge on its own.
    pub fn holding() -> Arc<Self> {
        Self::new(|_, _| None)
    }

    pub fn fail_emits(&self) {
        self.fail_emits.store(true, Ordering::SeqCst);
    }

    /// Leave connects pending until [`MockTransport::complete_connect`].
    pub fn defer_connect(&self) {
        self.defer_connect.store(true, Ordering::SeqCst);
    }

    pub fn complete_connect(&self) {
        self.fire("connect");
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.state.lock().handlers.get(event).map_or(0, Vec::len)
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.state.lock().emissions.clone()
    }

    pub fn emission_count(&self) -> usize {
        self.state.lock().emissions.len()
    }

    pub fn held_count(&self) -> usize {
        self.state.lock().held.iter().filter(|a| a.is_some()).count()
    }

    pub fn connects(&self) -> Vec<String> {
        self.state.lock().connects.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    /// Answer the `index`-th held call.
    pub fn deliver(&self, index: usize, response: Value) {
        let ack = self.state.lock().held.get_mut(index).and_then(Option::take);
        if let Some(ack) = ack {
            ack(response);
        }
    }

    /// Drop the `index`-th held acknowledgment without answering.
    pub fn drop_ack(&self, index: usize) {
        let ack = self.state.lock().held.get_mut(index).and_then(Option::take);
        drop(ack);
    }

    fn fire(&self, event: &str) {
        let handlers = self
            .state
            .lock()
            .handlers
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler();
        }
    }
}

impl Transport for MockTransport {
    fn connect(&self, url: &str) -> anyhow::Result<()> {
        self.state.lock().connects.push(url.to_string());
        if !self.defer_connect.load(Ordering::SeqCst) {
            self.fire("connect");
        }
        Ok(())
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.state
            .lock()
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn emit(&self, event: &str, payload: Value, ack: AckHandler) -> anyhow::Result<()> {
        if self.fail_emits.load(Ordering::SeqCst) {
            anyhow::bail!("socket closed");
        }
        let response = (self.responder)(event, &payload);
        {
            let mut state = self.state.lock();
            state.emissions.push(Emission {
                event: event.to_string(),
                message: payload,
            });
            if response.is_none() {
                state.held.push(Some(ack));
                return Ok(());
            }
        }
        if let Some(response) = response {
            ack(response);
        }
        Ok(())
    }

    fn disconnect(&self) -> anyhow::Result<()> {
        self.state.lock().disconnects += 1;
        self.fire("disconnect");
        Ok(())
    }
}

pub fn success(payload: Value) -> Value {
    json!({ "meta": {}, "payload": payload, "type": "", "status": "success" })
}

pub fn failure(payload: Value) -> Value {
    json!({ "meta": {}, "payload": payload, "type": "", "status": "error" })
}

/// A client over `transport`, already connected.
pub fn connected(transport: &Arc<MockTransport>) -> RpcClient {
    connected_with(transport, DriverConfig::default())
}

pub fn connected_with(transport: &Arc<MockTransport>, config: DriverConfig) -> RpcClient {
    let client = RpcClient::new(transport.clone(), config);
    client.connect(|| {}, || {}).expect("mock connect");
    client
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
