//! Call/acknowledgment behavior of the RPC client.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{connected, connected_with, failure, success, MockTransport};
use serde_json::json;
use trueno_driver::{DriverConfig, DriverError, Envelope, ErrorClass, RpcClient};

async fn wait_for_held(transport: &MockTransport, n: usize) {
    while transport.held_count() < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_call_wraps_payload_in_result() {
    common::init_tracing();
    let transport = MockTransport::answering(json!({"count": 4}));
    let client = connected(&transport);

    let out = client
        .call("ex_count", Envelope::with_payload(json!({"graph": "citations"})))
        .await
        .unwrap();
    assert_eq!(out, json!({"result": {"count": 4}}));

    let sent = transport.emissions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, "ex_count");
    assert_eq!(sent[0].message["type"], "ex_count");
    assert_eq!(sent[0].message["status"], "success");
    assert_eq!(sent[0].payload(), &json!({"graph": "citations"}));
}

#[tokio::test]
async fn test_error_status_rejects_with_document() {
    let transport = MockTransport::new(|_, _| Some(failure(json!({"reason": "no such graph"}))));
    let client = connected(&transport);

    let err = client.call("ex_open", Envelope::new()).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Remote);
    assert_eq!(
        err.remote_document(),
        Some(&json!({"result": {"reason": "no such graph"}}))
    );
}

#[tokio::test]
async fn test_unknown_status_is_protocol_error() {
    let transport = MockTransport::new(|_, _| Some(json!({"status": "partial", "payload": {}})));
    let client = connected(&transport);

    let err = client.call("ex_fetch", Envelope::new()).await.unwrap_err();
    assert!(matches!(err, DriverError::Protocol { .. }));
}

#[tokio::test]
async fn test_call_before_connect_emits_nothing() {
    let transport = MockTransport::answering(json!({}));
    let client = RpcClient::new(transport.clone(), DriverConfig::default());

    let err = client.call("ex_fetch", Envelope::new()).await.unwrap_err();
    assert!(matches!(err, DriverError::NotConnected { .. }));
    assert_eq!(err.class(), ErrorClass::Connectivity);
    assert_eq!(transport.emission_count(), 0);
}

#[tokio::test]
async fn test_out_of_order_acks_reach_their_callers() {
    let transport = MockTransport::holding();
    let client = connected(&transport);

    let first = client.call("ex_count", Envelope::with_payload(json!({"n": 1})));
    let second = client.call("ex_count", Envelope::with_payload(json!({"n": 2})));
    let deliver = async {
        wait_for_held(&transport, 2).await;
        transport.deliver(1, success(json!("second")));
        transport.deliver(0, success(json!("first")));
    };

    let (a, b, ()) = tokio::join!(first, second, deliver);
    assert_eq!(a.unwrap(), json!({"result": "first"}));
    assert_eq!(b.unwrap(), json!({"result": "second"}));
}

#[tokio::test]
async fn test_dropped_ack_fails_the_call() {
    let transport = MockTransport::holding();
    let client = connected(&transport);

    let call = client.call("ex_persist", Envelope::new());
    let drop_it = async {
        wait_for_held(&transport, 1).await;
        transport.drop_ack(0);
    };

    let (res, ()) = tokio::join!(call, drop_it);
    assert!(matches!(res, Err(DriverError::AckDropped { .. })));
}

#[tokio::test]
async fn test_timeout_when_configured() {
    let transport = MockTransport::holding();
    let config = DriverConfig {
        call_timeout_ms: Some(20),
        ..DriverConfig::default()
    };
    let client = connected_with(&transport, config);

    let err = client.call("ex_bulk", Envelope::new()).await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Timeout {
            timeout_ms: 20,
            ..
        }
    ));
}

#[tokio::test]
async fn test_emit_failure_is_transport_error() {
    let transport = MockTransport::answering(json!({}));
    let client = connected(&transport);
    transport.fail_emits();

    let err = client.call("ex_create", Envelope::new()).await.unwrap_err();
    assert!(matches!(err, DriverError::Transport { .. }));
    assert_eq!(err.class(), ErrorClass::Connectivity);
}

#[test]
fn test_connect_and_idempotent_disconnect() {
    let transport = MockTransport::answering(json!({}));
    let client = RpcClient::new(transport.clone(), DriverConfig::default());

    let ups = Arc::new(AtomicUsize::new(0));
    let downs = Arc::new(AtomicUsize::new(0));
    let (u, d) = (ups.clone(), downs.clone());
    client
        .connect(
            move || {
                u.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    assert!(client.is_connected());
    assert_eq!(transport.connects(), vec!["http://localhost:8000".to_string()]);
    assert_eq!(ups.load(Ordering::SeqCst), 1);

    client.disconnect().unwrap();
    client.disconnect().unwrap();
    assert!(!client.is_connected());
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(downs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disconnect_abandons_pending_connect() {
    let transport = MockTransport::answering(json!({}));
    transport.defer_connect();
    let client = RpcClient::new(transport.clone(), DriverConfig::default());

    client.connect(|| {}, || {}).unwrap();
    assert!(!client.is_connected());

    client.disconnect().unwrap();
    assert_eq!(transport.disconnects(), 1);

    transport.complete_connect();
    assert!(!client.is_connected());
    client.disconnect().unwrap();
    assert_eq!(transport.disconnects(), 1);

    client.connect(|| {}, || {}).unwrap();
    transport.complete_connect();
    assert!(client.is_connected());
}

#[test]
fn test_repeated_connect_registers_handlers_once() {
    let transport = MockTransport::answering(json!({}));
    let client = RpcClient::new(transport.clone(), DriverConfig::default());

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let downs = Arc::new(AtomicUsize::new(0));

    let (f, d) = (first.clone(), downs.clone());
    client
        .connect(
            move || {
                f.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
    let (s, d) = (second.clone(), downs.clone());
    client
        .connect(
            move || {
                s.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                d.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    assert_eq!(transport.handler_count("connect"), 1);
    assert_eq!(transport.handler_count("disconnect"), 1);
    assert_eq!(transport.handler_count("connect_error"), 1);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    client.disconnect().unwrap();
    assert_eq!(downs.load(Ordering::SeqCst), 1);
}
