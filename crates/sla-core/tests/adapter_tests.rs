//! Package callback adapter tests
//!
//! This test suite verifies that the adapter:
//! - validates dialogs and wraps engine failures
//! - applies the default policy when no handler is set
//! - forwards to application handlers when they are
//! - caches and replays NOTIFY bodies
//! - releases records exactly once on Terminated

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use common::{adapter, init_tracing, is_send, Call, MockEngine};
use rvoip_sla_core::adapter::NotifyParams;
use rvoip_sla_core::errors::SlaError;
use rvoip_sla_core::message::{IncomingRequest, MediaType, Method, ResponseOverride};
use rvoip_sla_core::subscription::SubscriptionCallbacks;
use rvoip_sla_core::types::{DialogId, Expires, SubscriptionKind, SubscriptionRole, SubscriptionState};

const DIALOG_INFO: &[u8] = b"<?xml version=\"1.0\"?><dialog-info version=\"1\" state=\"full\"/>";

fn subscribe_request() -> IncomingRequest {
    IncomingRequest::new(Method::Subscribe, "sip:line1@pbx.example.com")
        .with_header("Event", "dialog")
        .with_header("Expires", "3600")
}

#[tokio::test]
async fn test_create_requires_dialog() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);

    let missing = adapter
        .create(None, SubscriptionCallbacks::new(), SubscriptionKind::LineAppearance, 1)
        .await;
    assert!(matches!(missing, Err(SlaError::InvalidArgument { .. })));

    let nil = adapter
        .create(
            Some(DialogId(Uuid::nil())),
            SubscriptionCallbacks::new(),
            SubscriptionKind::LineAppearance,
            1,
        )
        .await;
    assert!(matches!(nil, Err(SlaError::InvalidArgument { .. })));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_create_failure_leaves_no_record() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    engine.fail("create_uac");

    let result = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::DeviceMonitor, 2)
        .await;
    match result {
        Err(SlaError::ResourceCreation { source, .. }) => assert_eq!(source.code, 503),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(adapter.record_count(), 0);
    assert_eq!(adapter.locks().len(), 0);
}

#[tokio::test]
async fn test_attach_failure_leaves_no_record() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    engine.fail("create_uas");
    let dialog = DialogId::new();

    let result = adapter
        .attach_from_incoming(Some(dialog), SubscriptionCallbacks::new(), &subscribe_request())
        .await;
    assert!(matches!(result, Err(SlaError::ResourceCreation { .. })));
    assert_eq!(adapter.record_count(), 0);
    assert_eq!(adapter.locks().len(), 0);
    assert!(!adapter.locks().is_locked(dialog));

    // A retry on the same dialog is not blocked by the failed attempt
    engine.recover("create_uas");
    assert!(adapter
        .attach_from_incoming(Some(dialog), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .is_ok());
    assert_eq!(adapter.locks().len(), 1);
}

#[tokio::test]
async fn test_default_line_refresh_uses_engine_default() {
    init_tracing();
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::LineAppearance, 1)
        .await
        .unwrap();

    adapter.on_client_refresh_due(subscription).await.unwrap();

    assert!(engine.calls().contains(&Call::Initiate(subscription, Expires::EngineDefault)));
    let sent = engine.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.expires, Some(-1));
}

#[tokio::test]
async fn test_default_device_refresh_uses_fixed_expiration() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::DeviceMonitor, 4)
        .await
        .unwrap();

    adapter.on_client_refresh_due(subscription).await.unwrap();

    let sent = engine.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.expires, Some(360));
}

#[tokio::test]
async fn test_refresh_handler_replaces_default() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let calls = Arc::new(AtomicUsize::new(0));
    let callbacks = {
        let calls = calls.clone();
        SubscriptionCallbacks::new().on_client_refresh_due(move |ctx| {
            assert_eq!(ctx.kind, SubscriptionKind::LineAppearance);
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    let subscription = adapter
        .create(Some(DialogId::new()), callbacks, SubscriptionKind::LineAppearance, 1)
        .await
        .unwrap();

    adapter.on_client_refresh_due(subscription).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.count(|c| matches!(c, Call::Initiate(..))), 0);
}

#[tokio::test]
async fn test_refresh_send_failure_is_swallowed() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::DeviceMonitor, 0)
        .await
        .unwrap();
    engine.fail("send_request");

    assert!(adapter.on_client_refresh_due(subscription).await.is_ok());
    assert!(adapter.has_record(subscription));
}

#[tokio::test]
async fn test_server_refresh_replays_cached_body() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let dialog = DialogId::new();
    let subscription = adapter
        .attach_from_incoming(Some(dialog), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();
    adapter.accept(subscription, &subscribe_request(), 200).await.unwrap();

    let first = adapter
        .notify(
            subscription,
            NotifyParams::with_body(SubscriptionState::Active, MediaType::dialog_info(), DIALOG_INFO),
        )
        .await
        .unwrap();
    adapter.send_request(subscription, first).await.unwrap();
    engine.set_state(subscription, SubscriptionState::Active);

    let response = adapter
        .on_incoming_refresh(subscription, &subscribe_request())
        .await
        .unwrap();
    assert_eq!(response, ResponseOverride::default());

    let sent = engine.sent();
    assert_eq!(sent.len(), 2);
    let body = sent[1].1.body.as_ref().unwrap();
    assert_eq!(body.content_type, MediaType::dialog_info());
    assert_eq!(body.data.as_ref(), DIALOG_INFO);
    assert!(engine.calls().contains(&Call::CurrentNotify(subscription)));
}

#[tokio::test]
async fn test_server_refresh_after_termination_sends_timeout() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();
    engine.set_state(subscription, SubscriptionState::Terminated);

    adapter
        .on_incoming_refresh(subscription, &subscribe_request())
        .await
        .unwrap();

    assert!(engine.calls().contains(&Call::Notify(
        subscription,
        SubscriptionState::Terminated,
        Some("timeout".to_string())
    )));
    let sent = engine.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.reason.as_deref(), Some("timeout"));
    assert!(sent[0].1.body.is_none());
}

#[tokio::test]
async fn test_server_refresh_without_cache_sends_nothing() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();
    engine.set_state(subscription, SubscriptionState::Active);

    let response = adapter.on_incoming_refresh(subscription, &subscribe_request()).await;
    assert!(response.is_ok());
    assert_eq!(engine.count(is_send), 0);
}

#[tokio::test]
async fn test_refresh_handler_response_is_returned() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let callbacks = SubscriptionCallbacks::new().on_incoming_refresh(|ctx, _request| {
        assert_eq!(ctx.role, SubscriptionRole::Server);
        ResponseOverride {
            status_code: Some(202),
            ..Default::default()
        }
    });
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), callbacks, &subscribe_request())
        .await
        .unwrap();

    let response = adapter
        .on_incoming_refresh(subscription, &subscribe_request())
        .await
        .unwrap();
    assert_eq!(response.status_code, Some(202));
    assert_eq!(engine.count(is_send), 0);
}

#[tokio::test]
async fn test_server_timeout_default_sends_terminated_notify() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();

    adapter.on_server_timeout(subscription).await.unwrap();

    let sent = engine.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.method, Method::Notify);
    assert_eq!(sent[0].1.subscription_state.as_deref(), Some("terminated"));
    assert_eq!(sent[0].1.reason.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_incoming_notify_without_handler_uses_engine_default() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::DeviceMonitor, 1)
        .await
        .unwrap();

    let notify = IncomingRequest::new(Method::Notify, "sip:alice@192.0.2.10").with_header("Event", "dialog");
    let response = adapter.on_incoming_notify(subscription, &notify).await.unwrap();
    assert_eq!(response, ResponseOverride::default());
    assert!(engine.calls().iter().all(|c| !matches!(c, Call::Send(..))));
}

#[tokio::test]
async fn test_double_terminated_releases_once() {
    init_tracing();
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let terminal = Arc::new(AtomicUsize::new(0));
    let callbacks = {
        let terminal = terminal.clone();
        SubscriptionCallbacks::new().on_state_changed(move |ctx| {
            if ctx.state.is_terminated() {
                terminal.fetch_add(1, Ordering::SeqCst);
            }
        })
    };
    let dialog = DialogId::new();
    let subscription = adapter
        .create(Some(dialog), callbacks, SubscriptionKind::LineAppearance, 3)
        .await
        .unwrap();
    adapter
        .set_cached_body(subscription, Some(&MediaType::dialog_info()), Some(DIALOG_INFO))
        .await
        .unwrap();

    engine.set_state(subscription, SubscriptionState::Terminated);
    adapter.on_state_changed(subscription).await.unwrap();
    let second = adapter.on_state_changed(subscription).await;

    assert!(matches!(second, Err(SlaError::InvalidOperation { .. })));
    assert_eq!(terminal.load(Ordering::SeqCst), 1);
    assert!(!adapter.has_record(subscription));
    assert!(adapter.cached_body(subscription).is_none());
    assert!(!adapter.locks().is_locked(dialog));
    assert_eq!(adapter.locks().len(), 0);
}

#[tokio::test]
async fn test_non_terminal_state_keeps_record() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::LineAppearance, 1)
        .await
        .unwrap();

    engine.set_state(subscription, SubscriptionState::Pending);
    adapter.on_state_changed(subscription).await.unwrap();
    assert!(adapter.has_record(subscription));
}

#[tokio::test]
async fn test_notify_requires_cached_body_unless_terminated() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();

    let params = NotifyParams {
        state: SubscriptionState::Active,
        state_text: None,
        reason: None,
        content_type: None,
        body: None,
    };
    let active = adapter.notify(subscription, params).await;
    assert!(matches!(active, Err(SlaError::InvalidOperation { .. })));

    let current = adapter.current_notify(subscription).await;
    assert!(matches!(current, Err(SlaError::InvalidOperation { .. })));

    let terminated = adapter
        .notify(subscription, NotifyParams::terminated("noresource"))
        .await
        .unwrap();
    assert!(terminated.body.is_none());
    assert_eq!(terminated.reason.as_deref(), Some("noresource"));
}

#[tokio::test]
async fn test_cached_body_round_trip_and_reset() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();

    adapter
        .set_cached_body(subscription, Some(&MediaType::dialog_info()), Some(DIALOG_INFO))
        .await
        .unwrap();
    adapter.set_cached_body(subscription, None, None).await.unwrap();
    let cached = adapter.cached_body(subscription).unwrap();
    assert_eq!(cached.data.as_ref(), DIALOG_INFO);

    let request = adapter.current_notify(subscription).await.unwrap();
    assert_eq!(request.body, Some(cached));

    // Supplying only a payload drops the cached content type
    adapter
        .set_cached_body(subscription, None, Some(b"<dialog-info/>"))
        .await
        .unwrap();
    assert!(adapter.cached_body(subscription).is_none());
    assert!(adapter.current_notify(subscription).await.is_err());
}

#[tokio::test]
async fn test_unknown_subscription_is_invalid_operation() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let stranger = rvoip_sla_core::types::SubscriptionId::new();

    assert!(matches!(
        adapter.initiate(stranger, Expires::EngineDefault).await,
        Err(SlaError::InvalidOperation { .. })
    ));
    assert!(matches!(
        adapter.on_server_timeout(stranger).await,
        Err(SlaError::InvalidOperation { .. })
    ));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_send_failure_is_transmission_error() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .create(Some(DialogId::new()), SubscriptionCallbacks::new(), SubscriptionKind::LineAppearance, 1)
        .await
        .unwrap();
    let request = adapter.initiate(subscription, Expires::EngineDefault).await.unwrap();
    engine.fail("send_request");

    let err = adapter.send_request(subscription, request).await.unwrap_err();
    assert!(matches!(err, SlaError::Transmission { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_terminate_reaches_engine() {
    let engine = MockEngine::new();
    let adapter = adapter(&engine);
    let subscription = adapter
        .attach_from_incoming(Some(DialogId::new()), SubscriptionCallbacks::new(), &subscribe_request())
        .await
        .unwrap();

    adapter.terminate(subscription, true).await.unwrap();
    assert!(engine.calls().contains(&Call::Terminate(subscription, true)));

    // Cleanup happens when the engine reports the state
    assert!(adapter.has_record(subscription));
    adapter.on_state_changed(subscription).await.unwrap();
    assert!(!adapter.has_record(subscription));
}

#[cfg(feature = "events")]
mod event_loop {
    use super::*;
    use pretty_assertions::assert_eq;
    use rvoip_sla_core::adapter::EngineEvent;
    use tokio::sync::{mpsc, oneshot};

    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        init_tracing();
        let engine = MockEngine::new();
        let adapter = adapter(&engine);
        let callbacks = SubscriptionCallbacks::new().on_incoming_notify(|_, _| ResponseOverride {
            status_code: Some(200),
            reason_phrase: Some("Seen".to_string()),
            body: None,
        });
        let subscription = adapter
            .create(Some(DialogId::new()), callbacks, SubscriptionKind::DeviceMonitor, 7)
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = adapter.clone().spawn_event_loop(rx);

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(EngineEvent::IncomingNotify {
            subscription,
            request: IncomingRequest::new(Method::Notify, "sip:alice@192.0.2.10"),
            reply: Some(reply_tx),
        })
        .await
        .unwrap();
        tx.send(EngineEvent::ClientRefreshDue { subscription }).await.unwrap();
        engine.set_state(subscription, SubscriptionState::Terminated);
        tx.send(EngineEvent::StateChanged { subscription }).await.unwrap();
        drop(tx);

        let response = reply_rx.await.unwrap();
        assert_eq!(response.reason_phrase.as_deref(), Some("Seen"));

        handle.await.unwrap();
        assert_eq!(engine.sent().len(), 1);
        assert!(!adapter.has_record(subscription));
    }
}
