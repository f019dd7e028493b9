//! Tests for `src/whatsapp/client.rs` against a local HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use wasend::whatsapp::client::WhatsAppClient;
use wasend::whatsapp::{
    AckObservation, ChannelId, ClientEvent, MessagingClient, SendOptions, WhatsAppError,
};

use super::bridge_server::{
    received, requests, serve_once, serve_routes, Reply, OK_ENVELOPE,
};

const STATUS: &str = r#"{"success":true,"data":{"connected":false,"phone_number":null},"error":null}"#;

async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
        Ok(Ok(event)) => event,
        Ok(Err(err)) => panic!("event stream should stay open: {err}"),
        Err(_) => panic!("no event within 5s"),
    }
}

#[tokio::test]
async fn send_posts_text_with_read_receipt_suppressed() {
    let body = r#"{"success":true,"data":{"message_id":"true_15551234567@c.us_3EB0","jid":"15551234567@c.us","timestamp":"2026-10-19T12:00:00Z"},"error":null}"#;
    let (url, server) = serve_once("200 OK", body).await;
    let client = WhatsAppClient::new(url);

    let result = client
        .send(
            &ChannelId::new("15551234567@c.us"),
            "Total: 1.204 páginas",
            SendOptions::without_read_receipt(),
        )
        .await;
    let message = match result {
        Ok(message) => message,
        Err(err) => panic!("send should succeed: {err}"),
    };

    assert_eq!(message.id, "true_15551234567@c.us_3EB0");
    assert_eq!(message.channel_id.as_str(), "15551234567@c.us");

    let request = received(server).await;
    assert!(request.starts_with("POST /send "));
    assert!(request.contains(r#""send_seen":false"#));
    assert!(request.contains("Total: 1.204 páginas"));
}

#[tokio::test]
async fn bridge_error_text_is_kept_verbatim() {
    let error_text = "Evaluation failed: TypeError: Cannot read properties of undefined (reading 'markedUnread')";
    let body = format!(r#"{{"success":false,"data":null,"error":"{error_text}"}}"#);
    let (url, _server) = serve_once("500 Internal Server Error", &body).await;
    let client = WhatsAppClient::new(url);

    let result = client
        .send(
            &ChannelId::new("1@c.us"),
            "hi",
            SendOptions::without_read_receipt(),
        )
        .await;

    match result {
        Err(err @ WhatsAppError::Bridge(_)) => assert_eq!(err.to_string(), error_text),
        other => panic!("expected bridge error, got: {other:?}"),
    }
}

#[tokio::test]
async fn non_envelope_error_reports_status() {
    let (url, _server) = serve_once("502 Bad Gateway", "upstream gone").await;
    let client = WhatsAppClient::new(url);

    let result = client.list_channels().await;

    match result {
        Err(WhatsAppError::Bridge(text)) => assert!(text.contains("502")),
        other => panic!("expected bridge error, got: {other:?}"),
    }
}

#[tokio::test]
async fn list_channels_decodes_chat_snapshot() {
    let body = r#"{"success":true,"data":[{"id":"120363-42@g.us","name":"Family","is_group":true},{"id":"5511@c.us","name":"Mom"}],"error":null}"#;
    let (url, server) = serve_once("200 OK", body).await;
    let client = WhatsAppClient::new(format!("{url}/"));

    let channels = match client.list_channels().await {
        Ok(channels) => channels,
        Err(err) => panic!("chat list should decode: {err}"),
    };

    assert_eq!(channels.len(), 2);
    assert!(channels[0].is_group);
    assert_eq!(channels[0].name, "Family");
    assert!(!channels[1].is_group);
    assert!(received(server).await.starts_with("GET /chats "));
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let (url, server) = serve_once("200 OK", r#"{"success":true,"data":null,"error":null}"#).await;
    let client = WhatsAppClient::new(url);

    assert!(client.destroy().await.is_ok());
    // The server only answers once; a second network call would fail.
    assert!(client.destroy().await.is_ok());
    assert!(received(server).await.starts_with("POST /session/close "));
}

#[tokio::test]
async fn initialize_after_destroy_is_refused() {
    let (url, _server) = serve_once("200 OK", r#"{"success":true,"data":null,"error":null}"#).await;
    let client = WhatsAppClient::new(url);

    assert!(client.destroy().await.is_ok());
    assert!(matches!(
        client.initialize().await,
        Err(WhatsAppError::NotConnected)
    ));
}

#[tokio::test]
async fn base_url_trailing_slash_is_trimmed() {
    let client = WhatsAppClient::new("http://127.0.0.1:3001/".to_owned());
    assert_eq!(client.base_url(), "http://127.0.0.1:3001");
}

#[tokio::test]
async fn initialize_starts_session_and_streams_bridge_events() {
    let polls = Arc::new(AtomicUsize::new(0));
    let poll_count = Arc::clone(&polls);
    let (url, log) = serve_routes(move |line| {
        if line.starts_with("GET /status") {
            Reply::Body(STATUS.to_owned())
        } else if line.starts_with("GET /events/poll") {
            if poll_count.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::Body(
                    r#"[{"type":"ready"},{"type":"ack","message_id":"m1","level":1}]"#.to_owned(),
                )
            } else {
                Reply::Hang
            }
        } else {
            Reply::Body(OK_ENVELOPE.to_owned())
        }
    })
    .await;
    let client = WhatsAppClient::new(url);
    let mut events = client.subscribe();

    let initialized = client.initialize().await;
    assert!(initialized.is_ok(), "initialize failed: {initialized:?}");

    assert_eq!(next_event(&mut events).await, ClientEvent::Ready);
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Ack(AckObservation {
            message_id: "m1".to_owned(),
            level: 1,
        })
    );

    assert!(client.destroy().await.is_ok());
    let seen = requests(&log);
    assert!(seen.iter().any(|line| line.starts_with("GET /status ")));
    assert!(seen.iter().any(|line| line.starts_with("POST /session/start ")));
    assert!(seen.iter().any(|line| line.starts_with("POST /session/close ")));
}

#[tokio::test]
async fn initialize_reports_bridge_error() {
    let (url, _log) = serve_routes(|line| {
        if line.starts_with("GET /status") {
            Reply::Body(STATUS.to_owned())
        } else if line.starts_with("GET /events/poll") {
            Reply::Hang
        } else {
            Reply::Body(
                r#"{"success":false,"data":null,"error":"session directory locked"}"#.to_owned(),
            )
        }
    })
    .await;
    let client = WhatsAppClient::new(url);

    match client.initialize().await {
        Err(WhatsAppError::Bridge(text)) => assert_eq!(text, "session directory locked"),
        other => panic!("expected bridge error, got: {other:?}"),
    }
}

#[tokio::test]
async fn dropping_client_stops_event_polling() {
    let polls = Arc::new(AtomicUsize::new(0));
    let poll_count = Arc::clone(&polls);
    let (url, _log) = serve_routes(move |line| {
        if line.starts_with("GET /status") {
            Reply::Body(STATUS.to_owned())
        } else if line.starts_with("GET /events/poll") {
            poll_count.fetch_add(1, Ordering::SeqCst);
            Reply::Delayed(Duration::from_millis(20), "[]".to_owned())
        } else {
            Reply::Body(OK_ENVELOPE.to_owned())
        }
    })
    .await;
    let client = WhatsAppClient::new(url);
    let _events = client.subscribe();
    assert!(client.initialize().await.is_ok());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(polls.load(Ordering::SeqCst) > 0, "listener should be polling");

    drop(client);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_drop = polls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(polls.load(Ordering::SeqCst), after_drop);
}
