//! Tests for the realtime channel against a local websocket server

use super::*;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, WebSocketStream};

const OPEN: &str = r#"0{"sid":"engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const WAIT: Duration = Duration::from_secs(5);

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("http://{}", listener.local_addr().unwrap());
    (listener, host)
}

/// Accept one client and run the Engine.IO + namespace handshake
async fn handshake(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let mut ws = open_only(listener).await;
    ws.send(Message::Text(r#"40{"sid":"socket-sid"}"#.into()))
        .await
        .unwrap();
    ws
}

/// Accept one client and stop after it asked for the namespace
async fn open_only(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut ws = accept_async(tcp).await.unwrap();
    ws.send(Message::Text(OPEN.into())).await.unwrap();
    let reply = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply, Message::Text("40".into()));
    ws
}

async fn collect(channel: &RealtimeChannel) -> UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = unbounded_channel();
    for name in [
        events::CONNECT,
        events::DISCONNECT,
        events::CONNECT_ERROR,
        events::WALLET_BALANCE,
        events::PAYMENT_STATUS,
        events::PAYMENT_CONFIRMED,
    ] {
        let tx = tx.clone();
        channel
            .on_event(name, move |event| {
                let _ = tx.send(event.clone());
            })
            .await;
    }
    rx
}

async fn next_event(rx: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

async fn wait_until_disconnected(channel: &RealtimeChannel) {
    let mut state = channel.subscribe_state();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Disconnected))
        .await
        .unwrap()
        .unwrap();
}

fn channel_for(host: String) -> RealtimeChannel {
    RealtimeChannel::new(
        RealtimeConfig::new(host).with_reconnect(false),
        PaymentCorrelationStore::new(),
    )
}

#[test]
fn test_websocket_url_from_hosts() {
    let url = RealtimeConfig::new("https://socket.smartdeals.com.ng")
        .websocket_url()
        .unwrap();
    assert_eq!(
        url.as_str(),
        "wss://socket.smartdeals.com.ng/ws/pay/socket.io/?EIO=4&transport=websocket"
    );

    let url = RealtimeConfig::new("http://127.0.0.1:8080/")
        .websocket_url()
        .unwrap();
    assert_eq!(
        url.as_str(),
        "ws://127.0.0.1:8080/ws/pay/socket.io/?EIO=4&transport=websocket"
    );

    assert!(matches!(
        RealtimeConfig::new("ftp://example.com").websocket_url(),
        Err(ClientError::Config(_))
    ));
    assert!(matches!(
        RealtimeConfig::new("not a url").websocket_url(),
        Err(ClientError::Url(_))
    ));
}

#[test]
fn test_config_defaults() {
    let config = RealtimeConfig::new("https://socket.example.com");
    assert!(config.reconnect);
    assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    assert_eq!(config.max_reconnect_attempts, None);
    assert_eq!(config.path, "/ws/pay/socket.io/");
}

#[tokio::test]
async fn test_handlers_register_and_deregister() {
    let channel = channel_for("http://127.0.0.1:1".into());
    let first = channel.on_event(events::WALLET_BALANCE, |_| {}).await;
    let second = channel.on_event(events::PAYMENT_STATUS, |_| {}).await;
    assert_ne!(first, second);
    assert_eq!(channel.handler_count().await, 2);

    assert!(channel.off(first).await);
    assert!(!channel.off(first).await);
    assert_eq!(channel.handler_count().await, 1);
}

#[tokio::test]
async fn test_payment_status_flow() {
    let (listener, host) = listener().await;
    let channel = channel_for(host);
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = handshake(&listener).await;

    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::Connected {
            sid: Some("socket-sid".into())
        }
    );
    assert_eq!(channel.state(), ConnectionState::Connected);

    let payload = json!({
        "method": "payment_status",
        "data": [{"initiationTranRef": "REF-1", "status": "SUCCESSFUL"}]
    })
    .to_string();
    let frame = format!("42{}", json!(["payment_status", payload]));
    server.send(Message::Text(frame)).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::PaymentConfirmed {
            initiation_tran_ref: "REF-1".into()
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::PaymentStatus(vec![
            json!({"initiationTranRef": "REF-1", "status": "SUCCESSFUL"})
        ])
    );
    assert!(channel.correlations().has("REF-1").await);

    // Engine.IO heartbeat
    server.send(Message::Text("2".into())).await.unwrap();
    let pong = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(pong, Message::Text("3".into()));

    channel.disconnect().await;
    let goodbye = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(goodbye, Message::Text("41".into()));
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    assert_eq!(channel.handler_count().await, 0);
}

#[tokio::test]
async fn test_unparseable_payload_is_dropped() {
    let (listener, host) = listener().await;
    let channel = channel_for(host);
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = handshake(&listener).await;
    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Connected { .. }
    ));

    let broken = format!("42{}", json!(["payment_status", "{not json"]));
    server.send(Message::Text(broken)).await.unwrap();
    let balance = format!(
        "42{}",
        json!(["wallet_balance", {"method": "wallet_balance", "data": [{"balance": 10}]}])
    );
    server.send(Message::Text(balance)).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::WalletBalance(json!([{"balance": 10}]))
    );
    assert!(channel.correlations().is_empty().await);

    channel.disconnect().await;
}

#[tokio::test]
async fn test_mislabelled_event_does_not_confirm_payment() {
    let (listener, host) = listener().await;
    let channel = channel_for(host);
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = handshake(&listener).await;
    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Connected { .. }
    ));

    let mislabelled = format!(
        "42{}",
        json!(["wallet_balance", {"method": "payment_status", "data": [{"initiationTranRef": "REF-FAKE"}]}])
    );
    server.send(Message::Text(mislabelled)).await.unwrap();
    let genuine = format!(
        "42{}",
        json!(["payment_status", {"method": "payment_status", "data": [{"initiationTranRef": "REF-REAL"}]}])
    );
    server.send(Message::Text(genuine)).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::PaymentConfirmed {
            initiation_tran_ref: "REF-REAL".into()
        }
    );
    assert_eq!(channel.correlations().all().await, vec!["REF-REAL"]);

    channel.disconnect().await;
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (listener, host) = listener().await;
    let channel = channel_for(host);

    channel.connect().await.unwrap();
    channel.connect().await.unwrap();
    let _server = handshake(&listener).await;

    let second = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(second.is_err(), "a second connection was opened");

    channel.disconnect().await;
}

#[tokio::test]
async fn test_server_disconnect_does_not_reconnect() {
    let (listener, host) = listener().await;
    let channel = RealtimeChannel::new(
        RealtimeConfig::new(host).with_reconnect_delay(Duration::from_millis(10)),
        PaymentCorrelationStore::new(),
    );
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = handshake(&listener).await;
    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Connected { .. }
    ));

    server.send(Message::Text("41".into())).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::Disconnected {
            reason: "io server disconnect".into()
        }
    );
    wait_until_disconnected(&channel).await;
}

#[tokio::test]
async fn test_reconnects_after_transport_close() {
    let (listener, host) = listener().await;
    let channel = RealtimeChannel::new(
        RealtimeConfig::new(host).with_reconnect_delay(Duration::from_millis(10)),
        PaymentCorrelationStore::new(),
    );
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = handshake(&listener).await;
    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Connected { .. }
    ));

    server.close(None).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::Disconnected {
            reason: "transport close".into()
        }
    );

    let _server = handshake(&listener).await;
    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Connected { .. }
    ));
    assert_eq!(channel.state(), ConnectionState::Connected);

    channel.disconnect().await;
}

#[tokio::test]
async fn test_connect_error_from_server() {
    let (listener, host) = listener().await;
    let channel = channel_for(host);
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    let mut server = open_only(&listener).await;
    server
        .send(Message::Text(r#"44{"message":"Not authorized"}"#.into()))
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        ChannelEvent::ConnectError {
            message: "Not authorized".into()
        }
    );
    wait_until_disconnected(&channel).await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let (listener, host) = listener().await;
    drop(listener);

    let channel = RealtimeChannel::new(
        RealtimeConfig::new(host)
            .with_reconnect_delay(Duration::from_millis(10))
            .with_max_reconnect_attempts(2),
        PaymentCorrelationStore::new(),
    );
    let mut rx = collect(&channel).await;

    channel.connect().await.unwrap();
    wait_until_disconnected(&channel).await;

    let mut failures = 0;
    while let Ok(event) = rx.try_recv() {
        assert!(matches!(event, ChannelEvent::ConnectError { .. }));
        failures += 1;
    }
    assert_eq!(failures, 3);
}
