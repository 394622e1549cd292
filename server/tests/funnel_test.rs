//! Integration tests for the checkout funnel aggregator: stage
//! transitions, admin snapshots, disconnect cleanup, and payment-driven
//! completion.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use pix_relay_server::payment::webhook::WebhookForwarder;
use pix_relay_server::relay::Relay;
use pix_relay_server::routes::build_router;
use pix_relay_server::state::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Helper: start the server on a random port and return its address.
async fn start_test_server() -> SocketAddr {
    let state = AppState::new(Relay::new(), WebhookForwarder::disabled());
    let app = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr, session: Option<&str>) -> WsStream {
    let url = match session {
        Some(s) => format!("ws://{}/ws?session={}", addr, s),
        None => format!("ws://{}/ws", addr),
    };
    let (stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect to WebSocket");
    stream
}

async fn send_event(ws: &mut WsStream, frame: Value) {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send event frame");
}

async fn recv_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for event")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Frame should be valid JSON")
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

async fn assert_no_event(ws: &mut WsStream) {
    let result = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await;
    assert!(result.is_err(), "Expected silence, got: {:?}", result);
}

/// Receive the next funnelUpdate frame and return its data payload.
async fn recv_funnel_update(ws: &mut WsStream) -> Value {
    let event = recv_event(ws).await;
    assert_eq!(event["event"], "funnelUpdate");
    event["data"].clone()
}

/// Track a stage and wait until the tracking connection's own send has
/// been processed (a ping round-trip orders the events).
async fn track_step(ws: &mut WsStream, user_id: &str, step: &str) {
    send_event(
        ws,
        json!({"event": "trackFunnelStep", "data": {"userId": user_id, "step": step}}),
    )
    .await;
    send_event(ws, json!({"event": "ping"})).await;
    let reply = recv_event(ws).await;
    assert_eq!(reply["event"], "pong");
}

#[tokio::test]
async fn test_admin_receives_immediate_snapshot_on_subscribe() {
    let addr = start_test_server().await;

    let mut storefront = connect(addr, None).await;
    track_step(&mut storefront, "u1", "step1_cart").await;
    track_step(&mut storefront, "u2", "step1_cart").await;

    // A dashboard attaching afterwards must render without waiting for
    // the next state change
    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;

    let snapshot = recv_funnel_update(&mut admin).await;
    assert_eq!(snapshot["step1_cart"], 2);
    assert_eq!(snapshot["step2_shipping"], 0);
    assert_eq!(snapshot["step3_payment"], 0);
    assert_eq!(snapshot["step4_pix_pending"], 0);
    assert_eq!(snapshot["step5_completed"], 0);
}

#[tokio::test]
async fn test_track_stage_moves_user_between_stages() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    let mut storefront = connect(addr, None).await;
    track_step(&mut storefront, "u1", "step3_payment").await;

    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step3_payment"], 1);

    track_step(&mut storefront, "u1", "step4_pix_pending").await;

    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(
        update["step3_payment"], 0,
        "A user occupies at most one stage at a time"
    );
    assert_eq!(update["step4_pix_pending"], 1);
}

#[tokio::test]
async fn test_unknown_stage_rejected_and_state_unchanged() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    let mut storefront = connect(addr, None).await;
    track_step(&mut storefront, "u1", "step1_cart").await;
    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step1_cart"], 1);

    // Invalid stage: no error back to the socket, no broadcast, no change
    send_event(
        &mut storefront,
        json!({"event": "trackFunnelStep", "data": {"userId": "u1", "step": "step9_bogus"}}),
    )
    .await;
    assert_no_event(&mut storefront).await;
    assert_no_event(&mut admin).await;
}

#[tokio::test]
async fn test_disconnect_clears_funnel_membership() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    // No userId in the event: membership is keyed by the session token
    let mut shopper = connect(addr, Some("shopper-1")).await;
    send_event(
        &mut shopper,
        json!({"event": "trackFunnelStep", "data": {"step": "step2_shipping"}}),
    )
    .await;

    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step2_shipping"], 1);

    // Closing the connection retires its funnel membership
    shopper.close(None).await.expect("Failed to close");

    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step2_shipping"], 0);
}

#[tokio::test]
async fn test_disconnect_of_untracked_connection_is_silent() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    // A connection that never tracked a stage must not trigger a broadcast
    let mut bystander = connect(addr, None).await;
    send_event(&mut bystander, json!({"event": "ping"})).await;
    recv_event(&mut bystander).await;
    bystander.close(None).await.expect("Failed to close");

    assert_no_event(&mut admin).await;
}

#[tokio::test]
async fn test_payment_moves_pending_purchase_to_completed() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    let mut storefront = connect(addr, None).await;
    track_step(&mut storefront, "order-7", "step4_pix_pending").await;
    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step4_pix_pending"], 1);

    send_event(
        &mut storefront,
        json!({"event": "pixPayment", "data": {"compra_id": "order-7", "valor": 99.9}}),
    )
    .await;

    let update = recv_funnel_update(&mut admin).await;
    assert_eq!(update["step4_pix_pending"], 0);
    assert_eq!(update["step5_completed"], 1);
}

#[tokio::test]
async fn test_payment_for_untracked_purchase_leaves_funnel_alone() {
    let addr = start_test_server().await;

    let mut admin = connect(addr, None).await;
    send_event(&mut admin, json!({"event": "joinAdminFunnel"})).await;
    recv_funnel_update(&mut admin).await;

    let mut source = connect(addr, None).await;
    send_event(
        &mut source,
        json!({"event": "pixPayment", "data": {"compra_id": "order-unknown"}}),
    )
    .await;

    // Notification routing happens, but the funnel must not change
    assert_no_event(&mut admin).await;
}
