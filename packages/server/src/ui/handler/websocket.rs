//! WebSocket connection handlers.
//!
//! Each connection runs a pump pair:
//! - the read pump feeds text frames to the [`MessageRouter`] and enforces the pong deadline
//! - the write pump drains the outbound queue and sends keep-alive pings
//!
//! Closing the outbound queue is what stops the write pump.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{Duration, Instant, MissedTickBehavior, interval_at, timeout, timeout_at},
};

use crate::{
    config::ConnectionSettings,
    domain::UserId,
    infrastructure::presence::ConnectionHandle,
    ui::{router::MessageRouter, state::AppState},
};

/// Query parameters for WebSocket connection
///
/// Identity is established by the authentication layer in front of this server.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: u64,
}

#[derive(Debug, Error)]
enum PumpError {
    #[error("socket error: {0}")]
    Socket(#[from] axum::Error),

    #[error("write timed out")]
    Timeout,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = match UserId::new(query.user_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting connection: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let max_message_size = state.connection_settings.max_message_size;
    Ok(ws
        .max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let settings = state.connection_settings;
    let (connection, rx) = ConnectionHandle::new(user_id, settings.outbound_capacity);

    // Register first so the online list is the first frame the client sees
    if let Err(e) = state.connect_user_usecase.execute(connection.clone()).await {
        tracing::error!("Failed to register user {}: {}", user_id, e);
        return;
    }
    tracing::info!(
        "User {} connected (connection {})",
        user_id,
        connection.id()
    );

    let (sink, stream) = socket.split();
    let mut send_task = tokio::spawn(write_pump(sink, rx, settings));
    let router = MessageRouter::new(connection.clone(), state.clone());
    let mut recv_task = tokio::spawn(read_pump(stream, router, settings.pong_wait));

    let outbound_finished = tokio::select! {
        _ = &mut recv_task => false,
        _ = &mut send_task => {
            recv_task.abort();
            true
        }
    };

    // Unregistering closes the outbound queue, which lets the write pump say goodbye
    state.disconnect_user_usecase.execute(&connection).await;
    if !outbound_finished && timeout(settings.write_wait, &mut send_task).await.is_err() {
        send_task.abort();
    }

    tracing::info!(
        "User {} disconnected (connection {})",
        user_id,
        connection.id()
    );
}

/// Read frames until the peer goes away, an error occurs or no pong arrives in time.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    router: MessageRouter,
    pong_wait: Duration,
) {
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let frame = match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                tracing::debug!("WebSocket read error: {}", e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::info!("No pong within {:?}, closing connection", pong_wait);
                break;
            }
        };

        match frame {
            Message::Text(text) => router.handle_text(text.as_str()).await,
            Message::Pong(_) => deadline = Instant::now() + pong_wait,
            Message::Close(_) => break,
            Message::Binary(_) => tracing::warn!("Dropping binary frame"),
            // answered by axum
            Message::Ping(_) => {}
        }
    }
}

/// Drain the outbound queue into the socket and keep the connection alive with pings.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    settings: ConnectionSettings,
) {
    let mut ping = interval_at(Instant::now() + settings.ping_period, settings.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(first) = payload else {
                    let _ = timeout(settings.write_wait, sink.send(Message::Close(None))).await;
                    break;
                };
                match write_batch(&mut sink, &mut rx, first, settings.write_wait).await {
                    Ok(count) => tracing::debug!("Wrote {} frames", count),
                    Err(e) => {
                        tracing::debug!("WebSocket write failed: {}", e);
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                let result = timeout(settings.write_wait, sink.send(Message::Ping(Bytes::new()))).await;
                if !matches!(result, Ok(Ok(()))) {
                    tracing::debug!("Failed to send ping, closing connection");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Write `first` plus everything already queued behind it with a single flush.
///
/// Frames stay separate on the wire; only the transport write is shared.
async fn write_batch(
    sink: &mut SplitSink<WebSocket, Message>,
    rx: &mut mpsc::Receiver<String>,
    first: String,
    write_wait: Duration,
) -> Result<usize, PumpError> {
    let mut batch = vec![first];
    while let Ok(next) = rx.try_recv() {
        batch.push(next);
    }
    let count = batch.len();

    let write = async {
        for payload in batch {
            sink.feed(Message::Text(payload.into())).await?;
        }
        sink.flush().await
    };
    timeout(write_wait, write)
        .await
        .map_err(|_| PumpError::Timeout)??;

    Ok(count)
}
