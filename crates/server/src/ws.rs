//! Worker WebSocket endpoint.
//!
//! Each upgraded connection becomes one scheduler session. The socket is
//! adapted to [`WorkerTransport`]: text frames carry protocol messages,
//! ping/pong frames are skipped and a close frame ends the stream.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use hypergrid_scheduler::{run_session, TransportError, WorkerTransport};
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::AppState;

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_worker(socket, state))
}

async fn handle_worker(socket: WebSocket, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    info!(%session, "worker connected");

    let mut transport = WsTransport::new(socket);
    // Failures are logged by the session itself.
    if let Ok(outcome) = run_session(&mut transport, &state.scheduler, session).await {
        info!(%session, ?outcome, "session finished");
    }
    transport.close().await;
}

pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }

    async fn close(mut self) {
        if let Err(e) = self.socket.send(Message::Close(None)).await {
            debug!(error = %e, "close frame not sent");
        }
    }
}

#[async_trait]
impl WorkerTransport for WsTransport {
    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(frame) = self.socket.recv().await {
            match frame.map_err(|e| TransportError::Connection(e.to_string()))? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(bytes) => {
                    debug!(len = bytes.len(), "skipping binary frame");
                }
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => return Ok(None),
            }
        }
        Ok(None)
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}
