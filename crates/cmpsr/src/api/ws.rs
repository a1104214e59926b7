//! WebSocket relay endpoint: one session per connection.
//!
//! The socket loop multiplexes two directions: controller events serialize
//! to outbound JSON frames, inbound frames feed command intake. Commands are
//! handed to the session without awaiting the cycle, so status broadcasts
//! keep flowing while a command is in flight. Connection loss tears the
//! session down synchronously.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cmpsr_protocol::{ClientCommand, ServerEvent};

use super::state::AppState;
use crate::relay::Session;

/// Size of the per-connection event buffer.
const EVENT_BUFFER_SIZE: usize = 64;

/// GET /ws - WebSocket relay endpoint.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| relay_socket(socket, state))
}

async fn relay_socket(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    state.connections.register(conn_id);
    info!("client {conn_id} connected");

    let (events_tx, mut events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    let mut session = Session::new(conn_id, state.relay.clone(), events_tx.clone());

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                let Ok(frame) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&mut session, &events_tx, &text);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("websocket receive error: {err:?}");
                        break;
                    }
                }
            }
        }
    }

    session.teardown();
    state.connections.unregister(conn_id);
    info!("client {conn_id} disconnected");
}

fn handle_frame(session: &mut Session, events: &mpsc::Sender<ServerEvent>, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::ExecuteCommand { command }) => session.submit(command),
        Err(err) => {
            warn!("unrecognized client frame: {err}");
            let events = events.clone();
            tokio::spawn(async move {
                let _ = events.send(ServerEvent::error("unrecognized message")).await;
            });
        }
    }
}
