//! WebSocket upgrade and per-connection command loop.
//!
//! Handles WebSocket upgrade, connection lifecycle, and message
//! forwarding. Every socket authenticates with the same bearer JWT
//! used on the REST surface, passed as a `?token=` query parameter
//! since browsers cannot set an `Authorization` header on a WebSocket
//! handshake.

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection::ConnectionManager;
use super::messages::{match_room, WsCommand, WsMessage, GLOBAL_CHAT_ROOM};
use crate::core_types::UserId;
use crate::gateway::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// GET /ws?token=<bearer jwt>
pub async fn ws_handler(ws: WebSocketUpgrade, Query(params): Query<WsQuery>, State(state): State<Arc<AppState>>) -> Response {
    let claims = match state.user_auth.verify_token(&params.token) {
        Ok(claims) => claims,
        Err(_) => return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response(),
    };
    let Ok(user_id) = claims.sub.parse::<UserId>() else {
        return (StatusCode::UNAUTHORIZED, "malformed subject claim").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: Arc<AppState>) {
    let manager = state.ws_manager.clone();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let conn_id = manager.add_connection(user_id, tx.clone());
    manager.subscribe(conn_id, GLOBAL_CHAT_ROOM.to_string());

    let welcome = WsMessage::Connected { user_id };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg)
                && sender.send(Message::Text(json.into())).await.is_err()
            {
                break;
            }
        }
    });

    let tx_for_recv = tx.clone();
    let manager_for_task = manager.clone();
    let state_for_recv = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(cmd) = serde_json::from_str::<WsCommand>(&text) {
                        handle_command(cmd, user_id, conn_id, &state_for_recv, &manager_for_task, &tx_for_recv).await;
                    } else if text.contains("\"type\"") && text.contains("\"ping\"") {
                        let _ = tx_for_recv.send(WsMessage::Pong);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    manager.remove_connection(conn_id);
}

async fn handle_command(
    cmd: WsCommand,
    user_id: UserId,
    conn_id: super::connection::ConnectionId,
    state: &Arc<AppState>,
    manager: &Arc<ConnectionManager>,
    tx: &mpsc::UnboundedSender<WsMessage>,
) {
    match cmd {
        WsCommand::QuickPlay { players_count, stake_vp } => {
            if let Err(e) = state.admission.quick_play(user_id, players_count, stake_vp, None).await {
                send_error(tx, e);
            }
        }

        WsCommand::Move { match_id, choice } => {
            if let Err(e) = state.round_engine.submit_move(match_id, user_id, choice).await {
                send_error(tx, e);
            }
        }

        WsCommand::MatchGet { match_id } => match state.round_engine.load(match_id).await {
            Ok(Some(m)) => {
                manager.subscribe(conn_id, match_room(match_id));
                let _ = tx.send(WsMessage::MatchUpdate { snapshot: Box::new(m) });
            }
            Ok(None) => {
                let _ = tx.send(WsMessage::Error { code: 4001, message: "match not found".to_string() });
            }
            Err(e) => send_error(tx, e),
        },

        WsCommand::MatchJoin { match_id } => {
            manager.subscribe(conn_id, match_room(match_id));
            let topics = vec![match_room(match_id)];
            let _ = tx.send(WsMessage::Subscribed { topics });
        }

        WsCommand::Subscribe { args } => {
            for topic in &args {
                manager.subscribe(conn_id, topic.clone());
            }
            let _ = tx.send(WsMessage::Subscribed { topics: args });
        }

        WsCommand::Unsubscribe { args } => {
            for topic in &args {
                manager.unsubscribe(conn_id, topic);
            }
            let _ = tx.send(WsMessage::Unsubscribed { topics: args });
        }

        WsCommand::ChatMessage { text } => {
            manager.send_to_room(GLOBAL_CHAT_ROOM, WsMessage::ChatGlobal { from: user_id, text });
        }

        WsCommand::ChatGame { match_id, text } => {
            manager.send_to_room(&match_room(match_id), WsMessage::ChatGame { match_id, from: user_id, text });
        }

        WsCommand::ChatGlobal { text } => {
            manager.send_to_room(GLOBAL_CHAT_ROOM, WsMessage::ChatGlobal { from: user_id, text });
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<WsMessage>, e: crate::error::EngineError) {
    let code = match e {
        crate::error::EngineError::BadInput(_) => 1001,
        crate::error::EngineError::InsufficientBalance => 1002,
        crate::error::EngineError::Precondition(_) => 1003,
        crate::error::EngineError::Unauthorized => 2001,
        crate::error::EngineError::NotFound(_) => 4001,
        crate::error::EngineError::Conflict(_) => 4002,
        crate::error::EngineError::Internal(_) => 5000,
    };
    let _ = tx.send(WsMessage::Error { code, message: e.to_string() });
}
