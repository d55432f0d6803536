use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Extension, Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use quickdesk_core::api::visible_ticket;
use quickdesk_core::model::Profile;
use quickdesk_core::realtime::{Change, ChangeOperation, Topic};
use quickdesk_core::store::DeskStore;
use quickdesk_core::AuthContext;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::auth::AuthMiddleware;
use super::response::RpcError;
use crate::function::FunctionRouter;

const MAX_SUBSCRIPTIONS: usize = 64;
const MAX_CLIENT_SUB_ID_LEN: usize = 255;

#[derive(Clone)]
pub struct WsState {
    pub router: Arc<FunctionRouter>,
    pub auth: Arc<AuthMiddleware>,
    pub changes: broadcast::Sender<Change>,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Browsers cannot set headers on websocket requests.
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        id: String,
        table: String,
        #[serde(default)]
        filter: Option<String>,
    },
    Unsubscribe {
        id: String,
    },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected,
    Pong,
    Subscribed {
        id: String,
    },
    Unsubscribed {
        id: String,
    },
    Change {
        id: String,
        table: String,
        operation: ChangeOperation,
        row_id: Option<Uuid>,
    },
    Error {
        id: Option<String>,
        code: String,
        message: String,
    },
}

impl ServerMessage {
    fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            id,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Subscriptions of one connected viewer.
pub struct Session {
    viewer: Profile,
    topics: HashMap<String, Topic>,
}

impl Session {
    pub fn new(viewer: Profile) -> Self {
        Self {
            viewer,
            topics: HashMap::new(),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.topics.len()
    }

    pub async fn handle(&mut self, message: ClientMessage, store: &dyn DeskStore) -> ServerMessage {
        match message {
            ClientMessage::Ping => ServerMessage::Pong,
            ClientMessage::Unsubscribe { id } => {
                self.topics.remove(&id);
                ServerMessage::Unsubscribed { id }
            }
            ClientMessage::Subscribe { id, table, filter } => {
                if id.is_empty() || id.len() > MAX_CLIENT_SUB_ID_LEN {
                    return ServerMessage::error(None, "INVALID_ARGUMENT", "Invalid subscription id");
                }
                if !self.topics.contains_key(&id) && self.topics.len() >= MAX_SUBSCRIPTIONS {
                    return ServerMessage::error(
                        Some(id),
                        "VALIDATION_ERROR",
                        "Too many subscriptions",
                    );
                }
                let topic = match Topic::parse(&table, filter.as_deref(), self.viewer.id) {
                    Ok(topic) => topic,
                    Err(e) => {
                        let err = RpcError::from(e);
                        return ServerMessage::error(Some(id), &err.code, err.message);
                    }
                };
                if let Some(ticket_id) = topic.ticket_id() {
                    if let Err(e) = visible_ticket(store, &self.viewer, ticket_id).await {
                        let err = RpcError::from(e);
                        return ServerMessage::error(Some(id), &err.code, err.message);
                    }
                }
                self.topics.insert(id.clone(), topic);
                ServerMessage::Subscribed { id }
            }
        }
    }

    /// Messages for every subscription the change matches.
    pub fn route(&self, change: &Change) -> Vec<ServerMessage> {
        self.topics
            .iter()
            .filter(|(_, topic)| topic.matches(change))
            .map(|(id, _)| ServerMessage::Change {
                id: id.clone(),
                table: change.table.clone(),
                operation: change.operation,
                row_id: change.row_id,
            })
            .collect()
    }
}

/// `GET /realtime`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<WsParams>,
) -> Response {
    let auth = match params.access_token {
        Some(token) if !auth.is_authenticated() => state.auth.authenticate(&token),
        _ => auth,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    serde_json::to_string(message)
        .ok()
        .map(|json| Message::Text(json.into()))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>, auth: AuthContext) {
    let (mut sender, mut receiver) = socket.split();

    let viewer = match state.router.resolve_viewer(&auth).await {
        Ok(viewer) => viewer,
        Err(e) => {
            let err = RpcError::from(e);
            if let Some(msg) = encode(&ServerMessage::error(None, &err.code, err.message)) {
                let _ = sender.send(msg).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let user_id = viewer.id;
    let mut session = Session::new(viewer);
    let mut changes = state.changes.subscribe();
    let store = state.router.services().store.clone();

    if let Some(msg) = encode(&ServerMessage::Connected) {
        if sender.send(msg).await.is_err() {
            return;
        }
    }
    tracing::debug!(%user_id, "Realtime session opened");

    loop {
        let outgoing: Vec<ServerMessage> = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => vec![session.handle(message, store.as_ref()).await],
                        Err(e) => vec![ServerMessage::error(None, "INVALID_ARGUMENT", e.to_string())],
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::debug!(%user_id, error = %e, "Realtime receive failed");
                    break;
                }
            },
            change = changes.recv() => match change {
                Ok(change) => session.route(&change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%user_id, skipped, "Realtime session lagging");
                    vec![ServerMessage::error(
                        None,
                        "LAGGED",
                        format!("{} changes were dropped", skipped),
                    )]
                }
                Err(RecvError::Closed) => break,
            },
        };

        for message in outgoing {
            let Some(msg) = encode(&message) else { continue };
            if sender.send(msg).await.is_err() {
                tracing::debug!(%user_id, "Realtime client went away");
                return;
            }
        }
    }

    tracing::debug!(
        %user_id,
        subscriptions = session.subscription_count(),
        "Realtime session closed"
    );
}
