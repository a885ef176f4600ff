//! Realtime Transport: a `rocket_ws` websocket that forwards client
//! intents to a room and fans out per-tick diffs plus chat. The handler
//! is written directly against `rocket_ws`'s channel API (the
//! `WebSocket::channel` pattern from its own docs), with the
//! intent/reply plumbing reusing this crate's `aic::call_room`.
//!
//! Auth travels as a `token` query parameter rather than a header: a
//! browser cannot set custom headers on the websocket upgrade request.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rocket::State;
use rocket_ws::{Message, WebSocket};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::chat::{Channel, ChatMessage, SendOptions};
use crate::grid::TileCoord;
use crate::room::entity::EntityStatus;
use crate::room::registry::RoomRegistry;
use crate::room::{Intent, RoomDiff};
use crate::session::SessionStore;

#[derive(Deserialize)]
struct Dest {
    tx: i32,
    ty: i32,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    MoveTo {
        dest: Dest,
    },
    ChatSend {
        channel: Channel,
        message: String,
        #[serde(default)]
        team_id: Option<String>,
        #[serde(default)]
        meeting_room_id: Option<String>,
        #[serde(default)]
        target_entity_id: Option<String>,
    },
    Interact {
        target_id: String,
        action: String,
    },
    ProfileUpdate {
        #[serde(default)]
        status: Option<EntityStatus>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        department: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame {
    Welcome {
        entity_id: String,
        room_id: String,
    },
    Diff {
        #[serde(flatten)]
        diff: RoomDiff,
    },
    Chat {
        #[serde(flatten)]
        message: ChatMessage,
    },
    Error {
        message: String,
    },
}

fn to_message(frame: &ServerFrame) -> Message {
    Message::Text(serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_string()))
}

/// The query string carries the same `(agentId, roomId, sessionToken)`
/// triple an agent would otherwise send as JSON, since a websocket
/// upgrade has no request body.
#[rocket::get("/ws?<agent_id>&<room_id>&<token>")]
pub fn connect(
    ws: WebSocket,
    agent_id: String,
    room_id: String,
    token: String,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
) -> rocket_ws::Channel<'static> {
    let registry = (**registry).clone();
    let sessions = (**sessions).clone();

    ws.channel(move |mut stream| {
        Box::pin(async move {
            let Some(session) = sessions.authenticate(&agent_id, &token) else {
                let _ = stream.send(to_message(&ServerFrame::Error {
                    message: "unauthorized".to_string(),
                })).await;
                return Ok(());
            };
            if session.room_id != room_id {
                let _ = stream.send(to_message(&ServerFrame::Error {
                    message: "unauthorized".to_string(),
                })).await;
                return Ok(());
            }
            let Some(handle) = registry.get(&room_id) else {
                let _ = stream.send(to_message(&ServerFrame::Error {
                    message: "room_not_ready".to_string(),
                })).await;
                return Ok(());
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            if handle
                .send(Intent::Reconnect {
                    entity_id: agent_id.clone(),
                    name: agent_id.clone(),
                    reply: reply_tx,
                })
                .await
                .is_err()
            {
                return Ok(());
            }
            let Ok(entity) = reply_rx.await else {
                return Ok(());
            };

            stream
                .send(to_message(&ServerFrame::Welcome {
                    entity_id: entity.id.clone(),
                    room_id: room_id.clone(),
                }))
                .await?;

            let mut diffs = handle.subscribe_diffs();
            let mut chat = handle.subscribe_chat();

            loop {
                tokio::select! {
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                handle_client_frame(&handle, &agent_id, &text).await;
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(_)) => break,
                        }
                    }
                    diff = diffs.recv() => {
                        if let Ok(diff) = diff {
                            if stream.send(to_message(&ServerFrame::Diff { diff })).await.is_err() {
                                break;
                            }
                        }
                    }
                    message = chat.recv() => {
                        if let Ok(message) = message {
                            if stream.send(to_message(&ServerFrame::Chat { message })).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }

            let _ = handle
                .send(Intent::Leave {
                    entity_id: agent_id,
                    reason: "disconnect".to_string(),
                })
                .await;
            Ok(())
        })
    })
}

async fn handle_client_frame(handle: &crate::room::RoomHandle, agent_id: &str, text: &str) {
    let Ok(frame) = serde_json::from_str::<ClientFrame>(text) else {
        return;
    };
    match frame {
        ClientFrame::MoveTo { dest } => {
            let (tx, rx) = oneshot::channel();
            let _ = handle
                .send(Intent::MoveTo {
                    entity_id: agent_id.to_string(),
                    dest: TileCoord::new(dest.tx, dest.ty),
                    reply: tx,
                })
                .await;
            let _ = tokio::time::timeout(Duration::from_secs(5), rx).await;
        }
        ClientFrame::ChatSend {
            channel,
            message,
            team_id,
            meeting_room_id,
            target_entity_id,
        } => {
            let (tx, rx) = oneshot::channel();
            let _ = handle
                .send(Intent::ChatSend {
                    entity_id: agent_id.to_string(),
                    channel,
                    message,
                    opts: SendOptions {
                        team_id,
                        meeting_room_id,
                        target_entity_id,
                    },
                    reply: tx,
                })
                .await;
            let _ = tokio::time::timeout(Duration::from_secs(5), rx).await;
        }
        ClientFrame::Interact { target_id, action } => {
            let (tx, rx) = oneshot::channel();
            let _ = handle
                .send(Intent::Interact {
                    entity_id: agent_id.to_string(),
                    target_id,
                    action,
                    reply: tx,
                })
                .await;
            let _ = tokio::time::timeout(Duration::from_secs(5), rx).await;
        }
        ClientFrame::ProfileUpdate { status, title, department } => {
            let (tx, rx) = oneshot::channel();
            let _ = handle
                .send(Intent::ProfileUpdate {
                    entity_id: agent_id.to_string(),
                    status,
                    title,
                    department,
                    reply: tx,
                })
                .await;
            let _ = tokio::time::timeout(Duration::from_secs(5), rx).await;
        }
    }
}
