//! Chat endpoints: `chatSend`, `chatObserve`.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::chat::{Channel, ChatMessage, SendOptions};
use crate::config::EndpointClass;
use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::idempotency::IdempotencyCache;
use crate::rate_limit::RateLimiter;
use crate::room::registry::RoomRegistry;
use crate::room::Intent;
use crate::session::SessionStore;

use super::{
    authorize, call_room, idempotent, room_handle, validate_agent_id, validate_room_id, validate_tx_id, BearerToken,
    DEFAULT_DEADLINE,
};

fn rate_limited(limiter: &RateLimiter, agent_id: &str, class: EndpointClass) -> Result<(), AicError> {
    if limiter.check(agent_id, class) {
        Ok(())
    } else {
        Err(AicError::RateLimited { retry_after_secs: 1 })
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    agent_id: String,
    room_id: String,
    tx_id: String,
    channel: Channel,
    message: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    meeting_room_id: Option<String>,
    #[serde(default)]
    target_entity_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendResponse {
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts_ms: Option<i64>,
}

#[rocket::post("/chatSend", data = "<body>")]
pub async fn chat_send(
    body: Json<ChatSendRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
    idempotency: &State<Arc<IdempotencyCache>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    validate_tx_id(&body.tx_id)?;
    if body.message.is_empty() || body.message.chars().count() > 500 {
        return Err(AicError::BadRequest("message must be 1..=500 chars".to_string()));
    }
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Chat)?;

    let handle = room_handle(registry, &body.room_id)?;
    let agent_id = body.agent_id.clone();
    let channel = body.channel;
    let message = body.message.clone();
    let opts = SendOptions {
        team_id: body.team_id.clone(),
        meeting_room_id: body.meeting_room_id.clone(),
        target_entity_id: body.target_entity_id.clone(),
    };

    idempotent::<ChatSendResponse, _, _>(idempotency, &body.agent_id, &body.tx_id, &*body, || async move {
        let sent = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::ChatSend {
            entity_id: agent_id,
            channel,
            message,
            opts,
            reply,
        })
        .await?;
        Ok(match sent {
            Some((message_id, ts_ms)) => ChatSendResponse {
                result: "sent",
                message_id: Some(message_id),
                ts_ms: Some(ts_ms),
            },
            None => ChatSendResponse {
                result: "rejected",
                message_id: None,
                ts_ms: None,
            },
        })
    })
    .await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatObserveRequest {
    agent_id: String,
    room_id: String,
    window_sec: u64,
    #[serde(default)]
    channel: Option<Channel>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatObserveResponse {
    messages: Vec<ChatMessage>,
}

#[rocket::post("/chatObserve", data = "<body>")]
pub async fn chat_observe(
    body: Json<ChatObserveRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<ChatObserveResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    if !(1..=300).contains(&body.window_sec) {
        return Err(AicError::BadRequest("windowSec must be in [1, 300]".to_string()));
    }
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Observation)?;

    let handle = room_handle(registry, &body.room_id)?;
    let messages = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::ChatObserve {
        viewer_id: body.agent_id.clone(),
        channel: body.channel,
        window_sec: body.window_sec,
        reply,
    })
    .await?;

    Ok(AicOk::new(ChatObserveResponse { messages }))
}
