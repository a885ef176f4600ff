//! Session & Auth endpoints: `register`, `unregister`, `reconnect`,
//! `heartbeat`.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::room::entity::EntityKind;
use crate::room::registry::{JoinOrCreateError, RoomRegistry};
use crate::room::Intent;
use crate::session::SessionStore;

use super::{authorize, call_room, validate_agent_id, validate_room_id, BearerToken, DEFAULT_DEADLINE, HEARTBEAT_DEADLINE};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    name: String,
    room_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    agent_id: String,
    room_id: String,
    session_token: String,
}

#[rocket::post("/register", data = "<body>")]
pub async fn register(
    body: Json<RegisterRequest>,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
) -> AicResult<RegisterResponse> {
    let name = body.name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err(AicError::BadRequest("name must be 1..=100 chars".to_string()));
    }

    let handle = registry
        .join_or_create(body.room_id.as_deref())
        .map_err(|JoinOrCreateError::ChannelFull| AicError::Conflict)?;

    let joined = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::Join {
        name: name.to_string(),
        kind: EntityKind::Agent,
        reply,
    })
    .await?;

    let session = sessions.register(&joined.entity.id, &handle.room_id);

    Ok(AicOk::new(RegisterResponse {
        agent_id: session.agent_id,
        room_id: session.room_id,
        session_token: session.token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterRequest {
    agent_id: String,
    room_id: String,
}

#[rocket::post("/unregister", data = "<body>")]
pub async fn unregister(
    body: Json<UnregisterRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;

    let handle = registry.get(&body.room_id).ok_or(AicError::RoomNotReady)?;
    handle
        .send(Intent::Leave {
            entity_id: body.agent_id.clone(),
            reason: "unregister".to_string(),
        })
        .await
        .map_err(|_| AicError::RoomNotReady)?;
    sessions.unregister(&body.agent_id);

    Ok(AicOk::new(serde_json::json!({})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectRequest {
    agent_id: String,
    room_id: String,
    session_token: String,
}

#[rocket::post("/reconnect", data = "<body>")]
pub async fn reconnect(
    body: Json<ReconnectRequest>,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
) -> AicResult<RegisterResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;

    let session = sessions
        .reconnect(&body.agent_id, &body.session_token)
        .ok_or(AicError::Unauthorized)?;
    if session.room_id != body.room_id {
        return Err(AicError::Unauthorized);
    }

    let handle = registry.get(&body.room_id).ok_or(AicError::RoomNotReady)?;
    call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::Reconnect {
        entity_id: body.agent_id.clone(),
        name: body.agent_id.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(RegisterResponse {
        agent_id: session.agent_id,
        room_id: session.room_id,
        session_token: session.token,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    agent_id: String,
    room_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    last_heartbeat_ms: i64,
}

/// Never rate-limited; deadline is the tighter 5s bound.
#[rocket::post("/heartbeat", data = "<body>")]
pub async fn heartbeat(
    body: Json<HeartbeatRequest>,
    token: BearerToken,
    sessions: &State<Arc<SessionStore>>,
) -> AicResult<HeartbeatResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;

    let session = tokio::time::timeout(HEARTBEAT_DEADLINE, async {
        sessions.heartbeat(&body.agent_id)
    })
    .await
    .map_err(|_| AicError::Timeout)?
    .ok_or(AicError::Unauthorized)?;

    Ok(AicOk::new(HeartbeatResponse {
        last_heartbeat_ms: session.last_heartbeat_ms,
    }))
}
