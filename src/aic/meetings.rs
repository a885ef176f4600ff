//! Meeting endpoints: `meeting/list`, `meeting/join`, `meeting/leave`.
//! Meetings are a thin grouping over `entity.meta["meetingRoomId"]`
//! rather than a first-class Room Runtime concept — there is no
//! dedicated event type for them, so join/leave piggyback on
//! `profile.updated` (see [`crate::room::RoomRuntime`]'s meeting
//! handlers).

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::EndpointClass;
use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::rate_limit::RateLimiter;
use crate::room::registry::RoomRegistry;
use crate::room::{Intent, MeetingSummary};
use crate::session::SessionStore;

use super::{authorize, call_room, room_handle, validate_agent_id, validate_room_id, BearerToken, DEFAULT_DEADLINE};

fn rate_limited(limiter: &RateLimiter, agent_id: &str, class: EndpointClass) -> Result<(), AicError> {
    if limiter.check(agent_id, class) {
        Ok(())
    } else {
        Err(AicError::RateLimited { retry_after_secs: 1 })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListRequest {
    agent_id: String,
    room_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListResponse {
    meetings: Vec<MeetingSummary>,
}

#[rocket::post("/meeting/list", data = "<body>")]
pub async fn meeting_list(
    body: Json<MeetingListRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<MeetingListResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Observation)?;

    let handle = room_handle(registry, &body.room_id)?;
    let meetings = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::MeetingList { reply }).await?;

    Ok(AicOk::new(MeetingListResponse { meetings }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingJoinRequest {
    agent_id: String,
    room_id: String,
    meeting_room_id: String,
}

#[rocket::post("/meeting/join", data = "<body>")]
pub async fn meeting_join(
    body: Json<MeetingJoinRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::MeetingJoin {
        entity_id: body.agent_id.clone(),
        meeting_room_id: body.meeting_room_id.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(serde_json::json!({})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingLeaveRequest {
    agent_id: String,
    room_id: String,
}

#[rocket::post("/meeting/leave", data = "<body>")]
pub async fn meeting_leave(
    body: Json<MeetingLeaveRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::MeetingLeave {
        entity_id: body.agent_id.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(serde_json::json!({})))
}
