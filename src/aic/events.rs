//! Event Log endpoint: `pollEvents`, long-polling against the room's
//! Event Log.

use std::sync::Arc;
use std::time::Duration;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::EndpointClass;
use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::event_log::Envelope;
use crate::rate_limit::RateLimiter;
use crate::room::registry::RoomRegistry;
use crate::room::Intent;
use crate::session::SessionStore;

use super::{authorize, call_room, room_handle, validate_agent_id, validate_room_id, BearerToken, POLL_EVENTS_MAX_WAIT_MS};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollEventsRequest {
    agent_id: String,
    room_id: String,
    #[serde(default)]
    since_cursor: Option<String>,
    limit: usize,
    wait_ms: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollEventsResponse {
    events: Vec<Envelope>,
    next_cursor: String,
    cursor_expired: bool,
}

#[rocket::post("/pollEvents", data = "<body>")]
pub async fn poll_events(
    body: Json<PollEventsRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<PollEventsResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    if !(1..=200).contains(&body.limit) {
        return Err(AicError::BadRequest("limit must be in [1, 200]".to_string()));
    }
    if body.wait_ms > POLL_EVENTS_MAX_WAIT_MS {
        return Err(AicError::BadRequest(format!(
            "waitMs must be in [0, {POLL_EVENTS_MAX_WAIT_MS}]"
        )));
    }
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    if !limiter.check(&body.agent_id, EndpointClass::Events) {
        return Err(AicError::RateLimited { retry_after_secs: 1 });
    }

    let handle = room_handle(registry, &body.room_id)?;
    // The room itself parks the reply until an event arrives or waitMs
    // elapses, so the handler's own deadline just needs enough slack on
    // top of that for the round trip.
    let deadline = Duration::from_millis(body.wait_ms) + Duration::from_secs(5);
    let outcome = call_room(&handle, deadline, |reply| Intent::PollEvents {
        since_cursor: body.since_cursor.clone(),
        limit: body.limit,
        wait_ms: body.wait_ms,
        reply,
    })
    .await?;

    Ok(AicOk::new(PollEventsResponse {
        events: outcome.events,
        next_cursor: outcome.next_cursor,
        cursor_expired: outcome.cursor_expired,
    }))
}
