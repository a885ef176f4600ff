//! World endpoints: `observe`, `moveTo`, `interact`, `profile/update`.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::EndpointClass;
use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::grid::TileCoord;
use crate::idempotency::IdempotencyCache;
use crate::rate_limit::RateLimiter;
use crate::room::entity::EntityStatus;
use crate::room::registry::RoomRegistry;
use crate::room::{GridSummary, Intent, InteractOutcome, MoveOutcome};
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

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveRequest {
    agent_id: String,
    room_id: String,
    radius: f64,
    #[serde(default)]
    detail: crate::room::entity::ObserveDetail,
    #[serde(default)]
    include_self: Option<bool>,
    #[serde(default)]
    include_grid: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveResponse {
    entities: crate::room::entity::ObservedEntities,
    #[serde(skip_serializing_if = "Option::is_none")]
    grid: Option<GridSummary>,
}

#[rocket::post("/observe", data = "<body>")]
pub async fn observe(
    body: Json<ObserveRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<ObserveResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    if !(1.0..=2000.0).contains(&body.radius) {
        return Err(AicError::BadRequest("radius must be in [1, 2000]".to_string()));
    }
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Observation)?;

    let handle = room_handle(registry, &body.room_id)?;
    let outcome = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::Observe {
        entity_id: body.agent_id.clone(),
        radius: body.radius,
        detail: body.detail,
        include_self: body.include_self.unwrap_or(false),
        include_grid: body.include_grid.unwrap_or(false),
        reply,
    })
    .await?;

    Ok(AicOk::new(ObserveResponse {
        entities: outcome.entities,
        grid: outcome.grid,
    }))
}

#[derive(Deserialize, Serialize)]
pub struct Dest {
    tx: i32,
    ty: i32,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToRequest {
    agent_id: String,
    room_id: String,
    tx_id: String,
    dest: Dest,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToResponse {
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<MoveOutcome> for MoveToResponse {
    fn from(outcome: MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Accepted => Self {
                result: "accepted",
                reason: None,
            },
            MoveOutcome::NoOp => Self {
                result: "no_op",
                reason: None,
            },
            MoveOutcome::NoPath => Self {
                result: "no_path",
                reason: None,
            },
            MoveOutcome::Rejected { reason } => Self {
                result: "rejected",
                reason: Some(reason),
            },
        }
    }
}

#[rocket::post("/moveTo", data = "<body>")]
pub async fn move_to(
    body: Json<MoveToRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
    idempotency: &State<Arc<IdempotencyCache>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    validate_tx_id(&body.tx_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    let dest = TileCoord::new(body.dest.tx, body.dest.ty);
    let agent_id = body.agent_id.clone();

    idempotent::<MoveToResponse, _, _>(idempotency, &body.agent_id, &body.tx_id, &*body, || async move {
        let outcome = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::MoveTo {
            entity_id: agent_id,
            dest,
            reply,
        })
        .await?;
        Ok(MoveToResponse::from(outcome))
    })
    .await
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractRequest {
    agent_id: String,
    room_id: String,
    tx_id: String,
    target_id: String,
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractResponse {
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<serde_json::Value>,
}

impl From<InteractOutcome> for InteractResponse {
    fn from(outcome: InteractOutcome) -> Self {
        match outcome {
            InteractOutcome::Applied { patch } => Self {
                result: "applied",
                patch: Some(patch),
            },
            InteractOutcome::TooFar => Self {
                result: "too_far",
                patch: None,
            },
            InteractOutcome::NotFound => Self {
                result: "not_found",
                patch: None,
            },
            InteractOutcome::InvalidAction => Self {
                result: "invalid_action",
                patch: None,
            },
        }
    }
}

#[rocket::post("/interact", data = "<body>")]
pub async fn interact(
    body: Json<InteractRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
    idempotency: &State<Arc<IdempotencyCache>>,
) -> AicResult<serde_json::Value> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    validate_tx_id(&body.tx_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    let agent_id = body.agent_id.clone();
    let target_id = body.target_id.clone();
    let action = body.action.clone();

    idempotent::<InteractResponse, _, _>(idempotency, &body.agent_id, &body.tx_id, &*body, || async move {
        let outcome = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::Interact {
            entity_id: agent_id,
            target_id,
            action,
            reply,
        })
        .await?;
        Ok(InteractResponse::from(outcome))
    })
    .await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    agent_id: String,
    room_id: String,
    #[serde(default)]
    status: Option<EntityStatus>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    department: Option<String>,
}

#[rocket::post("/profile/update", data = "<body>")]
pub async fn profile_update(
    body: Json<ProfileUpdateRequest>,
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
    call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::ProfileUpdate {
        entity_id: body.agent_id.clone(),
        status: body.status,
        title: body.title.clone(),
        department: body.department.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(serde_json::json!({})))
}
