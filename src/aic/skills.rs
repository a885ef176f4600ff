//! Skill endpoints: `skill/list`, `skill/install`, `skill/invoke`.

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::EndpointClass;
use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::idempotency::IdempotencyCache;
use crate::rate_limit::RateLimiter;
use crate::room::registry::RoomRegistry;
use crate::room::Intent;
use crate::session::SessionStore;
use crate::skill::{InvokeRejection, SkillDefinition};

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
pub struct SkillListRequest {
    agent_id: String,
    room_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillListResponse {
    skills: Vec<SkillDefinition>,
}

#[rocket::post("/skill/list", data = "<body>")]
pub async fn skill_list(
    body: Json<SkillListRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<SkillListResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Observation)?;

    let handle = room_handle(registry, &body.room_id)?;
    let skills = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::SkillList { reply }).await?;

    Ok(AicOk::new(SkillListResponse { skills }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInstallRequest {
    agent_id: String,
    room_id: String,
    skill_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInstallResponse {
    already_installed: bool,
}

#[rocket::post("/skill/install", data = "<body>")]
pub async fn skill_install(
    body: Json<SkillInstallRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<SkillInstallResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    let already_installed = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::SkillInstall {
        entity_id: body.agent_id.clone(),
        skill_id: body.skill_id.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(SkillInstallResponse { already_installed }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCancelRequest {
    agent_id: String,
    room_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCancelResponse {
    cancelled: bool,
}

/// Cancels the caller's own pending cast, if any. Not part of the
/// original closed endpoint list, but cancellation is an
/// entity-triggered capability of the skill engine, so it's reachable
/// the same way `skill/invoke` is.
#[rocket::post("/skill/cancel", data = "<body>")]
pub async fn skill_cancel(
    body: Json<SkillCancelRequest>,
    token: BearerToken,
    registry: &State<Arc<RoomRegistry>>,
    sessions: &State<Arc<SessionStore>>,
    limiter: &State<Arc<RateLimiter>>,
) -> AicResult<SkillCancelResponse> {
    validate_agent_id(&body.agent_id)?;
    validate_room_id(&body.room_id)?;
    authorize(sessions, &token, &body.agent_id, &body.room_id)?;
    rate_limited(limiter, &body.agent_id, EndpointClass::Action)?;

    let handle = room_handle(registry, &body.room_id)?;
    let cancelled = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::SkillCancel {
        entity_id: body.agent_id.clone(),
        reply,
    })
    .await?;

    Ok(AicOk::new(SkillCancelResponse { cancelled }))
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInvokeRequest {
    agent_id: String,
    room_id: String,
    tx_id: String,
    skill_id: String,
    action_id: String,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInvokeResponse {
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

fn rejection_reason(rejection: &InvokeRejection) -> &'static str {
    match rejection {
        InvokeRejection::ActionNotInstalled => "action_not_installed",
        InvokeRejection::OnCooldown => "on_cooldown",
        InvokeRejection::OutOfRange => "out_of_range",
        InvokeRejection::AlreadyCasting => "already_casting",
    }
}

#[rocket::post("/skill/invoke", data = "<body>")]
pub async fn skill_invoke(
    body: Json<SkillInvokeRequest>,
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
    let skill_id = body.skill_id.clone();
    let action_id = body.action_id.clone();
    let target_id = body.target_id.clone().unwrap_or_else(|| agent_id.clone());
    let tx_id = body.tx_id.clone();

    idempotent::<SkillInvokeResponse, _, _>(idempotency, &body.agent_id, &body.tx_id, &*body, || async move {
        let outcome = call_room(&handle, DEFAULT_DEADLINE, |reply| Intent::SkillInvoke {
            entity_id: agent_id,
            skill_id,
            action_id,
            target_id,
            tx_id,
            reply,
        })
        .await?;
        Ok(match outcome {
            Ok(pending) => SkillInvokeResponse {
                result: "pending",
                completion_time_ms: Some(pending.completion_time_ms),
                reason: None,
            },
            Err(rejection) => SkillInvokeResponse {
                result: "rejected",
                completion_time_ms: None,
                reason: Some(rejection_reason(&rejection)),
            },
        })
    })
    .await
}
