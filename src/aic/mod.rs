//! AIC HTTP Surface: JSON routes under `/aic/v0.1`, split by domain area
//! into one file per route group, each endpoint mapping 1:1 onto a Room
//! Runtime intent.

pub mod chat;
pub mod events;
pub mod meetings;
pub mod session;
pub mod skills;
pub mod system;
pub mod world;

use std::future::Future;
use std::time::Duration;

use rocket::request::{FromRequest, Outcome, Request};
use rocket::Route;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::error::{AicError, AicResult, Ok as AicOk};
use crate::idempotency::{IdempotencyCache, LookupResult};
use crate::ids;
use crate::room::registry::RoomRegistry;
use crate::room::{Intent, RoomHandle};
use crate::session::{Session, SessionStore};

/// Deadline every AIC handler carries absent a more specific one:
/// `pollEvents` uses its own `waitMs` and `heartbeat` uses
/// [`HEARTBEAT_DEADLINE`].
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const HEARTBEAT_DEADLINE: Duration = Duration::from_secs(5);
pub const POLL_EVENTS_MAX_WAIT_MS: u64 = 25_000;

pub fn routes() -> Vec<Route> {
    rocket::routes![
        session::register,
        session::unregister,
        session::reconnect,
        session::heartbeat,
        world::observe,
        world::move_to,
        world::interact,
        chat::chat_send,
        chat::chat_observe,
        events::poll_events,
        world::profile_update,
        skills::skill_list,
        skills::skill_install,
        skills::skill_invoke,
        skills::skill_cancel,
        meetings::meeting_list,
        meetings::meeting_join,
        meetings::meeting_leave,
        system::list_channels,
        system::health,
        system::metrics,
    ]
}

/// Raw bearer token from `Authorization: Bearer <token>`, if present.
/// Never rejects by itself — individual handlers decide whether the
/// endpoint requires one (`register`, `reconnect`, and `GET /channels`
/// are exempt).
pub struct BearerToken(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string());
        Outcome::Success(BearerToken(token))
    }
}

/// Validates the bearer token against the stored `(agentId, roomId)`
/// session. Every AIC call except `register`, `reconnect`, and
/// `GET /channels` goes through this before the request reaches a
/// Room Runtime.
pub fn authorize(
    sessions: &SessionStore,
    token: &BearerToken,
    agent_id: &str,
    room_id: &str,
) -> Result<Session, AicError> {
    let tok = token.0.as_deref().ok_or(AicError::Unauthorized)?;
    let session = sessions.authenticate(agent_id, tok).ok_or(AicError::Unauthorized)?;
    if session.room_id != room_id {
        return Err(AicError::Unauthorized);
    }
    Ok(session)
}

pub fn validate_room_id(room_id: &str) -> Result<(), AicError> {
    if ids::is_valid_room_id(room_id) {
        Ok(())
    } else {
        Err(AicError::BadRequest(format!("invalid roomId: {room_id}")))
    }
}

pub fn validate_agent_id(agent_id: &str) -> Result<(), AicError> {
    if ids::is_valid_agent_id(agent_id) {
        Ok(())
    } else {
        Err(AicError::BadRequest(format!("invalid agentId: {agent_id}")))
    }
}

pub fn validate_tx_id(tx_id: &str) -> Result<(), AicError> {
    if ids::is_valid_tx_id(tx_id) {
        Ok(())
    } else {
        Err(AicError::BadRequest(format!("invalid txId: {tx_id}")))
    }
}

pub fn room_handle(registry: &RoomRegistry, room_id: &str) -> Result<std::sync::Arc<RoomHandle>, AicError> {
    registry.get(room_id).ok_or(AicError::RoomNotReady)
}

/// Sends an intent to a room and awaits its reply under `deadline`: a
/// full intake queue fails fast with `room_not_ready`; a room that never
/// replies in time surfaces `timeout`.
pub async fn call_room<T>(
    handle: &RoomHandle,
    deadline: Duration,
    build: impl FnOnce(oneshot::Sender<T>) -> Intent,
) -> Result<T, AicError> {
    let (tx, rx) = oneshot::channel();
    handle
        .send(build(tx))
        .await
        .map_err(|_| AicError::RoomNotReady)?;
    timeout(deadline, rx)
        .await
        .map_err(|_| AicError::Timeout)?
        .map_err(|_| AicError::Internal("room reply channel closed".to_string()))
}

/// Idempotency wrapper: looks up `(agentId, txId)` against a digest of
/// the request body; on a fresh key, runs `handler` and stores its
/// JSON-encoded result for replay.
pub async fn idempotent<T, F, Fut>(
    cache: &IdempotencyCache,
    agent_id: &str,
    tx_id: &str,
    body: &impl serde::Serialize,
    handler: F,
) -> AicResult<serde_json::Value>
where
    T: serde::Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AicError>>,
{
    let digest_source = serde_json::to_vec(body).unwrap_or_default();
    let digest = IdempotencyCache::digest(&digest_source);

    match cache.lookup(agent_id, tx_id, &digest) {
        LookupResult::Replay(value) => Ok(AicOk::new(value)),
        LookupResult::Conflict => Err(AicError::Conflict),
        LookupResult::Fresh => {
            let result = handler().await?;
            let value = serde_json::to_value(&result).map_err(|e| AicError::Internal(e.to_string()))?;
            cache.store(agent_id, tx_id, &digest, value.clone());
            Ok(AicOk::new(value))
        }
    }
}
