use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use thiserror::Error;

/// The closed error-kind set for the AIC wire envelope. `retryable` is
/// asserted only for `RoomNotReady`, `RateLimited`, `Timeout`, and
/// `Internal`.
#[derive(Debug, Error, Clone)]
pub enum AicError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("room not ready")]
    RoomNotReady,
    #[error("agent not in room")]
    AgentNotInRoom,
    #[error("invalid destination")]
    InvalidDestination,
    #[error("collision blocked")]
    CollisionBlocked,
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
    #[error("conflict")]
    Conflict,
    #[error("timeout")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AicError {
    pub fn code(&self) -> &'static str {
        match self {
            AicError::BadRequest(_) => "bad_request",
            AicError::Unauthorized => "unauthorized",
            AicError::Forbidden => "forbidden",
            AicError::NotFound(_) => "not_found",
            AicError::RoomNotReady => "room_not_ready",
            AicError::AgentNotInRoom => "agent_not_in_room",
            AicError::InvalidDestination => "invalid_destination",
            AicError::CollisionBlocked => "collision_blocked",
            AicError::RateLimited { .. } => "rate_limited",
            AicError::Conflict => "conflict",
            AicError::Timeout => "timeout",
            AicError::Internal(_) => "internal",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            AicError::RoomNotReady
                | AicError::RateLimited { .. }
                | AicError::Timeout
                | AicError::Internal(_)
        )
    }

    pub fn status(&self) -> Status {
        match self {
            AicError::BadRequest(_) => Status::BadRequest,
            AicError::Unauthorized => Status::Unauthorized,
            AicError::Forbidden => Status::Forbidden,
            AicError::NotFound(_) => Status::NotFound,
            AicError::RoomNotReady => Status::ServiceUnavailable,
            AicError::AgentNotInRoom => Status::BadRequest,
            AicError::InvalidDestination => Status::BadRequest,
            AicError::CollisionBlocked => Status::BadRequest,
            AicError::RateLimited { .. } => Status::TooManyRequests,
            AicError::Conflict => Status::Conflict,
            AicError::Timeout => Status::RequestTimeout,
            AicError::Internal(_) => Status::InternalServerError,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AicError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs }))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: &'static str,
    error: ErrorBody,
}

impl<'r> Responder<'r, 'static> for AicError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let envelope = ErrorEnvelope {
            status: "error",
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                retryable: self.retryable(),
                details: self.details(),
            },
        };
        let status = self.status();
        tracing::warn!(code = envelope.error.code, status = status.code, "aic error");
        let mut response = Json(envelope).respond_to(req)?;
        response.set_status(status);
        Ok(response)
    }
}

/// Successful-response envelope: `{"status":"ok","data":...}`.
#[derive(Serialize)]
pub struct Ok<T: Serialize> {
    status: &'static str,
    data: T,
}

impl<T: Serialize> Ok<T> {
    pub fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

impl<'r, T: Serialize> Responder<'r, 'static> for Ok<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        Json(self).respond_to(req)
    }
}

pub type AicResult<T> = Result<Ok<T>, AicError>;
