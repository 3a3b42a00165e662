use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use quickdraw_collab::{DatabaseError, RoomError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage unavailable")]
    StorageUnavailable(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::StorageUnavailable(reason) = &self {
            error!("Storage failure while handling request: {}", reason);
        }

        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::Unauthorized(reason) => Self::Unauthorized(reason),
            RoomError::Forbidden(reason) => Self::Forbidden(reason),
            RoomError::BadRequest(reason) => Self::BadRequest(reason),
            RoomError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            RoomError::Conflict(reason) => Self::Conflict(reason),
            RoomError::StorageUnavailable(e) => Self::StorageUnavailable(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        RoomError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_errors_map_to_status_codes() {
        let cases = [
            (RoomError::Unauthorized("x"), StatusCode::UNAUTHORIZED),
            (RoomError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (RoomError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                RoomError::NotFound {
                    resource: "room",
                    identifier: "id",
                },
                StatusCode::NOT_FOUND,
            ),
            (RoomError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                RoomError::StorageUnavailable(DatabaseError::Internal("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ServerError::from(error).into_response().status(), status);
        }
    }
}
