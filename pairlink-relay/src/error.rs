use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pairlink_core::{SdpType, SessionIdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid session id: {0}")]
    InvalidSession(#[from] SessionIdError),

    #[error("{0}")]
    InvalidKind(String),

    #[error("body holds an {actual} but the key is {expected}")]
    KindMismatch { expected: SdpType, actual: SdpType },

    #[error("no signal stored")]
    NotFound,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}
