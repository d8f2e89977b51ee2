use axum::http::StatusCode;
use axum::Json;
use library::{ErrorKind, LibraryError};

use crate::state::ErrorResponse;

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Config => StatusCode::PRECONDITION_FAILED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Io | ErrorKind::Parse | ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn library_error(err: LibraryError) -> (StatusCode, Json<ErrorResponse>) {
    json_error(status_for(err.kind()), err.to_string())
}
