use api_shared::dto::ErrorRes;
use api_shared::AuthError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::{ClinicError, ErrorKind};

/// A failed request: status code plus the JSON body sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        match err.kind() {
            ErrorKind::InvalidArgument => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_argument", err.to_string())
            }
            ErrorKind::Forbidden => Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
            ErrorKind::InvalidState => {
                Self::new(StatusCode::CONFLICT, "invalid_state", err.to_string())
            }
            ErrorKind::Conflict => Self::new(StatusCode::CONFLICT, "conflict", err.to_string()),
            ErrorKind::Internal => {
                tracing::error!("Internal error: {:?}", err);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error",
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            rejection.body_text(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorRes {
            error: self.error.to_owned(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status_codes() {
        let cases = [
            (ClinicError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (ClinicError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ClinicError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ClinicError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ClinicError::NotFound {
                    kind: "submission",
                    id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (ClinicError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::from(AuthError::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(ClinicError::LockPoisoned);
        assert_eq!(err.message, "Internal error");
    }
}
