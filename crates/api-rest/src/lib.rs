//! # API REST
//!
//! REST API implementation for the clinic submissions service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Uses `api-shared` for wire types and `clinic-core` for everything else.

#![warn(rust_2018_idioms)]

mod error;
mod handlers;

pub use error::ApiError;

use api_shared::{dto, parse_actor_id, AuthError, ACTOR_HEADER};
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    routing::{get, post},
    Router,
};
use clinic_core::{ClinicError, ClinicStore, CoreConfig, SubmissionService, User, UserService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub submissions: Arc<SubmissionService<dyn ClinicStore>>,
    pub users: Arc<UserService<dyn ClinicStore>>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn ClinicStore>) -> Self {
        Self {
            submissions: Arc::new(SubmissionService::new(cfg, store.clone())),
            users: Arc::new(UserService::new(store)),
        }
    }
}

/// JSON request body whose rejections use the [`ApiError`] body shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// The user named by the request's actor header.
pub struct Actor(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .map(|v| v.to_str().map_err(|_| AuthError::Malformed("non-ASCII value".into())))
            .transpose()?;
        let id = parse_actor_id(raw)?;

        match state.users.resolve_actor(&id) {
            Ok(user) => Ok(Actor(user)),
            Err(ClinicError::NotFound { .. }) => Err(AuthError::UnknownUser(id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::validate_nric,
        handlers::list_clinics,
        handlers::create_clinic,
        handlers::list_users,
        handlers::create_user,
        handlers::current_user,
        handlers::list_submissions,
        handlers::create_submission,
        handlers::get_submission,
        handlers::update_submission,
        handlers::submit_submission,
        handlers::approve_submission,
        handlers::reject_submission,
        handlers::submission_audit,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ErrorRes,
        dto::NricValidateReq,
        dto::NricValidateRes,
        dto::CreateClinicReq,
        dto::ClinicRes,
        dto::CreateUserReq,
        dto::UserRes,
        dto::CreateSubmissionReq,
        dto::UpdateSubmissionReq,
        dto::SubmitReq,
        dto::RejectReq,
        dto::SubmissionRes,
        dto::AuditEntryRes,
    ))
)]
pub struct ApiDoc;

/// Builds the application router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/nric/validate", post(handlers::validate_nric))
        .route(
            "/clinics",
            get(handlers::list_clinics).post(handlers::create_clinic),
        )
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/users/me", get(handlers::current_user))
        .route(
            "/submissions",
            get(handlers::list_submissions).post(handlers::create_submission),
        )
        .route(
            "/submissions/:id",
            get(handlers::get_submission).put(handlers::update_submission),
        )
        .route("/submissions/:id/submit", post(handlers::submit_submission))
        .route("/submissions/:id/approve", post(handlers::approve_submission))
        .route("/submissions/:id/reject", post(handlers::reject_submission))
        .route("/submissions/:id/audit", get(handlers::submission_audit))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
