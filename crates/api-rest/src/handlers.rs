use crate::{error::ApiError, Actor, ApiJson, AppState};
use api_shared::dto::{
    AuditEntryRes, ClinicRes, CreateClinicReq, CreateSubmissionReq, CreateUserReq, HealthRes,
    ListSubmissionsQuery, NricValidateReq, NricValidateRes, RejectReq, SubmissionRes, SubmitReq,
    UpdateSubmissionReq, UserRes,
};
use api_shared::HealthService;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
};
use clinic_core::{Nric, ShardableUuid};

type ApiResult<T> = Result<T, ApiError>;

fn parse_id(raw: &str) -> ApiResult<ShardableUuid> {
    ShardableUuid::parse(raw).map_err(|e| ApiError::from(clinic_core::ClinicError::from(e)))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/nric/validate",
    request_body = NricValidateReq,
    responses(
        (status = 200, description = "Validation result", body = NricValidateRes)
    )
)]
/// Checks an NRIC/FIN checksum. Invalid input is a normal `valid: false` answer, not an error.
pub async fn validate_nric(ApiJson(req): ApiJson<NricValidateReq>) -> Json<NricValidateRes> {
    let res = match Nric::parse(&req.nric) {
        Ok(nric) => NricValidateRes {
            valid: true,
            nric: Some(nric.as_str().to_owned()),
        },
        Err(_) => NricValidateRes {
            valid: false,
            nric: None,
        },
    };
    Json(res)
}

#[utoipa::path(
    get,
    path = "/clinics",
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 200, description = "Clinics visible to the caller", body = [ClinicRes]),
        (status = 401, description = "Missing or unknown caller", body = ErrorRes)
    )
)]
pub async fn list_clinics(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<ClinicRes>>> {
    let clinics = state.users.list_clinics(&actor)?;
    Ok(Json(clinics.into_iter().map(ClinicRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/clinics",
    request_body = CreateClinicReq,
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 201, description = "Clinic created", body = ClinicRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Caller is not an admin", body = ErrorRes)
    )
)]
pub async fn create_clinic(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateClinicReq>,
) -> ApiResult<(StatusCode, Json<ClinicRes>)> {
    let clinic = state.users.create_clinic(&actor, req.into_domain()?)?;
    Ok((StatusCode::CREATED, Json(clinic.into())))
}

#[utoipa::path(
    get,
    path = "/users",
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 200, description = "All users", body = [UserRes]),
        (status = 403, description = "Caller is not an admin", body = ErrorRes)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> ApiResult<Json<Vec<UserRes>>> {
    let users = state.users.list_users(&actor, None)?;
    Ok(Json(users.into_iter().map(UserRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 201, description = "User created", body = UserRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Caller is not an admin", body = ErrorRes),
        (status = 409, description = "Email already registered", body = ErrorRes)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateUserReq>,
) -> ApiResult<(StatusCode, Json<UserRes>)> {
    let user = state.users.create_user(&actor, req.into_domain()?)?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/users/me",
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 200, description = "The calling user", body = UserRes),
        (status = 401, description = "Missing or unknown caller", body = ErrorRes)
    )
)]
pub async fn current_user(Actor(actor): Actor) -> Json<UserRes> {
    Json(actor.into())
}

#[utoipa::path(
    get,
    path = "/submissions",
    params(
        ("x-user-id" = String, Header, description = "Acting user id"),
        ListSubmissionsQuery
    ),
    responses(
        (status = 200, description = "Submissions, newest first", body = [SubmissionRes]),
        (status = 400, description = "Bad filter", body = ErrorRes)
    )
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<ListSubmissionsQuery>,
) -> ApiResult<Json<Vec<SubmissionRes>>> {
    let submissions = state.submissions.list(&actor, query.into_domain()?)?;
    Ok(Json(submissions.into_iter().map(SubmissionRes::from).collect()))
}

#[utoipa::path(
    post,
    path = "/submissions",
    request_body = CreateSubmissionReq,
    params(("x-user-id" = String, Header, description = "Acting user id")),
    responses(
        (status = 201, description = "Submission created", body = SubmissionRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 403, description = "Caller cannot create submissions", body = ErrorRes)
    )
)]
pub async fn create_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<CreateSubmissionReq>,
) -> ApiResult<(StatusCode, Json<SubmissionRes>)> {
    let (new, mode) = req.into_domain()?;
    let submission = state.submissions.create(&actor, new, mode)?;
    Ok((StatusCode::CREATED, Json(submission.into())))
}

#[utoipa::path(
    get,
    path = "/submissions/{id}",
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "The submission", body = SubmissionRes),
        (status = 403, description = "Submission belongs to another clinic", body = ErrorRes),
        (status = 404, description = "No such submission", body = ErrorRes)
    )
)]
pub async fn get_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<SubmissionRes>> {
    let submission = state.submissions.get(&actor, &parse_id(&id)?)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    put,
    path = "/submissions/{id}",
    request_body = UpdateSubmissionReq,
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "Draft updated", body = SubmissionRes),
        (status = 403, description = "Caller may not edit", body = ErrorRes),
        (status = 409, description = "Submission is not a draft", body = ErrorRes)
    )
)]
pub async fn update_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
    ApiJson(req): ApiJson<UpdateSubmissionReq>,
) -> ApiResult<Json<SubmissionRes>> {
    let id = parse_id(&id)?;
    let submission = state
        .submissions
        .update(&actor, &id, req.into_domain()?)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    post,
    path = "/submissions/{id}/submit",
    request_body = SubmitReq,
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "Draft submitted or routed", body = SubmissionRes),
        (status = 403, description = "Caller is not the creator", body = ErrorRes),
        (status = 409, description = "Submission is not a draft", body = ErrorRes)
    )
)]
pub async fn submit_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
    ApiJson(req): ApiJson<SubmitReq>,
) -> ApiResult<Json<SubmissionRes>> {
    let id = parse_id(&id)?;
    let submission = state
        .submissions
        .submit(&actor, &id, req.route_for_approval)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    post,
    path = "/submissions/{id}/approve",
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "Submission approved", body = SubmissionRes),
        (status = 403, description = "Caller is not a doctor of the clinic", body = ErrorRes),
        (status = 409, description = "Submission is not pending approval", body = ErrorRes)
    )
)]
pub async fn approve_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<SubmissionRes>> {
    let submission = state.submissions.approve(&actor, &parse_id(&id)?)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    post,
    path = "/submissions/{id}/reject",
    request_body = RejectReq,
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "Submission rejected", body = SubmissionRes),
        (status = 400, description = "Empty reason", body = ErrorRes),
        (status = 403, description = "Caller is not a doctor of the clinic", body = ErrorRes),
        (status = 409, description = "Submission is not pending approval", body = ErrorRes)
    )
)]
pub async fn reject_submission(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
    ApiJson(req): ApiJson<RejectReq>,
) -> ApiResult<Json<SubmissionRes>> {
    let id = parse_id(&id)?;
    let submission = state.submissions.reject(&actor, &id, &req.reason)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    get,
    path = "/submissions/{id}/audit",
    params(
        ("id" = String, Path, description = "Submission id"),
        ("x-user-id" = String, Header, description = "Acting user id")
    ),
    responses(
        (status = 200, description = "Audit trail, oldest first", body = [AuditEntryRes]),
        (status = 404, description = "No such submission", body = ErrorRes)
    )
)]
pub async fn submission_audit(
    State(state): State<AppState>,
    Actor(actor): Actor,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Vec<AuditEntryRes>>> {
    let trail = state.submissions.audit_trail(&actor, &parse_id(&id)?)?;
    Ok(Json(trail.into_iter().map(AuditEntryRes::from).collect()))
}
