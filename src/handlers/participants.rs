use crate::error::AppError;
use crate::models::*;
use crate::services::{ParticipantService, RedemptionService};
use crate::utils::*;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/admin/participants",
    tag = "admin-participants",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("perPage" = Option<u32>, Query, description = "Items per page"),
        ("search" = Option<String>, Query, description = "Name/email/national id/reference substring"),
        ("dateFrom" = Option<String>, Query, description = "Inclusive lower bound, YYYY-MM-DD"),
        ("dateTo" = Option<String>, Query, description = "Inclusive upper bound, YYYY-MM-DD"),
        ("reference" = Option<String>, Query, description = "Exact reference code")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated participant list"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_participants(
    participant_service: web::Data<ParticipantService>,
    query: web::Query<ParticipantQuery>,
) -> Result<HttpResponse> {
    match participant_service.list(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/participants/{id}",
    tag = "admin-participants",
    params(("id" = String, Path, description = "Participant id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Participant detail", body = ParticipantResponse),
        (status = 404, description = "Participant not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_participant(
    participant_service: web::Data<ParticipantService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match participant_service.get_by_id(&path).await {
        Ok(participant) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": participant
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/participants",
    tag = "admin-participants",
    request_body = CreateParticipantRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Participant created with freshly allocated tickets"),
        (status = 400, description = "Validation failure or pool depleted"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_participant(
    redemption_service: web::Data<RedemptionService>,
    request: web::Json<CreateParticipantRequest>,
) -> Result<HttpResponse> {
    if request.name.trim().len() < 2 {
        return Ok(AppError::ValidationError("Invalid name".to_string()).error_response());
    }
    if !validate_email(&request.email) {
        return Ok(AppError::ValidationError("Invalid email".to_string()).error_response());
    }
    if !validate_phone(&request.phone) {
        return Ok(AppError::ValidationError("Invalid phone".to_string()).error_response());
    }
    if !validate_national_id(&request.national_id) {
        return Ok(AppError::ValidationError("Invalid national id".to_string()).error_response());
    }
    if let Some(code) = request.reference.as_deref()
        && !validate_reference_code(code)
    {
        return Ok(AppError::ValidationError("Invalid reference".to_string()).error_response());
    }

    match redemption_service.redeem_admin(&request).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ParticipantResponse::from(outcome.participant)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/participants/{id}/tickets",
    tag = "admin-participants",
    params(("id" = String, Path, description = "Participant id")),
    request_body = UpdateParticipantTicketsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket list replaced", body = ParticipantResponse),
        (status = 400, description = "Invalid numbers or numbers already taken"),
        (status = 404, description = "Participant not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_participant_tickets(
    participant_service: web::Data<ParticipantService>,
    path: web::Path<String>,
    request: web::Json<UpdateParticipantTicketsRequest>,
) -> Result<HttpResponse> {
    match participant_service
        .update_tickets(&path, request.into_inner().tickets)
        .await
    {
        Ok(participant) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": participant
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/participants/{id}",
    tag = "admin-participants",
    params(("id" = String, Path, description = "Participant id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Participant deleted, numbers released"),
        (status = 404, description = "Participant not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn delete_participant(
    participant_service: web::Data<ParticipantService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match participant_service.delete(&path).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn participant_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/participants")
            .route("", web::get().to(list_participants))
            .route("", web::post().to(create_participant))
            .route("/{id}", web::get().to(get_participant))
            .route("/{id}/tickets", web::put().to(update_participant_tickets))
            .route("/{id}", web::delete().to(delete_participant)),
    );
}
