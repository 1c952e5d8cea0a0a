use crate::error::AppError;
use crate::models::*;
use crate::services::{RedemptionService, ReferenceService, TicketService};
use crate::utils::*;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateReferenceRequest {
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTicketsRequest {
    pub reference: String,
    pub user_data: ParticipantFields,
    pub ticket_count: i64,
}

#[utoipa::path(
    post,
    path = "/api/validate-reference",
    tag = "public",
    request_body = ValidateReferenceRequest,
    responses(
        (status = 200, description = "Reference is valid and unused"),
        (status = 400, description = "Bad format or reference already used"),
        (status = 404, description = "Reference not found")
    )
)]
pub async fn validate_reference(
    reference_service: web::Data<ReferenceService>,
    request: web::Json<ValidateReferenceRequest>,
) -> Result<HttpResponse> {
    let code = request.reference.trim();

    if !validate_reference_code(code) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "valid": false,
            "reason": "BAD_FORMAT",
            "message": "Reference must be exactly 6 digits"
        })));
    }

    match reference_service.check_available(code).await {
        Ok(reference) => Ok(HttpResponse::Ok().json(json!({
            "valid": true,
            "reference": reference.code,
            "ticketCount": reference.ticket_count,
            "ticketValue": reference.ticket_value,
        }))),
        Err(AppError::NotFound(_)) => Ok(HttpResponse::NotFound().json(json!({
            "valid": false,
            "reason": "NOT_FOUND",
            "message": "Reference not found"
        }))),
        Err(AppError::AlreadyUsed) => Ok(HttpResponse::BadRequest().json(json!({
            "valid": false,
            "reason": "ALREADY_USED",
            "message": "This reference has already been used"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Participant field validation happens here, at the edge; the services only
/// see pre-validated data.
fn validate_user_data(user_data: &ParticipantFields) -> Result<(), AppError> {
    if user_data.name.trim().len() < 2 {
        return Err(AppError::ValidationError("Invalid name".to_string()));
    }
    if !validate_email(&user_data.email) {
        return Err(AppError::ValidationError("Invalid email".to_string()));
    }
    if !validate_phone(&user_data.phone) {
        return Err(AppError::ValidationError("Invalid phone".to_string()));
    }
    if !validate_national_id(&user_data.national_id) {
        return Err(AppError::ValidationError("Invalid national id".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/generate-tickets",
    tag = "public",
    request_body = GenerateTicketsRequest,
    responses(
        (status = 200, description = "Tickets generated and reference consumed"),
        (status = 400, description = "Validation failure, reference already used, or pool depleted"),
        (status = 404, description = "Reference not found")
    )
)]
pub async fn generate_tickets(
    redemption_service: web::Data<RedemptionService>,
    request: web::Json<GenerateTicketsRequest>,
) -> Result<HttpResponse> {
    let code = request.reference.trim().to_string();

    if !validate_reference_code(&code) {
        return Ok(AppError::ValidationError("Invalid reference".to_string()).error_response());
    }
    if let Err(e) = validate_user_data(&request.user_data) {
        return Ok(e.error_response());
    }
    if request.ticket_count < 1 {
        return Ok(
            AppError::ValidationError("Ticket count must be greater than 0".to_string())
                .error_response(),
        );
    }

    match redemption_service
        .redeem(&code, &request.user_data, request.ticket_count)
        .await
    {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "participantId": outcome.participant.id,
            "tickets": outcome.tickets,
            "message": "Tickets generated successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "public",
    responses(
        (status = 200, description = "Ticket pool statistics", body = TicketStats)
    )
)]
pub async fn stats(ticket_service: web::Data<TicketService>) -> Result<HttpResponse> {
    match ticket_service.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(stats)),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn public_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/validate-reference", web::post().to(validate_reference))
        .route("/generate-tickets", web::post().to(generate_tickets))
        .route("/stats", web::get().to(stats));
}
