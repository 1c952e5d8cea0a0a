use crate::error::AppError;
use crate::models::*;
use crate::services::TicketService;
use crate::utils::validate_ticket_number;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/admin/tickets",
    tag = "admin-tickets",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("perPage" = Option<u32>, Query, description = "Items per page"),
        ("used" = Option<bool>, Query, description = "Filter by used state"),
        ("search" = Option<String>, Query, description = "Number substring")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated ticket list"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_tickets(
    ticket_service: web::Data<TicketService>,
    query: web::Query<TicketQuery>,
) -> Result<HttpResponse> {
    match ticket_service.list(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/tickets/stats",
    tag = "admin-tickets",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket pool statistics", body = TicketStats),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn ticket_stats(ticket_service: web::Data<TicketService>) -> Result<HttpResponse> {
    match ticket_service.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/tickets/{number}",
    tag = "admin-tickets",
    params(("number" = String, Path, description = "4-digit ticket number")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ticket detail", body = TicketResponse),
        (status = 400, description = "Malformed number"),
        (status = 404, description = "Ticket not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_ticket(
    ticket_service: web::Data<TicketService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let number = path.into_inner();

    if !validate_ticket_number(&number) {
        return Ok(
            AppError::ValidationError("Ticket number must be exactly 4 digits".to_string())
                .error_response(),
        );
    }

    match ticket_service.get_by_number(&number).await {
        Ok(ticket) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ticket
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn ticket_config(cfg: &mut web::ServiceConfig) {
    // /stats before /{number} so it is not captured as a path parameter.
    cfg.service(
        web::scope("/tickets")
            .route("", web::get().to(list_tickets))
            .route("/stats", web::get().to(ticket_stats))
            .route("/{number}", web::get().to(get_ticket)),
    );
}
