use crate::services::RedemptionService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/api/admin/reset",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All participants and tickets cleared, references unmarked"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn reset_raffle(
    redemption_service: web::Data<RedemptionService>,
) -> Result<HttpResponse> {
    match redemption_service.reset_all().await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Raffle reset: all data cleared and references unmarked"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/reset", web::post().to(reset_raffle));
}
