use crate::models::*;
use crate::services::ReferenceService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/admin/references",
    tag = "admin-references",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("perPage" = Option<u32>, Query, description = "Items per page"),
        ("used" = Option<bool>, Query, description = "Filter by used state"),
        ("search" = Option<String>, Query, description = "Code substring")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated reference list"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_references(
    reference_service: web::Data<ReferenceService>,
    query: web::Query<ReferenceQuery>,
) -> Result<HttpResponse> {
    match reference_service.list(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/references",
    tag = "admin-references",
    request_body = CreateReferenceRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reference created", body = ReferenceResponse),
        (status = 400, description = "Invalid or duplicate code"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_reference(
    reference_service: web::Data<ReferenceService>,
    request: web::Json<CreateReferenceRequest>,
) -> Result<HttpResponse> {
    match reference_service.create(&request).await {
        Ok(reference) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": reference
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/references/bulk",
    tag = "admin-references",
    request_body = BulkCreateReferencesRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-row creation outcome", body = BulkCreateResult),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn bulk_create_references(
    reference_service: web::Data<ReferenceService>,
    request: web::Json<BulkCreateReferencesRequest>,
) -> Result<HttpResponse> {
    if request.references.is_empty() {
        return Ok(crate::error::AppError::ValidationError(
            "An array of references is required".to_string(),
        )
        .error_response());
    }

    match reference_service.bulk_create(&request.references).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/references/{id}",
    tag = "admin-references",
    params(("id" = i64, Path, description = "Reference id")),
    request_body = UpdateReferenceRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reference updated", body = ReferenceResponse),
        (status = 404, description = "Reference not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_reference(
    reference_service: web::Data<ReferenceService>,
    path: web::Path<i64>,
    request: web::Json<UpdateReferenceRequest>,
) -> Result<HttpResponse> {
    match reference_service.update(path.into_inner(), &request).await {
        Ok(reference) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": reference
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/references/{id}",
    tag = "admin-references",
    params(("id" = i64, Path, description = "Reference id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reference deleted"),
        (status = 404, description = "Reference not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn delete_reference(
    reference_service: web::Data<ReferenceService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match reference_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn reference_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/references")
            .route("", web::get().to(list_references))
            .route("", web::post().to(create_reference))
            .route("/bulk", web::post().to(bulk_create_references))
            .route("/{id}", web::put().to(update_reference))
            .route("/{id}", web::delete().to(delete_reference)),
    );
}
