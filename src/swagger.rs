use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::public::validate_reference,
        handlers::public::generate_tickets,
        handlers::public::stats,
        handlers::references::list_references,
        handlers::references::create_reference,
        handlers::references::bulk_create_references,
        handlers::references::update_reference,
        handlers::references::delete_reference,
        handlers::participants::list_participants,
        handlers::participants::get_participant,
        handlers::participants::create_participant,
        handlers::participants::update_participant_tickets,
        handlers::participants::delete_participant,
        handlers::tickets::list_tickets,
        handlers::tickets::ticket_stats,
        handlers::tickets::get_ticket,
        handlers::admin::reset_raffle,
    ),
    components(
        schemas(
            handlers::public::ValidateReferenceRequest,
            handlers::public::GenerateTicketsRequest,
            ReferenceResponse,
            CreateReferenceRequest,
            UpdateReferenceRequest,
            BulkCreateReferencesRequest,
            BulkCreateResult,
            ParticipantResponse,
            ParticipantFields,
            CreateParticipantRequest,
            UpdateParticipantTicketsRequest,
            TicketResponse,
            TicketStats,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "public", description = "Reference validation and ticket redemption"),
        (name = "admin-references", description = "Backoffice reference management"),
        (name = "admin-participants", description = "Backoffice participant management"),
        (name = "admin-tickets", description = "Backoffice ticket pool inspection"),
        (name = "admin", description = "Backoffice maintenance operations")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
