pub mod participant_service;
pub mod redemption_service;
pub mod reference_service;
pub mod ticket_service;

pub use participant_service::ParticipantService;
pub use redemption_service::{RedemptionOutcome, RedemptionService};
pub use reference_service::ReferenceService;
pub use ticket_service::{MAX_DRAW_ATTEMPTS, TOTAL_TICKETS, TicketService};
