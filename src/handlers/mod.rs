pub mod admin;
pub mod participants;
pub mod public;
pub mod references;
pub mod tickets;

pub use admin::admin_config;
pub use participants::participant_config;
pub use public::public_config;
pub use references::reference_config;
pub use tickets::ticket_config;
