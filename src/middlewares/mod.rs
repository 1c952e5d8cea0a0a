pub mod auth;
pub mod cors;

pub use auth::AdminAuth;
pub use cors::create_cors;
