use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body carried inside the `{"success": false, "error": {...}}`
/// envelope every failing endpoint returns.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
