use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Row in `raffle_references`. `used` flips false -> true exactly once, inside
/// the redemption transaction or by an explicit admin edit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reference {
    pub id: i64,
    pub code: String,
    pub ticket_count: i64,
    pub ticket_value: f64,
    pub used: bool,
    pub used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceResponse {
    pub id: i64,
    pub code: String,
    pub ticket_count: i64,
    pub ticket_value: f64,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Reference> for ReferenceResponse {
    fn from(r: Reference) -> Self {
        Self {
            id: r.id,
            code: r.code,
            ticket_count: r.ticket_count,
            ticket_value: r.ticket_value,
            used: r.used,
            used_at: r.used_at.map(|dt| dt.and_utc()),
            created_at: r.created_at.and_utc(),
            updated_at: r.updated_at.and_utc(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferenceRequest {
    pub code: String,
    pub ticket_count: i64,
    pub ticket_value: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReferenceRequest {
    pub ticket_count: Option<i64>,
    pub ticket_value: Option<f64>,
    pub used: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkCreateReferencesRequest {
    pub references: Vec<CreateReferenceRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkCreateResult {
    pub created: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub used: Option<bool>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_query_takes_camel_case_keys() {
        let query: ReferenceQuery = serde_json::from_value(serde_json::json!({
            "page": 2,
            "perPage": 50,
            "used": false
        }))
        .unwrap();
        assert_eq!(query.page, Some(2));
        assert_eq!(query.per_page, Some(50));
        assert_eq!(query.used, Some(false));
        assert_eq!(query.search, None);
    }
}
