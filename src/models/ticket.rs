use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Row in `tickets`. A row exists only for numbers allocated at least once;
/// the core never clears `used`, only admin edits and the full reset do.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i64,
    pub number: String,
    pub used: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub id: i64,
    pub number: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Ticket> for TicketResponse {
    fn from(t: Ticket) -> Self {
        Self {
            id: t.id,
            number: t.number,
            used: t.used,
            created_at: t.created_at.and_utc(),
            updated_at: t.updated_at.and_utc(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: i64,
    pub used: i64,
    pub available: i64,
    pub percentage_used: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub used: Option<bool>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_query_takes_camel_case_keys() {
        let query: TicketQuery = serde_json::from_value(serde_json::json!({
            "perPage": 10,
            "used": true,
            "search": "00"
        }))
        .unwrap();
        assert_eq!(query.page, None);
        assert_eq!(query.per_page, Some(10));
        assert_eq!(query.used, Some(true));
        assert_eq!(query.search.as_deref(), Some("00"));
    }
}
