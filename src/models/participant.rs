use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Row in `participants`. `tickets` is a JSON array of 4-digit strings; it and
/// the `tickets` table are two projections of the same allocation event, kept
/// consistent by the redemption transaction rather than by schema constraints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: String,
    pub reference_code: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub tickets: String,
    pub generated_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Participant {
    pub fn ticket_numbers(&self) -> Vec<String> {
        serde_json::from_str(&self.tickets).unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub id: String,
    pub reference_code: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub tickets: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        let tickets = p.ticket_numbers();
        Self {
            id: p.id,
            reference_code: p.reference_code,
            name: p.name,
            email: p.email,
            phone: p.phone,
            national_id: p.national_id,
            tickets,
            generated_at: p.generated_at.and_utc(),
            created_at: p.created_at.and_utc(),
            updated_at: p.updated_at.and_utc(),
        }
    }
}

/// Identity fields supplied by the buyer (public flow) or the backoffice.
/// Format validation happens at the edge, before these reach the services.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateParticipantRequest {
    /// Absent for "gifted" tickets: no reference is consumed.
    pub reference: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub ticket_count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateParticipantTicketsRequest {
    pub tickets: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    /// Inclusive, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub reference: Option<String>,
}
