use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::{NaiveDateTime, Utc};
use std::collections::HashSet;

#[derive(Clone)]
pub struct ParticipantService {
    pool: DbPool,
}

impl ParticipantService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        query: &ParticipantQuery,
    ) -> AppResult<PaginatedResponse<ParticipantResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset() as i64;
        let limit = params.get_limit() as i64;

        let date_from = parse_day_start(query.date_from.as_deref())?;
        let date_to = parse_day_end(query.date_to.as_deref())?;
        let search = query.search.as_deref();
        let reference = query.reference.as_deref();

        let filter = r#"
            WHERE (?1 IS NULL
                   OR name LIKE '%' || ?1 || '%'
                   OR email LIKE '%' || ?1 || '%'
                   OR national_id LIKE '%' || ?1 || '%'
                   OR reference_code LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at <= ?3)
              AND (?4 IS NULL OR reference_code = ?4)
        "#;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM participants {filter}"))
                .bind(search)
                .bind(date_from)
                .bind(date_to)
                .bind(reference)
                .fetch_one(&self.pool)
                .await?;

        let participants = sqlx::query_as::<_, Participant>(&format!(
            r#"
            SELECT id, reference_code, name, email, phone, national_id, tickets,
                   generated_at, created_at, updated_at
            FROM participants
            {filter}
            ORDER BY created_at DESC, id DESC
            LIMIT ?5 OFFSET ?6
            "#
        ))
        .bind(search)
        .bind(date_from)
        .bind(date_to)
        .bind(reference)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<ParticipantResponse> = participants
            .into_iter()
            .map(ParticipantResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<ParticipantResponse> {
        self.fetch(id).await.map(ParticipantResponse::from)
    }

    /// Replace the participant's ticket list. Newly added numbers must still
    /// be claimable (fail closed if any is taken by someone else); removed
    /// numbers are released back to the pool.
    pub async fn update_tickets(
        &self,
        id: &str,
        new_tickets: Vec<String>,
    ) -> AppResult<ParticipantResponse> {
        for number in &new_tickets {
            if !crate::utils::validate_ticket_number(number) {
                return Err(AppError::ValidationError(format!(
                    "Ticket number {number} must be exactly 4 digits"
                )));
            }
        }
        let new_set: HashSet<&String> = new_tickets.iter().collect();
        if new_set.len() != new_tickets.len() {
            return Err(AppError::ValidationError(
                "Ticket list contains duplicate numbers".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let participant = sqlx::query_as::<_, Participant>(
            r#"
            SELECT id, reference_code, name, email, phone, national_id, tickets,
                   generated_at, created_at, updated_at
            FROM participants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Participant {id} not found")))?;

        let old_tickets = participant.ticket_numbers();
        let old_set: HashSet<&String> = old_tickets.iter().collect();

        let added: Vec<&String> = new_tickets.iter().filter(|n| !old_set.contains(n)).collect();
        let removed: Vec<&String> = old_tickets.iter().filter(|n| !new_set.contains(n)).collect();

        // Same claim discipline as the redemption commit.
        let mut claimed: u64 = 0;
        for number in &added {
            claimed += sqlx::query(
                r#"
                INSERT INTO tickets (number, used) VALUES (?, 1)
                ON CONFLICT(number) DO UPDATE
                    SET used = 1, updated_at = CURRENT_TIMESTAMP
                    WHERE used = 0
                "#,
            )
            .bind(number)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        if claimed < added.len() as u64 {
            return Err(AppError::ValidationError(
                "One or more ticket numbers are already taken".to_string(),
            ));
        }

        for number in &removed {
            sqlx::query("UPDATE tickets SET used = 0, updated_at = CURRENT_TIMESTAMP WHERE number = ?")
                .bind(number)
                .execute(&mut *tx)
                .await?;
        }

        let tickets_json = serde_json::to_string(&new_tickets)?;
        sqlx::query("UPDATE participants SET tickets = ?, updated_at = ? WHERE id = ?")
            .bind(&tickets_json)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.fetch(id).await.map(ParticipantResponse::from)
    }

    /// Deleting a participant releases its numbers back to the pool. The
    /// reference (if any) stays used; only the full reset unmarks references.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let participant = sqlx::query_as::<_, Participant>(
            r#"
            SELECT id, reference_code, name, email, phone, national_id, tickets,
                   generated_at, created_at, updated_at
            FROM participants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Participant {id} not found")))?;

        for number in participant.ticket_numbers() {
            sqlx::query("UPDATE tickets SET used = 0, updated_at = CURRENT_TIMESTAMP WHERE number = ?")
                .bind(&number)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> AppResult<Participant> {
        sqlx::query_as::<_, Participant>(
            r#"
            SELECT id, reference_code, name, email, phone, national_id, tickets,
                   generated_at, created_at, updated_at
            FROM participants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Participant {id} not found")))
    }
}

fn parse_day_start(value: Option<&str>) -> AppResult<Option<NaiveDateTime>> {
    value
        .map(|v| {
            chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
                .map_err(|_| AppError::ValidationError(format!("Invalid date: {v}")))
        })
        .transpose()
}

fn parse_day_end(value: Option<&str>) -> AppResult<Option<NaiveDateTime>> {
    value
        .map(|v| {
            chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(23, 59, 59).unwrap())
                .map_err(|_| AppError::ValidationError(format!("Invalid date: {v}")))
        })
        .transpose()
}
