use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::Utc;

#[derive(Clone)]
pub struct ReferenceService {
    pool: DbPool,
}

impl ReferenceService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Is this reference currently redeemable? Pure read, no side effects.
    /// Expects a format-validated code; only existence and state are checked
    /// here. The answer is advisory: the authoritative check is the guarded
    /// UPDATE inside the redemption transaction.
    pub async fn check_available(&self, code: &str) -> AppResult<Reference> {
        let reference = self.get_by_code(code).await?;

        if reference.used {
            return Err(AppError::AlreadyUsed);
        }

        Ok(reference)
    }

    pub async fn get_by_code(&self, code: &str) -> AppResult<Reference> {
        sqlx::query_as::<_, Reference>(
            r#"
            SELECT id, code, ticket_count, ticket_value, used, used_at, created_at, updated_at
            FROM raffle_references
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reference {code} not found")))
    }

    pub async fn list(
        &self,
        query: &ReferenceQuery,
    ) -> AppResult<PaginatedResponse<ReferenceResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset() as i64;
        let limit = params.get_limit() as i64;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM raffle_references
            WHERE (?1 IS NULL OR used = ?1)
              AND (?2 IS NULL OR code LIKE '%' || ?2 || '%')
            "#,
        )
        .bind(query.used)
        .bind(query.search.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let references = sqlx::query_as::<_, Reference>(
            r#"
            SELECT id, code, ticket_count, ticket_value, used, used_at, created_at, updated_at
            FROM raffle_references
            WHERE (?1 IS NULL OR used = ?1)
              AND (?2 IS NULL OR code LIKE '%' || ?2 || '%')
            ORDER BY created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(query.used)
        .bind(query.search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<ReferenceResponse> = references
            .into_iter()
            .map(ReferenceResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn create(&self, request: &CreateReferenceRequest) -> AppResult<ReferenceResponse> {
        validate_create(request)?;

        let ticket_value = request.ticket_value.unwrap_or(0.0);

        let result = sqlx::query(
            "INSERT INTO raffle_references (code, ticket_count, ticket_value) VALUES (?, ?, ?)",
        )
        .bind(&request.code)
        .bind(request.ticket_count)
        .bind(ticket_value)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.get_by_code(&request.code).await.map(ReferenceResponse::from),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::ValidationError(format!("Reference {} already exists", request.code)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Per-row best effort: invalid or duplicate rows are collected as error
    /// strings, valid ones are still created.
    pub async fn bulk_create(
        &self,
        requests: &[CreateReferenceRequest],
    ) -> AppResult<BulkCreateResult> {
        let mut created = 0;
        let mut errors = Vec::new();

        for request in requests {
            match self.create(request).await {
                Ok(_) => created += 1,
                Err(AppError::ValidationError(msg)) => errors.push(msg),
                Err(e) => return Err(e),
            }
        }

        Ok(BulkCreateResult { created, errors })
    }

    pub async fn update(
        &self,
        id: i64,
        request: &UpdateReferenceRequest,
    ) -> AppResult<ReferenceResponse> {
        if let Some(count) = request.ticket_count
            && count < 1
        {
            return Err(AppError::ValidationError(
                "Ticket count must be greater than 0".to_string(),
            ));
        }
        if let Some(value) = request.ticket_value
            && value < 0.0
        {
            return Err(AppError::ValidationError(
                "Ticket value must not be negative".to_string(),
            ));
        }

        let now = Utc::now().naive_utc();

        // Direct admin edit of the used flag keeps the used/used_at invariant:
        // marking used stamps used_at, clearing used clears it.
        let result = sqlx::query(
            r#"
            UPDATE raffle_references
            SET ticket_count = COALESCE(?1, ticket_count),
                ticket_value = COALESCE(?2, ticket_value),
                used = COALESCE(?3, used),
                used_at = CASE
                    WHEN ?3 IS NULL THEN used_at
                    WHEN ?3 = 1 THEN ?4
                    ELSE NULL
                END,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(request.ticket_count)
        .bind(request.ticket_value)
        .bind(request.used)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Reference {id} not found")));
        }

        let reference = sqlx::query_as::<_, Reference>(
            r#"
            SELECT id, code, ticket_count, ticket_value, used, used_at, created_at, updated_at
            FROM raffle_references
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ReferenceResponse::from(reference))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM raffle_references WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Reference {id} not found")));
        }

        Ok(())
    }
}

fn validate_create(request: &CreateReferenceRequest) -> AppResult<()> {
    if !crate::utils::validate_reference_code(&request.code) {
        return Err(AppError::ValidationError(format!(
            "Reference {} must be exactly 6 digits",
            if request.code.is_empty() {
                "(empty)"
            } else {
                request.code.as_str()
            }
        )));
    }
    if request.ticket_count < 1 {
        return Err(AppError::ValidationError(format!(
            "Reference {}: ticket count must be greater than 0",
            request.code
        )));
    }
    if let Some(value) = request.ticket_value
        && value < 0.0
    {
        return Err(AppError::ValidationError(format!(
            "Reference {}: ticket value must not be negative",
            request.code
        )));
    }
    Ok(())
}
