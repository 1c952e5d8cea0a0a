use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{ReferenceService, TicketService};
use chrono::Utc;
use std::collections::HashSet;
use uuid::Uuid;

/// How many times a redemption re-proposes a batch after a commit-time number
/// collision with a concurrent redemption. Allocator-level depletion is never
/// retried: a near-full pool would just fail again.
const MAX_COMMIT_RETRIES: u32 = 3;

/// Orchestrates the one atomic unit of the system: flip the reference to used
/// (first committer wins), create the participant, claim the ticket numbers.
/// All-or-nothing; every shared resource is guarded by storage-level
/// constraints rather than in-process locks, so multiple server processes are
/// safe.
#[derive(Clone)]
pub struct RedemptionService {
    pool: DbPool,
    tickets: TicketService,
    references: ReferenceService,
}

pub struct RedemptionOutcome {
    pub participant: Participant,
    pub tickets: Vec<String>,
}

impl RedemptionService {
    pub fn new(pool: DbPool, tickets: TicketService, references: ReferenceService) -> Self {
        Self {
            pool,
            tickets,
            references,
        }
    }

    /// Public redemption: the reference is mandatory and the requested count
    /// must match what the reference was sold for.
    pub async fn redeem(
        &self,
        code: &str,
        fields: &ParticipantFields,
        ticket_count: i64,
    ) -> AppResult<RedemptionOutcome> {
        if ticket_count < 1 {
            return Err(AppError::ValidationError(
                "Ticket count must be greater than 0".to_string(),
            ));
        }

        // Advisory pre-check; the race window it leaves is closed by the
        // guarded UPDATE inside commit().
        let reference = self.references.check_available(code).await?;

        if ticket_count != reference.ticket_count {
            return Err(AppError::ValidationError(format!(
                "Reference {} is valid for {} tickets",
                code, reference.ticket_count
            )));
        }

        self.allocate_and_commit(Some(code), fields, ticket_count as usize)
            .await
    }

    /// Backoffice redemption: explicit count, and the reference may be absent
    /// ("gifted" tickets consume no reference).
    pub async fn redeem_admin(
        &self,
        request: &CreateParticipantRequest,
    ) -> AppResult<RedemptionOutcome> {
        if request.ticket_count < 1 {
            return Err(AppError::ValidationError(
                "Ticket count must be greater than 0".to_string(),
            ));
        }

        if let Some(code) = request.reference.as_deref() {
            self.references.check_available(code).await?;
        }

        let fields = ParticipantFields {
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            national_id: request.national_id.clone(),
        };

        self.allocate_and_commit(
            request.reference.as_deref(),
            &fields,
            request.ticket_count as usize,
        )
        .await
    }

    async fn allocate_and_commit(
        &self,
        reference: Option<&str>,
        fields: &ParticipantFields,
        count: usize,
    ) -> AppResult<RedemptionOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            // Allocator failure means the pool itself cannot cover the
            // request; surface it immediately.
            let numbers = self.tickets.allocate(count, &HashSet::new()).await?;

            match self.commit(reference, fields, &numbers).await {
                // A concurrent commit claimed part of this proposal between
                // the snapshot and our commit. The pool still has room (the
                // allocator just succeeded), so propose a fresh batch.
                Err(AppError::InsufficientCapacity) if attempt <= MAX_COMMIT_RETRIES => {
                    log::info!(
                        "Ticket proposal collided with a concurrent redemption (attempt {attempt}), retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e),
                Ok(participant) => {
                    let tickets = participant.ticket_numbers();
                    return Ok(RedemptionOutcome {
                        participant,
                        tickets,
                    });
                }
            }
        }
    }

    /// The single atomic unit. Either every step lands or none does: no
    /// orphaned participant, no stray ticket rows, no half-flipped reference.
    async fn commit(
        &self,
        reference: Option<&str>,
        fields: &ParticipantFields,
        numbers: &[String],
    ) -> AppResult<Participant> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        // Step 1: guarded write, not read-then-write. rows_affected is the
        // sole arbiter of who flips the reference first; it is also the first
        // statement so the transaction takes the write lock up front.
        if let Some(code) = reference {
            let flipped = sqlx::query(
                "UPDATE raffle_references SET used = 1, used_at = ?, updated_at = ? WHERE code = ? AND used = 0",
            )
            .bind(now)
            .bind(now)
            .bind(code)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if flipped == 0 {
                let exists: Option<i64> =
                    sqlx::query_scalar("SELECT id FROM raffle_references WHERE code = ?")
                        .bind(code)
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match exists {
                    Some(_) => AppError::AlreadyUsed,
                    None => AppError::NotFound(format!("Reference {code} not found")),
                });
            }
        }

        // Step 2: one participant row carrying the full batch. The UNIQUE
        // constraint on reference_code backstops the guarded UPDATE.
        let id = Uuid::new_v4().to_string();
        let tickets_json = serde_json::to_string(numbers)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO participants
                (id, reference_code, name, email, phone, national_id, tickets,
                 generated_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(reference)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.phone)
        .bind(&fields.national_id)
        .bind(&tickets_json)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::AlreadyUsed,
                _ => e.into(),
            });
        }

        // Step 3: claim each proposed number. A number already claimed by a
        // concurrent transaction conflicts without being re-marked (counts 0);
        // a released row (used = 0, admin edits) is re-claimed and counts.
        let mut claimed: u64 = 0;
        for number in numbers {
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

        // Fail closed: never hand the participant fewer tickets than promised.
        if claimed < numbers.len() as u64 {
            return Err(AppError::InsufficientCapacity);
        }

        tx.commit().await?;

        let participant = sqlx::query_as::<_, Participant>(
            r#"
            SELECT id, reference_code, name, email, phone, national_id, tickets,
                   generated_at, created_at, updated_at
            FROM participants
            WHERE id = ?
            "#,
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        if let Some(code) = reference {
            log::info!(
                "Reference {code} redeemed for {} tickets by participant {id}",
                numbers.len()
            );
        }

        Ok(participant)
    }

    /// Administrative full reset: clear every participant and ticket row and
    /// unmark every reference, as one transaction.
    pub async fn reset_all(&self) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM participants")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tickets").execute(&mut *tx).await?;
        sqlx::query("UPDATE raffle_references SET used = 0, used_at = NULL, updated_at = ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!("Raffle reset: all participants and tickets cleared, references unmarked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_pool;
    use futures_util::future::join_all;

    fn services(pool: &DbPool) -> RedemptionService {
        RedemptionService::new(
            pool.clone(),
            TicketService::new(pool.clone()),
            ReferenceService::new(pool.clone()),
        )
    }

    fn fields(name: &str) -> ParticipantFields {
        ParticipantFields {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            phone: "04121234567".to_string(),
            national_id: "12345678".to_string(),
        }
    }

    async fn create_reference(pool: &DbPool, code: &str, count: i64) {
        sqlx::query(
            "INSERT INTO raffle_references (code, ticket_count, ticket_value) VALUES (?, ?, 10.0)",
        )
        .bind(code)
        .bind(count)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn participant_count(pool: &DbPool, code: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE reference_code = ?")
            .bind(code)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_redeem_happy_path() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        let outcome = service
            .redeem("123456", &fields("Juan Perez"), 5)
            .await
            .unwrap();

        assert_eq!(outcome.tickets.len(), 5);
        let distinct: HashSet<&String> = outcome.tickets.iter().collect();
        assert_eq!(distinct.len(), 5);
        for number in &outcome.tickets {
            assert!(crate::utils::validate_ticket_number(number));
        }
        assert_eq!(outcome.participant.reference_code.as_deref(), Some("123456"));
        assert_eq!(outcome.participant.ticket_numbers(), outcome.tickets);

        // Reference flipped, with used_at stamped.
        let reference = ReferenceService::new(pool.clone())
            .get_by_code("123456")
            .await
            .unwrap();
        assert!(reference.used);
        assert!(reference.used_at.is_some());

        // One ticket row per number, all used.
        let used: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE used = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(used, 5);
    }

    #[tokio::test]
    async fn test_redeem_twice_fails_and_leaves_one_participant() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        service
            .redeem("123456", &fields("Juan Perez"), 5)
            .await
            .unwrap();

        // Sequentially idempotent: both retries fail the same way.
        for _ in 0..2 {
            let second = service.redeem("123456", &fields("Maria Lopez"), 5).await;
            assert!(matches!(second, Err(AppError::AlreadyUsed)));
        }

        assert_eq!(participant_count(&pool, "123456").await, 1);
        let used: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE used = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(used, 5);
    }

    #[tokio::test]
    async fn test_redeem_unknown_reference() {
        let pool = test_pool().await;
        let service = services(&pool);

        let result = service.redeem("999999", &fields("Juan Perez"), 5).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_redeem_count_must_match_reference() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        let result = service.redeem("123456", &fields("Juan Perez"), 3).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        // Nothing persisted, reference still redeemable.
        assert_eq!(participant_count(&pool, "123456").await, 0);
        ReferenceService::new(pool.clone())
            .check_available("123456")
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_same_reference_single_winner() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "654321", 5).await;

        let attempts = (0..10).map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .redeem("654321", &fields(&format!("Racer {i}")), 5)
                    .await
            })
        });

        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, AppError::AlreadyUsed), "unexpected error: {e}");
            }
        }

        assert_eq!(participant_count(&pool, "654321").await, 1);
        let used: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE used = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(used, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_distinct_references_all_unique() {
        let pool = test_pool().await;
        let service = services(&pool);

        let codes = ["100001", "100002", "100003", "100004", "100005"];
        for code in &codes {
            create_reference(&pool, code, 10).await;
        }

        let attempts = codes.map(|code| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .redeem(code, &fields(&format!("Holder {code}")), 10)
                    .await
            })
        });

        let mut all_tickets = Vec::new();
        for joined in join_all(attempts).await {
            let outcome = joined.unwrap().expect("every distinct reference succeeds");
            assert_eq!(outcome.tickets.len(), 10);
            all_tickets.extend(outcome.tickets);
        }

        assert_eq!(all_tickets.len(), 50);
        let distinct: HashSet<&String> = all_tickets.iter().collect();
        assert_eq!(distinct.len(), 50, "tickets must be pairwise distinct");
    }

    #[tokio::test]
    async fn test_near_exhausted_pool_fails_closed() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        // Mark every number used except 0042.
        let values: Vec<String> = (0..10_000)
            .filter(|n| *n != 42)
            .map(|n| format!("('{n:04}', 1)"))
            .collect();
        for chunk in values.chunks(500) {
            sqlx::query(&format!(
                "INSERT INTO tickets (number, used) VALUES {}",
                chunk.join(", ")
            ))
            .execute(&pool)
            .await
            .unwrap();
        }

        let result = service.redeem("123456", &fields("Juan Perez"), 5).await;
        assert!(matches!(result, Err(AppError::InsufficientCapacity)));

        // No partial state: no participant, the free number is still free,
        // the reference is still redeemable.
        assert_eq!(participant_count(&pool, "123456").await, 0);
        let free: Option<bool> = sqlx::query_scalar("SELECT used FROM tickets WHERE number = '0042'")
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert!(free.is_none());
        ReferenceService::new(pool.clone())
            .check_available("123456")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redeem_count_beyond_number_space_fails_cleanly() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", i64::MAX).await;

        // A reference mis-created with an absurd count must surface capacity
        // exhaustion, not blow up allocating the proposal buffer.
        let result = service.redeem("123456", &fields("Juan Perez"), i64::MAX).await;
        assert!(matches!(result, Err(AppError::InsufficientCapacity)));

        let gifted = service
            .redeem_admin(&CreateParticipantRequest {
                reference: None,
                name: "Gifted Guest".to_string(),
                email: "guest@example.com".to_string(),
                phone: "04121234567".to_string(),
                national_id: "12345678".to_string(),
                ticket_count: 10_001,
            })
            .await;
        assert!(matches!(gifted, Err(AppError::InsufficientCapacity)));

        // Nothing persisted, reference still redeemable.
        let participants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(participants, 0);
        ReferenceService::new(pool.clone())
            .check_available("123456")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_fails_closed_on_proposal_collision() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 3).await;

        // Simulate a concurrent transaction having claimed part of the
        // proposal after the allocator snapshot.
        sqlx::query("INSERT INTO tickets (number, used) VALUES ('0001', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let numbers = vec!["0001".to_string(), "0002".to_string(), "0003".to_string()];
        let result = service
            .commit(Some("123456"), &fields("Juan Perez"), &numbers)
            .await;
        assert!(matches!(result, Err(AppError::InsufficientCapacity)));

        // Rolled back wholesale: reference untouched, no participant, the
        // genuinely-free numbers were not consumed.
        ReferenceService::new(pool.clone())
            .check_available("123456")
            .await
            .unwrap();
        assert_eq!(participant_count(&pool, "123456").await, 0);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_commit_collision_retries_with_fresh_batch() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 1).await;

        // Every number taken except 0001, so the first proposal must be
        // {0001}.
        let values: Vec<String> = (0..10_000)
            .filter(|n| *n != 1)
            .map(|n| format!("('{n:04}', 1)"))
            .collect();
        for chunk in values.chunks(500) {
            sqlx::query(&format!(
                "INSERT INTO tickets (number, used) VALUES {}",
                chunk.join(", ")
            ))
            .execute(&pool)
            .await
            .unwrap();
        }

        // A held transaction takes the write lock, claims 0001 out from under
        // the proposal and releases 0002. The redemption's guarded UPDATE
        // queues behind it, its claim of 0001 then falls through, and the
        // retry must come back with 0002.
        let mut tx = pool.begin().await.unwrap();
        sqlx::query("INSERT INTO tickets (number, used) VALUES ('0001', 1)")
            .execute(&mut *tx)
            .await
            .unwrap();

        let redemption = {
            let service = service.clone();
            tokio::spawn(async move { service.redeem("123456", &fields("Juan Perez"), 1).await })
        };

        // Give the redemption time to snapshot the pool and block on the
        // write lock before the competing transaction lands.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        sqlx::query(
            "UPDATE tickets SET used = 0, updated_at = CURRENT_TIMESTAMP WHERE number = '0002'",
        )
        .execute(&mut *tx)
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let outcome = redemption.await.unwrap().unwrap();
        assert_eq!(outcome.tickets, vec!["0002".to_string()]);
        assert_eq!(participant_count(&pool, "123456").await, 1);

        let reference = ReferenceService::new(pool.clone())
            .get_by_code("123456")
            .await
            .unwrap();
        assert!(reference.used);
        let claimed: bool = sqlx::query_scalar("SELECT used FROM tickets WHERE number = '0002'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(claimed);
    }

    #[tokio::test]
    async fn test_commit_reclaims_released_numbers() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 2).await;

        // A row released by an admin edit may be allocated again.
        sqlx::query("INSERT INTO tickets (number, used) VALUES ('0005', 0)")
            .execute(&pool)
            .await
            .unwrap();

        let numbers = vec!["0005".to_string(), "0006".to_string()];
        service
            .commit(Some("123456"), &fields("Juan Perez"), &numbers)
            .await
            .unwrap();

        let reclaimed: bool = sqlx::query_scalar("SELECT used FROM tickets WHERE number = '0005'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(reclaimed);
    }

    #[tokio::test]
    async fn test_admin_redeem_without_reference() {
        let pool = test_pool().await;
        let service = services(&pool);

        let outcome = service
            .redeem_admin(&CreateParticipantRequest {
                reference: None,
                name: "Gifted Guest".to_string(),
                email: "guest@example.com".to_string(),
                phone: "04121234567".to_string(),
                national_id: "12345678".to_string(),
                ticket_count: 3,
            })
            .await
            .unwrap();

        assert_eq!(outcome.tickets.len(), 3);
        assert!(outcome.participant.reference_code.is_none());

        // A second gifted participant is fine: no reference is consumed.
        service
            .redeem_admin(&CreateParticipantRequest {
                reference: None,
                name: "Second Guest".to_string(),
                email: "guest2@example.com".to_string(),
                phone: "04121234567".to_string(),
                national_id: "87654321".to_string(),
                ticket_count: 2,
            })
            .await
            .unwrap();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_admin_redeem_with_reference_uses_override_count() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        // Backoffice may override the configured count.
        let outcome = service
            .redeem_admin(&CreateParticipantRequest {
                reference: Some("123456".to_string()),
                name: "Override".to_string(),
                email: "override@example.com".to_string(),
                phone: "04121234567".to_string(),
                national_id: "12345678".to_string(),
                ticket_count: 2,
            })
            .await
            .unwrap();

        assert_eq!(outcome.tickets.len(), 2);
        let reference = ReferenceService::new(pool.clone())
            .get_by_code("123456")
            .await
            .unwrap();
        assert!(reference.used);
    }

    #[tokio::test]
    async fn test_reset_all() {
        let pool = test_pool().await;
        let service = services(&pool);
        create_reference(&pool, "123456", 5).await;

        service
            .redeem("123456", &fields("Juan Perez"), 5)
            .await
            .unwrap();
        service.reset_all().await.unwrap();

        let participants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&pool)
            .await
            .unwrap();
        let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(participants, 0);
        assert_eq!(tickets, 0);

        // References survive, unmarked and redeemable again.
        ReferenceService::new(pool.clone())
            .check_available("123456")
            .await
            .unwrap();
    }
}
