use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use rand::Rng;
use std::collections::HashSet;

/// The number space is fixed: "0000" through "9999".
pub const TOTAL_TICKETS: i64 = 10_000;

/// Hard ceiling on random draws per allocation call. Guarantees termination as
/// the free pool shrinks toward zero; a shortfall at the ceiling is reported as
/// insufficient capacity, never as a partial batch.
pub const MAX_DRAW_ATTEMPTS: usize = 10_000;

#[derive(Clone)]
pub struct TicketService {
    pool: DbPool,
}

impl TicketService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Propose `count` distinct numbers not currently marked used. The used
    /// set read here is a snapshot: a concurrent allocator may propose
    /// overlapping numbers before either commits, so the output is a proposal
    /// only. The redemption transaction resolves residual collisions at
    /// commit time against the UNIQUE constraint on `tickets.number`.
    pub async fn allocate(
        &self,
        count: usize,
        reserved: &HashSet<String>,
    ) -> AppResult<Vec<String>> {
        let used: Vec<String> = sqlx::query_scalar("SELECT number FROM tickets WHERE used = 1")
            .fetch_all(&self.pool)
            .await?;

        let mut taken: HashSet<String> = used.into_iter().collect();
        taken.extend(reserved.iter().cloned());

        draw_unique(count, &mut taken)
    }

    pub async fn stats(&self) -> AppResult<TicketStats> {
        let used: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE used = 1")
            .fetch_one(&self.pool)
            .await?;

        let percentage = (used as f64 / TOTAL_TICKETS as f64) * 100.0;

        Ok(TicketStats {
            total: TOTAL_TICKETS,
            used,
            available: TOTAL_TICKETS - used,
            percentage_used: (percentage * 100.0).round() / 100.0,
        })
    }

    pub async fn list(&self, query: &TicketQuery) -> AppResult<PaginatedResponse<TicketResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset() as i64;
        let limit = params.get_limit() as i64;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tickets
            WHERE (?1 IS NULL OR used = ?1)
              AND (?2 IS NULL OR number LIKE '%' || ?2 || '%')
            "#,
        )
        .bind(query.used)
        .bind(query.search.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, number, used, created_at, updated_at
            FROM tickets
            WHERE (?1 IS NULL OR used = ?1)
              AND (?2 IS NULL OR number LIKE '%' || ?2 || '%')
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

        let items: Vec<TicketResponse> = tickets.into_iter().map(TicketResponse::from).collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_by_number(&self, number: &str) -> AppResult<TicketResponse> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT id, number, used, created_at, updated_at FROM tickets WHERE number = ?",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {number} not found")))?;

        Ok(TicketResponse::from(ticket))
    }
}

/// Random-probe with rejection. `taken` doubles as the exclusion set and the
/// in-call reservation set; accepted numbers are added to it so a batch never
/// contains duplicates.
fn draw_unique(count: usize, taken: &mut HashSet<String>) -> AppResult<Vec<String>> {
    // A request larger than the whole number space can never be satisfied;
    // reject it before sizing the result buffer.
    if count > TOTAL_TICKETS as usize {
        return Err(AppError::InsufficientCapacity);
    }

    let mut rng = rand::thread_rng();
    let mut drawn = Vec::with_capacity(count);
    let mut attempts = 0;

    while drawn.len() < count && attempts < MAX_DRAW_ATTEMPTS {
        let candidate = format!("{:04}", rng.gen_range(0..TOTAL_TICKETS));
        if taken.insert(candidate.clone()) {
            drawn.push(candidate);
        }
        attempts += 1;
    }

    if drawn.len() < count {
        return Err(AppError::InsufficientCapacity);
    }

    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::test_pool;

    #[test]
    fn test_draw_unique_returns_exact_count() {
        let mut taken = HashSet::new();
        let drawn = draw_unique(100, &mut taken).unwrap();

        assert_eq!(drawn.len(), 100);
        let distinct: HashSet<&String> = drawn.iter().collect();
        assert_eq!(distinct.len(), 100);
        for number in &drawn {
            assert_eq!(number.len(), 4);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_draw_unique_respects_exclusions() {
        // Exclude all even numbers; every draw must come back odd.
        let mut taken: HashSet<String> = (0..10_000)
            .step_by(2)
            .map(|n| format!("{n:04}"))
            .collect();
        let drawn = draw_unique(50, &mut taken).unwrap();

        assert_eq!(drawn.len(), 50);
        for number in &drawn {
            assert_eq!(number.parse::<u32>().unwrap() % 2, 1);
        }
    }

    #[test]
    fn test_draw_unique_rejects_count_beyond_number_space() {
        let mut taken = HashSet::new();
        assert!(matches!(
            draw_unique(10_001, &mut taken),
            Err(AppError::InsufficientCapacity)
        ));
        assert!(matches!(
            draw_unique(usize::MAX, &mut taken),
            Err(AppError::InsufficientCapacity)
        ));
        assert!(taken.is_empty());
    }

    #[test]
    fn test_draw_unique_fails_when_free_pool_too_small() {
        // 10 numbers free, 20 requested: must fail, never a partial batch.
        let mut taken: HashSet<String> = (0..9_990).map(|n| format!("{n:04}")).collect();
        let result = draw_unique(20, &mut taken);
        assert!(matches!(result, Err(AppError::InsufficientCapacity)));
    }

    #[tokio::test]
    async fn test_allocate_excludes_used_and_reserved() {
        let pool = test_pool().await;
        let service = TicketService::new(pool.clone());

        sqlx::query("INSERT INTO tickets (number, used) VALUES ('0001', 1), ('0002', 1)")
            .execute(&pool)
            .await
            .unwrap();

        let reserved: HashSet<String> = ["0003".to_string()].into();
        for _ in 0..20 {
            let drawn = service.allocate(5, &reserved).await.unwrap();
            assert_eq!(drawn.len(), 5);
            assert!(!drawn.contains(&"0001".to_string()));
            assert!(!drawn.contains(&"0002".to_string()));
            assert!(!drawn.contains(&"0003".to_string()));
        }
    }

    #[tokio::test]
    async fn test_stats() {
        let pool = test_pool().await;
        let service = TicketService::new(pool.clone());

        sqlx::query("INSERT INTO tickets (number, used) VALUES ('0001', 1), ('0002', 1), ('0003', 0)")
            .execute(&pool)
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 10_000);
        assert_eq!(stats.used, 2);
        assert_eq!(stats.available, 9_998);
        assert_eq!(stats.percentage_used, 0.02);
    }
}
