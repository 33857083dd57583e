use async_trait::async_trait;
use chrono::NaiveDate;
use redis::Client as RedisClient;
use thiserror::Error;
use uuid::Uuid;

/// Keys outlive their day so late releases still find them.
const USAGE_KEY_TTL_SECS: i64 = 60 * 60 * 48;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Per-user daily import counter.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn used_on(&self, user_id: Uuid, day: NaiveDate) -> Result<u32, LedgerError>;

    /// Atomically takes one import slot if fewer than `limit` are in use.
    /// Returns the count including this claim, or `None` when the day is full.
    async fn try_claim(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>, LedgerError>;

    /// Gives back a slot taken by `try_claim` for an import that did not complete.
    async fn release(&self, user_id: Uuid, day: NaiveDate) -> Result<(), LedgerError>;
}

fn usage_key(user_id: Uuid, day: NaiveDate) -> String {
    format!("import_usage:{user_id}:{}", day.format("%Y-%m-%d"))
}

fn as_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Redis-backed ledger: one `INCR`-ed counter per user and UTC day.
#[derive(Clone)]
pub struct RedisUsageLedger {
    client: RedisClient,
}

impl RedisUsageLedger {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UsageLedger for RedisUsageLedger {
    async fn used_on(&self, user_id: Uuid, day: NaiveDate) -> Result<u32, LedgerError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let used: Option<i64> = redis::cmd("GET")
            .arg(usage_key(user_id, day))
            .query_async(&mut conn)
            .await?;
        Ok(used.map(as_count).unwrap_or(0))
    }

    async fn try_claim(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        limit: u32,
    ) -> Result<Option<u32>, LedgerError> {
        let key = usage_key(user_id, day);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(USAGE_KEY_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if count > i64::from(limit) {
            let _: i64 = redis::cmd("DECR").arg(&key).query_async(&mut conn).await?;
            return Ok(None);
        }
        Ok(Some(as_count(count)))
    }

    async fn release(&self, user_id: Uuid, day: NaiveDate) -> Result<(), LedgerError> {
        let key = usage_key(user_id, day);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let remaining: i64 = redis::cmd("DECR").arg(&key).query_async(&mut conn).await?;
        if remaining < 0 {
            let _: () = redis::cmd("SET")
                .arg(&key)
                .arg(0)
                .arg("KEEPTTL")
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::memory::InMemoryUsageLedger;
    use super::*;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    #[test]
    fn test_usage_key_format() {
        let user = Uuid::nil();
        assert_eq!(
            usage_key(user, today()),
            "import_usage:00000000-0000-0000-0000-000000000000:2026-05-04"
        );
    }

    #[tokio::test]
    async fn test_claims_stop_at_limit_and_release_frees_a_slot() {
        let ledger = InMemoryUsageLedger::new();
        let user = Uuid::new_v4();

        assert_eq!(ledger.try_claim(user, today(), 2).await.unwrap(), Some(1));
        assert_eq!(ledger.try_claim(user, today(), 2).await.unwrap(), Some(2));
        assert_eq!(ledger.try_claim(user, today(), 2).await.unwrap(), None);

        ledger.release(user, today()).await.unwrap();
        assert_eq!(ledger.used_on(user, today()).await.unwrap(), 1);

        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(ledger.used_on(user, tomorrow).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_exceed_limit() {
        let ledger = Arc::new(InMemoryUsageLedger::new());
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.try_claim(user, today(), 5).await.unwrap()
            }));
        }
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
        assert_eq!(ledger.used_on(user, today()).await.unwrap(), 5);
    }
}
