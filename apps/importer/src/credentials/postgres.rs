use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{CredentialStore, StoreError};
use crate::models::credential::{Credential, CredentialResult, CredentialRow};
use crate::providers::ProviderId;

/// `api_credentials` table access. Usage and reset are conditional
/// `UPDATE`s so concurrent importers never push a key past its cap.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_credentials(rows: Vec<CredentialRow>) -> Result<Vec<Credential>, StoreError> {
    rows.into_iter()
        .map(|row| Credential::try_from(row).map_err(StoreError::Malformed))
        .collect()
}

fn into_credential(row: Option<CredentialRow>) -> Result<Option<Credential>, StoreError> {
    row.map(|r| Credential::try_from(r).map_err(StoreError::Malformed))
        .transpose()
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn list_for_service(&self, service: ProviderId) -> Result<Vec<Credential>, StoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM api_credentials WHERE service = $1 ORDER BY priority ASC",
        )
        .bind(service.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_credentials(rows)
    }

    async fn list_all(&self) -> Result<Vec<Credential>, StoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM api_credentials ORDER BY service ASC, priority ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        into_credentials(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>("SELECT * FROM api_credentials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        into_credential(row)
    }

    async fn try_reserve(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            UPDATE api_credentials
            SET daily_usage = daily_usage + 1,
                usage_count = usage_count + 1,
                last_used_at = $2
            WHERE id = $1 AND active AND daily_usage < daily_limit
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        into_credential(row)
    }

    async fn settle(
        &self,
        id: Uuid,
        result: CredentialResult,
        deactivate: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE api_credentials
            SET last_result = $2,
                last_used_at = $3,
                active = active AND NOT $4,
                deactivated_at = CASE
                    WHEN $4 AND active THEN $3
                    ELSE deactivated_at
                END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(result.as_str())
        .bind(now)
        .bind(deactivate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_daily_if_due(
        &self,
        id: Uuid,
        day_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE api_credentials SET daily_usage = 0, last_reset = $3 WHERE id = $1 AND last_reset < $2",
        )
        .bind(id)
        .bind(day_start)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE api_credentials
            SET active = TRUE, deactivated_at = NULL, last_result = 'unknown'
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
