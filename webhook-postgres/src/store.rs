use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use webhook_core::error::StoreError;
use webhook_core::health::ewma_update;
use webhook_core::store::{Store, StoreResult};
use webhook_core::types::{
    DeliveryAttempt, Message, MessageSearchFilters, MessageStatus, Page, WebhookConfig,
    WebhookHealthStats,
};

/// Table names derived from a configurable prefix, mirroring the shape of a
/// multi-tenant-safe deployment where several services share one database.
#[derive(Debug, Clone)]
struct TableNames {
    configs: String,
    messages: String,
    attempts: String,
    health: String,
}

impl TableNames {
    fn new(prefix: &str) -> Self {
        Self {
            configs: format!("{prefix}_webhook_configs"),
            messages: format!("{prefix}_messages"),
            attempts: format!("{prefix}_delivery_attempts"),
            health: format!("{prefix}_webhook_health_stats"),
        }
    }
}

fn sqlx_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::AlreadyExists,
        other => StoreError::Backend(other.to_string()),
    }
}

fn headers_to_json(headers: &Option<std::collections::HashMap<String, String>>) -> Option<JsonValue> {
    headers.as_ref().map(|h| serde_json::to_value(h).unwrap_or(JsonValue::Null))
}

fn headers_from_json(value: Option<JsonValue>) -> Option<std::collections::HashMap<String, String>> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

/// PostgreSQL-backed `Store`: every mutation that can race a concurrent
/// worker (`mark_processing`, `cancel_message`) is a conditional `UPDATE ...
/// WHERE status = ...`, never a read-then-write — the database is the
/// compare-and-set.
pub struct PostgresStore {
    pool: PgPool,
    tables: TableNames,
}

impl PostgresStore {
    pub fn new(pool: PgPool, prefix: Option<&str>) -> Self {
        let resolved = prefix
            .map(|s| s.to_string())
            .or_else(|| std::env::var("WEBHOOK_PG_PREFIX").ok())
            .unwrap_or_else(|| "webhook".to_string());
        Self { pool, tables: TableNames::new(&resolved) }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        let configs = &self.tables.configs;
        let messages = &self.tables.messages;
        let attempts = &self.tables.attempts;
        let health = &self.tables.health;

        let migration = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {configs} (
              id TEXT PRIMARY KEY,
              name TEXT NOT NULL UNIQUE,
              target_url TEXT NOT NULL,
              secret TEXT NOT NULL,
              active BOOLEAN NOT NULL DEFAULT TRUE,
              max_retries INTEGER NOT NULL,
              backoff_strategy TEXT NOT NULL,
              initial_interval_s BIGINT NOT NULL,
              backoff_factor DOUBLE PRECISION NOT NULL,
              max_interval_s BIGINT NOT NULL,
              max_age_s BIGINT NOT NULL,
              headers JSONB,
              created_at DOUBLE PRECISION NOT NULL,
              updated_at DOUBLE PRECISION NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {messages} (
              id TEXT PRIMARY KEY,
              webhook_config_id TEXT NOT NULL REFERENCES {configs}(id),
              payload TEXT NOT NULL,
              target_url TEXT NOT NULL,
              signature TEXT NOT NULL,
              headers JSONB,
              status TEXT NOT NULL,
              retry_count INTEGER NOT NULL DEFAULT 0,
              next_retry DOUBLE PRECISION,
              last_error TEXT,
              created_at DOUBLE PRECISION NOT NULL,
              updated_at DOUBLE PRECISION NOT NULL,
              processing_node TEXT
            );

            CREATE INDEX IF NOT EXISTS {messages}_retry_idx ON {messages}(status, next_retry);
            CREATE INDEX IF NOT EXISTS {messages}_pending_idx ON {messages}(status, created_at);
            CREATE INDEX IF NOT EXISTS {messages}_config_idx ON {messages}(webhook_config_id, created_at);

            CREATE TABLE IF NOT EXISTS {attempts} (
              id TEXT PRIMARY KEY,
              message_id TEXT NOT NULL REFERENCES {messages}(id) ON DELETE CASCADE,
              attempt_number INTEGER NOT NULL,
              timestamp DOUBLE PRECISION NOT NULL,
              target_url TEXT NOT NULL,
              status_code INTEGER,
              response_body TEXT,
              response_headers JSONB,
              request_duration_ms BIGINT NOT NULL,
              error TEXT,
              processing_node TEXT
            );

            CREATE INDEX IF NOT EXISTS {attempts}_message_idx ON {attempts}(message_id, attempt_number DESC);

            CREATE TABLE IF NOT EXISTS {health} (
              webhook_config_id TEXT PRIMARY KEY REFERENCES {configs}(id),
              webhook_name TEXT NOT NULL,
              total_sent BIGINT NOT NULL DEFAULT 0,
              total_delivered BIGINT NOT NULL DEFAULT 0,
              total_failed BIGINT NOT NULL DEFAULT 0,
              avg_response_time_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
              last_success_time DOUBLE PRECISION,
              last_error_time DOUBLE PRECISION,
              last_error TEXT,
              updated_at DOUBLE PRECISION NOT NULL
            );
            "#
        );

        sqlx::query(&migration).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_config(row: &PgRow) -> WebhookConfig {
        let strategy: String = row.get("backoff_strategy");
        let backoff_strategy =
            serde_json::from_value(JsonValue::String(strategy.clone())).unwrap_or_else(|_| {
                tracing::warn!(backoff_strategy = %strategy, "unknown backoff strategy, falling back to exponential");
                webhook_core::types::BackoffStrategy::Exponential
            });
        WebhookConfig {
            id: row.get("id"),
            name: row.get("name"),
            target_url: row.get("target_url"),
            secret: row.get("secret"),
            active: row.get("active"),
            max_retries: row.get::<i32, _>("max_retries") as u32,
            backoff_strategy,
            initial_interval_s: row.get::<i64, _>("initial_interval_s") as u64,
            backoff_factor: row.get("backoff_factor"),
            max_interval_s: row.get::<i64, _>("max_interval_s") as u64,
            max_age_s: row.get::<i64, _>("max_age_s") as u64,
            headers: headers_from_json(row.get("headers")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn row_to_message(row: &PgRow) -> Message {
        let status_str: String = row.get("status");
        Message {
            id: row.get("id"),
            webhook_config_id: row.get("webhook_config_id"),
            payload: row.get("payload"),
            target_url: row.get("target_url"),
            signature: row.get("signature"),
            headers: headers_from_json(row.get("headers")),
            status: MessageStatus::from_str(&status_str).unwrap_or(MessageStatus::Pending),
            retry_count: row.get::<i32, _>("retry_count") as u32,
            next_retry: row.get("next_retry"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            processing_node: row.get("processing_node"),
        }
    }

    fn row_to_attempt(row: &PgRow) -> DeliveryAttempt {
        DeliveryAttempt {
            id: row.get("id"),
            message_id: row.get("message_id"),
            attempt_number: row.get::<i32, _>("attempt_number") as u32,
            timestamp: row.get("timestamp"),
            target_url: row.get("target_url"),
            status_code: row.get::<Option<i32>, _>("status_code").map(|c| c as u16),
            response_body: row.get("response_body"),
            response_headers: headers_from_json(row.get("response_headers")),
            request_duration_ms: row.get::<i64, _>("request_duration_ms") as u64,
            error: row.get("error"),
            processing_node: row.get("processing_node"),
        }
    }

    fn row_to_health(row: &PgRow) -> WebhookHealthStats {
        WebhookHealthStats {
            webhook_config_id: row.get("webhook_config_id"),
            webhook_name: row.get("webhook_name"),
            total_sent: row.get::<i64, _>("total_sent") as u64,
            total_delivered: row.get::<i64, _>("total_delivered") as u64,
            total_failed: row.get::<i64, _>("total_failed") as u64,
            avg_response_time_ms: row.get("avg_response_time_ms"),
            last_success_time: row.get("last_success_time"),
            last_error_time: row.get("last_error_time"),
            last_error: row.get("last_error"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_active_config_by_name(&self, name: &str) -> StoreResult<WebhookConfig> {
        let sql = format!("SELECT * FROM {} WHERE name = $1 AND active = TRUE", self.tables.configs);
        let row = sqlx::query(&sql).bind(name).fetch_optional(&self.pool).await.map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_config).ok_or(StoreError::NotFound)
    }

    async fn get_config(&self, id: &str) -> StoreResult<WebhookConfig> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.tables.configs);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await.map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_config).ok_or(StoreError::NotFound)
    }

    async fn insert_config(&self, config: WebhookConfig) -> StoreResult<()> {
        let sql = format!(
            r#"INSERT INTO {} (
                id, name, target_url, secret, active, max_retries, backoff_strategy,
                initial_interval_s, backoff_factor, max_interval_s, max_age_s, headers,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
            self.tables.configs
        );
        let strategy_str = config.backoff_strategy.to_string_lossy();
        sqlx::query(&sql)
            .bind(&config.id)
            .bind(&config.name)
            .bind(&config.target_url)
            .bind(&config.secret)
            .bind(config.active)
            .bind(config.max_retries as i32)
            .bind(strategy_str)
            .bind(config.initial_interval_s as i64)
            .bind(config.backoff_factor)
            .bind(config.max_interval_s as i64)
            .bind(config.max_age_s as i64)
            .bind(headers_to_json(&config.headers))
            .bind(config.created_at)
            .bind(config.updated_at)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn deactivate_config(&self, name: &str) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET active = FALSE, updated_at = $2 WHERE name = $1", self.tables.configs);
        let result = sqlx::query(&sql)
            .bind(name)
            .bind(now_ms())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_message(&self, message: Message) -> StoreResult<()> {
        let sql = format!(
            r#"INSERT INTO {} (
                id, webhook_config_id, payload, target_url, signature, headers, status,
                retry_count, next_retry, last_error, created_at, updated_at, processing_node
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
            self.tables.messages
        );
        sqlx::query(&sql)
            .bind(&message.id)
            .bind(&message.webhook_config_id)
            .bind(&message.payload)
            .bind(&message.target_url)
            .bind(&message.signature)
            .bind(headers_to_json(&message.headers))
            .bind(message.status.to_string())
            .bind(message.retry_count as i32)
            .bind(message.next_retry)
            .bind(&message.last_error)
            .bind(message.created_at)
            .bind(message.updated_at)
            .bind(&message.processing_node)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_message(&self, id: &str) -> StoreResult<Message> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.tables.messages);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await.map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_message).ok_or(StoreError::NotFound)
    }

    async fn mark_processing(&self, id: &str) -> StoreResult<u64> {
        let sql = format!(
            r#"UPDATE {} SET status = 'processing', updated_at = $2
               WHERE id = $1 AND status IN ('pending', 'failed')"#,
            self.tables.messages
        );
        let result = sqlx::query(&sql).bind(id).bind(now_ms()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn mark_delivered(&self, id: &str) -> StoreResult<()> {
        let sql = format!(
            r#"UPDATE {} SET status = 'delivered', next_retry = NULL, last_error = NULL, updated_at = $2
               WHERE id = $1"#,
            self.tables.messages
        );
        sqlx::query(&sql).bind(id).bind(now_ms()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error_message: &str, next_retry: Option<f64>) -> StoreResult<()> {
        let sql = format!(
            r#"UPDATE {} SET status = 'failed', next_retry = $2, last_error = $3, updated_at = $4
               WHERE id = $1"#,
            self.tables.messages
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(next_retry)
            .bind(error_message)
            .bind(now_ms())
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn increment_retry_count(&self, id: &str) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET retry_count = retry_count + 1, updated_at = $2 WHERE id = $1",
            self.tables.messages
        );
        sqlx::query(&sql).bind(id).bind(now_ms()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn set_message_target_url(&self, id: &str, target_url: &str) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET target_url = $2, updated_at = $3 WHERE id = $1",
            self.tables.messages
        );
        sqlx::query(&sql).bind(id).bind(target_url).bind(now_ms()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn cancel_message(&self, id: &str) -> StoreResult<bool> {
        let sql = format!(
            r#"UPDATE {} SET status = 'cancelled', next_retry = NULL, updated_at = $2
               WHERE id = $1 AND status IN ('pending', 'processing', 'failed')"#,
            self.tables.messages
        );
        let result = sqlx::query(&sql).bind(id).bind(now_ms()).execute(&self.pool).await.map_err(sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_messages_for_retry(&self, now: f64, limit: u64) -> StoreResult<Vec<String>> {
        let sql = format!(
            r#"SELECT id FROM {} WHERE status = 'failed' AND next_retry IS NOT NULL AND next_retry <= $1
               ORDER BY next_retry ASC LIMIT $2"#,
            self.tables.messages
        );
        let rows =
            sqlx::query(&sql).bind(now).bind(limit as i64).fetch_all(&self.pool).await.map_err(sqlx_err)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
    }

    async fn find_pending_messages(&self, limit: u64) -> StoreResult<Vec<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1",
            self.tables.messages
        );
        let rows = sqlx::query(&sql).bind(limit as i64).fetch_all(&self.pool).await.map_err(sqlx_err)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
    }

    async fn find_stuck_messages(&self, threshold: f64) -> StoreResult<Vec<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE status = 'processing' AND updated_at < $1",
            self.tables.messages
        );
        let rows = sqlx::query(&sql).bind(threshold).fetch_all(&self.pool).await.map_err(sqlx_err)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("id")).collect())
    }

    async fn search_messages(&self, filters: &MessageSearchFilters, page: Page) -> StoreResult<Vec<Message>> {
        let mut clauses = Vec::new();
        let mut sql = format!("SELECT * FROM {} WHERE 1 = 1", self.tables.messages);
        let mut idx = 1;

        if filters.webhook_config_id.is_some() {
            idx += 1;
            clauses.push(format!(" AND webhook_config_id = ${idx}"));
        }
        if filters.status.is_some() {
            idx += 1;
            clauses.push(format!(" AND status = ${idx}"));
        }
        if filters.created_after.is_some() {
            idx += 1;
            clauses.push(format!(" AND created_at >= ${idx}"));
        }
        if filters.created_before.is_some() {
            idx += 1;
            clauses.push(format!(" AND created_at <= ${idx}"));
        }
        for clause in &clauses {
            sql.push_str(clause);
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ${} OFFSET ${}", idx + 1, idx + 2));

        let mut query = sqlx::query(&sql);
        if let Some(ref id) = filters.webhook_config_id {
            query = query.bind(id);
        }
        if let Some(status) = filters.status {
            query = query.bind(status.to_string());
        }
        if let Some(t) = filters.created_after {
            query = query.bind(t);
        }
        if let Some(t) = filters.created_before {
            query = query.bind(t);
        }
        query = query.bind(page.limit as i64).bind(page.offset as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(sqlx_err)?;
        Ok(rows.iter().map(Self::row_to_message).collect())
    }

    async fn append_attempt(&self, attempt: DeliveryAttempt) -> StoreResult<()> {
        let sql = format!(
            r#"INSERT INTO {} (
                id, message_id, attempt_number, timestamp, target_url, status_code,
                response_body, response_headers, request_duration_ms, error, processing_node
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
            self.tables.attempts
        );
        sqlx::query(&sql)
            .bind(&attempt.id)
            .bind(&attempt.message_id)
            .bind(attempt.attempt_number as i32)
            .bind(attempt.timestamp)
            .bind(&attempt.target_url)
            .bind(attempt.status_code.map(|c| c as i32))
            .bind(&attempt.response_body)
            .bind(headers_to_json(&attempt.response_headers))
            .bind(attempt.request_duration_ms as i64)
            .bind(&attempt.error)
            .bind(&attempt.processing_node)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn get_attempts(&self, message_id: &str, limit: u64) -> StoreResult<Vec<DeliveryAttempt>> {
        let sql = format!(
            "SELECT * FROM {} WHERE message_id = $1 ORDER BY attempt_number DESC LIMIT $2",
            self.tables.attempts
        );
        let rows = sqlx::query(&sql)
            .bind(message_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(rows.iter().map(Self::row_to_attempt).collect())
    }

    async fn record_success(&self, config_id: &str, latency_ms: f64) -> StoreResult<()> {
        self.upsert_health(config_id, true, latency_ms, None).await
    }

    async fn record_failure(&self, config_id: &str, reason: &str) -> StoreResult<()> {
        self.upsert_health(config_id, false, 0.0, Some(reason)).await
    }

    async fn get_health_stats(&self, config_id: &str) -> StoreResult<WebhookHealthStats> {
        let sql = format!("SELECT * FROM {} WHERE webhook_config_id = $1", self.tables.health);
        let row = sqlx::query(&sql).bind(config_id).fetch_optional(&self.pool).await.map_err(sqlx_err)?;
        row.as_ref().map(Self::row_to_health).ok_or(StoreError::NotFound)
    }

    async fn delete_old_messages(
        &self,
        cutoff: f64,
        statuses: &[MessageStatus],
        batch_size: u64,
    ) -> StoreResult<u64> {
        let status_strs: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let sql = format!(
            r#"DELETE FROM {table} WHERE ctid IN (
                SELECT ctid FROM {table} WHERE status = ANY($1) AND updated_at < $2 LIMIT $3
            )"#,
            table = self.tables.messages
        );
        let result = sqlx::query(&sql)
            .bind(&status_strs)
            .bind(cutoff)
            .bind(batch_size as i64)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_old_attempts(&self, cutoff: f64, batch_size: u64) -> StoreResult<u64> {
        let sql = format!(
            r#"DELETE FROM {table} WHERE ctid IN (
                SELECT ctid FROM {table} WHERE timestamp < $1 LIMIT $2
            )"#,
            table = self.tables.attempts
        );
        let result = sqlx::query(&sql)
            .bind(cutoff)
            .bind(batch_size as i64)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(result.rows_affected())
    }
}

impl PostgresStore {
    async fn upsert_health(
        &self,
        config_id: &str,
        success: bool,
        latency_ms: f64,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let name_sql = format!("SELECT name FROM {} WHERE id = $1", self.tables.configs);
        let name_row =
            sqlx::query(&name_sql).bind(config_id).fetch_optional(&self.pool).await.map_err(sqlx_err)?;
        let webhook_name: String = name_row.map(|r| r.get("name")).unwrap_or_else(|| config_id.to_string());

        let existing_sql = format!("SELECT * FROM {} WHERE webhook_config_id = $1", self.tables.health);
        let existing = sqlx::query(&existing_sql)
            .bind(config_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        let mut stats = existing
            .as_ref()
            .map(Self::row_to_health)
            .unwrap_or_else(|| WebhookHealthStats::new(config_id, &webhook_name, now_ms()));

        stats.total_sent += 1;
        if success {
            stats.total_delivered += 1;
            stats.avg_response_time_ms = ewma_update(stats.avg_response_time_ms, latency_ms);
            stats.last_success_time = Some(now_ms());
        } else {
            stats.total_failed += 1;
            stats.last_error_time = Some(now_ms());
            stats.last_error = reason.map(|s| s.to_string());
        }
        stats.updated_at = now_ms();

        let sql = format!(
            r#"INSERT INTO {table} (
                webhook_config_id, webhook_name, total_sent, total_delivered, total_failed,
                avg_response_time_ms, last_success_time, last_error_time, last_error, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (webhook_config_id) DO UPDATE SET
                total_sent = EXCLUDED.total_sent,
                total_delivered = EXCLUDED.total_delivered,
                total_failed = EXCLUDED.total_failed,
                avg_response_time_ms = EXCLUDED.avg_response_time_ms,
                last_success_time = EXCLUDED.last_success_time,
                last_error_time = EXCLUDED.last_error_time,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at"#,
            table = self.tables.health
        );
        sqlx::query(&sql)
            .bind(config_id)
            .bind(&webhook_name)
            .bind(stats.total_sent as i64)
            .bind(stats.total_delivered as i64)
            .bind(stats.total_failed as i64)
            .bind(stats.avg_response_time_ms)
            .bind(stats.last_success_time)
            .bind(stats.last_error_time)
            .bind(&stats.last_error)
            .bind(stats.updated_at)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }
}

fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

trait ToStringLossy {
    fn to_string_lossy(&self) -> String;
}

impl ToStringLossy for webhook_core::types::BackoffStrategy {
    fn to_string_lossy(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "exponential".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_with_default_prefix() {
        let tables = TableNames::new("webhook");
        assert_eq!(tables.configs, "webhook_webhook_configs");
        assert_eq!(tables.messages, "webhook_messages");
        assert_eq!(tables.attempts, "webhook_delivery_attempts");
        assert_eq!(tables.health, "webhook_webhook_health_stats");
    }

    #[test]
    fn table_names_with_custom_prefix() {
        let tables = TableNames::new("acme");
        assert_eq!(tables.messages, "acme_messages");
    }

    #[test]
    fn backoff_strategy_round_trips_through_string() {
        let strategy = webhook_core::types::BackoffStrategy::Linear;
        let s = strategy.to_string_lossy();
        assert_eq!(s, "linear");
    }
}
