//! SQL implementation of the webhook event repository

use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::{debug, error, info, warn};

use crate::error::DbError;
use crate::models::{format_timestamp, now_utc, BookingUpdate, CompletionOutcome, WebhookEventRecord};
use crate::repositories::rows::{apply_booking_update, webhook_event_from_row, WEBHOOK_EVENT_COLUMNS};
use crate::repository::WebhookEventRepository;
use crate::DbClient;

#[derive(Debug, Clone)]
pub struct SqlWebhookEventRepository {
    db_client: DbClient,
}

impl SqlWebhookEventRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

async fn find_on(
    conn: &mut AnyConnection,
    provider_event_id: &str,
    event_kind: &str,
) -> Result<Option<WebhookEventRecord>, DbError> {
    let query = format!(
        "SELECT {} FROM webhook_events WHERE provider_event_id = $1 AND event_kind = $2",
        WEBHOOK_EVENT_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(provider_event_id)
        .bind(event_kind)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

    row.as_ref().map(webhook_event_from_row).transpose()
}

#[async_trait]
impl WebhookEventRepository for SqlWebhookEventRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing webhook event schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS webhook_events (
                provider_event_id TEXT NOT NULL,
                event_kind TEXT NOT NULL,
                received_at TEXT NOT NULL,
                processed_at TEXT,
                processing_error TEXT,
                attempts BIGINT NOT NULL DEFAULT 0,
                payload TEXT NOT NULL,
                UNIQUE(provider_event_id, event_kind)
            )
        "#;

        self.db_client.execute(query).await?;

        info!("Webhook event schema initialized successfully");
        Ok(())
    }

    async fn find(
        &self,
        provider_event_id: &str,
        event_kind: &str,
    ) -> Result<Option<WebhookEventRecord>, DbError> {
        let mut conn = self
            .db_client
            .pool()
            .acquire()
            .await
            .map_err(|e| DbError::PoolError(e.to_string()))?;
        find_on(&mut conn, provider_event_id, event_kind).await
    }

    async fn record_received(&self, record: WebhookEventRecord) -> Result<bool, DbError> {
        debug!(
            "Recording webhook event {} ({})",
            record.provider_event_id, record.event_kind
        );

        let query = r#"
            INSERT INTO webhook_events
                (provider_event_id, event_kind, received_at, processed_at, processing_error, attempts, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#;

        let result = sqlx::query(query)
            .bind(&record.provider_event_id)
            .bind(&record.event_kind)
            .bind(format_timestamp(&record.received_at))
            .bind(record.processed_at.as_ref().map(format_timestamp))
            .bind(record.processing_error.clone())
            .bind(record.attempts)
            .bind(&record.payload)
            .execute(self.db_client.pool())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match DbError::from_query(e) {
                DbError::UniqueViolation(_) => {
                    debug!(
                        "Webhook event {} ({}) already recorded",
                        record.provider_event_id, record.event_kind
                    );
                    Ok(false)
                }
                other => {
                    error!("Failed to record webhook event: {}", other);
                    Err(other)
                }
            },
        }
    }

    async fn complete_with_transition(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        update: Option<BookingUpdate>,
    ) -> Result<CompletionOutcome, DbError> {
        let mut tx = self.db_client.begin().await?;

        match find_on(&mut tx, provider_event_id, event_kind).await? {
            None => {
                return Err(DbError::QueryError(format!(
                    "webhook event {} ({}) was never recorded",
                    provider_event_id, event_kind
                )));
            }
            Some(record) if record.is_processed() => return Ok(CompletionOutcome::AlreadyProcessed),
            Some(_) => {}
        }

        let query = r#"
            UPDATE webhook_events
            SET processed_at = $1, processing_error = NULL
            WHERE provider_event_id = $2 AND event_kind = $3 AND processed_at IS NULL
        "#;

        let marked = sqlx::query(query)
            .bind(format_timestamp(&now_utc()))
            .bind(provider_event_id)
            .bind(event_kind)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from_query)?;

        if marked.rows_affected() == 0 {
            return Ok(CompletionOutcome::AlreadyProcessed);
        }

        let booking = match update {
            Some(update) => match apply_booking_update(&mut tx, &update).await? {
                Some(booking) => Some(booking),
                None => {
                    warn!(
                        "Booking {} changed while processing {} ({}), rolling back",
                        update.booking_id, provider_event_id, event_kind
                    );
                    tx.rollback()
                        .await
                        .map_err(|e| DbError::TransactionError(e.to_string()))?;
                    return Ok(CompletionOutcome::BookingChanged);
                }
            },
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        debug!("Webhook event {} ({}) processed", provider_event_id, event_kind);
        Ok(CompletionOutcome::Completed(booking))
    }

    async fn mark_failed(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError> {
        let query = r#"
            UPDATE webhook_events
            SET processing_error = $1, attempts = attempts + 1
            WHERE provider_event_id = $2 AND event_kind = $3 AND processed_at IS NULL
        "#;

        sqlx::query(query)
            .bind(error)
            .bind(provider_event_id)
            .bind(event_kind)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to store processing error: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        Ok(())
    }

    async fn abandon(
        &self,
        provider_event_id: &str,
        event_kind: &str,
        error: &str,
    ) -> Result<(), DbError> {
        let query = r#"
            UPDATE webhook_events
            SET processed_at = $1, processing_error = $2
            WHERE provider_event_id = $3 AND event_kind = $4 AND processed_at IS NULL
        "#;

        sqlx::query(query)
            .bind(format_timestamp(&now_utc()))
            .bind(error)
            .bind(provider_event_id)
            .bind(event_kind)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        warn!("Webhook event {} ({}) closed unapplied", provider_event_id, event_kind);
        Ok(())
    }

    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<WebhookEventRecord>, DbError> {
        let query = format!(
            "SELECT {} FROM webhook_events WHERE processed_at IS NULL \
             ORDER BY attempts ASC, received_at ASC LIMIT $1",
            WEBHOOK_EVENT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        rows.iter().map(webhook_event_from_row).collect()
    }
}
