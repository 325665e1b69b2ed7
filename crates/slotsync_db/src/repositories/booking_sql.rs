//! SQL implementation of the booking repository
//!
//! Slot uniqueness is carried by the nullable `slot_key` column: a live booking
//! stores `"{session_type_id}|{start}"`, a canceled one stores NULL. A plain
//! UNIQUE constraint then admits any number of canceled rows per slot but only
//! one live row, on every backend the `Any` driver supports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::DbError;
use crate::models::{format_timestamp, slot_key, Booking, BookingUpdate};
use crate::repositories::rows::{apply_booking_update, booking_from_row, BOOKING_COLUMNS};
use crate::repository::BookingRepository;
use crate::DbClient;

#[derive(Debug, Clone)]
pub struct SqlBookingRepository {
    db_client: DbClient,
}

impl SqlBookingRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn find_one(&self, clause: &str, value: &str) -> Result<Option<Booking>, DbError> {
        let query = format!("SELECT {} FROM bookings WHERE {} = $1", BOOKING_COLUMNS, clause);
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find booking by {}: {}", clause, e);
                DbError::QueryError(e.to_string())
            })?;

        row.as_ref().map(booking_from_row).transpose()
    }
}

#[async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing booking schema");

        let query = r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                session_type_id TEXT NOT NULL,
                builder_id TEXT NOT NULL,
                client_name TEXT NOT NULL,
                client_email TEXT NOT NULL,
                client_timezone TEXT NOT NULL,
                notes TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                provider_confirmed BIGINT NOT NULL DEFAULT 0,
                payment_reference TEXT,
                provider_event_uri TEXT,
                provider_invitee_uri TEXT,
                slot_key TEXT UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        self.db_client.execute(query).await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_bookings_invitee ON bookings (provider_invitee_uri)",
            "CREATE INDEX IF NOT EXISTS idx_bookings_event ON bookings (provider_event_uri)",
            "CREATE INDEX IF NOT EXISTS idx_bookings_status_end ON bookings (status, end_time)",
        ] {
            self.db_client.execute(index).await?;
        }

        info!("Booking schema initialized successfully");
        Ok(())
    }

    async fn insert(&self, booking: Booking) -> Result<Booking, DbError> {
        debug!(
            "Inserting booking {} for session type {} at {}",
            booking.id, booking.session_type_id, booking.start_time
        );

        let query = format!(
            "INSERT INTO bookings ({}, slot_key) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            BOOKING_COLUMNS
        );

        let key = booking
            .holds_slot()
            .then(|| slot_key(&booking.session_type_id, &booking.start_time));

        sqlx::query(&query)
            .bind(&booking.id)
            .bind(&booking.session_type_id)
            .bind(&booking.builder_id)
            .bind(&booking.client_name)
            .bind(&booking.client_email)
            .bind(&booking.client_timezone)
            .bind(booking.notes.clone())
            .bind(format_timestamp(&booking.start_time))
            .bind(format_timestamp(&booking.end_time))
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .bind(i64::from(booking.provider_confirmed))
            .bind(booking.payment_reference.clone())
            .bind(booking.provider_event_uri.clone())
            .bind(booking.provider_invitee_uri.clone())
            .bind(format_timestamp(&booking.created_at))
            .bind(format_timestamp(&booking.updated_at))
            .bind(key)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| match DbError::from_query(e) {
                DbError::UniqueViolation(msg) => {
                    warn!("Slot already taken for booking {}: {}", booking.id, msg);
                    DbError::UniqueViolation(msg)
                }
                other => {
                    error!("Failed to insert booking: {}", other);
                    other
                }
            })?;

        info!("Booking {} created", booking.id);
        Ok(booking)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, DbError> {
        self.find_one("id", id).await
    }

    async fn find_by_invitee_uri(&self, uri: &str) -> Result<Option<Booking>, DbError> {
        self.find_one("provider_invitee_uri", uri).await
    }

    async fn find_by_event_uri(&self, uri: &str) -> Result<Option<Booking>, DbError> {
        self.find_one("provider_event_uri", uri).await
    }

    async fn find_by_slot(
        &self,
        session_type_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Option<Booking>, DbError> {
        self.find_one("slot_key", &slot_key(session_type_id, &start_time))
            .await
    }

    async fn apply_update(&self, update: BookingUpdate) -> Result<Option<Booking>, DbError> {
        debug!(
            "Updating booking {}: {} -> {}",
            update.booking_id, update.expected.status, update.next.status
        );

        let mut tx = self.db_client.begin().await?;
        let updated = apply_booking_update(&mut tx, &update).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        if updated.is_none() {
            debug!("Booking {} changed concurrently, update skipped", update.booking_id);
        }
        Ok(updated)
    }

    async fn find_confirmed_ended_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>, DbError> {
        let query = format!(
            "SELECT {} FROM bookings WHERE status = 'confirmed' AND end_time < $1 \
             ORDER BY end_time ASC LIMIT $2",
            BOOKING_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(format_timestamp(&cutoff))
            .bind(limit)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list finished bookings: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        rows.iter().map(booking_from_row).collect()
    }
}
