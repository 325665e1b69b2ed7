//! Row decoding shared by the SQL repositories.
//!
//! `sqlx::Any` has no chrono or bool codec, so timestamps come back as text and
//! flags as integers.

use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Row};

use crate::error::DbError;
use crate::models::{
    format_timestamp, now_utc, parse_timestamp, Booking, BookingUpdate, EventMapping, SessionType,
    WebhookEventRecord,
};

pub(crate) const BOOKING_COLUMNS: &str = "id, session_type_id, builder_id, client_name, \
    client_email, client_timezone, notes, start_time, end_time, status, payment_status, \
    provider_confirmed, payment_reference, provider_event_uri, provider_invitee_uri, \
    created_at, updated_at";

pub(crate) const WEBHOOK_EVENT_COLUMNS: &str =
    "provider_event_id, event_kind, received_at, processed_at, processing_error, attempts, payload";

fn get<'r, T>(row: &'r AnyRow, column: &str) -> Result<T, DbError>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get(column)
        .map_err(|e| DbError::DecodeError(format!("column '{}': {}", column, e)))
}

fn get_flag(row: &AnyRow, column: &str) -> Result<bool, DbError> {
    get::<i64>(row, column).map(|v| v != 0)
}

fn get_time(row: &AnyRow, column: &str) -> Result<chrono::DateTime<chrono::Utc>, DbError> {
    parse_timestamp(&get::<String>(row, column)?)
}

pub(crate) fn session_type_from_row(row: &AnyRow) -> Result<SessionType, DbError> {
    Ok(SessionType {
        id: get(row, "id")?,
        builder_id: get(row, "builder_id")?,
        title: get(row, "title")?,
        duration_minutes: get(row, "duration_minutes")?,
        price_minor: get(row, "price_minor")?,
        currency: get(row, "currency")?,
        is_active: get_flag(row, "is_active")?,
        requires_auth: get_flag(row, "requires_auth")?,
    })
}

pub(crate) fn event_mapping_from_row(row: &AnyRow) -> Result<EventMapping, DbError> {
    Ok(EventMapping {
        session_type_id: get(row, "session_type_id")?,
        provider_event_type_id: get(row, "provider_event_type_id")?,
        provider_event_type_uri: get(row, "provider_event_type_uri")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

pub(crate) fn booking_from_row(row: &AnyRow) -> Result<Booking, DbError> {
    Ok(Booking {
        id: get(row, "id")?,
        session_type_id: get(row, "session_type_id")?,
        builder_id: get(row, "builder_id")?,
        client_name: get(row, "client_name")?,
        client_email: get(row, "client_email")?,
        client_timezone: get(row, "client_timezone")?,
        notes: get(row, "notes")?,
        start_time: get_time(row, "start_time")?,
        end_time: get_time(row, "end_time")?,
        status: get::<String>(row, "status")?.parse()?,
        payment_status: get::<String>(row, "payment_status")?.parse()?,
        provider_confirmed: get_flag(row, "provider_confirmed")?,
        payment_reference: get(row, "payment_reference")?,
        provider_event_uri: get(row, "provider_event_uri")?,
        provider_invitee_uri: get(row, "provider_invitee_uri")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

pub(crate) fn webhook_event_from_row(row: &AnyRow) -> Result<WebhookEventRecord, DbError> {
    let processed_at = match get::<Option<String>>(row, "processed_at")? {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };
    Ok(WebhookEventRecord {
        provider_event_id: get(row, "provider_event_id")?,
        event_kind: get(row, "event_kind")?,
        received_at: get_time(row, "received_at")?,
        processed_at,
        processing_error: get(row, "processing_error")?,
        attempts: get(row, "attempts")?,
        payload: get(row, "payload")?,
    })
}

pub(crate) async fn fetch_booking(
    conn: &mut AnyConnection,
    booking_id: &str,
) -> Result<Option<Booking>, DbError> {
    let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
    let row = sqlx::query(&query)
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DbError::from_query)?;
    row.as_ref().map(booking_from_row).transpose()
}

/// Applies a compare-and-swap booking update on an open connection.
///
/// Returns `None` when the stored state no longer matches `update.expected`.
/// Canceling releases the slot by clearing `slot_key`.
pub(crate) async fn apply_booking_update(
    conn: &mut AnyConnection,
    update: &BookingUpdate,
) -> Result<Option<Booking>, DbError> {
    let query = r#"
        UPDATE bookings
        SET status = $1,
            payment_status = $2,
            provider_confirmed = $3,
            payment_reference = COALESCE($4, payment_reference),
            provider_event_uri = COALESCE($5, provider_event_uri),
            provider_invitee_uri = COALESCE($6, provider_invitee_uri),
            slot_key = CASE WHEN $7 = 1 THEN NULL ELSE slot_key END,
            updated_at = $8
        WHERE id = $9 AND status = $10 AND payment_status = $11 AND provider_confirmed = $12
    "#;

    let releases_slot = update.next.status == crate::models::BookingStatus::Canceled;
    let result = sqlx::query(query)
        .bind(update.next.status.as_str())
        .bind(update.next.payment_status.as_str())
        .bind(i64::from(update.next.provider_confirmed))
        .bind(update.payment_reference.clone())
        .bind(update.provider_event_uri.clone())
        .bind(update.provider_invitee_uri.clone())
        .bind(i64::from(releases_slot))
        .bind(format_timestamp(&now_utc()))
        .bind(&update.booking_id)
        .bind(update.expected.status.as_str())
        .bind(update.expected.payment_status.as_str())
        .bind(i64::from(update.expected.provider_confirmed))
        .execute(&mut *conn)
        .await
        .map_err(DbError::from_query)?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_booking(conn, &update.booking_id).await
}
