//! Out-of-band reconciliation.
//!
//! Replays stored webhook events whose processing failed and completes confirmed
//! bookings once their session is well past. The least attempted events go
//! first, so events that never match cannot starve newer ones; after
//! `reconcile_max_attempts` failures an event is closed unapplied.
//!
//! Safe to run concurrently with live deliveries: every write goes through the
//! same compare-and-swap.

use std::sync::Arc;

use chrono::Duration;
use slotsync_config::BookingConfig;
use slotsync_db::models::now_utc;
use slotsync_db::Repositories;
use tracing::{debug, info, warn};

use crate::error::BookingError;
use crate::models::ReconcileReport;
use crate::transitions::{plan_update, BookingEvent, Correlation};
use crate::webhook::{WebhookOutcome, WebhookProcessor};

pub struct Reconciler {
    repos: Repositories,
    webhooks: Arc<WebhookProcessor>,
    config: BookingConfig,
}

impl Reconciler {
    pub fn new(repos: Repositories, webhooks: Arc<WebhookProcessor>, config: BookingConfig) -> Self {
        Self {
            repos,
            webhooks,
            config,
        }
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, BookingError> {
        let mut report = ReconcileReport::default();
        let batch = self.config.reconcile_batch_size.max(1);

        for record in self.repos.webhook_events.list_unprocessed(batch).await? {
            if record.attempts >= self.config.reconcile_max_attempts {
                let reason = record.processing_error.as_deref().unwrap_or("no matching booking");
                warn!(
                    "Giving up on event {} ({}) after {} attempts: {}",
                    record.provider_event_id, record.event_kind, record.attempts, reason
                );
                self.repos
                    .webhook_events
                    .abandon(&record.provider_event_id, &record.event_kind, reason)
                    .await?;
                report.abandoned += 1;
                continue;
            }
            report.replayed += 1;
            let outcome = self.webhooks.process_record(&record).await?;
            if let WebhookOutcome::Deferred { reason } = outcome {
                debug!(
                    "Event {} ({}) still failing: {}",
                    record.provider_event_id, record.event_kind, reason
                );
                report.still_failing += 1;
            }
        }

        let cutoff = now_utc() - Duration::hours(self.config.completion_grace_hours);
        for booking in self
            .repos
            .bookings
            .find_confirmed_ended_before(cutoff, batch)
            .await?
        {
            let Some(update) = plan_update(&booking, BookingEvent::Completed, &Correlation::default())?
            else {
                continue;
            };
            match self.repos.bookings.apply_update(update).await? {
                Some(_) => report.completed += 1,
                None => warn!("Booking {} changed while being completed", booking.id),
            }
        }

        info!(
            "Reconciliation replayed {} events ({} still failing, {} abandoned), completed {} bookings",
            report.replayed, report.still_failing, report.abandoned, report.completed
        );
        Ok(report)
    }
}
