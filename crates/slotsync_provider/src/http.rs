//! HTTP implementation of [`ProviderClient`] against the Calendly v2 API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use slotsync_common::create_client;
use slotsync_config::env_vars::{get_secret_env_var, PROVIDER_API_TOKEN};
use slotsync_config::{AppConfig, ProviderConfig};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::client::ProviderClient;
use crate::error::ProviderError;
use crate::models::{
    id_from_uri, Collection, EventType, ProviderAccount, RawAvailableTime, RawEventType, RawUser,
    Resource, TimeSlot, WebhookSubscription, WebhookSubscriptionRequest,
};
use crate::pages::EventTypePages;
use crate::retry::{is_retryable_error, is_retryable_status, retry_after, RetryPolicy};
use crate::window::{merge_slots, split_window};

const PAGE_SIZE: &str = "100";

pub struct HttpProviderClient {
    client: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    max_window_days: i64,
    max_window_chunks: usize,
    account: OnceCell<ProviderAccount>,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig, token: impl Into<String>) -> Result<Self, ProviderError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "provider API token is empty".to_string(),
            ));
        }
        let client = create_client(config.request_timeout_secs, true)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            max_window_days: config.max_window_days,
            max_window_chunks: config.max_window_chunks,
            account: OnceCell::new(),
        })
    }

    /// Builds the client from the `[provider]` section and the API token secret.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let provider_config = config.provider.as_ref().ok_or_else(|| {
            ProviderError::Configuration("provider configuration is missing".to_string())
        })?;
        let token = get_secret_env_var(PROVIDER_API_TOKEN).ok_or_else(|| {
            ProviderError::Configuration("provider API token is not set".to_string())
        })?;
        Self::new(provider_config, token)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Lazy, restartable pager over the account's event types.
    pub fn event_type_pages(&self, user_uri: &str) -> Result<EventTypePages<'_>, ProviderError> {
        let first = Url::parse_with_params(
            &self.endpoint("event_types"),
            &[("user", user_uri), ("count", PAGE_SIZE)],
        )
        .map_err(|e| ProviderError::Configuration(format!("invalid base URL: {}", e)))?;
        Ok(EventTypePages::new(self, first.to_string()))
    }

    pub async fn get_event_type(&self, event_type_uri: &str) -> Result<EventType, ProviderError> {
        let url = self.endpoint(&format!("event_types/{}", id_from_uri(event_type_uri)));
        let raw: Resource<RawEventType> = self.get_json(&url, &[]).await?;
        Ok(raw.resource.into())
    }

    /// GET with retries on 429/5xx and transient transport failures.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut retry = 0;
        loop {
            debug!("GET {} (attempt {})", url, retry + 1);
            let result = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .query(query)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(ProviderError::from);
                }
                Ok(response) => {
                    let status = response.status();
                    if is_retryable_status(status) && retry < self.retry.max_retries {
                        let delay = self.retry.delay_for(retry, retry_after(response.headers()));
                        warn!(
                            "Provider answered {} for {}, retrying in {:?}",
                            status, url, delay
                        );
                        tokio::time::sleep(delay).await;
                        retry += 1;
                        continue;
                    }
                    return Err(error_from_response(response).await);
                }
                Err(err) => {
                    if is_retryable_error(&err) && retry < self.retry.max_retries {
                        let delay = self.retry.delay_for(retry, None);
                        warn!("Provider request to {} failed ({}), retrying in {:?}", url, err, delay);
                        tokio::time::sleep(delay).await;
                        retry += 1;
                        continue;
                    }
                    error!("Provider request to {} failed: {}", url, err);
                    return Err(ProviderError::from(err));
                }
            }
        }
    }

    async fn fetch_chunk(
        &self,
        event_type_uri: &str,
        duration_minutes: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, ProviderError> {
        let url = self.endpoint("event_type_available_times");
        let query = [
            ("event_type", event_type_uri.to_string()),
            ("start_time", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end_time", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];

        let page: Collection<RawAvailableTime> = match self.get_json(&url, &query).await {
            Err(ProviderError::Api { status: 400, message }) => {
                return Err(ProviderError::InvalidDateRange(message));
            }
            other => other?,
        };

        let slot_length = chrono::Duration::minutes(duration_minutes);
        Ok(page
            .collection
            .into_iter()
            .map(|raw| TimeSlot {
                start_time: raw.start_time,
                end_time: raw.start_time + slot_length,
                remaining_capacity: if raw.status == "available" {
                    raw.invitees_remaining
                } else {
                    0
                },
                scheduling_handle: raw.scheduling_url,
            })
            .collect())
    }
}

impl std::fmt::Debug for HttpProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("max_window_days", &self.max_window_days)
            .field("max_window_chunks", &self.max_window_chunks)
            .finish_non_exhaustive()
    }
}

/// Turns a non-success answer into the matching error.
async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("title"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("Provider rejected credentials: {} {}", status, message);
            ProviderError::Auth {
                status: status.as_u16(),
                message,
            }
        }
        s if is_retryable_status(s) => {
            ProviderError::Unavailable(format!("status {}: {}", s.as_u16(), message))
        }
        s => ProviderError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn get_current_account(&self) -> Result<ProviderAccount, ProviderError> {
        let account = self
            .account
            .get_or_try_init(|| async {
                let me: Resource<RawUser> = self.get_json(&self.endpoint("users/me"), &[]).await?;
                let account = ProviderAccount::from(me.resource);
                info!("Provider account resolved: {}", account.uri);
                Ok::<_, ProviderError>(account)
            })
            .await?;
        Ok(account.clone())
    }

    async fn list_event_types(&self) -> Result<Vec<EventType>, ProviderError> {
        let account = self.get_current_account().await?;
        let mut pages = self.event_type_pages(&account.uri)?;
        let mut all = Vec::new();
        while let Some(page) = pages.next_page().await? {
            all.extend(page);
        }
        debug!("Listed {} provider event types", all.len());
        Ok(all)
    }

    async fn get_available_times(
        &self,
        event_type_uri: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, ProviderError> {
        let chunks = split_window(
            start,
            end,
            self.max_window_days,
            self.max_window_chunks,
            Utc::now(),
        )?;
        let event_type = self.get_event_type(event_type_uri).await?;

        let mut slots = Vec::new();
        for (chunk_start, chunk_end) in &chunks {
            slots.extend(
                self.fetch_chunk(event_type_uri, event_type.duration_minutes, *chunk_start, *chunk_end)
                    .await?,
            );
        }

        let window_start = chunks.first().map(|c| c.0).unwrap_or(start);
        let merged = merge_slots(slots, window_start, end);
        debug!(
            "{} slots for {} across {} provider calls",
            merged.len(),
            event_type_uri,
            chunks.len()
        );
        Ok(merged)
    }

    async fn create_webhook_subscription(
        &self,
        request: WebhookSubscriptionRequest,
    ) -> Result<WebhookSubscription, ProviderError> {
        let url = self.endpoint("webhook_subscriptions");
        info!(
            "Registering webhook subscription for {} ({} events)",
            request.url,
            request.events.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Webhook subscription request failed: {}", e);
                ProviderError::from(e)
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let created: Resource<WebhookSubscription> = response.json().await?;
        Ok(created.resource)
    }
}
