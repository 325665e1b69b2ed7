//! Webhook subscription provisioning (administrative).

use std::sync::Arc;

use slotsync_config::WebhookConfig;
use slotsync_provider::{ProviderClient, WebhookSubscriptionRequest};
use tracing::{error, info};

use crate::error::BookingError;
use crate::models::{ProvisionSubscriptionRequest, ProvisionSubscriptionResponse};
use crate::signing::SigningSecretManager;

const SCOPE_USER: &str = "user";
const SCOPE_ORGANIZATION: &str = "organization";

pub struct SubscriptionProvisioner {
    provider: Arc<dyn ProviderClient>,
    secrets: Arc<SigningSecretManager>,
    config: WebhookConfig,
}

impl SubscriptionProvisioner {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        secrets: Arc<SigningSecretManager>,
        config: WebhookConfig,
    ) -> Self {
        Self {
            provider,
            secrets,
            config,
        }
    }

    /// Registers the callback with the provider under a freshly generated
    /// signing key. The key becomes active only once the provider accepted it;
    /// the previous key keeps verifying until it is retired.
    pub async fn provision(
        &self,
        request: ProvisionSubscriptionRequest,
    ) -> Result<ProvisionSubscriptionResponse, BookingError> {
        let callback_url = request
            .callback_url
            .unwrap_or_else(|| self.config.callback_url.clone());
        if callback_url.trim().is_empty() {
            return Err(BookingError::Configuration(
                "no webhook callback URL configured".to_string(),
            ));
        }
        let events = request
            .events
            .filter(|events| !events.is_empty())
            .unwrap_or_else(|| self.config.events.clone());
        let scope = request.scope.unwrap_or_else(|| self.config.scope.clone());
        if scope != SCOPE_USER && scope != SCOPE_ORGANIZATION {
            return Err(BookingError::MalformedPayload(format!(
                "scope must be '{}' or '{}', got '{}'",
                SCOPE_USER, SCOPE_ORGANIZATION, scope
            )));
        }

        let account = self.provider.get_current_account().await.map_err(|e| {
            let err = BookingError::from(e);
            if matches!(err, BookingError::ProviderAuthError(_)) {
                error!("Provider credentials rejected during provisioning: {}", err);
            }
            err
        })?;
        let organization = account.organization_uri.clone().ok_or_else(|| {
            BookingError::Configuration(format!(
                "provider account {} has no organization",
                account.uri
            ))
        })?;

        let signing_key = SigningSecretManager::generate();
        let subscription = self
            .provider
            .create_webhook_subscription(WebhookSubscriptionRequest {
                url: callback_url,
                events,
                organization,
                user: (scope == SCOPE_USER).then(|| account.uri.clone()),
                scope,
                signing_key: signing_key.clone(),
            })
            .await?;
        self.secrets.rotate(signing_key.clone()).await;

        info!(
            "Webhook subscription {} registered for {} ({} events)",
            subscription.uri,
            subscription.callback_url,
            subscription.events.len()
        );
        Ok(ProvisionSubscriptionResponse {
            subscription,
            signing_key,
        })
    }
}
