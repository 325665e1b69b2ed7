use reqwest::Client;
use slotsync_common::create_client;
use slotsync_common::services::{BoxFuture, PaymentHandle, PaymentRequest, PaymentService};
use slotsync_config::{env_vars, AppConfig, StripeConfig};

use crate::error::StripeError;
use crate::logic::create_checkout_session;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Stripe Checkout backed [`PaymentService`].
pub struct StripePaymentService {
    client: Client,
    config: StripeConfig,
    secret_key: String,
}

impl StripePaymentService {
    pub fn new(config: StripeConfig, secret_key: impl Into<String>) -> Result<Self, StripeError> {
        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(StripeError::ConfigError("Stripe secret key is empty".to_string()));
        }
        Ok(Self {
            client: create_client(REQUEST_TIMEOUT_SECS, false)?,
            config,
            secret_key,
        })
    }

    /// Builds the service from the `[stripe]` section and the secret key in the environment.
    pub fn from_app_config(app_config: &AppConfig) -> Result<Self, StripeError> {
        let config = app_config
            .stripe
            .clone()
            .ok_or_else(|| StripeError::ConfigError("[stripe] section is missing".to_string()))?;
        let secret_key = env_vars::get_secret_env_var(env_vars::STRIPE_SECRET_KEY).ok_or_else(|| {
            StripeError::ConfigError(format!(
                "{} is not set",
                env_vars::secret_path_to_env_var(env_vars::STRIPE_SECRET_KEY)
            ))
        })?;
        Self::new(config, secret_key)
    }
}

impl PaymentService for StripePaymentService {
    type Error = StripeError;

    fn initiate_payment(&self, request: PaymentRequest) -> BoxFuture<'_, PaymentHandle, Self::Error> {
        Box::pin(async move {
            let session =
                create_checkout_session(&self.client, &self.config, &self.secret_key, &request).await?;
            Ok(PaymentHandle {
                reference: session.session_id,
                checkout_url: Some(session.url),
                processor: "stripe".to_string(),
            })
        })
    }
}
