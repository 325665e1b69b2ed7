//! Service factory implementation.
//!
//! Builds the collaborator services that are enabled both as cargo features
//! and in the runtime configuration.
use slotsync_common::services::{BoxedError, PaymentService, ServiceFactory};
use slotsync_config::AppConfig;
use std::sync::Arc;
#[allow(unused_imports)] // used only by certain features
use {
    slotsync_common::services::BoxedPaymentService,
    tracing::{error, info, warn},
};

#[cfg(feature = "stripe")]
use slotsync_stripe::StripePaymentService;

/// Collaborators for the backend binary.
pub struct SlotsyncServiceFactory {
    payment_service: Option<Arc<dyn PaymentService<Error = BoxedError>>>,
}

impl SlotsyncServiceFactory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            payment_service: Self::build_payment_service(config),
        }
    }

    #[cfg(feature = "stripe")]
    fn build_payment_service(config: &AppConfig) -> Option<Arc<dyn PaymentService<Error = BoxedError>>> {
        if !slotsync_common::is_stripe_enabled(config) {
            info!("Stripe disabled in configuration; paid session types cannot be booked");
            return None;
        }
        match StripePaymentService::from_app_config(config) {
            Ok(service) => {
                info!("Stripe payment service initialized");
                Some(Arc::new(BoxedPaymentService::new(service)))
            }
            Err(e) => {
                error!("Failed to initialize Stripe payment service: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "stripe"))]
    fn build_payment_service(config: &AppConfig) -> Option<Arc<dyn PaymentService<Error = BoxedError>>> {
        if config.use_stripe {
            warn!("use_stripe is set but the binary was built without the stripe feature");
        }
        None
    }
}

impl ServiceFactory for SlotsyncServiceFactory {
    fn payment_service(&self) -> Option<Arc<dyn PaymentService<Error = BoxedError>>> {
        self.payment_service.clone()
    }
}
