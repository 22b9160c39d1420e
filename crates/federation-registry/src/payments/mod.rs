//! Registration fee collection through an external payment processor.
//!
//! Sessions are tracked in an in-process ledger that is informational only; approval never
//! depends on payment state.

pub mod broker;
pub mod cashfree;
pub mod domain;
pub mod ledger;
pub mod processor;
pub mod router;
pub mod webhook;

use std::sync::Arc;

use crate::config::PaymentConfig;

pub use broker::{generate_order_id, PaymentBroker};
pub use cashfree::CashfreeProcessor;
pub use domain::{
    CallbackOutcome, OrderContext, PaymentSession, PaymentStatus, PaymentStatusView, CURRENCY,
};
pub use processor::{PaymentError, PaymentProcessor, SyntheticProcessor};
pub use router::payment_router;
pub use webhook::WebhookVerifier;

/// Live processor when credentials are configured, the synthetic one otherwise.
pub fn broker_from_config(config: &PaymentConfig) -> Result<PaymentBroker, PaymentError> {
    let processor: Arc<dyn PaymentProcessor> = match &config.credentials {
        Some(credentials) => Arc::new(CashfreeProcessor::new(config, credentials.clone())?),
        None => {
            tracing::warn!("payment credentials not configured; using the synthetic processor");
            Arc::new(SyntheticProcessor::default())
        }
    };

    Ok(PaymentBroker::new(
        processor,
        WebhookVerifier::new(config.webhook_secret.clone()),
        config.return_url.clone(),
        config.notify_url.clone(),
    ))
}
