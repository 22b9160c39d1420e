use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use super::domain::{
    CallbackOutcome, CallbackPayload, CustomerDetails, OrderContext, OrderRequest,
    PaymentSession, PaymentStatus, PaymentStatusView, CURRENCY,
};
use super::ledger::SessionLedger;
use super::processor::{PaymentError, PaymentProcessor};
use super::webhook::WebhookVerifier;

/// Opens payment sessions, checks their status, and applies authenticated callbacks.
pub struct PaymentBroker {
    processor: Arc<dyn PaymentProcessor>,
    ledger: SessionLedger,
    verifier: WebhookVerifier,
    return_url: String,
    notify_url: String,
}

impl PaymentBroker {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        verifier: WebhookVerifier,
        return_url: impl Into<String>,
        notify_url: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            ledger: SessionLedger::default(),
            verifier,
            return_url: return_url.into(),
            notify_url: notify_url.into(),
        }
    }

    pub fn processor_name(&self) -> &'static str {
        self.processor.name()
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub async fn create_session(
        &self,
        context: OrderContext,
    ) -> Result<PaymentSession, PaymentError> {
        let order = self.order_request(context)?;
        if self.ledger.contains(&order.order_id)? {
            return Err(PaymentError::DuplicateOrder(order.order_id));
        }
        let opened = self.processor.open_session(&order).await?;

        let now = Utc::now();
        let session = PaymentSession {
            order_id: order.order_id,
            amount: order.amount,
            currency: order.currency.to_string(),
            customer: order.customer,
            session_id: opened.session_id,
            redirect_url: opened.redirect_url,
            status: opened.status,
            processor: self.processor.name(),
            created_at: now,
            updated_at: now,
        };
        self.ledger.record(session.clone())?;
        tracing::info!(
            order_id = %session.order_id,
            amount = session.amount,
            processor = session.processor,
            "payment session opened"
        );
        Ok(session)
    }

    pub async fn verify(&self, order_id: &str) -> Result<PaymentStatusView, PaymentError> {
        let order_id = order_id.trim();
        if !valid_order_id(order_id) {
            return Err(PaymentError::UnknownOrder(order_id.to_string()));
        }

        let status = self.processor.fetch_status(order_id).await?;
        self.ledger.set_status(order_id, status)?;
        Ok(PaymentStatusView {
            order_id: order_id.to_string(),
            status,
            updated_at: Utc::now(),
        })
    }

    /// Signature first; the body is only parsed once it is authenticated.
    pub fn handle_callback(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> Result<CallbackOutcome, PaymentError> {
        if let Err(err) = self.verifier.verify(signature, timestamp, body) {
            tracing::warn!(error = %err, "payment callback rejected");
            return Err(err);
        }

        let payload: CallbackPayload = serde_json::from_slice(body)
            .map_err(|err| PaymentError::MalformedCallback(err.to_string()))?;
        let order_id = payload.data.order.order_id;
        let status = payload
            .data
            .payment
            .and_then(|payment| payment.payment_status)
            .map_or(PaymentStatus::Pending, |raw| {
                PaymentStatus::from_processor(&raw)
            });

        let tracked = self.ledger.set_status(&order_id, status)?;
        tracing::info!(
            %order_id,
            %status,
            tracked,
            event = payload.event_type.as_deref().unwrap_or("unknown"),
            "payment callback applied"
        );
        Ok(CallbackOutcome {
            order_id,
            status,
            tracked,
        })
    }

    fn order_request(&self, context: OrderContext) -> Result<OrderRequest, PaymentError> {
        if !context.order_amount.is_finite() || context.order_amount <= 0.0 {
            return Err(PaymentError::Validation(
                "order amount must be greater than zero".into(),
            ));
        }

        let missing: Vec<&str> = [
            ("customerName", context.customer_name.as_str()),
            ("customerEmail", context.customer_email.as_str()),
            ("customerPhone", context.customer_phone.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(PaymentError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let order_id = match context.order_id.filter(|id| !id.trim().is_empty()) {
            Some(id) if valid_order_id(id.trim()) => id.trim().to_string(),
            Some(id) => {
                return Err(PaymentError::Validation(format!(
                    "order id '{id}' may only contain letters, digits, '-' and '_'"
                )))
            }
            None => generate_order_id(),
        };

        let email = context.customer_email.trim().to_ascii_lowercase();
        let customer_id = context
            .customer_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| customer_id_from_email(&email));

        Ok(OrderRequest {
            order_id,
            amount: context.order_amount,
            currency: CURRENCY,
            customer: CustomerDetails {
                id: customer_id,
                name: context.customer_name.trim().to_string(),
                email,
                phone: context.customer_phone.trim().to_string(),
            },
            return_url: self.return_url.clone(),
            notify_url: self.notify_url.clone(),
        })
    }
}

/// `order_{unix_millis}_{4 digits}`.
pub fn generate_order_id() -> String {
    let suffix = rand::thread_rng().gen_range(1000..=9999u16);
    format!("order_{}_{suffix}", Utc::now().timestamp_millis())
}

fn valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id.len() <= 64
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn customer_id_from_email(email: &str) -> String {
    email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
