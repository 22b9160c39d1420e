use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CURRENCY: &str = "INR";

/// Client request for `POST /payments/create-session`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderContext {
    pub order_id: Option<String>,
    pub order_amount: f64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Order forwarded to a processor.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub order_id: String,
    pub amount: f64,
    pub currency: &'static str,
    pub customer: CustomerDetails,
    pub return_url: String,
    pub notify_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    /// Maps processor order and payment states. Unknown values are treated as pending.
    pub fn from_processor(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" | "SUCCESS" => PaymentStatus::Paid,
            "EXPIRED" => PaymentStatus::Expired,
            "FAILED" | "CANCELLED" | "USER_DROPPED" | "TERMINATED" | "VOID" => {
                PaymentStatus::Failed
            }
            "CREATED" => PaymentStatus::Created,
            _ => PaymentStatus::Pending,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a processor hands back when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSession {
    pub session_id: String,
    pub redirect_url: Option<String>,
    pub status: PaymentStatus,
}

/// Ledger entry for an opened session. Not authoritative for approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub order_id: String,
    pub amount: f64,
    pub currency: String,
    pub customer: CustomerDetails,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub status: PaymentStatus,
    pub processor: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of `GET /payments/verify/:orderId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub order_id: String,
    pub status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
}

/// Authenticated callback, reduced to the fields the ledger needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    pub data: CallbackData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackData {
    pub order: CallbackOrder,
    #[serde(default)]
    pub payment: Option<CallbackPayment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackOrder {
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayment {
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// Reply to an authenticated callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutcome {
    pub order_id: String,
    pub status: PaymentStatus,
    pub tracked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_processor_states() {
        assert_eq!(PaymentStatus::from_processor("PAID"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_processor("success"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_processor("ACTIVE"), PaymentStatus::Pending);
        assert_eq!(
            PaymentStatus::from_processor("USER_DROPPED"),
            PaymentStatus::Failed
        );
        assert_eq!(PaymentStatus::from_processor("EXPIRED"), PaymentStatus::Expired);
    }
}
