use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::api::{Classify, ErrorKind};

use super::domain::{OrderRequest, PaymentStatus, ProcessorSession};
use super::ledger::MAX_TRACKED_SESSIONS;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("order '{0}' not found")]
    UnknownOrder(String),
    #[error("callback signature could not be verified")]
    Unauthenticated,
    #[error("callback timestamp is outside the accepted window")]
    StaleCallback,
    #[error("order '{0}' already has a payment session")]
    DuplicateOrder(String),
    #[error("malformed callback payload: {0}")]
    MalformedCallback(String),
    #[error("payment processor request failed: {0}")]
    Transport(String),
    #[error("payment processor returned {status}: {message}")]
    Processor { status: u16, message: String },
    #[error("payment ledger unavailable")]
    Ledger,
}

impl Classify for PaymentError {
    fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Validation(_) | PaymentError::MalformedCallback(_) => {
                ErrorKind::Validation
            }
            PaymentError::UnknownOrder(_) => ErrorKind::NotFound,
            PaymentError::Unauthenticated | PaymentError::StaleCallback => {
                ErrorKind::Unauthorized
            }
            PaymentError::DuplicateOrder(_) => ErrorKind::Duplicate,
            PaymentError::Transport(_)
            | PaymentError::Processor { .. }
            | PaymentError::Ledger => ErrorKind::Upstream,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PaymentError::Transport(_) | PaymentError::Processor { .. } => StatusCode::BAD_GATEWAY,
            other => other.kind().status(),
        }
    }
}

/// External payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open_session(&self, order: &OrderRequest) -> Result<ProcessorSession, PaymentError>;

    async fn fetch_status(&self, order_id: &str) -> Result<PaymentStatus, PaymentError>;
}

/// Stand-in used when no processor credentials are configured. Sessions redirect straight to
/// the return URL and every order it issued reports `paid`.
/// Only the most recent orders are remembered.
#[derive(Debug)]
pub struct SyntheticProcessor {
    issued: Mutex<IssuedOrders>,
}

impl Default for SyntheticProcessor {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_SESSIONS)
    }
}

impl SyntheticProcessor {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            issued: Mutex::new(IssuedOrders {
                ids: HashSet::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }
}

#[derive(Debug)]
struct IssuedOrders {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl IssuedOrders {
    fn insert(&mut self, order_id: &str) {
        if !self.ids.insert(order_id.to_string()) {
            return;
        }
        self.order.push_back(order_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

#[async_trait]
impl PaymentProcessor for SyntheticProcessor {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn open_session(&self, order: &OrderRequest) -> Result<ProcessorSession, PaymentError> {
        self.issued
            .lock()
            .map_err(|_| PaymentError::Ledger)?
            .insert(&order.order_id);

        let separator = if order.return_url.contains('?') { '&' } else { '?' };
        Ok(ProcessorSession {
            session_id: format!("synthetic_{}", order.order_id),
            redirect_url: Some(format!(
                "{}{separator}order_id={}",
                order.return_url, order.order_id
            )),
            status: PaymentStatus::Created,
        })
    }

    async fn fetch_status(&self, order_id: &str) -> Result<PaymentStatus, PaymentError> {
        let issued = self.issued.lock().map_err(|_| PaymentError::Ledger)?;
        if issued.ids.contains(order_id) {
            Ok(PaymentStatus::Paid)
        } else {
            Err(PaymentError::UnknownOrder(order_id.to_string()))
        }
    }
}
