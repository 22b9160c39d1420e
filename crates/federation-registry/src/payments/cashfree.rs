use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{PaymentConfig, ProcessorCredentials};

use super::domain::{OrderRequest, PaymentStatus, ProcessorSession};
use super::processor::{PaymentError, PaymentProcessor};

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    order_id: &'a str,
    order_amount: f64,
    order_currency: &'a str,
    customer_details: CustomerBody<'a>,
    order_meta: OrderMeta<'a>,
}

#[derive(Serialize)]
struct CustomerBody<'a> {
    customer_id: &'a str,
    customer_name: &'a str,
    customer_email: &'a str,
    customer_phone: &'a str,
}

#[derive(Serialize)]
struct OrderMeta<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    return_url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    notify_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    payment_session_id: Option<String>,
    #[serde(default)]
    order_status: Option<String>,
    #[serde(default)]
    payment_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// REST client for a Cashfree-style orders API.
#[derive(Debug, Clone)]
pub struct CashfreeProcessor {
    client: reqwest::Client,
    api_base: String,
    api_version: String,
    credentials: ProcessorCredentials,
}

impl CashfreeProcessor {
    pub fn new(
        config: &PaymentConfig,
        credentials: ProcessorCredentials,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PaymentError::Transport(format!("http client build failed: {err}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            credentials,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header("x-client-id", &self.credentials.app_id)
            .header("x-client-secret", &self.credentials.secret_key)
            .header("x-api-version", &self.api_version)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, PaymentError> {
        builder
            .send()
            .await
            .map_err(|err| PaymentError::Transport(err.to_string()))
    }
}

async fn processor_failure(response: reqwest::Response) -> PaymentError {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    PaymentError::Processor {
        status: status.as_u16(),
        message,
    }
}

async fn decode_order(response: reqwest::Response) -> Result<OrderResponse, PaymentError> {
    response
        .json::<OrderResponse>()
        .await
        .map_err(|err| PaymentError::Transport(format!("unreadable processor response: {err}")))
}

#[async_trait]
impl PaymentProcessor for CashfreeProcessor {
    fn name(&self) -> &'static str {
        "cashfree"
    }

    async fn open_session(&self, order: &OrderRequest) -> Result<ProcessorSession, PaymentError> {
        let body = CreateOrderBody {
            order_id: &order.order_id,
            order_amount: order.amount,
            order_currency: order.currency,
            customer_details: CustomerBody {
                customer_id: &order.customer.id,
                customer_name: &order.customer.name,
                customer_email: &order.customer.email,
                customer_phone: &order.customer.phone,
            },
            order_meta: OrderMeta {
                return_url: &order.return_url,
                notify_url: &order.notify_url,
            },
        };

        let response = self
            .send(self.request(Method::POST, "/orders").json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(processor_failure(response).await);
        }

        let created = decode_order(response).await?;
        let session_id = created.payment_session_id.ok_or_else(|| {
            PaymentError::Transport("processor response carried no payment_session_id".into())
        })?;
        Ok(ProcessorSession {
            session_id,
            redirect_url: created.payment_link,
            status: created
                .order_status
                .as_deref()
                .map_or(PaymentStatus::Created, PaymentStatus::from_processor),
        })
    }

    async fn fetch_status(&self, order_id: &str) -> Result<PaymentStatus, PaymentError> {
        let response = self
            .send(self.request(Method::GET, &format!("/orders/{order_id}")))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PaymentError::UnknownOrder(order_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(processor_failure(response).await);
        }

        let order = decode_order(response).await?;
        Ok(order
            .order_status
            .as_deref()
            .map_or(PaymentStatus::Pending, PaymentStatus::from_processor))
    }
}
