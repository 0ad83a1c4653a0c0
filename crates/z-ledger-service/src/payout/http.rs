//! HTTP payout channel for the disbursement provider's `/v2/payouts` API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{channel_code, PayoutChannel, PayoutError, PayoutReceipt, PayoutRequest};
use crate::config::PayoutProviderConfig;

/// Request timeout for the HTTP client.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Payout channel backed by the provider's REST API.
#[derive(Clone)]
pub struct HttpPayoutChannel {
    client: Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Serialize)]
struct PayoutBody<'a> {
    reference_id: &'a str,
    channel_code: String,
    channel_properties: ChannelProperties<'a>,
    amount: i64,
    currency: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct ChannelProperties<'a> {
    account_holder_name: &'a str,
    account_number: &'a str,
}

impl HttpPayoutChannel {
    /// Create a channel from provider settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &PayoutProviderConfig) -> Result<Self, PayoutError> {
        if config.secret_key.is_empty() {
            return Err(PayoutError::Configuration("payout secret key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PayoutChannel for HttpPayoutChannel {
    async fn submit(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        let channel_code = channel_code(&request.destination)?;

        let body = PayoutBody {
            reference_id: &request.reference_id,
            channel_code,
            channel_properties: ChannelProperties {
                account_holder_name: &request.destination.holder_name,
                account_number: &request.destination.account_number,
            },
            amount: request.amount,
            currency: &request.currency,
            description: &request.description,
        };

        tracing::debug!(
            reference_id = %request.reference_id,
            channel_code = %body.channel_code,
            amount = request.amount,
            "Submitting payout"
        );

        let response = self
            .client
            .post(format!("{}/v2/payouts", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-key", &request.idempotency_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(
                reference_id = %request.reference_id,
                status = %status,
                "Payout provider rejected submission"
            );
            return Err(PayoutError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: PayoutReceipt = response.json().await?;
        tracing::info!(
            reference_id = %request.reference_id,
            payout_id = %receipt.payout_id,
            status = %receipt.status,
            "Payout submitted"
        );
        Ok(receipt)
    }
}
