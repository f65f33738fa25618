use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::{
    CheckoutMetadata, CreateSessionRequest, PaymentProvider, ProviderError, ProviderSession,
    SessionStatus,
};

/// Metadata key under which the checkout snapshot travels.
const METADATA_KEY: &str = "metadata[checkout]";

/// Stripe-style hosted checkout client. The API base is configurable so
/// tests can point it at a local mock server.
#[derive(Debug, Clone)]
pub struct StripeCheckoutProvider {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeCheckoutProvider {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// Creates a single-use percentage coupon on the provider so the hosted
    /// payment page charges exactly the server-computed total.
    async fn create_provider_coupon(&self, percent_off: i32) -> Result<String, ProviderError> {
        let params = vec![
            ("percent_off".to_string(), percent_off.to_string()),
            ("duration".to_string(), "once".to_string()),
            ("max_redemptions".to_string(), "1".to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/coupons", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let coupon: CouponResponse = decode_response(response).await?;
        Ok(coupon.id)
    }
}

#[async_trait]
impl PaymentProvider for StripeCheckoutProvider {
    #[instrument(skip(self, request), fields(reference = %request.client_reference))]
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProviderSession, ProviderError> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.client_reference.clone(),
            ),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            params.push((
                format!("line_items[{}][price_data][currency]", i),
                request.currency.clone(),
            ));
            params.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.unit_amount_minor.to_string(),
            ));
            params.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.name.clone(),
            ));
            params.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
        }

        if let Some(percent_off) = request.discount_percentage.filter(|p| *p > 0) {
            let coupon_id = self.create_provider_coupon(percent_off).await?;
            params.push(("discounts[0][coupon]".to_string(), coupon_id));
        }

        let snapshot = serde_json::to_string(&request.metadata)
            .map_err(|e| ProviderError::InvalidResponse(format!("metadata encode: {}", e)))?;
        params.push((METADATA_KEY.to_string(), snapshot));

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let session: SessionResponse = decode_response(response).await?;
        let url = session.url.ok_or_else(|| {
            ProviderError::InvalidResponse("checkout session missing redirect url".to_string())
        })?;

        Ok(ProviderSession {
            id: session.id,
            url,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ProviderError> {
        let response = self
            .http
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        let session: SessionResponse = decode_response(response).await?;

        let raw_metadata = session.metadata.checkout.ok_or_else(|| {
            ProviderError::InvalidResponse("checkout session missing metadata snapshot".to_string())
        })?;
        let metadata: CheckoutMetadata = serde_json::from_str(&raw_metadata)
            .map_err(|e| ProviderError::InvalidResponse(format!("metadata decode: {}", e)))?;

        let amount_minor = session.amount_total.unwrap_or_default();
        // Payment intent is the per-payment reference; fall back to the
        // session id for providers that omit it.
        let reference = session
            .payment_intent
            .unwrap_or_else(|| session.id.clone());

        Ok(SessionStatus {
            paid: session.payment_status.as_deref() == Some("paid"),
            reference,
            amount_total: Decimal::new(amount_minor, 2),
            metadata,
        })
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Unreachable(err.to_string())
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "provider API call failed");
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct CouponResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    payment_intent: Option<String>,
    amount_total: Option<i64>,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    checkout: Option<String>,
}
