use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::domain::value_objects::{
    plans::PlanCatalog,
    subscriptions::{CheckoutSessionDto, ProviderSubscriptionState},
};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook before it is rejected as a replay.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Metadata key carrying our user id through checkout and subscription objects.
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
    portal_return_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub client_reference_id: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StripeCheckoutSession {
    /// The user id from `metadata.userId`, falling back to `client_reference_id`.
    pub fn user_id(&self) -> Option<Uuid> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(USER_ID_METADATA_KEY))
            .or(self.client_reference_id.as_ref())
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

impl StripeSubscription {
    /// Returns the subscription period start timestamp, falling back to the first item
    /// or the billing cycle anchor when the top-level field is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .or(self.billing_cycle_anchor)
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    pub fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    /// Normalizes the provider object into the values we persist.
    pub fn to_provider_state(&self, catalog: &PlanCatalog) -> Result<ProviderSubscriptionState> {
        let start = self
            .period_start()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .with_context(|| format!("subscription {} has no usable period start", self.id))?;
        let end = self
            .period_end()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .with_context(|| format!("subscription {} has no usable period end", self.id))?;

        Ok(ProviderSubscriptionState {
            subscription_id: self.id.clone(),
            customer_id: self.customer.clone(),
            tier: self
                .price_id()
                .and_then(|price| catalog.find_tier_for_price_id(price)),
            status: self.status.clone(),
            current_period_start: start,
            current_period_end: end,
            cancel_at_period_end: self.cancel_at_period_end,
        })
    }
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
        portal_return_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
            portal_return_url,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Creates a subscription-mode Checkout Session for one seat of `price_id`.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        user_id: Uuid,
        customer_id: Option<String>,
    ) -> Result<CheckoutSessionDto> {
        // https://stripe.com/docs/api/checkout/sessions/create
        let body = checkout_form(
            price_id,
            user_id,
            customer_id,
            &self.success_url,
            &self.cancel_url,
        );

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))?;

        Ok(CheckoutSessionDto {
            session_id: parsed.id,
            url,
        })
    }

    /// Opens a billing-portal session for an existing customer and returns its URL.
    pub async fn create_billing_portal_session(&self, customer_id: &str) -> Result<String> {
        // https://stripe.com/docs/api/customer_portal/sessions/create
        let body = [
            ("customer", customer_id.to_string()),
            ("return_url", self.portal_return_url.clone()),
        ];

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/billing_portal/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create billing portal session").await?;

        #[derive(Deserialize)]
        struct PortalResp {
            url: String,
        }

        let parsed: PortalResp = resp.json().await?;
        Ok(parsed.url)
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature_at(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).context("webhook payload is not a Stripe event")?;
        Ok(event)
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_subscription(event: &StripeEvent) -> Option<StripeSubscription> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}/subscriptions/{}", subscription_id))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }
}

fn checkout_form(
    price_id: &str,
    user_id: Uuid,
    customer_id: Option<String>,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let user_id = user_id.to_string();
    let mut body: Vec<(String, String)> = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), price_id.to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
        ("client_reference_id".to_string(), user_id.clone()),
        (format!("metadata[{USER_ID_METADATA_KEY}]"), user_id.clone()),
        (
            format!("subscription_data[metadata][{USER_ID_METADATA_KEY}]"),
            user_id,
        ),
    ];

    if let Some(customer) = customer_id {
        body.push(("customer".to_string(), customer));
    }

    body
}

/// Checks a `stripe-signature` header (`t=...,v1=...[,v1=...]`) against the payload.
pub fn verify_signature_at(
    webhook_secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp
        .parse()
        .context("invalid timestamp in stripe-signature")?;
    if now.abs_diff(signed_at) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
        anyhow::bail!("webhook timestamp outside tolerance");
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        anyhow::bail!("invalid webhook signature");
    }

    Ok(())
}
