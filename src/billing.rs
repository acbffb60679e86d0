//! Plan limits and the hosted checkout used to upgrade to Pro.

use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{QuoteError, Result};
use crate::model::{Plan, Profile};
use crate::settings::BillingSettings;
use crate::store::Store;

/// Quotes a free account may hold.
pub const FREE_QUOTE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanUsage {
    pub plan: Plan,
    pub quote_count: usize,
}

impl PlanUsage {
    pub fn load(store: &Store, profile: &Profile) -> Result<Self> {
        Ok(Self {
            plan: profile.plan,
            quote_count: store.count_quotes(profile.id)?,
        })
    }

    pub fn can_create_quote(&self) -> bool {
        self.plan == Plan::Pro || self.quote_count < FREE_QUOTE_LIMIT
    }

    pub fn ensure_can_create_quote(&self) -> Result<()> {
        if self.can_create_quote() {
            Ok(())
        } else {
            Err(QuoteError::PlanLimit { used: self.quote_count, limit: FREE_QUOTE_LIMIT })
        }
    }

    /// `3/5` on the free plan, `12/unlimited` on Pro.
    pub fn describe(&self) -> String {
        match self.plan {
            Plan::Pro => format!("{}/unlimited", self.quote_count),
            Plan::Free => format!("{}/{}", self.quote_count, FREE_QUOTE_LIMIT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub customer_email: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    pub fn for_profile(profile: &Profile, settings: &BillingSettings) -> Result<Self> {
        let price_id = settings
            .pro_price_id
            .clone()
            .ok_or(QuoteError::MissingConfig("billing.pro_price_id (or STRIPE_PRO_PRICE_ID)"))?;
        let origin = settings.app_origin.trim_end_matches('/');
        Ok(Self {
            user_id: profile.id,
            customer_email: profile.email.clone(),
            price_id,
            success_url: format!("{}/settings?success=true", origin),
            cancel_url: format!("{}/settings?canceled=true", origin),
        })
    }

    /// Form body for a one-seat card subscription.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("payment_method_types[]", "card".to_string()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("mode", "subscription".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("client_reference_id", self.user_id.to_string()),
            ("customer_email", self.customer_email.clone()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

pub trait CheckoutProvider {
    fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

pub struct StripeCheckout {
    http: HttpClient,
    secret_key: String,
    api_base: String,
}

impl StripeCheckout {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into(),
        }
    }

    pub fn from_settings(settings: &BillingSettings) -> Result<Self> {
        let key = settings
            .secret_key
            .clone()
            .ok_or(QuoteError::MissingConfig("billing.secret_key (or STRIPE_SECRET_KEY)"))?;
        Ok(Self::new(key, settings.api_base.clone()))
    }
}

impl CheckoutProvider for StripeCheckout {
    fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.api_base.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(&request.form())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(QuoteError::Upstream {
                service: "payment provider",
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json()?)
    }
}

/// Starts an upgrade for `profile`. Pro accounts are turned away.
pub fn start_upgrade(
    provider: &dyn CheckoutProvider,
    profile: &Profile,
    settings: &BillingSettings,
) -> Result<CheckoutSession> {
    if profile.plan == Plan::Pro {
        return Err(QuoteError::Validation("account is already on the Pro plan".to_string()));
    }
    let request = CheckoutRequest::for_profile(profile, settings)?;
    let session = provider.create_session(&request)?;
    tracing::info!(user_id = %profile.id, session = %session.id, "checkout session created");
    Ok(session)
}
