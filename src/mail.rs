//! Sending quotes by email.
//!
//! `ResendMailer` talks to the Resend HTTP API. Without an API key the
//! `ConsoleMailer` is used so the flow can be exercised locally.

use chrono::Utc;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuoteError, Result};
use crate::model::{Client, Quote, QuoteStatus};
use crate::render::{QuoteContext, Renderer};
use crate::settings::EmailSettings;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

pub trait Mailer {
    /// Delivers `email`, returning the provider's message id.
    fn send(&self, email: &Email) -> Result<String>;
}

pub struct ResendMailer {
    http: HttpClient,
    api_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            api_key: api_key.into(),
            api_base: api_base.into(),
        }
    }
}

impl Mailer for ResendMailer {
    fn send(&self, email: &Email) -> Result<String> {
        let url = format!("{}/emails", self.api_base.trim_end_matches('/'));
        let response = self.http.post(url).bearer_auth(&self.api_key).json(email).send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            tracing::error!(status = status.as_u16(), %message, "email provider rejected message");
            return Err(QuoteError::Upstream {
                service: "email provider",
                status: status.as_u16(),
                message,
            });
        }

        let body: ResendResponse = response.json()?;
        Ok(body.id)
    }
}

/// Prints the envelope instead of sending. Bodies are not echoed.
#[derive(Debug, Default)]
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send(&self, email: &Email) -> Result<String> {
        let id = format!("console-{}", Uuid::new_v4().simple());
        println!("📧 [console] From: {}", email.from);
        println!("📧 [console] To: {}", email.to.join(", "));
        println!("📧 [console] Subject: {}", email.subject);
        println!("📧 [console] Body: {} bytes of HTML", email.html.len());
        tracing::warn!(%id, "no email API key configured, message printed instead of sent");
        Ok(id)
    }
}

pub fn mailer_from_settings(settings: &EmailSettings) -> Box<dyn Mailer> {
    match &settings.api_key {
        Some(key) => Box::new(ResendMailer::new(key.clone(), settings.api_base.clone())),
        None => Box::new(ConsoleMailer),
    }
}

/// Resolves where a quote would be sent: its client, which must have an email.
pub fn recipient(store: &Store, quote: &Quote) -> Result<(Client, String)> {
    let client = match quote.client_id {
        Some(id) => store.get_owned::<Client>(quote.user_id, id)?,
        None => None,
    }
    .ok_or_else(|| QuoteError::Validation("quote has no client".to_string()))?;

    let email = client
        .email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            QuoteError::Validation(format!("client {} has no email address", client.name))
        })?;
    Ok((client, email))
}

/// Emails a saved quote to its client and marks it as sent.
pub fn send_quote(
    store: &Store,
    renderer: &Renderer,
    mailer: &dyn Mailer,
    from: &str,
    user_id: Uuid,
    quote_id: Uuid,
) -> Result<Quote> {
    let mut quote = store
        .get_owned::<Quote>(user_id, quote_id)?
        .ok_or_else(|| QuoteError::NotFound(format!("quote {}", quote_id)))?;
    let (client, to) = recipient(store, &quote)?;
    let company = store.load_company(user_id)?;

    let context = QuoteContext::new(&quote, company.as_ref(), Some(&client));
    let email = Email {
        from: from.to_string(),
        to: vec![to.clone()],
        subject: format!("New Quote: {} from {}", context.number, context.company.name),
        html: renderer.render_email(&context)?,
    };

    let message_id = mailer.send(&email)?;
    tracing::info!(quote = %quote.id, %to, %message_id, "quote emailed");

    quote.status = QuoteStatus::Sent;
    quote.updated_at = Utc::now();
    store.save(&quote)?;
    Ok(quote)
}
