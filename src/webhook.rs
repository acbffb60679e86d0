//! Payment provider webhooks.
//!
//! Events arrive with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The HMAC-SHA256 is taken over
//! `"<t>.<raw body>"` with the endpoint secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{QuoteError, Result};
use crate::model::Plan;
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed event, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    PlanUpgraded(Uuid),
    Ignored(String),
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| QuoteError::Webhook("malformed signature header".to_string()))?;
        match key.trim() {
            "t" => timestamp = value.trim().parse().ok(),
            "v1" => signatures.push(value.trim().to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| QuoteError::Webhook("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(QuoteError::Webhook("missing v1 signature".to_string()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Checks the signature header against `payload` and parses the event.
///
/// `now` is the current unix time in seconds.
pub fn verify_event(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<WebhookEvent> {
    let header = parse_signature_header(header)?;

    if now.abs_diff(header.timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(QuoteError::Webhook("timestamp outside tolerance".to_string()));
    }

    let expected = compute_signature(secret, header.timestamp, payload);
    let matched = header
        .signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|provided| provided.len() == expected.len() && bool::from(provided.ct_eq(&expected)));

    if !matched {
        tracing::debug!("webhook signature mismatch");
        return Err(QuoteError::Webhook("invalid signature".to_string()));
    }

    serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse webhook payload");
        QuoteError::Webhook("malformed JSON payload".to_string())
    })
}

/// Applies a verified event. Completed checkouts move the referenced user to Pro.
pub fn handle_event(store: &Store, event: &WebhookEvent) -> Result<WebhookOutcome> {
    if event.kind != CHECKOUT_COMPLETED {
        return Ok(WebhookOutcome::Ignored(format!("event type {}", event.kind)));
    }

    let reference = event.data.object.get("client_reference_id").and_then(|v| v.as_str());
    let Some(reference) = reference else {
        return Ok(WebhookOutcome::Ignored("checkout without client_reference_id".to_string()));
    };
    let user_id = Uuid::parse_str(reference)
        .map_err(|_| {
            QuoteError::Webhook(format!("client_reference_id {} is not a user id", reference))
        })?;

    if store.set_plan(user_id, Plan::Pro)? {
        tracing::info!(%user_id, event = ?event.id, "checkout completed, plan upgraded");
        Ok(WebhookOutcome::PlanUpgraded(user_id))
    } else {
        tracing::warn!(%user_id, "checkout completed for unknown user");
        Ok(WebhookOutcome::Ignored(format!("no profile {}", user_id)))
    }
}

pub fn process_webhook(
    store: &Store,
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<WebhookOutcome> {
    let event = verify_event(payload, header, secret, now)?;
    handle_event(store, &event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Profile;
    use chrono::Utc;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;

    fn sign(payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, hex::encode(compute_signature(SECRET, timestamp, payload)))
    }

    fn checkout_payload(reference: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "client_reference_id": reference } }
        })
        .to_string()
        .into_bytes()
    }

    fn store_with_profile() -> (tempfile::TempDir, Store, Profile) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            full_name: None,
            plan: Plan::Free,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.save_profile(&profile).unwrap();
        (dir, store, profile)
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = checkout_payload("abc");
        let event = verify_event(&payload, &sign(&payload, NOW), SECRET, NOW + 10).unwrap();
        assert_eq!(event.kind, CHECKOUT_COMPLETED);
        assert_eq!(event.id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn any_matching_v1_signature_is_enough() {
        let payload = checkout_payload("abc");
        let good = hex::encode(compute_signature(SECRET, NOW, &payload));
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good);
        assert!(verify_event(&payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = checkout_payload("abc");
        let header = sign(&payload, NOW);
        let tampered = checkout_payload("xyz");
        let result = verify_event(&tampered, &header, SECRET, NOW);
        assert!(matches!(result, Err(QuoteError::Webhook(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = checkout_payload("abc");
        let header = sign(&payload, NOW);
        assert!(verify_event(&payload, &header, "whsec_other", NOW).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = checkout_payload("abc");
        let header = sign(&payload, NOW - SIGNATURE_TOLERANCE_SECS - 1);
        assert!(verify_event(&payload, &header, SECRET, NOW).is_err());
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        let payload = checkout_payload("abc");
        for timestamp in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1={}", timestamp, "00".repeat(32));
            let result = verify_event(&payload, &header, SECRET, NOW);
            assert!(matches!(result, Err(QuoteError::Webhook(_))), "{timestamp}");
        }
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let payload = checkout_payload("abc");
        for header in ["", "garbage", "t=123", "v1=abcd", "t=x,v1=abcd"] {
            assert!(verify_event(&payload, header, SECRET, NOW).is_err(), "{header}");
        }
    }

    #[test]
    fn completed_checkout_upgrades_profile() {
        let (_dir, store, profile) = store_with_profile();
        let payload = checkout_payload(&profile.id.to_string());
        let outcome = process_webhook(&store, &payload, &sign(&payload, NOW), SECRET, NOW).unwrap();

        assert_eq!(outcome, WebhookOutcome::PlanUpgraded(profile.id));
        assert_eq!(store.load_profile().unwrap().unwrap().plan, Plan::Pro);
    }

    #[test]
    fn unknown_user_is_acknowledged_without_change() {
        let (_dir, store, _) = store_with_profile();
        let payload = checkout_payload(&Uuid::new_v4().to_string());
        let outcome = process_webhook(&store, &payload, &sign(&payload, NOW), SECRET, NOW).unwrap();

        assert!(matches!(outcome, WebhookOutcome::Ignored(_)));
        assert_eq!(store.load_profile().unwrap().unwrap().plan, Plan::Free);
    }

    #[test]
    fn other_events_are_ignored() {
        let (_dir, store, _) = store_with_profile();
        let payload = serde_json::json!({ "type": "invoice.paid", "data": { "object": {} } })
            .to_string()
            .into_bytes();
        let outcome = process_webhook(&store, &payload, &sign(&payload, NOW), SECRET, NOW).unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("event type invoice.paid".into()));
    }

    #[test]
    fn bad_reference_is_an_error() {
        let (_dir, store, _) = store_with_profile();
        let payload = checkout_payload("not-a-uuid");
        assert!(process_webhook(&store, &payload, &sign(&payload, NOW), SECRET, NOW).is_err());
    }
}
