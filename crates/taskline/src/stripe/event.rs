/*
 *  Copyright 2025 Taskline Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Stripe event payload parsing.
//!
//! Only the handful of fields the reconciler consumes are modeled; the full
//! payload is stored verbatim in the idempotency ledger for audit.

use serde::Deserialize;
use serde_json::Value;

/// The checkout event type that triggers entitlement extension. Every other
/// event type is acknowledged and ignored.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    event_type: String,
    created: Option<i64>,
    data: Option<EnvelopeData>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnvelopeData {
    object: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CheckoutSession {
    client_reference_id: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    created: Option<i64>,
}

/// A payment event reduced to the fields the reconciler acts on.
///
/// Checkout fields are only populated when `event_type` is
/// [`CHECKOUT_COMPLETED`]; other event types never reach the code that reads
/// them.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    /// Provider-assigned event id; may be empty, in which case the
    /// idempotency ledger is skipped (there is nothing to key it on)
    pub event_id: String,
    pub event_type: String,
    /// The raw payload, stored for audit
    pub payload: Value,
    pub client_reference_id: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Unix seconds when the checkout was created; the session's own
    /// timestamp wins over the envelope's
    pub paid_at_unix: Option<i64>,
}

impl ParsedEvent {
    /// Parses a raw webhook body.
    pub fn parse(raw_body: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: Value = serde_json::from_slice(raw_body)?;
        let envelope: Envelope = serde_json::from_value(payload.clone())?;

        let mut parsed = ParsedEvent {
            event_id: envelope.id.trim().to_string(),
            event_type: envelope.event_type.trim().to_string(),
            payload,
            client_reference_id: None,
            amount_total: None,
            currency: None,
            paid_at_unix: envelope.created,
        };

        if parsed.event_type == CHECKOUT_COMPLETED {
            let session: CheckoutSession = envelope
                .data
                .and_then(|d| d.object)
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            parsed.client_reference_id = session
                .client_reference_id
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            parsed.amount_total = session.amount_total;
            parsed.currency = session.currency;
            parsed.paid_at_unix = session.created.or(envelope.created);
        }

        Ok(parsed)
    }
}

/// Splits a checkout `client_reference_id` of the form `<task_id>_<plan>` on
/// its last underscore. A reference with no underscore is all task id.
pub fn split_client_reference(reference: &str) -> (String, Option<String>) {
    let trimmed = reference.trim();
    match trimmed.rsplit_once('_') {
        Some((task_id, plan)) => (task_id.to_string(), Some(plan.to_string())),
        None => (trimmed.to_string(), None),
    }
}

/// Formats the stored payment amount display string, e.g. `12000 JPY`.
pub fn format_payment_amount(amount_total: Option<i64>, currency: Option<&str>) -> String {
    match amount_total {
        Some(amount) => match currency {
            Some(cur) if !cur.is_empty() => format!("{} {}", amount, cur.to_uppercase()),
            _ => amount.to_string(),
        },
        None => String::new(),
    }
}
