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

//! Stripe webhook reconciliation.
//!
//! Turns one webhook delivery into at most one entitlement update:
//! signature verification, then payload parsing, then a single-transaction
//! ledger insert + task update through the DAL. Verification failures reject
//! the delivery; anything after verification acknowledges success so the
//! provider stops retrying.

pub mod event;
pub mod signature;

pub use event::ParsedEvent;
pub use signature::{SignatureHeader, DEFAULT_TOLERANCE_SECS};

use crate::dal::{ReconcileOutcome, DAL};
use crate::error::StripeWebhookError;
use chrono::{DateTime, Utc};
use tracing::warn;

/// The payment webhook reconciler.
///
/// Holds the endpoint secret and tolerance; stateless otherwise.
#[derive(Clone)]
pub struct Reconciler {
    dal: DAL,
    secret: String,
    tolerance_secs: i64,
}

impl Reconciler {
    /// Creates a reconciler. The secret may be empty here; processing then
    /// fails with [`StripeWebhookError::MisconfiguredSecret`] on every
    /// delivery, which is the operator-visible signal that configuration is
    /// broken (distinct from a forged signature).
    pub fn new(dal: DAL, secret: String, tolerance_secs: i64) -> Self {
        Self {
            dal,
            secret,
            tolerance_secs,
        }
    }

    /// Processes one webhook delivery.
    ///
    /// `signature_header` is the raw `Stripe-Signature` header value, if the
    /// request carried one.
    pub async fn process(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StripeWebhookError> {
        if self.secret.trim().is_empty() {
            return Err(StripeWebhookError::MisconfiguredSecret);
        }
        let header = signature_header.ok_or(StripeWebhookError::MissingSignature)?;

        signature::verify_signature(raw_body, header, &self.secret, now, self.tolerance_secs)?;

        let event = ParsedEvent::parse(raw_body)?;

        let outcome = self
            .dal
            .payment_events()
            .reconcile_checkout(event, now)
            .await?;

        match &outcome {
            ReconcileOutcome::MissingReference => {
                warn!("Checkout completed without client_reference_id; acknowledged without effect");
            }
            ReconcileOutcome::TaskNotFound { task_id } => {
                warn!(%task_id, "Checkout references unknown task; acknowledged without effect");
            }
            _ => {}
        }

        Ok(outcome)
    }
}
