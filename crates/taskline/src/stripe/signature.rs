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

//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header carries comma-separated `k=v` pairs; this
//! module consumes `t` (unix seconds) and `v1` (hex HMAC-SHA256 over
//! `"{t}.{raw_body}"` keyed by the endpoint secret). Timestamps outside the
//! tolerance window are rejected before any digest work, bounding replay of
//! validly-signed-but-stale payloads.

use crate::error::StripeWebhookError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance for the signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// The parsed `t`/`v1` pair from a `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1: String,
}

impl SignatureHeader {
    /// Parses a header of the form `t=1492774577,v1=5257a869e7...,v0=...`.
    /// Pairs other than `t` and `v1` are ignored.
    pub fn parse(header: &str) -> Result<Self, StripeWebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1: Option<String> = None;

        for item in header.split(',') {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        StripeWebhookError::MalformedHeader(format!(
                            "t is not an integer: {:?}",
                            value.trim()
                        ))
                    })?);
                }
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (timestamp, v1) {
            (Some(timestamp), Some(v1)) => Ok(SignatureHeader { timestamp, v1 }),
            _ => Err(StripeWebhookError::MalformedHeader(
                "missing t or v1 pair".to_string(),
            )),
        }
    }
}

/// Verifies a webhook delivery.
///
/// Checks the timestamp window first, then recomputes the digest and compares
/// in constant time.
pub fn verify_signature(
    raw_body: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<(), StripeWebhookError> {
    let sig = SignatureHeader::parse(header)?;

    let deviation = (now.timestamp() - sig.timestamp).abs();
    if deviation > tolerance_secs {
        return Err(StripeWebhookError::TimestampOutOfTolerance {
            deviation,
            tolerance: tolerance_secs,
        });
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| StripeWebhookError::MisconfiguredSecret)?;
    mac.update(sig.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(expected.as_bytes(), sig.v1.as_bytes()) {
        return Err(StripeWebhookError::SignatureMismatch);
    }

    Ok(())
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
