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

//! Stripe webhook endpoint.
//!
//! Verification failures are HTTP 400 (Stripe should stop retrying a
//! permanently bad signature), server faults are 500 (Stripe retries), and
//! every post-verification business outcome is a 200 acknowledgment.

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use taskline::dal::ReconcileOutcome;
use taskline::error::StripeWebhookError;
use tracing::{error, warn};

pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match state.reconciler.process(&body, signature, Utc::now()).await {
        Ok(outcome) => Json(outcome_body(outcome)).into_response(),
        Err(e) => {
            let status = match &e {
                StripeWebhookError::MisconfiguredSecret
                | StripeWebhookError::ConnectionPool(_)
                | StripeWebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            if status.is_server_error() {
                error!(error = %e, "Stripe webhook processing failed");
            } else {
                warn!(error = %e, "Stripe webhook rejected");
            }
            (status, Json(json!({ "ok": false, "error": e.to_string() }))).into_response()
        }
    }
}

fn outcome_body(outcome: ReconcileOutcome) -> serde_json::Value {
    match outcome {
        ReconcileOutcome::Duplicate => json!({ "ok": true, "duplicate": true }),
        ReconcileOutcome::Ignored { event_type } => json!({ "ok": true, "ignored": event_type }),
        ReconcileOutcome::MissingReference => {
            json!({ "ok": true, "warning": "missing client_reference_id" })
        }
        ReconcileOutcome::TaskNotFound { task_id } => {
            json!({ "ok": true, "warning": "task not found", "task_id": task_id })
        }
        ReconcileOutcome::Applied {
            task_id,
            plan,
            payment_date,
            payment_amount,
            ..
        } => json!({
            "ok": true,
            "task_id": task_id.to_string(),
            "plan": plan.map(|p| p.as_str()),
            "payment_date": payment_date.to_string(),
            "payment_amount": payment_amount,
        }),
    }
}
