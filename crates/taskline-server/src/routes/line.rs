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

//! LINE webhook endpoint.
//!
//! Verifies the `X-Line-Signature` (HMAC-SHA256 over the raw body with the
//! channel secret, base64-encoded) before touching the payload, then feeds
//! each event through the dispatcher. A dispatch infrastructure failure
//! returns 500 so LINE redelivers the batch; business outcomes never fail
//! the request.

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use taskline::chat::InboundEvent;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    source: EventSource,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    message: Option<EventMessage>,
    postback: Option<EventPostback>,
}

#[derive(Debug, Default, Deserialize)]
struct EventSource {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventPostback {
    data: Option<String>,
}

/// Verifies the LINE webhook signature: base64(HMAC-SHA256(secret, body)).
pub fn verify_line_signature(channel_secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    if channel_secret.is_empty() {
        return false;
    }

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());

    constant_time_eq(expected.as_bytes(), signature.as_bytes())
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

pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok());

    if !verify_line_signature(&state.line_channel_secret, &body, signature) {
        warn!("LINE webhook signature verification failed");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "invalid signature" })),
        )
            .into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "LINE webhook payload was not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "invalid payload" })),
            )
                .into_response();
        }
    };

    let received = payload.events.len();
    for event in payload.events {
        let inbound = InboundEvent {
            event_type: event.event_type,
            user_id: event.source.user_id.unwrap_or_default(),
            reply_token: event.reply_token,
            text: event.message.and_then(|m| m.text),
            postback_data: event.postback.and_then(|p| p.data),
        };

        if let Err(e) = state.dispatcher.handle_event(&inbound).await {
            error!(error = %e, "Webhook event dispatch failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": "dispatch failed" })),
            )
                .into_response();
        }
    }

    Json(json!({ "ok": true, "received": received })).into_response()
}

/// LINE's reachability probe.
pub async fn probe() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
