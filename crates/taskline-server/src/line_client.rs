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

//! reqwest-backed implementation of the LINE transport capability.
//!
//! Every call carries a bounded timeout; a slow Messaging API degrades to an
//! error result, never a hung webhook handler. Without an access token,
//! profile fetches are no-ops and sends return `Unconfigured`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use taskline::chat::{LineProfile, LineTransport, TransportError};
use tracing::warn;

const PROFILE_URL: &str = "https://api.line.me/v2/bot/profile";
const REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";
const RICH_MENU_URL: &str = "https://api.line.me/v2/bot/user";

const PROFILE_TIMEOUT: Duration = Duration::from_secs(7);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LineClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    #[serde(rename = "pictureUrl")]
    picture_url: Option<String>,
    #[serde(rename = "statusMessage")]
    status_message: Option<String>,
}

impl LineClient {
    pub fn new(channel_access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: channel_access_token,
        }
    }

    fn token(&self) -> Result<&str, TransportError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(TransportError::Unconfigured);
        }
        Ok(token)
    }
}

#[async_trait]
impl LineTransport for LineClient {
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<LineProfile>, TransportError> {
        // Profile is best-effort: without a token (or for users who blocked
        // the bot) we proceed without one.
        let Ok(token) = self.token() else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/{}", PROFILE_URL, user_id))
            .bearer_auth(token)
            .timeout(PROFILE_TIMEOUT)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            warn!(user_id, status = %response.status(), "LINE profile fetch not available");
            return Ok(None);
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Some(LineProfile {
            display_name: profile.display_name,
            picture_url: profile.picture_url,
            status_message: profile.status_message,
        }))
    }

    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let token = self.token()?;

        let response = self
            .http
            .post(REPLY_URL)
            .bearer_auth(token)
            .timeout(REPLY_TIMEOUT)
            .json(&serde_json::json!({
                "replyToken": reply_token,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn link_rich_menu(
        &self,
        user_id: &str,
        rich_menu_id: &str,
    ) -> Result<(), TransportError> {
        let token = self.token()?;

        let response = self
            .http
            .post(format!("{}/{}/richmenu/{}", RICH_MENU_URL, user_id, rich_menu_id))
            .bearer_auth(token)
            .timeout(REPLY_TIMEOUT)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn unlink_rich_menu(&self, user_id: &str) -> Result<(), TransportError> {
        let token = self.token()?;

        let response = self
            .http
            .delete(format!("{}/{}/richmenu", RICH_MENU_URL, user_id))
            .bearer_auth(token)
            .timeout(REPLY_TIMEOUT)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
