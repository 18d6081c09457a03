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

//! LINE transport capability.
//!
//! The Messaging API is an external collaborator; this trait is the seam the
//! dispatcher talks through. The production implementation lives in the
//! server crate (reqwest-backed, bounded timeouts); tests substitute an
//! in-memory recorder.

use async_trait::async_trait;
use thiserror::Error;

/// A LINE user profile, as returned by the profile endpoint.
#[derive(Debug, Clone, Default)]
pub struct LineProfile {
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub status_message: Option<String>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    /// No channel access token configured; calls are skipped, not retried.
    #[error("LINE channel access token is not configured")]
    Unconfigured,

    #[error("LINE API request failed: {0}")]
    Request(String),

    #[error("LINE API returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Capability handle over the LINE Messaging API.
#[async_trait]
pub trait LineTransport: Send + Sync {
    /// Fetches a user's profile. `None` when the profile is not available
    /// (user blocked the bot, token missing); callers proceed without it.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<LineProfile>, TransportError>;

    /// Sends reply messages for a webhook event's reply token.
    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<serde_json::Value>,
    ) -> Result<(), TransportError>;

    /// Links a rich menu to a user.
    async fn link_rich_menu(&self, user_id: &str, rich_menu_id: &str)
        -> Result<(), TransportError>;

    /// Unlinks whatever rich menu the user currently has.
    async fn unlink_rich_menu(&self, user_id: &str) -> Result<(), TransportError>;
}
