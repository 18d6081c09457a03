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

//! Chat command dispatcher.
//!
//! Owns no state: every event re-reads through the DAL, and the only side
//! effects are DAL writes and replies through the transport capability.
//! Queue admission outcomes translate into user-facing messages here; reply
//! delivery failures are logged and swallowed so LINE does not redeliver the
//! whole webhook batch over a lost reply.

use super::command::ChatCommand;
use super::messages;
use super::transport::{LineProfile, LineTransport};
use crate::dal::DAL;
use crate::error::{QueueError, StorageError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// One inbound webhook event, reduced to the fields the dispatcher consumes.
#[derive(Debug, Clone, Default)]
pub struct InboundEvent {
    /// LINE event type ("message", "postback", "follow", ...)
    pub event_type: String,
    pub user_id: String,
    pub reply_token: Option<String>,
    /// Text of a message event, if any
    pub text: Option<String>,
    /// Raw postback payload, if any
    pub postback_data: Option<String>,
}

/// Infrastructure failures surfaced to the webhook handler. Business
/// outcomes (unknown task, disabled, already pending) never appear here;
/// they become reply messages.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(QueueError),
}

/// Maps chat events onto the rerun queue, task listing and terms agreement.
pub struct Dispatcher {
    dal: DAL,
    transport: Arc<dyn LineTransport>,
    /// Rich menu to link once a user has agreed to the terms
    member_rich_menu_id: Option<String>,
}

impl Dispatcher {
    pub fn new(
        dal: DAL,
        transport: Arc<dyn LineTransport>,
        member_rich_menu_id: Option<String>,
    ) -> Self {
        Self {
            dal,
            transport,
            member_rich_menu_id,
        }
    }

    /// Handles one inbound event: records the user sighting, parses the
    /// command and dispatches it.
    pub async fn handle_event(&self, event: &InboundEvent) -> Result<(), DispatchError> {
        if event.user_id.is_empty() {
            debug!(event_type = %event.event_type, "Event without user id skipped");
            return Ok(());
        }

        self.record_sighting(event).await?;

        // A user who blocks the bot loses their rich menu; LINE keeps the
        // link around otherwise and re-follows would show stale entries.
        if event.event_type == "unfollow" {
            if let Err(e) = self.transport.unlink_rich_menu(&event.user_id).await {
                warn!(user_id = %event.user_id, error = %e, "Rich menu unlink failed");
            }
            return Ok(());
        }

        let command = if let Some(data) = event.postback_data.as_deref() {
            ChatCommand::parse_postback(data)
        } else if let Some(text) = event.text.as_deref() {
            ChatCommand::parse_text(text)
        } else {
            ChatCommand::Unrecognized
        };

        self.dispatch(event, command).await
    }

    /// Upserts the user row. The profile round trip is only paid for users
    /// we have never seen.
    async fn record_sighting(&self, event: &InboundEvent) -> Result<(), DispatchError> {
        let users = self.dal.users();
        let profile: Option<LineProfile> = if users.exists(&event.user_id).await? {
            None
        } else {
            match self.transport.fetch_profile(&event.user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(user_id = %event.user_id, error = %e, "Profile fetch failed");
                    None
                }
            }
        };

        users
            .upsert_seen(
                &event.user_id,
                profile.as_ref(),
                &event.event_type,
                Utc::now(),
            )
            .await?;
        Ok(())
    }

    async fn dispatch(
        &self,
        event: &InboundEvent,
        command: ChatCommand,
    ) -> Result<(), DispatchError> {
        match command {
            ChatCommand::ShowTasks => {
                let tasks = self.dal.tasks().list_for_user(&event.user_id).await?;
                self.reply(event, vec![messages::tasks_flex(&tasks)]).await;
            }
            ChatCommand::Rerun { name } => {
                let message = match self
                    .dal
                    .rerun_queue()
                    .enqueue(&event.user_id, &name, None)
                    .await
                {
                    Ok(admitted) => {
                        format!(
                            "「{}」の再実行を受け付けました。（実行PC: {}）",
                            admitted.task_name, admitted.pc_name
                        )
                    }
                    Err(QueueError::TaskNotFound { name }) => {
                        format!("「{}」というタスクが見つかりませんでした。", name)
                    }
                    Err(QueueError::TaskDisabled { name }) => {
                        format!("「{}」は現在無効のため再実行できません。", name)
                    }
                    Err(QueueError::AlreadyPending { .. }) => {
                        "このタスクの再実行はすでに受付済みです。順番に実行されます。".to_string()
                    }
                    Err(e) => return Err(DispatchError::Queue(e)),
                };
                self.reply(event, vec![messages::text_message(message)]).await;
            }
            ChatCommand::ShowDetail { task_id } => {
                let task = self.dal.tasks().get_by_id(task_id).await?;
                match task.filter(|t| t.user_id == event.user_id) {
                    Some(task) => {
                        self.reply(event, vec![messages::task_detail_flex(&task)])
                            .await;
                    }
                    None => {
                        self.reply(
                            event,
                            vec![messages::text_message(
                                "タスクが見つかりませんでした。",
                            )],
                        )
                        .await;
                    }
                }
            }
            ChatCommand::AgreeTerms { version } => {
                self.dal
                    .users()
                    .record_terms_agreement(&event.user_id, &version, Utc::now())
                    .await?;
                if let Some(menu_id) = self.member_rich_menu_id.as_deref() {
                    if let Err(e) = self.transport.link_rich_menu(&event.user_id, menu_id).await {
                        warn!(user_id = %event.user_id, error = %e, "Rich menu link failed");
                    }
                }
                self.reply(
                    event,
                    vec![messages::text_message(format!(
                        "利用規約（{}）への同意を記録しました。",
                        version
                    ))],
                )
                .await;
            }
            ChatCommand::Unrecognized => {
                debug!(user_id = %event.user_id, "Unrecognized chat input dropped");
            }
        }
        Ok(())
    }

    async fn reply(&self, event: &InboundEvent, messages: Vec<serde_json::Value>) {
        let Some(token) = event.reply_token.as_deref() else {
            return;
        };
        if let Err(e) = self.transport.reply(token, messages).await {
            warn!(user_id = %event.user_id, error = %e, "Reply failed");
        }
    }
}
