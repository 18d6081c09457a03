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

//! Typed chat commands.
//!
//! Inbound free text and postback payloads parse into a closed set of
//! variants consumed by one dispatcher, instead of ad hoc string matching
//! scattered across handlers. Anything unparseable is `Unrecognized` and
//! silently dropped downstream.

use uuid::Uuid;

/// The closed set of commands a chat user can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show the user's task list.
    ShowTasks,
    /// Ask for an out-of-schedule re-run of the named task.
    Rerun { name: String },
    /// Tap-to-view detail of one task.
    ShowDetail { task_id: Uuid },
    /// The user agreed to a terms-of-service version.
    AgreeTerms { version: String },
    Unrecognized,
}

/// Suffix that turns a message into a re-run request, e.g. `日次レポート再実行`.
const RERUN_SUFFIX: &str = "再実行";

impl ChatCommand {
    /// Parses a plain text message.
    pub fn parse_text(text: &str) -> Self {
        let trimmed = text.trim();

        if trimmed.eq_ignore_ascii_case("tasks")
            || trimmed.eq_ignore_ascii_case("task")
            || trimmed == "タスク"
        {
            return ChatCommand::ShowTasks;
        }

        if let Some(name) = trimmed.strip_suffix(RERUN_SUFFIX) {
            let name = name.trim();
            if !name.is_empty() {
                return ChatCommand::Rerun {
                    name: name.to_string(),
                };
            }
        }

        ChatCommand::Unrecognized
    }

    /// Parses a postback payload of `key=value` pairs joined by `&`.
    pub fn parse_postback(data: &str) -> Self {
        let mut action = None;
        let mut task_id = None;
        let mut version = None;

        for pair in data.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "action" => action = Some(value),
                "task_id" => task_id = Some(value),
                "version" => version = Some(value),
                _ => {}
            }
        }

        match action {
            Some("detail") => match task_id.and_then(|id| Uuid::parse_str(id).ok()) {
                Some(task_id) => ChatCommand::ShowDetail { task_id },
                None => ChatCommand::Unrecognized,
            },
            Some("agree") => match version {
                Some(version) if !version.is_empty() => ChatCommand::AgreeTerms {
                    version: version.to_string(),
                },
                _ => ChatCommand::Unrecognized,
            },
            _ => ChatCommand::Unrecognized,
        }
    }
}
