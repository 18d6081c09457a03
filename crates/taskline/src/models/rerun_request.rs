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

//! Rerun Request Model
//!
//! A rerun request is one admission into the re-run queue: a durable record
//! asking that a task's automation be executed out of schedule. For any task,
//! at most one request may be queued or running at a time; that invariant is
//! enforced by a partial unique index, not by this model.
//!
//! Status lifecycle:
//!
//! ```text
//! queued --(runner claims)--> running --(runner reports)--> done | failed
//! queued --(cancel)--> canceled
//! ```
//!
//! `running` has no cancel transition: no cancellation signal reaches the
//! external runner, so the record must be allowed to finish.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a rerun request record in the database.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::task_rerun_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RerunRequest {
    /// Unique identifier for this admission
    pub request_id: Uuid,
    /// The task to re-run
    pub task_id: Uuid,
    /// Owner of the task at enqueue time
    pub user_id: String,
    /// Snapshot of the task's `pc_name` at enqueue time, kept for audit even
    /// if the task later moves to another runner
    pub pc_name: String,
    /// Display name of whoever asked for the re-run (informational)
    pub requested_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Current status: queued / running / done / failed / canceled
    pub status: String,
    /// When the external runner claimed this request
    pub locked_at: Option<DateTime<Utc>>,
    /// Identity of the claiming runner
    pub locked_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Exit code reported by the runner
    pub exit_code: Option<i32>,
    /// Captured standard output, if the runner reported any
    pub stdout: Option<String>,
    /// Captured standard error, if the runner reported any
    pub stderr: Option<String>,
}

/// Represents a new rerun request to be inserted into the database.
///
/// Identifier, `requested_at` and `status` (defaults to `queued`) are
/// populated by the database.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::task_rerun_queue)]
pub struct NewRerunRequest {
    pub task_id: Uuid,
    pub user_id: String,
    pub pc_name: String,
    pub requested_by: Option<String>,
}

impl RerunRequest {
    /// Parses the stored status string, if it is one of the known states.
    pub fn parsed_status(&self) -> Option<RerunStatus> {
        RerunStatus::parse(&self.status)
    }
}

/// The closed set of rerun request states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RerunStatus {
    Queued,
    Running,
    Done,
    Failed,
    Canceled,
}

impl RerunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerunStatus::Queued => "queued",
            RerunStatus::Running => "running",
            RerunStatus::Done => "done",
            RerunStatus::Failed => "failed",
            RerunStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RerunStatus::Queued),
            "running" => Some(RerunStatus::Running),
            "done" => Some(RerunStatus::Done),
            "failed" => Some(RerunStatus::Failed),
            "canceled" => Some(RerunStatus::Canceled),
            _ => None,
        }
    }

    /// Active states occupy the partial unique index slot for their task.
    pub fn is_active(&self) -> bool {
        matches!(self, RerunStatus::Queued | RerunStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RerunStatus::Done | RerunStatus::Failed | RerunStatus::Canceled
        )
    }

    /// Cancellation is only allowed before the runner claims the request.
    pub fn can_cancel(&self) -> bool {
        matches!(self, RerunStatus::Queued)
    }

    /// Deletion is only allowed once the record no longer represents live work.
    pub fn can_delete(&self) -> bool {
        self.is_terminal()
    }
}

impl std::fmt::Display for RerunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
