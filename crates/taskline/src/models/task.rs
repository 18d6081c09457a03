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

//! Task Model
//!
//! A task is a user-owned scheduled automation job definition, executed by an
//! external runner on a named machine. This module defines the data structures
//! for querying existing tasks and creating new ones, plus the plan-tag enum
//! describing a task's entitlement state.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a task record in the database.
///
/// This struct maps to the `tasks` table. Entitlement fields (`plan_tag`,
/// `expires_at`, `payment_date`, `payment_amount`) are mutated only by the
/// Stripe reconciler or admin-level DAL calls.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    /// Unique identifier for the task
    pub task_id: Uuid,
    /// LINE user id of the owner
    pub user_id: String,
    /// Display name; also the lookup key for chat-initiated re-runs
    pub name: String,
    /// Which automation script the runner executes
    pub script_key: String,
    /// Daily execution time as "HH:MM" (interpreted by the external runner)
    pub schedule_value: String,
    /// Whether the task is eligible to run at all
    pub enabled: bool,
    pub notes: Option<String>,
    /// Entitlement state: "free", "paid" or "expired"
    pub plan_tag: String,
    /// When the paid entitlement lapses, if any
    pub expires_at: Option<DateTime<Utc>>,
    /// Civil date (Asia/Tokyo) of the most recent payment
    pub payment_date: Option<NaiveDate>,
    /// Display string of the most recent payment, e.g. "12000 JPY"
    pub payment_amount: Option<String>,
    /// Which remote runner machine executes this task
    pub pc_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents a new task to be inserted into the database.
///
/// Identifier, timestamps and payment fields are populated by the database.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::tasks)]
pub struct NewTask {
    pub user_id: String,
    pub name: String,
    pub script_key: String,
    pub schedule_value: String,
    pub enabled: bool,
    pub notes: Option<String>,
    pub plan_tag: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub pc_name: String,
}

/// Task-level entitlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTag {
    Free,
    Paid,
    Expired,
}

impl PlanTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTag::Free => "free",
            PlanTag::Paid => "paid",
            PlanTag::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanTag::Free),
            "paid" => Some(PlanTag::Paid),
            "expired" => Some(PlanTag::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
