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

//! LINE user records, upserted on every inbound webhook event.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub user_id: String,
    pub user_name: Option<String>,
    pub picture_url: Option<String>,
    pub status_message: Option<String>,
    pub last_event: Option<String>,
    pub terms_agreed_version: Option<String>,
    pub terms_agreed_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for the first sighting of a user. On conflict only
/// `last_event` and `last_seen_at` are refreshed; profile fields stay as
/// captured when the user was first seen.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::users)]
pub struct NewUser {
    pub user_id: String,
    pub user_name: Option<String>,
    pub picture_url: Option<String>,
    pub status_message: Option<String>,
    pub last_event: Option<String>,
    pub last_seen_at: DateTime<Utc>,
}
