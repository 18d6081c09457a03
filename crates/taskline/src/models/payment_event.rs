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

//! Payment event idempotency records.
//!
//! One row per distinct provider event id. Rows are inserted once and never
//! mutated; a second delivery of the same id is detected by the primary key
//! and skipped.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::stripe_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEvent {
    /// Provider-assigned, globally unique event identifier
    pub event_id: String,
    /// Raw event payload, stored for audit
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::stripe_events)]
pub struct NewPaymentEvent {
    pub event_id: String,
    pub payload: serde_json::Value,
}
