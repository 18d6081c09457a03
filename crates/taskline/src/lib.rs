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

//! Taskline core library.
//!
//! The backend behind a LINE chatbot that manages scheduled automation tasks
//! running on remote PCs. The load-bearing pieces are:
//!
//! - [`dal::rerun_queue`] - the re-run admission queue. At most one queued or
//!   running request may exist per task; a partial unique index enforces
//!   this atomically with the insert, so concurrent requesters can never
//!   both win.
//! - [`dal::payment_event`] + [`stripe`] - idempotent Stripe webhook
//!   reconciliation. Each provider event id is applied at most once; ledger
//!   insert and entitlement update share one transaction.
//! - [`entitlement`] - pure calendar-month expiry math in Asia/Tokyo civil
//!   time, with month-end clamping and renewal stacking.
//! - [`chat`] - typed chat commands and the dispatcher that exercises the
//!   queue from its only caller.
//!
//! No in-process state survives a request: PostgreSQL (via [`database`]) is
//! the sole arbiter of concurrency correctness.

pub mod chat;
pub mod dal;
pub mod database;
pub mod entitlement;
pub mod error;
pub mod models;
pub mod stripe;

pub use dal::DAL;
pub use database::Database;
