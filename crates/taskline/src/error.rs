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

//! Error taxonomies for the queue and payment-reconciliation boundaries.
//!
//! Admission outcomes (`TaskNotFound`, `TaskDisabled`, `AlreadyPending`) are
//! expected business results, not faults; callers translate them into
//! user-facing messages. Storage-layer constraint violations never propagate
//! raw: the rerun queue interprets a unique violation on the active-request
//! index as `AlreadyPending`.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the rerun admission queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// No task owned by the requester matches the typed name after
    /// whitespace normalization.
    #[error("No task named \"{name}\" found for this user")]
    TaskNotFound { name: String },

    /// The task exists but is disabled; declined by business rule.
    #[error("Task \"{name}\" is disabled")]
    TaskDisabled { name: String },

    /// An active (queued or running) request already occupies this task's
    /// admission slot. Expected under concurrent or duplicate user action.
    #[error("A re-run for task {task_id} is already queued or running")]
    AlreadyPending { task_id: Uuid },

    /// No rerun request with this id exists.
    #[error("Rerun request {request_id} not found")]
    RequestNotFound { request_id: Uuid },

    /// The requested transition is not allowed from the record's current
    /// status (e.g. cancel on a running request).
    #[error("Rerun request {request_id} is {status}; transition not allowed")]
    InvalidTransition { request_id: Uuid, status: String },

    /// Deletion was attempted on a queued or running record.
    #[error("Rerun request {request_id} is {status}; active records cannot be deleted")]
    ActiveRecordProtected { request_id: Uuid, status: String },

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Errors returned by the Stripe webhook reconciler.
///
/// Everything before signature verification rejects the delivery outright;
/// anomalies after verification are acknowledged as success-with-warning
/// (`ReconcileOutcome`), because the provider retrying cannot fix them.
#[derive(Error, Debug)]
pub enum StripeWebhookError {
    /// The endpoint secret is empty or unset. A server fault, reported
    /// distinctly from a bad signature so operators can tell "we're broken"
    /// from "someone's forging requests".
    #[error("Stripe webhook secret is not configured")]
    MisconfiguredSecret,

    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    #[error("Malformed Stripe-Signature header: {0}")]
    MalformedHeader(String),

    /// The signed timestamp deviates from server time by more than the
    /// tolerance window; bounds replay of validly-signed-but-stale payloads.
    #[error("Signature timestamp outside tolerance ({deviation}s > {tolerance}s)")]
    TimestampOutOfTolerance { deviation: i64, tolerance: i64 },

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Errors from the users/tasks DALs, where every failure is infrastructural.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}
