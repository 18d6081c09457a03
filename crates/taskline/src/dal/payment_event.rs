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

//! Payment event ledger DAL.
//!
//! The ledger insert and the entitlement update run in ONE transaction:
//! either the event id becomes visible together with its effect, or neither
//! lands. A provider retry after any crash is then rejected cleanly by the
//! ledger with no window in which the effect could be double-applied or
//! lost behind an already-recorded id.

use super::DAL;
use crate::database::schema::{stripe_events, tasks};
use crate::entitlement::{self, PlanCode};
use crate::error::StripeWebhookError;
use crate::models::payment_event::{NewPaymentEvent, PaymentEvent};
use crate::models::task::Task;
use crate::stripe::event::{format_payment_amount, split_client_reference, ParsedEvent, CHECKOUT_COMPLETED};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

/// What a webhook delivery amounted to.
///
/// Everything except `Applied` is a no-effect acknowledgment; the provider
/// must still see success so it stops retrying conditions a retry cannot fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This event id was already recorded; effects were NOT re-applied.
    Duplicate,
    /// Recorded, but not a checkout completion; no effect.
    Ignored { event_type: String },
    /// Recorded, but the event carried no usable `client_reference_id`.
    MissingReference,
    /// Recorded, but the referenced task does not exist. Money has moved, so
    /// this is a warning, not a failure.
    TaskNotFound { task_id: String },
    /// Payment recorded on the task, expiry extended where the plan calls
    /// for it.
    Applied {
        task_id: Uuid,
        plan: Option<PlanCode>,
        payment_date: NaiveDate,
        payment_amount: String,
        new_expires_at: Option<DateTime<Utc>>,
    },
}

/// Data Access Layer for the payment event ledger.
pub struct PaymentEventDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> PaymentEventDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Conditionally records an event id. Returns `true` when the id was new
    /// and the caller may apply effects, `false` on a redelivery.
    ///
    /// Single atomic `INSERT ... ON CONFLICT DO NOTHING` - an existence check
    /// followed by an insert would reopen the race this ledger exists to
    /// close.
    pub async fn record_if_new(
        &self,
        event_id: &str,
        payload: serde_json::Value,
    ) -> Result<bool, StripeWebhookError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))?;

        let new_event = NewPaymentEvent {
            event_id: event_id.to_string(),
            payload,
        };

        let inserted = conn
            .interact(move |conn| {
                diesel::insert_into(stripe_events::table)
                    .values(&new_event)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))??;

        Ok(inserted > 0)
    }

    /// Retrieves a ledger entry by event id.
    pub async fn get(&self, event_id: &str) -> Result<Option<PaymentEvent>, StripeWebhookError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))?;
        let id = event_id.to_string();

        let event: Option<PaymentEvent> = conn
            .interact(move |conn| stripe_events::table.find(id).first(conn).optional())
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))??;

        Ok(event)
    }

    /// Applies one verified payment event: ledger insert, event-type gate,
    /// reference resolution and entitlement update, all in one transaction.
    ///
    /// `processed_at` is the fallback payment instant for events without a
    /// usable `created` timestamp.
    pub async fn reconcile_checkout(
        &self,
        event: ParsedEvent,
        processed_at: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StripeWebhookError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))?;

        let outcome = conn
            .interact(move |conn| {
                conn.transaction::<ReconcileOutcome, diesel::result::Error, _>(|conn| {
                    // Idempotency gate. Events without an id (never seen from
                    // Stripe in practice) cannot be deduplicated and skip the
                    // ledger.
                    if !event.event_id.is_empty() {
                        let new_event = NewPaymentEvent {
                            event_id: event.event_id.clone(),
                            payload: event.payload.clone(),
                        };
                        let inserted = diesel::insert_into(stripe_events::table)
                            .values(&new_event)
                            .on_conflict_do_nothing()
                            .execute(conn)?;
                        if inserted == 0 {
                            return Ok(ReconcileOutcome::Duplicate);
                        }
                    }

                    if event.event_type != CHECKOUT_COMPLETED {
                        return Ok(ReconcileOutcome::Ignored {
                            event_type: event.event_type.clone(),
                        });
                    }

                    let Some(reference) = event.client_reference_id.as_deref() else {
                        return Ok(ReconcileOutcome::MissingReference);
                    };
                    let (task_id_str, plan_str) = split_client_reference(reference);
                    if task_id_str.is_empty() {
                        return Ok(ReconcileOutcome::MissingReference);
                    }

                    let Ok(task_id) = Uuid::parse_str(&task_id_str) else {
                        return Ok(ReconcileOutcome::TaskNotFound {
                            task_id: task_id_str,
                        });
                    };
                    let task: Option<Task> =
                        tasks::table.find(task_id).first(conn).optional()?;
                    let Some(task) = task else {
                        return Ok(ReconcileOutcome::TaskNotFound {
                            task_id: task_id_str,
                        });
                    };

                    let paid_at = event
                        .paid_at_unix
                        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                        .unwrap_or(processed_at);
                    let payment_date = entitlement::civil_payment_date(paid_at);
                    let payment_amount =
                        format_payment_amount(event.amount_total, event.currency.as_deref());

                    let plan = plan_str.as_deref().and_then(PlanCode::parse);
                    let new_expires_at = match plan {
                        Some(plan) if plan.extends_expiry() => {
                            Some(entitlement::extend(task.expires_at, plan, paid_at))
                        }
                        // Legacy 1m and unrecognized codes leave expiry alone.
                        _ => task.expires_at,
                    };

                    diesel::update(tasks::table.find(task_id))
                        .set((
                            tasks::payment_date.eq(Some(payment_date)),
                            tasks::payment_amount.eq(Some(payment_amount.clone())),
                            tasks::expires_at.eq(new_expires_at),
                            tasks::updated_at.eq(diesel::dsl::now),
                        ))
                        .execute(conn)?;

                    Ok(ReconcileOutcome::Applied {
                        task_id,
                        plan,
                        payment_date,
                        payment_amount,
                        new_expires_at,
                    })
                })
            })
            .await
            .map_err(|e| StripeWebhookError::ConnectionPool(e.to_string()))??;

        if let ReconcileOutcome::Applied {
            task_id,
            plan,
            payment_date,
            ..
        } = &outcome
        {
            info!(
                %task_id,
                plan = plan.map(|p| p.as_str()).unwrap_or("-"),
                %payment_date,
                "Payment applied to task"
            );
        }

        Ok(outcome)
    }
}
