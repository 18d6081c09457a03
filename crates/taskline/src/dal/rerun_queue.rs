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

//! Rerun queue Data Access Layer: admission, cancel, delete, list, and the
//! runner-facing claim/finish surface.
//!
//! Admission control never reads before writing. The insert itself is the
//! admission check: the `uq_rerun_active_task` partial unique index rejects a
//! second active request for the same task, and that rejection is interpreted
//! as [`QueueError::AlreadyPending`]. Two concurrent requesters therefore race
//! on the index, and exactly one wins.

use super::tasks::normalize_task_name;
use super::DAL;
use crate::database::schema::{task_rerun_queue, tasks};
use crate::error::QueueError;
use crate::models::rerun_request::{NewRerunRequest, RerunRequest, RerunStatus};
use crate::models::task::Task;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use tracing::debug;
use uuid::Uuid;

/// A successful admission into the rerun queue.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub request_id: Uuid,
    pub task_id: Uuid,
    /// The task's stored display name (not the typed lookup key)
    pub task_name: String,
    /// Runner machine captured at enqueue time
    pub pc_name: String,
}

/// Listing filter for rerun requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerunFilter {
    /// Queued or running
    Active,
    /// One specific status
    Status(RerunStatus),
    All,
}

enum EnqueueRow {
    Admitted(Box<RerunRequest>, String),
    NoMatch,
    Disabled { name: String },
    Conflict { task_id: Uuid },
}

/// Data Access Layer for rerun queue operations.
pub struct RerunQueueDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> RerunQueueDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Admits a re-run request for the task the typed name resolves to.
    ///
    /// Resolution compares names after whitespace normalization; when several
    /// of the user's tasks normalize to the same name, the most recently
    /// created one wins. That tie-break mirrors long-standing behavior but is
    /// a UX soft spot: the user cannot address the older duplicates from
    /// chat. The task's current `pc_name` is snapshotted onto the request.
    /// Admission is a single conditional insert; see the module docs for why
    /// no existence check precedes it.
    pub async fn enqueue(
        &self,
        owner_id: &str,
        typed_task_name: &str,
        requested_by: Option<&str>,
    ) -> Result<Admitted, QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let owner = owner_id.to_string();
        let wanted = normalize_task_name(typed_task_name);
        let requested_by = requested_by.map(str::to_string);

        let row = conn
            .interact(move |conn| -> Result<EnqueueRow, diesel::result::Error> {
                let candidates: Vec<Task> = tasks::table
                    .filter(tasks::user_id.eq(&owner))
                    .order(tasks::created_at.desc())
                    .load(conn)?;

                let Some(task) = candidates
                    .into_iter()
                    .find(|task| normalize_task_name(&task.name) == wanted)
                else {
                    return Ok(EnqueueRow::NoMatch);
                };

                if !task.enabled {
                    return Ok(EnqueueRow::Disabled { name: task.name });
                }

                let new_request = NewRerunRequest {
                    task_id: task.task_id,
                    user_id: owner.clone(),
                    pc_name: task.pc_name.clone(),
                    requested_by,
                };

                match diesel::insert_into(task_rerun_queue::table)
                    .values(&new_request)
                    .get_result::<RerunRequest>(conn)
                {
                    Ok(request) => Ok(EnqueueRow::Admitted(Box::new(request), task.name)),
                    Err(diesel::result::Error::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        info,
                    )) => {
                        // The partial index holding the invariant fired; any
                        // other unique violation is a genuine fault.
                        if info.constraint_name() == Some("uq_rerun_active_task") {
                            Ok(EnqueueRow::Conflict {
                                task_id: task.task_id,
                            })
                        } else {
                            Err(diesel::result::Error::DatabaseError(
                                DatabaseErrorKind::UniqueViolation,
                                info,
                            ))
                        }
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        match row {
            EnqueueRow::Admitted(request, task_name) => {
                debug!(
                    request_id = %request.request_id,
                    task_id = %request.task_id,
                    pc_name = %request.pc_name,
                    "Rerun request admitted"
                );
                Ok(Admitted {
                    request_id: request.request_id,
                    task_id: request.task_id,
                    task_name,
                    pc_name: request.pc_name,
                })
            }
            EnqueueRow::NoMatch => Err(QueueError::TaskNotFound {
                name: typed_task_name.trim().to_string(),
            }),
            EnqueueRow::Disabled { name } => Err(QueueError::TaskDisabled { name }),
            EnqueueRow::Conflict { task_id } => Err(QueueError::AlreadyPending { task_id }),
        }
    }

    /// Cancels a queued request.
    ///
    /// Only `queued` records can be canceled: once a runner has claimed the
    /// request there is no way to signal it, so `running` records must be
    /// left to finish. The guard lives in the UPDATE predicate; the follow-up
    /// read only names the refusal.
    pub async fn cancel(&self, request_id: Uuid) -> Result<RerunRequest, QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let (canceled, current_status) = conn
            .interact(
                move |conn| -> Result<(Option<RerunRequest>, Option<String>), diesel::result::Error> {
                    let canceled: Option<RerunRequest> = diesel::update(
                        task_rerun_queue::table
                            .find(request_id)
                            .filter(task_rerun_queue::status.eq(RerunStatus::Queued.as_str())),
                    )
                    .set((
                        task_rerun_queue::status.eq(RerunStatus::Canceled.as_str()),
                        task_rerun_queue::finished_at.eq(Some(Utc::now())),
                    ))
                    .get_result(conn)
                    .optional()?;

                    if canceled.is_some() {
                        return Ok((canceled, None));
                    }

                    let current: Option<RerunRequest> = task_rerun_queue::table
                        .find(request_id)
                        .first(conn)
                        .optional()?;
                    Ok((None, current.map(|r| r.status)))
                },
            )
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        match (canceled, current_status) {
            (Some(request), _) => Ok(request),
            (None, Some(status)) => Err(QueueError::InvalidTransition { request_id, status }),
            (None, None) => Err(QueueError::RequestNotFound { request_id }),
        }
    }

    /// Deletes a finished request record.
    ///
    /// Queued and running records are protected: deleting one would free the
    /// task's admission slot while work may still happen.
    pub async fn delete(&self, request_id: Uuid) -> Result<(), QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let terminal = [
            RerunStatus::Done.as_str(),
            RerunStatus::Failed.as_str(),
            RerunStatus::Canceled.as_str(),
        ];

        let (deleted, current_status) = conn
            .interact(
                move |conn| -> Result<(usize, Option<String>), diesel::result::Error> {
                    let deleted = diesel::delete(
                        task_rerun_queue::table
                            .find(request_id)
                            .filter(task_rerun_queue::status.eq_any(terminal)),
                    )
                    .execute(conn)?;

                    if deleted > 0 {
                        return Ok((deleted, None));
                    }

                    let current: Option<RerunRequest> = task_rerun_queue::table
                        .find(request_id)
                        .first(conn)
                        .optional()?;
                    Ok((0, current.map(|r| r.status)))
                },
            )
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        match (deleted, current_status) {
            (n, _) if n > 0 => Ok(()),
            (_, Some(status)) => Err(QueueError::ActiveRecordProtected { request_id, status }),
            (_, None) => Err(QueueError::RequestNotFound { request_id }),
        }
    }

    /// Lists rerun requests: running first, then queued, then finished
    /// records, newest request first within each band. Operators see what's
    /// happening now before what's waiting.
    pub async fn list(&self, filter: RerunFilter) -> Result<Vec<RerunRequest>, QueueError> {
        use diesel::dsl::sql;
        use diesel::sql_types::Integer;

        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let rows: Vec<RerunRequest> = conn
            .interact(move |conn| {
                let mut query = task_rerun_queue::table.into_boxed();
                match filter {
                    RerunFilter::Active => {
                        query = query.filter(task_rerun_queue::status.eq_any([
                            RerunStatus::Queued.as_str(),
                            RerunStatus::Running.as_str(),
                        ]));
                    }
                    RerunFilter::Status(status) => {
                        query = query.filter(task_rerun_queue::status.eq(status.as_str()));
                    }
                    RerunFilter::All => {}
                }
                query
                    .order((
                        sql::<Integer>(
                            "CASE status WHEN 'running' THEN 0 WHEN 'queued' THEN 1 ELSE 2 END",
                        )
                        .asc(),
                        task_rerun_queue::requested_at.desc(),
                    ))
                    .load(conn)
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Retrieves a rerun request by id.
    pub async fn get_by_id(&self, request_id: Uuid) -> Result<Option<RerunRequest>, QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let request: Option<RerunRequest> = conn
            .interact(move |conn| {
                task_rerun_queue::table
                    .find(request_id)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        Ok(request)
    }

    /// Atomically claims the oldest queued request for a runner machine.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent runners polling the same
    /// `pc_name` never claim the same request and never block each other.
    pub async fn claim_next(
        &self,
        pc_name: &str,
        locked_by: &str,
    ) -> Result<Option<RerunRequest>, QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let pc = pc_name.to_string();
        let worker = locked_by.to_string();

        let claimed: Option<RerunRequest> = conn
            .interact(move |conn| {
                diesel::sql_query(
                    r#"
                    UPDATE task_rerun_queue
                    SET status = 'running', locked_at = NOW(), locked_by = $2, started_at = NOW()
                    WHERE request_id = (
                        SELECT request_id FROM task_rerun_queue
                        WHERE pc_name = $1 AND status = 'queued'
                        ORDER BY requested_at ASC
                        LIMIT 1
                        FOR UPDATE SKIP LOCKED
                    )
                    RETURNING request_id, task_id, user_id, pc_name, requested_by,
                              requested_at, status, locked_at, locked_by, started_at,
                              finished_at, exit_code, stdout, stderr
                    "#,
                )
                .bind::<diesel::sql_types::Text, _>(pc)
                .bind::<diesel::sql_types::Text, _>(worker)
                .get_result::<RerunRequest>(conn)
                .optional()
            })
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        if let Some(ref request) = claimed {
            debug!(
                request_id = %request.request_id,
                pc_name = %request.pc_name,
                locked_by = ?request.locked_by,
                "Rerun request claimed"
            );
        }

        Ok(claimed)
    }

    /// Records a runner's result for a running request.
    ///
    /// Exit code zero finishes as `done`, anything else as `failed`. Only a
    /// `running` record can finish; the guard is the UPDATE predicate.
    pub async fn finish(
        &self,
        request_id: Uuid,
        exit_code: i32,
        stdout: Option<String>,
        stderr: Option<String>,
    ) -> Result<RerunRequest, QueueError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))?;

        let final_status = if exit_code == 0 {
            RerunStatus::Done
        } else {
            RerunStatus::Failed
        };

        let (finished, current_status) = conn
            .interact(
                move |conn| -> Result<(Option<RerunRequest>, Option<String>), diesel::result::Error> {
                    let finished: Option<RerunRequest> = diesel::update(
                        task_rerun_queue::table
                            .find(request_id)
                            .filter(task_rerun_queue::status.eq(RerunStatus::Running.as_str())),
                    )
                    .set((
                        task_rerun_queue::status.eq(final_status.as_str()),
                        task_rerun_queue::finished_at.eq(Some(Utc::now())),
                        task_rerun_queue::exit_code.eq(Some(exit_code)),
                        task_rerun_queue::stdout.eq(stdout),
                        task_rerun_queue::stderr.eq(stderr),
                    ))
                    .get_result(conn)
                    .optional()?;

                    if finished.is_some() {
                        return Ok((finished, None));
                    }

                    let current: Option<RerunRequest> = task_rerun_queue::table
                        .find(request_id)
                        .first(conn)
                        .optional()?;
                    Ok((None, current.map(|r| r.status)))
                },
            )
            .await
            .map_err(|e| QueueError::ConnectionPool(e.to_string()))??;

        match (finished, current_status) {
            (Some(request), _) => Ok(request),
            (None, Some(status)) => Err(QueueError::InvalidTransition { request_id, status }),
            (None, None) => Err(QueueError::RequestNotFound { request_id }),
        }
    }
}
