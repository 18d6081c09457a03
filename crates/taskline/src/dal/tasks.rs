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

//! Task Data Access Layer, including display-name resolution for
//! chat-initiated re-runs.

use super::DAL;
use crate::database::schema::tasks;
use crate::error::StorageError;
use crate::models::task::{NewTask, Task};
use diesel::prelude::*;
use uuid::Uuid;

/// Normalizes a human-typed task name for comparison.
///
/// Full-width spaces (U+3000) become ASCII spaces, whitespace runs collapse
/// to a single space, and the result is trimmed. Chat clients on phones
/// freely substitute full-width spaces, so stored and typed names are rarely
/// byte-identical.
pub fn normalize_task_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '\u{3000}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Data Access Layer for task operations.
pub struct TaskDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> TaskDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new task record.
    pub async fn create(&self, new_task: NewTask) -> Result<Task, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let task: Task = conn
            .interact(move |conn| {
                diesel::insert_into(tasks::table)
                    .values(&new_task)
                    .get_result(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(task)
    }

    /// Retrieves a task by its id.
    pub async fn get_by_id(&self, task_id: Uuid) -> Result<Option<Task>, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let task: Option<Task> = conn
            .interact(move |conn| tasks::table.find(task_id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(task)
    }

    /// Lists a user's tasks, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;
        let id = user_id.to_string();

        let rows: Vec<Task> = conn
            .interact(move |conn| {
                tasks::table
                    .filter(tasks::user_id.eq(id))
                    .order(tasks::created_at.desc())
                    .load(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Enables or disables a task.
    pub async fn set_enabled(&self, task_id: Uuid, enabled: bool) -> Result<(), StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(tasks::table.find(task_id))
                .set((
                    tasks::enabled.eq(enabled),
                    tasks::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Counts all tasks. Used by the health endpoint.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| tasks::table.count().first(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
