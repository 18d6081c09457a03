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

//! Health endpoint: proves the store is reachable, not just the process.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub async fn health(State(state): State<AppState>) -> Response {
    let users = state.dal.users().count().await;
    let tasks = state.dal.tasks().count().await;

    match (users, tasks) {
        (Ok(users_count), Ok(tasks_count)) => Json(json!({
            "status": "ok",
            "db": "postgres",
            "users_count": users_count,
            "tasks_count": tasks_count,
        }))
        .into_response(),
        (users, tasks) => {
            let e = users.err().or(tasks.err());
            error!(error = ?e, "Health check could not reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "ng", "db": "postgres" })),
            )
                .into_response()
        }
    }
}
