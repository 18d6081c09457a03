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

//! Shared fixtures for DAL integration tests.
//!
//! Every test works against its own freshly generated user id and task
//! names, so tests never observe each other's rows and no teardown is
//! needed.

use chrono::Utc;
use taskline::models::task::{NewTask, Task};
use taskline::{Database, DAL};
use uuid::Uuid;

/// Connects to the test database, running migrations first.
///
/// Returns `None` (test should skip) when DATABASE_URL is not set.
pub async fn test_dal() -> Option<DAL> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => return None,
    };
    let database = Database::new(&url, 5);
    database
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    Some(DAL::new(database))
}

/// Prints the standard skip notice.
pub fn skip_notice(test: &str) {
    eprintln!("skipping {}: DATABASE_URL not set", test);
}

/// Creates a user with a unique id.
pub async fn seed_user(dal: &DAL) -> String {
    let user_id = format!("U{}", Uuid::new_v4().simple());
    dal.users()
        .upsert_seen(&user_id, None, "follow", Utc::now())
        .await
        .expect("Failed to seed user");
    user_id
}

/// Creates an enabled task for the user.
pub async fn seed_task(dal: &DAL, user_id: &str, name: &str, pc_name: &str) -> Task {
    dal.tasks()
        .create(NewTask {
            user_id: user_id.to_string(),
            name: name.to_string(),
            script_key: "attendance_export".to_string(),
            schedule_value: "08:30".to_string(),
            enabled: true,
            notes: None,
            plan_tag: "free".to_string(),
            expires_at: None,
            pc_name: pc_name.to_string(),
        })
        .await
        .expect("Failed to seed task")
}
