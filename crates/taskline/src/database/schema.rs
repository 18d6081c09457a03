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

//! Diesel table definitions for the PostgreSQL store.
//!
//! `task_rerun_queue` additionally carries a partial unique index
//! (`uq_rerun_active_task`, see the migrations) on `task_id` filtered to
//! `status IN ('queued', 'running')`. Diesel's DSL cannot express partial
//! indexes, but the admission logic in `dal::rerun_queue` depends on it.

diesel::table! {
    users (user_id) {
        user_id -> Text,
        user_name -> Nullable<Text>,
        picture_url -> Nullable<Text>,
        status_message -> Nullable<Text>,
        last_event -> Nullable<Text>,
        terms_agreed_version -> Nullable<Text>,
        terms_agreed_at -> Nullable<Timestamptz>,
        last_seen_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (task_id) {
        task_id -> Uuid,
        user_id -> Text,
        name -> Text,
        script_key -> Text,
        schedule_value -> Text,
        enabled -> Bool,
        notes -> Nullable<Text>,
        plan_tag -> Text,
        expires_at -> Nullable<Timestamptz>,
        payment_date -> Nullable<Date>,
        payment_amount -> Nullable<Text>,
        pc_name -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    task_rerun_queue (request_id) {
        request_id -> Uuid,
        task_id -> Uuid,
        user_id -> Text,
        pc_name -> Text,
        requested_by -> Nullable<Text>,
        requested_at -> Timestamptz,
        status -> Text,
        locked_at -> Nullable<Timestamptz>,
        locked_by -> Nullable<Text>,
        started_at -> Nullable<Timestamptz>,
        finished_at -> Nullable<Timestamptz>,
        exit_code -> Nullable<Int4>,
        stdout -> Nullable<Text>,
        stderr -> Nullable<Text>,
    }
}

diesel::table! {
    stripe_events (event_id) {
        event_id -> Text,
        payload -> Jsonb,
        received_at -> Timestamptz,
    }
}

diesel::joinable!(tasks -> users (user_id));
diesel::joinable!(task_rerun_queue -> tasks (task_id));

diesel::allow_tables_to_appear_in_same_query!(users, tasks, task_rerun_queue, stripe_events);
