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

//! User Data Access Layer.

use super::DAL;
use crate::chat::transport::LineProfile;
use crate::database::schema::users;
use crate::error::StorageError;
use crate::models::user::{NewUser, User};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;

/// Data Access Layer for LINE user records.
pub struct UserDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> UserDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Returns whether a user has been seen before. Used by the webhook
    /// handler to decide whether a profile fetch is worth the round trip.
    pub async fn exists(&self, user_id: &str) -> Result<bool, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;
        let id = user_id.to_string();

        let count: i64 = conn
            .interact(move |conn| {
                users::table
                    .filter(users::user_id.eq(id))
                    .count()
                    .first(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count > 0)
    }

    /// Records a sighting of a user.
    ///
    /// First sighting inserts the full profile; later sightings only refresh
    /// `last_event` and `last_seen_at`, so the profile stays as captured when
    /// the user first appeared.
    pub async fn upsert_seen(
        &self,
        user_id: &str,
        profile: Option<&LineProfile>,
        last_event: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let new_user = NewUser {
            user_id: user_id.to_string(),
            user_name: profile.and_then(|p| p.display_name.clone()),
            picture_url: profile.and_then(|p| p.picture_url.clone()),
            status_message: profile.and_then(|p| p.status_message.clone()),
            last_event: Some(last_event.to_string()),
            last_seen_at: seen_at,
        };

        conn.interact(move |conn| {
            diesel::insert_into(users::table)
                .values(&new_user)
                .on_conflict(users::user_id)
                .do_update()
                .set((
                    users::last_event.eq(excluded(users::last_event)),
                    users::last_seen_at.eq(excluded(users::last_seen_at)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Retrieves a user by id.
    pub async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;
        let id = user_id.to_string();

        let user: Option<User> = conn
            .interact(move |conn| users::table.find(id).first(conn).optional())
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(user)
    }

    /// Stamps the terms-of-service version a user agreed to.
    pub async fn record_terms_agreement(
        &self,
        user_id: &str,
        version: &str,
        agreed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;
        let id = user_id.to_string();
        let version = version.to_string();

        conn.interact(move |conn| {
            diesel::update(users::table.find(id))
                .set((
                    users::terms_agreed_version.eq(Some(version)),
                    users::terms_agreed_at.eq(Some(agreed_at)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Counts all known users. Used by the health endpoint.
    pub async fn count(&self) -> Result<i64, StorageError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| users::table.count().first(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
