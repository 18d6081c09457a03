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

//! User upsert and terms-agreement tests.

use crate::fixtures;
use chrono::Utc;
use serial_test::serial;
use taskline::chat::LineProfile;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_upsert_keeps_first_profile_and_refreshes_sighting() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_upsert_keeps_first_profile_and_refreshes_sighting");
        return;
    };

    let user_id = format!("U{}", Uuid::new_v4().simple());
    let profile = LineProfile {
        display_name: Some("太郎".to_string()),
        picture_url: None,
        status_message: Some("hello".to_string()),
    };

    dal.users()
        .upsert_seen(&user_id, Some(&profile), "follow", Utc::now())
        .await
        .unwrap();

    // Later sighting with no profile must not erase the captured one.
    dal.users()
        .upsert_seen(&user_id, None, "message", Utc::now())
        .await
        .unwrap();

    let user = dal.users().get(&user_id).await.unwrap().unwrap();
    assert_eq!(user.user_name.as_deref(), Some("太郎"));
    assert_eq!(user.status_message.as_deref(), Some("hello"));
    assert_eq!(user.last_event.as_deref(), Some("message"));

    assert!(dal.users().exists(&user_id).await.unwrap());
    assert!(!dal
        .users()
        .exists(&format!("U{}", Uuid::new_v4().simple()))
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_terms_agreement_recorded() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_terms_agreement_recorded");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    dal.users()
        .record_terms_agreement(&user_id, "2024-06", Utc::now())
        .await
        .unwrap();

    let user = dal.users().get(&user_id).await.unwrap().unwrap();
    assert_eq!(user.terms_agreed_version.as_deref(), Some("2024-06"));
    assert!(user.terms_agreed_at.is_some());
}
