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

//! Idempotency and entitlement tests for Stripe reconciliation.

use crate::fixtures;
use chrono::{NaiveDate, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serial_test::serial;
use sha2::Sha256;
use taskline::dal::ReconcileOutcome;
use taskline::error::StripeWebhookError;
use taskline::stripe::{ParsedEvent, Reconciler};
use uuid::Uuid;

fn checkout_body(event_id: &str, reference: &str, created: i64) -> Vec<u8> {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": created,
        "data": {
            "object": {
                "client_reference_id": reference,
                "amount_total": 12000,
                "currency": "jpy",
                "created": created
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn stripe_signature(body: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(body);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
#[serial]
async fn test_duplicate_event_applies_entitlement_once() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_duplicate_event_applies_entitlement_once");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "有料タスク", "pc-pay").await;

    // 2024-01-31T10:00:00Z -> Jan 31 19:00 JST; +3 months clamps to Apr 30.
    let paid_at = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let body = checkout_body(
        &event_id,
        &format!("{}_3m", task.task_id),
        paid_at.timestamp(),
    );
    let event = ParsedEvent::parse(&body).unwrap();

    let first = dal
        .payment_events()
        .reconcile_checkout(event.clone(), Utc::now())
        .await
        .unwrap();
    let expected_expiry_date = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
    match first {
        ReconcileOutcome::Applied {
            task_id,
            payment_date,
            payment_amount,
            new_expires_at,
            ..
        } => {
            assert_eq!(task_id, task.task_id);
            assert_eq!(payment_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
            assert_eq!(payment_amount, "12000 JPY");
            let expiry = new_expires_at.expect("3m plan extends expiry");
            assert_eq!(
                expiry.with_timezone(&taskline::entitlement::TOKYO).date_naive(),
                expected_expiry_date
            );
        }
        other => panic!("Expected Applied, got {:?}", other),
    }

    let after_first = dal.tasks().get_by_id(task.task_id).await.unwrap().unwrap();

    // Redelivery: same event id, no second application.
    let second = dal
        .payment_events()
        .reconcile_checkout(event, Utc::now())
        .await
        .unwrap();
    assert_eq!(second, ReconcileOutcome::Duplicate);

    let after_second = dal.tasks().get_by_id(task.task_id).await.unwrap().unwrap();
    assert_eq!(after_first.expires_at, after_second.expires_at);
    assert_eq!(after_first.payment_date, after_second.payment_date);
    assert_eq!(after_first.payment_amount, after_second.payment_amount);
}

#[tokio::test]
#[serial]
async fn test_renewal_stacks_from_current_expiry() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_renewal_stacks_from_current_expiry");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "更新タスク", "pc-pay").await;

    // First purchase: 6 months from 2024-01-10.
    let first_paid = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
    let body = checkout_body(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &format!("{}_6m", task.task_id),
        first_paid.timestamp(),
    );
    dal.payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();

    // Early renewal in March extends from July, not from March.
    let renewal_paid = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let body = checkout_body(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &format!("{}_6m", task.task_id),
        renewal_paid.timestamp(),
    );
    dal.payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();

    let task_row = dal.tasks().get_by_id(task.task_id).await.unwrap().unwrap();
    let expiry = task_row.expires_at.expect("expiry set");
    assert_eq!(
        expiry.with_timezone(&taskline::entitlement::TOKYO).date_naive(),
        NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
    );
}

#[tokio::test]
#[serial]
async fn test_legacy_one_month_records_payment_without_extension() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_legacy_one_month_records_payment_without_extension");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "旧プランタスク", "pc-pay").await;

    let body = checkout_body(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &format!("{}_1m", task.task_id),
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap().timestamp(),
    );
    let outcome = dal
        .payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::Applied { new_expires_at, .. } => {
            assert_eq!(new_expires_at, None, "1m must not extend expiry");
        }
        other => panic!("Expected Applied, got {:?}", other),
    }

    let task_row = dal.tasks().get_by_id(task.task_id).await.unwrap().unwrap();
    assert!(task_row.expires_at.is_none());
    assert!(task_row.payment_date.is_some());
}

#[tokio::test]
#[serial]
async fn test_non_checkout_events_recorded_and_ignored() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_non_checkout_events_recorded_and_ignored");
        return;
    };

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let body = serde_json::json!({
        "id": event_id,
        "type": "invoice.paid",
        "created": 1700000000
    })
    .to_string()
    .into_bytes();

    let outcome = dal
        .payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Ignored {
            event_type: "invoice.paid".to_string()
        }
    );

    // Ignored events still occupy the ledger: a redelivery is a duplicate.
    let outcome = dal
        .payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Duplicate);
}

#[tokio::test]
#[serial]
async fn test_unknown_task_acknowledged_with_warning() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_unknown_task_acknowledged_with_warning");
        return;
    };

    let missing = Uuid::new_v4();
    let body = checkout_body(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &format!("{}_3m", missing),
        1_700_000_000,
    );
    let outcome = dal
        .payment_events()
        .reconcile_checkout(ParsedEvent::parse(&body).unwrap(), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::TaskNotFound {
            task_id: missing.to_string()
        }
    );
}

#[tokio::test]
#[serial]
async fn test_record_if_new_reports_duplicates() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_record_if_new_reports_duplicates");
        return;
    };

    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    let payload = serde_json::json!({ "id": event_id });

    let first = dal
        .payment_events()
        .record_if_new(&event_id, payload.clone())
        .await
        .unwrap();
    assert!(first);

    let second = dal
        .payment_events()
        .record_if_new(&event_id, payload.clone())
        .await
        .unwrap();
    assert!(!second);

    // The stored row keeps the original payload for audit.
    let stored = dal.payment_events().get(&event_id).await.unwrap().unwrap();
    assert_eq!(stored.event_id, event_id);
    assert_eq!(stored.payload, payload);
}

#[tokio::test]
#[serial]
async fn test_reconciler_end_to_end_signature_flow() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_reconciler_end_to_end_signature_flow");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "署名テスト", "pc-pay").await;

    let secret = "whsec_integration";
    let reconciler = Reconciler::new(dal.clone(), secret.to_string(), 300);

    let now = Utc::now();
    let body = checkout_body(
        &format!("evt_{}", Uuid::new_v4().simple()),
        &format!("{}_12m", task.task_id),
        now.timestamp(),
    );
    let header = stripe_signature(&body, secret, now.timestamp());

    let outcome = reconciler
        .process(&body, Some(&header), now)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));

    // A forged digest is rejected before any storage work.
    let bad_header = stripe_signature(&body, "whsec_wrong", now.timestamp());
    let err = reconciler
        .process(&body, Some(&bad_header), now)
        .await
        .unwrap_err();
    assert!(matches!(err, StripeWebhookError::SignatureMismatch));

    // An unconfigured secret is a server fault, not a signature failure.
    let broken = Reconciler::new(dal.clone(), "".to_string(), 300);
    assert!(matches!(
        broken.process(&body, Some(&header), now).await,
        Err(StripeWebhookError::MisconfiguredSecret)
    ));
}
