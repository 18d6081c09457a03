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

//! Concurrency and state-machine tests for the rerun admission queue.
//!
//! The central assertion: for one task, N concurrent enqueues admit exactly
//! one request. The partial unique index is what makes that hold; these
//! tests would catch any regression to check-then-insert.

use crate::fixtures;
use serial_test::serial;
use std::sync::Arc;
use taskline::dal::RerunFilter;
use taskline::error::QueueError;
use taskline::models::rerun_request::RerunStatus;
use tokio::sync::Barrier;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_concurrent_enqueue_admits_exactly_one() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_concurrent_enqueue_admits_exactly_one");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "在庫同期", "pc-alpha").await;

    const NUM_REQUESTERS: usize = 8;
    let barrier = Arc::new(Barrier::new(NUM_REQUESTERS));
    let mut handles = Vec::new();

    for i in 0..NUM_REQUESTERS {
        let dal = dal.clone();
        let user_id = user_id.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            dal.rerun_queue()
                .enqueue(&user_id, "在庫同期", Some(&format!("requester-{}", i)))
                .await
        }));
    }

    let mut admitted = 0;
    let mut already_pending = 0;
    for handle in handles {
        match handle.await.expect("Requester task panicked") {
            Ok(result) => {
                admitted += 1;
                assert_eq!(result.task_id, task.task_id);
                assert_eq!(result.pc_name, "pc-alpha");
            }
            Err(QueueError::AlreadyPending { task_id }) => {
                already_pending += 1;
                assert_eq!(task_id, task.task_id);
            }
            Err(e) => panic!("Unexpected enqueue error: {:?}", e),
        }
    }

    assert_eq!(
        admitted, 1,
        "RACE DETECTED: {} of {} concurrent enqueues were admitted",
        admitted, NUM_REQUESTERS
    );
    assert_eq!(already_pending, NUM_REQUESTERS - 1);
}

#[tokio::test]
#[serial]
async fn test_enqueue_matches_full_width_space_names() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_enqueue_matches_full_width_space_names");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "通勤バス 乗車記録", "pc-beta").await;

    // Typed with a full-width space; stored with a regular space.
    let admitted = dal
        .rerun_queue()
        .enqueue(&user_id, "通勤バス\u{3000}乗車記録", None)
        .await
        .expect("Normalized name should resolve");
    assert_eq!(admitted.task_id, task.task_id);
    assert_eq!(admitted.task_name, "通勤バス 乗車記録");
}

#[tokio::test]
#[serial]
async fn test_enqueue_unknown_name_is_not_found() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_enqueue_unknown_name_is_not_found");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    fixtures::seed_task(&dal, &user_id, "日次レポート", "pc-alpha").await;

    let result = dal.rerun_queue().enqueue(&user_id, "存在しない", None).await;
    assert!(matches!(result, Err(QueueError::TaskNotFound { .. })));
}

#[tokio::test]
#[serial]
async fn test_enqueue_disabled_task_creates_no_row() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_enqueue_disabled_task_creates_no_row");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let task = fixtures::seed_task(&dal, &user_id, "夜間バッチ", "pc-alpha").await;
    dal.tasks()
        .set_enabled(task.task_id, false)
        .await
        .expect("Failed to disable task");

    let result = dal.rerun_queue().enqueue(&user_id, "夜間バッチ", None).await;
    assert!(matches!(result, Err(QueueError::TaskDisabled { .. })));

    let rows = dal.rerun_queue().list(RerunFilter::All).await.unwrap();
    assert!(
        !rows.iter().any(|r| r.task_id == task.task_id),
        "Disabled task must not gain a queue row"
    );
}

#[tokio::test]
#[serial]
async fn test_ambiguous_names_resolve_to_newest_task() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_ambiguous_names_resolve_to_newest_task");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let _older = fixtures::seed_task(&dal, &user_id, "重複タスク", "pc-old").await;
    let newer = fixtures::seed_task(&dal, &user_id, "重複\u{3000}タスク", "pc-new").await;

    let admitted = dal
        .rerun_queue()
        .enqueue(&user_id, "重複 タスク", None)
        .await
        .expect("Ambiguous name should still resolve");
    assert_eq!(admitted.task_id, newer.task_id);
    assert_eq!(admitted.pc_name, "pc-new");
}

#[tokio::test]
#[serial]
async fn test_cancel_only_from_queued() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_cancel_only_from_queued");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    fixtures::seed_task(&dal, &user_id, "請求書発行", "pc-gamma").await;

    let admitted = dal
        .rerun_queue()
        .enqueue(&user_id, "請求書発行", None)
        .await
        .unwrap();

    // Runner claims it; cancel must now be refused without mutating status.
    let claimed = dal
        .rerun_queue()
        .claim_next("pc-gamma", "runner-1")
        .await
        .unwrap()
        .expect("A queued request should be claimable");
    assert_eq!(claimed.request_id, admitted.request_id);
    assert_eq!(claimed.parsed_status(), Some(RerunStatus::Running));
    assert_eq!(claimed.locked_by.as_deref(), Some("runner-1"));
    assert!(claimed.locked_at.is_some());
    assert!(claimed.started_at.is_some());

    let result = dal.rerun_queue().cancel(admitted.request_id).await;
    match result {
        Err(QueueError::InvalidTransition { status, .. }) => assert_eq!(status, "running"),
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }

    let current = dal
        .rerun_queue()
        .get_by_id(admitted.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.parsed_status(), Some(RerunStatus::Running));

    // Let the runner finish so later assertions see a terminal record.
    let finished = dal
        .rerun_queue()
        .finish(admitted.request_id, 0, Some("ok".into()), None)
        .await
        .unwrap();
    assert_eq!(finished.parsed_status(), Some(RerunStatus::Done));
    assert!(finished.finished_at.is_some());
}

#[tokio::test]
#[serial]
async fn test_cancel_queued_stamps_finished_at() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_cancel_queued_stamps_finished_at");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    fixtures::seed_task(&dal, &user_id, "勤怠集計", "pc-alpha").await;

    let admitted = dal
        .rerun_queue()
        .enqueue(&user_id, "勤怠集計", None)
        .await
        .unwrap();
    let canceled = dal.rerun_queue().cancel(admitted.request_id).await.unwrap();
    assert_eq!(canceled.parsed_status(), Some(RerunStatus::Canceled));
    assert!(canceled.finished_at.is_some());

    // The admission slot is free again.
    let again = dal.rerun_queue().enqueue(&user_id, "勤怠集計", None).await;
    assert!(again.is_ok(), "Canceling must free the admission slot");
}

#[tokio::test]
#[serial]
async fn test_delete_protects_active_records() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_delete_protects_active_records");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    fixtures::seed_task(&dal, &user_id, "棚卸し", "pc-delta").await;

    let admitted = dal.rerun_queue().enqueue(&user_id, "棚卸し", None).await.unwrap();

    // queued -> protected
    let result = dal.rerun_queue().delete(admitted.request_id).await;
    match result {
        Err(QueueError::ActiveRecordProtected { status, .. }) => assert_eq!(status, "queued"),
        other => panic!("Expected ActiveRecordProtected, got {:?}", other),
    }

    // running -> protected
    dal.rerun_queue()
        .claim_next("pc-delta", "runner-2")
        .await
        .unwrap()
        .expect("claimable");
    assert!(matches!(
        dal.rerun_queue().delete(admitted.request_id).await,
        Err(QueueError::ActiveRecordProtected { .. })
    ));

    // terminal -> deletable
    dal.rerun_queue()
        .finish(admitted.request_id, 2, None, Some("boom".into()))
        .await
        .unwrap();
    dal.rerun_queue()
        .delete(admitted.request_id)
        .await
        .expect("Terminal records are deletable");
    assert!(dal
        .rerun_queue()
        .get_by_id(admitted.request_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[serial]
async fn test_cancel_and_delete_unknown_request() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_cancel_and_delete_unknown_request");
        return;
    };

    let missing = Uuid::new_v4();
    assert!(matches!(
        dal.rerun_queue().cancel(missing).await,
        Err(QueueError::RequestNotFound { .. })
    ));
    assert!(matches!(
        dal.rerun_queue().delete(missing).await,
        Err(QueueError::RequestNotFound { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_claim_takes_oldest_for_matching_pc_only() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_claim_takes_oldest_for_matching_pc_only");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let pc = format!("pc-{}", Uuid::new_v4().simple());
    fixtures::seed_task(&dal, &user_id, "最初のタスク", &pc).await;
    fixtures::seed_task(&dal, &user_id, "次のタスク", &pc).await;

    let first = dal
        .rerun_queue()
        .enqueue(&user_id, "最初のタスク", None)
        .await
        .unwrap();
    let second = dal
        .rerun_queue()
        .enqueue(&user_id, "次のタスク", None)
        .await
        .unwrap();

    let claimed = dal.rerun_queue().claim_next(&pc, "runner-3").await.unwrap();
    assert_eq!(claimed.map(|r| r.request_id), Some(first.request_id));

    let claimed = dal.rerun_queue().claim_next(&pc, "runner-3").await.unwrap();
    assert_eq!(claimed.map(|r| r.request_id), Some(second.request_id));

    // Queue drained for this pc.
    assert!(dal
        .rerun_queue()
        .claim_next(&pc, "runner-3")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[serial]
async fn test_list_orders_running_before_queued() {
    let Some(dal) = fixtures::test_dal().await else {
        fixtures::skip_notice("test_list_orders_running_before_queued");
        return;
    };

    let user_id = fixtures::seed_user(&dal).await;
    let pc = format!("pc-{}", Uuid::new_v4().simple());
    let running_task = fixtures::seed_task(&dal, &user_id, "実行中タスク", &pc).await;
    let queued_task = fixtures::seed_task(&dal, &user_id, "待機タスク", "pc-elsewhere").await;

    let running = dal
        .rerun_queue()
        .enqueue(&user_id, "実行中タスク", None)
        .await
        .unwrap();
    let queued = dal
        .rerun_queue()
        .enqueue(&user_id, "待機タスク", None)
        .await
        .unwrap();
    dal.rerun_queue().claim_next(&pc, "runner-4").await.unwrap();

    let rows = dal.rerun_queue().list(RerunFilter::Active).await.unwrap();
    let ours: Vec<_> = rows
        .iter()
        .filter(|r| r.task_id == running_task.task_id || r.task_id == queued_task.task_id)
        .collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].request_id, running.request_id, "running sorts first");
    assert_eq!(ours[1].request_id, queued.request_id);

    let only_queued = dal
        .rerun_queue()
        .list(RerunFilter::Status(RerunStatus::Queued))
        .await
        .unwrap();
    assert!(only_queued.iter().all(|r| r.status == "queued"));
}
