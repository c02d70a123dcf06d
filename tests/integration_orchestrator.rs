//! End-to-end sync runs against a mock congress.gov and an in-memory store
//!
//! Tests the orchestrator including:
//! - Paging through a stream until the 404 sentinel
//! - Idempotent re-runs
//! - Same-offset retries and stalled streams
//! - Run records and the incremental watermark

mod common;

use std::sync::Arc;

use common::*;
use congress_sync::database::Database;
use congress_sync::models::{BillStatus, SyncOutcome};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test 1: Three pages then a 404 stores every bill
#[tokio::test]
async fn test_full_run_pages_until_not_found() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;
    mount_three_bill_pages(&server).await;

    let db = create_test_database().await;
    let orchestrator = create_orchestrator(&test_config(&server.uri()), Arc::clone(&db));

    let report = match orchestrator.run().await {
        SyncOutcome::Completed(report) => report,
        SyncOutcome::AlreadyRunning => panic!("run should not be rejected"),
    };

    assert!(report.success, "errors: {:?}", report.errors);
    assert!(!report.aborted);
    assert!(!report.stalled);
    assert_eq!(report.stats.bills.processed, 6);
    assert_eq!(report.stats.bills.created, 6);
    assert_eq!(report.stats.bills.errors, 0);
    assert_eq!(report.stats.committees.processed, 0);
    assert_eq!(report.stats.legislators.processed, 0);
    assert!(report.errors.is_empty());

    assert_eq!(db.count_bills().await.unwrap(), 6);
    let bill = db.find_bill("hr1-118").await.unwrap().unwrap();
    assert_eq!(bill.title, "Test Bill 1");
    assert_eq!(bill.status, BillStatus::InCommittee);
}

/// Test 2: A second run over the same data updates instead of duplicating
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;
    mount_three_bill_pages(&server).await;

    let db = create_test_database().await;
    let orchestrator = create_orchestrator(&test_config(&server.uri()), Arc::clone(&db));

    let first = orchestrator.run().await;
    assert_eq!(first.report().unwrap().stats.bills.created, 6);

    let second = orchestrator.run().await;
    let report = second.report().unwrap();
    assert!(report.success);
    assert_eq!(report.stats.bills.created, 0);
    assert_eq!(report.stats.bills.updated, 6);

    assert_eq!(db.count_bills().await.unwrap(), 6);
}

/// Test 3: A persistently failing offset stalls its stream and blocks the watermark
#[tokio::test]
async fn test_failing_offset_stalls_stream() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;

    let route = format!("/bill/{}", CONGRESS);
    mount_page(
        &server,
        &route,
        0,
        ResponseTemplate::new(200).set_body_json(bills_page(&[1, 2], true)),
    )
    .await;
    mount_page(
        &server,
        &route,
        2,
        ResponseTemplate::new(200).set_body_json(bills_page(&[3, 4], true)),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(route.clone()))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let db = create_test_database().await;
    let config = test_config(&server.uri());
    assert_eq!(config.sync.max_consecutive_errors, 3);
    let orchestrator = create_orchestrator(&config, Arc::clone(&db));

    let report = orchestrator.run().await.report().cloned().unwrap();

    assert!(report.stalled);
    assert!(!report.aborted);
    assert!(!report.success);
    assert_eq!(report.stats.bills.processed, 4);
    assert!(report
        .errors
        .iter()
        .any(|e| e.id == format!("bills-{}@4", CONGRESS)));

    // Items already written are kept
    assert_eq!(db.count_bills().await.unwrap(), 4);

    // Stalled runs are recorded but never advance the watermark
    assert_eq!(db.last_successful_sync().await.unwrap(), None);
    assert_eq!(orchestrator.state().last_successful_sync_at, None);
}

/// Test 4: A 404 on the very first page is an empty, successful stream
#[tokio::test]
async fn test_not_found_on_first_page() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;
    mount_page(
        &server,
        &format!("/bill/{}", CONGRESS),
        0,
        ResponseTemplate::new(404),
    )
    .await;

    let db = create_test_database().await;
    let orchestrator = create_orchestrator(&test_config(&server.uri()), Arc::clone(&db));

    let report = orchestrator.run().await.report().cloned().unwrap();

    assert!(report.success);
    assert_eq!(report.stats.bills.processed, 0);
    assert!(report.errors.is_empty());
    assert_eq!(db.count_bills().await.unwrap(), 0);
}

/// Test 5: A successful run is persisted and restores into a fresh orchestrator
#[tokio::test]
async fn test_watermark_survives_restart() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;
    mount_three_bill_pages(&server).await;

    let db = create_test_database().await;
    let config = test_config(&server.uri());

    let first = create_orchestrator(&config, Arc::clone(&db));
    let report = first.run().await.report().cloned().unwrap();
    assert!(report.success);

    let stored = db.last_successful_sync().await.unwrap();
    assert_eq!(stored, Some(report.started_at));

    let restarted = create_orchestrator(&config, Arc::clone(&db));
    assert_eq!(restarted.state().last_successful_sync_at, None);
    let restored = restarted.restore_state().await.unwrap();
    assert_eq!(restored, Some(report.started_at));
    assert_eq!(
        restarted.state().last_successful_sync_at,
        Some(report.started_at)
    );
}

/// Test 6: Records that fail normalization are reported without stopping the stream
#[tokio::test]
async fn test_rejected_records_are_item_errors() {
    let server = MockServer::start().await;
    mount_empty_committees_and_members(&server).await;

    let mut bad = bill_json(2);
    bad["type"] = serde_json::json!("XYZ");
    let body = serde_json::json!({
        "bills": [bill_json(1), bad],
        "pagination": { "count": 2 }
    });
    mount_page(
        &server,
        &format!("/bill/{}", CONGRESS),
        0,
        ResponseTemplate::new(200).set_body_json(body),
    )
    .await;

    let db = create_test_database().await;
    let orchestrator = create_orchestrator(&test_config(&server.uri()), Arc::clone(&db));

    let report = orchestrator.run().await.report().cloned().unwrap();

    assert!(report.success);
    assert_eq!(report.stats.bills.processed, 2);
    assert_eq!(report.stats.bills.created, 1);
    assert_eq!(report.stats.bills.errors, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(db.count_bills().await.unwrap(), 1);
}
