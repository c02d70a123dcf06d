//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use congress_sync::config::Config;
use congress_sync::database::SqliteDatabase;
use congress_sync::sync::SyncOrchestrator;
use congress_sync::upstream::CongressClient;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CONGRESS: u32 = 118;
pub const PAGE_SIZE: u32 = 2;

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Configuration pointing at a mock upstream with fast, deterministic policies
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = server_uri.to_string();
    config.upstream.api_key = Some("test-key".to_string());
    config.upstream.page_size = PAGE_SIZE;
    config.rate_limit.requests_per_hour = 1_000_000;
    config.rate_limit.burst_capacity = 1_000;
    config.retry.max_retries = 0;
    config.retry.jitter = false;
    config.sync.batch_size = 2;
    config.sync.congresses = vec![CONGRESS];
    config.sync.page_retry_delay_ms = 0;
    config.sync.fetch_bill_details = false;
    config
}

/// Build an orchestrator wired to a real client and store
pub fn create_orchestrator(config: &Config, db: Arc<SqliteDatabase>) -> Arc<SyncOrchestrator> {
    let client = CongressClient::from_config(config).expect("Failed to build client");
    Arc::new(SyncOrchestrator::new(config, Arc::new(client), db))
}

pub fn bill_json(number: u32) -> Value {
    json!({
        "congress": CONGRESS,
        "number": number.to_string(),
        "type": "HR",
        "title": format!("Test Bill {}", number),
        "updateDate": "2024-03-01",
        "latestAction": {
            "actionDate": "2024-02-15",
            "text": "Referred to the House Committee on Energy and Commerce."
        }
    })
}

/// A page of bills, with a next link when more pages follow
pub fn bills_page(numbers: &[u32], has_next: bool) -> Value {
    let bills: Vec<Value> = numbers.iter().map(|n| bill_json(*n)).collect();
    let mut pagination = json!({ "count": 6 });
    if has_next {
        pagination["next"] = json!(format!(
            "https://api.congress.gov/v3/bill/{}?offset=next",
            CONGRESS
        ));
    }
    json!({ "bills": bills, "pagination": pagination })
}

/// Answer one offset of a list endpoint
pub async fn mount_page(server: &MockServer, route: &str, offset: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .and(query_param("offset", offset.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Committees and members report no data for the test congress
pub async fn mount_empty_committees_and_members(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/committee/{}", CONGRESS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/member/congress/{}", CONGRESS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Three full pages of bills followed by a 404 at offset 6
pub async fn mount_three_bill_pages(server: &MockServer) {
    let route = format!("/bill/{}", CONGRESS);
    mount_page(
        server,
        &route,
        0,
        ResponseTemplate::new(200).set_body_json(bills_page(&[1, 2], true)),
    )
    .await;
    mount_page(
        server,
        &route,
        2,
        ResponseTemplate::new(200).set_body_json(bills_page(&[3, 4], true)),
    )
    .await;
    mount_page(
        server,
        &route,
        4,
        ResponseTemplate::new(200).set_body_json(bills_page(&[5, 6], true)),
    )
    .await;
    mount_page(server, &route, 6, ResponseTemplate::new(404)).await;
}
