//! Paginated listing of existing entity ids

mod common;

use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use seed_common::RemoteId;
use seed_ingest::pagination::PaginatedFetcher;

use common::fast_dispatcher;

async fn mount_page(server: &MockServer, page: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pages_are_concatenated_in_order() {
    let server = MockServer::start().await;
    mount_page(&server, "0", json!({"content": [{"id": 1}, {"id": 2}], "last": false})).await;
    mount_page(&server, "1", json!({"content": [{"id": 3}], "last": false})).await;
    mount_page(&server, "2", json!({"content": [{"id": "s-4"}], "last": true})).await;

    let fetcher = PaginatedFetcher::new(&fast_dispatcher(1), 2);
    let ids = fetcher
        .fetch_all_ids(&format!("{}/estudiantes", server.uri()))
        .await;

    assert_eq!(
        ids.into_vec(),
        vec![
            RemoteId::Int(1),
            RemoteId::Int(2),
            RemoteId::Int(3),
            RemoteId::from("s-4"),
        ]
    );
}

#[tokio::test]
async fn test_page_size_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", "0"))
        .and(query_param("size", "25"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 1}], "last": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ids = PaginatedFetcher::new(&fast_dispatcher(1), 25)
        .fetch_all_ids(&format!("{}/estudiantes", server.uri()))
        .await;
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_walk_stops_at_last_page() {
    let server = MockServer::start().await;
    mount_page(&server, "0", json!({"content": [{"id": 1}], "last": true})).await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 2}], "last": true})),
        )
        .expect(0)
        .mount(&server)
        .await;

    let ids = PaginatedFetcher::new(&fast_dispatcher(1), 10)
        .fetch_all_ids(&format!("{}/estudiantes", server.uri()))
        .await;
    assert_eq!(ids.into_vec(), vec![RemoteId::Int(1)]);
}

#[tokio::test]
async fn test_failed_page_returns_partial_ids() {
    let server = MockServer::start().await;
    mount_page(&server, "0", json!({"content": [{"id": 1}, {"id": 2}], "last": false})).await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let ids = PaginatedFetcher::new(&fast_dispatcher(3), 2)
        .fetch_all_ids(&format!("{}/estudiantes", server.uri()))
        .await;
    assert_eq!(ids.into_vec(), vec![RemoteId::Int(1), RemoteId::Int(2)]);
}

#[tokio::test]
async fn test_empty_unflagged_page_ends_walk() {
    let server = MockServer::start().await;
    let first = json!({"content": [{"id": 1}, {"nombre": "no id"}], "last": false});
    mount_page(&server, "0", first).await;
    mount_page(&server, "1", json!({"content": [], "last": false})).await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 9}], "last": true})),
        )
        .expect(0)
        .mount(&server)
        .await;

    let ids = PaginatedFetcher::new(&fast_dispatcher(1), 2)
        .fetch_all_ids(&format!("{}/estudiantes", server.uri()))
        .await;
    assert_eq!(ids.into_vec(), vec![RemoteId::Int(1)]);
}

#[tokio::test]
async fn test_unreachable_service_yields_empty_set() {
    let ids = PaginatedFetcher::new(&fast_dispatcher(1), 10)
        .fetch_all_ids("http://127.0.0.1:9/estudiantes")
        .await;
    assert!(ids.is_empty());
}
