//! Detail resolution against a simulated upstream.

use catalog::HttpCatalog;
use catalog::config::{CatalogConfig, Endpoints};
use gateway::resolver::{Resolution, Resolver};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog_config(server: &MockServer) -> CatalogConfig {
    let url = |p: &str| Url::parse(&format!("{}{}", server.uri(), p)).unwrap();
    let mut config = CatalogConfig::new(Endpoints {
        trending: url("/trending"),
        latest: url("/latest"),
        for_you: url("/foryou"),
        popular_search: url("/populersearch"),
        search: url("/search"),
        episodes: url("/allepisode"),
    });
    config.retry_backoff_ms = 10;
    config.timeout_secs = 5;
    config
}

fn resolver(server: &MockServer) -> Resolver {
    let catalog = HttpCatalog::new(&catalog_config(server)).unwrap();
    Resolver::new(Arc::new(catalog))
}

async fn mount_list(server: &MockServer, p: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_failing(server: &MockServer, p: &str) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_found_in_trending_is_enriched_once() {
    let server = MockServer::start().await;

    mount_list(&server, "/trending", json!([{"bookId": "A", "bookName": "Foo", "cover": "a.jpg"}])).await;
    mount_list(&server, "/latest", json!([])).await;
    mount_list(&server, "/foryou", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Foo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"bookId": "A", "bookName": "Foo", "introduction": "desc", "tagNames": ["x"], "protagonist": "Lin"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let Resolution::Found(record) = resolver(&server).resolve_by_id("A").await else {
        panic!("expected a record");
    };

    assert_eq!(record.id, "A");
    assert_eq!(record.title, "Foo");
    assert_eq!(record.cover_image, "a.jpg");
    assert_eq!(record.summary, "desc");
    assert_eq!(record.tags, vec!["x"]);
    assert_eq!(record.lead_character, "Lin");
}

#[tokio::test]
async fn test_complete_record_skips_search() {
    let server = MockServer::start().await;

    mount_list(
        &server,
        "/latest",
        json!([{"bookId": "B", "bookName": "Bar", "introduction": "already here"}]),
    )
    .await;
    mount_list(&server, "/trending", json!([])).await;
    mount_list(&server, "/foryou", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let resolution = resolver(&server).resolve_by_id("B").await;

    let Resolution::Found(record) = resolution else {
        panic!("expected a record");
    };
    assert_eq!(record.summary, "already here");
}

#[tokio::test]
async fn test_failing_sources_are_skipped() {
    let server = MockServer::start().await;

    mount_failing(&server, "/trending").await;
    mount_failing(&server, "/latest").await;
    mount_list(
        &server,
        "/foryou",
        json!([
            {"tagCardVo": {"tagBooks": [{"bookId": "X"}]}},
            {"tagCardVo": {"tagBooks": [{"bookId": "C", "bookName": "Baz", "introduction": "ok"}]}}
        ]),
    )
    .await;

    let Resolution::Found(record) = resolver(&server).resolve_by_id("C").await else {
        panic!("expected a record");
    };
    assert_eq!(record.title, "Baz");
}

#[tokio::test]
async fn test_not_found_never_searches() {
    let server = MockServer::start().await;

    mount_list(&server, "/trending", json!([{"bookId": "Z"}])).await;
    mount_list(&server, "/latest", json!([])).await;
    mount_failing(&server, "/foryou").await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"bookId": "A"}])))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(
        resolver(&server).resolve_by_id("A").await,
        Resolution::NotFound
    );
}

#[tokio::test]
async fn test_enrichment_failure_keeps_record() {
    let server = MockServer::start().await;

    mount_list(&server, "/trending", json!([{"bookId": "A", "bookName": "Foo", "tags": ["t"]}])).await;
    mount_list(&server, "/latest", json!([])).await;
    mount_list(&server, "/foryou", json!([])).await;
    mount_failing(&server, "/search").await;

    let Resolution::Found(record) = resolver(&server).resolve_by_id("A").await else {
        panic!("expected a record");
    };
    assert_eq!(record.title, "Foo");
    assert_eq!(record.summary, "");
    assert_eq!(record.tags, vec!["t"]);
}

#[tokio::test]
async fn test_fanout_deadline_bounds_slow_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"bookId": "A", "bookName": "Slow", "introduction": "s"}]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_list(
        &server,
        "/latest",
        json!([{"bookId": "A", "bookName": "Fast", "introduction": "f"}]),
    )
    .await;
    mount_list(&server, "/foryou", json!([])).await;

    let resolver = resolver(&server).with_fanout_deadline(Duration::from_millis(500));

    let Resolution::Found(record) = resolver.resolve_by_id("A").await else {
        panic!("expected a record");
    };
    assert_eq!(record.title, "Fast");
}
