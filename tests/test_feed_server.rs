//! End-to-end feed serving against a mocked content platform
//!
//! Runs the real loader, cache and renderer behind the warp routes, with
//! wiremock standing in for the platform API.

use authorfeed::cache::{KeyValueStore, MemoryStore};
use authorfeed::config::FeedConfig;
use authorfeed::server::{bind_feed_server, feed_routes, FeedHandler};
use futures::future::join_all;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use warp::http::StatusCode;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = "/api/v1/article/user/public/page/get";

fn config_for(server: &MockServer) -> FeedConfig {
    let mut config = FeedConfig::default();
    config.upstream.api_base_url = format!("{}/api/v1", server.uri());
    config.upstream.timeout_ms = 1000;
    config.upstream.full_retries = 0;
    config
}

fn handler_for(server: &MockServer, store: Arc<MemoryStore>) -> Arc<FeedHandler> {
    Arc::new(FeedHandler::from_config(&config_for(server), store).unwrap())
}

fn listing() -> Vec<Value> {
    vec![
        json!({
            "id": 200,
            "title": "Members only",
            "free": false,
            "author": {"nickname": "Wayne"},
            "released_time": 1_700_000_100,
            "summary": "Paid summary"
        }),
        json!({
            "id": 100,
            "title": "Open to all",
            "free": true,
            "author": {"nickname": "Wayne"},
            "released_time": 1_700_000_000,
            "summary": "Free summary"
        }),
    ]
}

async fn mount_listing(server: &MockServer, articles: Vec<Value>) {
    let total = articles.len();

    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": -1,
            "data": [],
            "total": total
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("offset", "0"))
        .and(query_param("limit", total.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": -1,
            "data": articles,
            "total": total
        })))
        .mount(server)
        .await;
}

async fn mount_outage(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LISTING))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

async fn wait_for_entry(store: &MemoryStore, author: &str) {
    for _ in 0..100 {
        if matches!(store.get(author).await, Ok(Some(_))) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache entry for {author} never written");
}

#[tokio::test]
async fn test_live_feed_document() {
    let server = MockServer::start().await;
    mount_listing(&server, listing()).await;
    let routes = feed_routes(handler_for(&server, Arc::new(MemoryStore::new())));

    let response = warp::test::request().path("/wayne").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        body,
        json!({
            "version": "https://jsonfeed.org/version/1.1",
            "title": "wayne - 少数派作者",
            "home_page_url": "https://sspai.com/u/wayne/posts",
            "description": "wayne更新推送",
            "authors": [{"name": "wayne"}],
            "items": [
                {
                    "id": "https://sspai.com/post/200",
                    "url": "https://sspai.com/post/200",
                    "title": "[$] Members only",
                    "content_text": "Paid summary",
                    "date_published": "2023-11-14T22:15:00.000Z"
                },
                {
                    "id": "https://sspai.com/post/100",
                    "url": "https://sspai.com/post/100",
                    "title": "Open to all",
                    "content_text": "Free summary",
                    "date_published": "2023-11-14T22:13:20.000Z"
                }
            ]
        })
    );
}

#[tokio::test]
async fn test_author_slug_is_forwarded_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING))
        .and(query_param("slug", "少数派"))
        .and(query_param("object_type", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": -1,
            "data": [],
            "total": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    let routes = feed_routes(handler_for(&server, Arc::new(MemoryStore::new())));

    let response = warp::test::request()
        .path("/%E5%B0%91%E6%95%B0%E6%B4%BE")
        .reply(&routes)
        .await;

    // Zero total with nothing cached
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_missing_author() {
    let server = MockServer::start().await;
    let routes = feed_routes(handler_for(&server, Arc::new(MemoryStore::new())));

    let response = warp::test::request().path("/").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"error": "missing author"}));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_outage_without_cache_is_bad_gateway() {
    let server = MockServer::start().await;
    mount_outage(&server).await;
    let routes = feed_routes(handler_for(&server, Arc::new(MemoryStore::new())));

    let response = warp::test::request().path("/wayne").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({"error": "Can not get articles of author wayne"}));
}

#[tokio::test]
async fn test_outage_after_live_fetch_serves_cache() {
    let server = MockServer::start().await;
    mount_listing(&server, listing()).await;
    let store = Arc::new(MemoryStore::new());
    let routes = feed_routes(handler_for(&server, store.clone()));

    let live = warp::test::request().path("/wayne").reply(&routes).await;
    assert_eq!(live.status(), StatusCode::OK);
    wait_for_entry(&store, "wayne").await;

    server.reset().await;
    mount_outage(&server).await;

    let cached = warp::test::request().path("/wayne").reply(&routes).await;
    assert_eq!(cached.status(), StatusCode::OK);
    assert_eq!(cached.body(), live.body());
}

#[tokio::test]
async fn test_sentinel_error_serves_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": 40001})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let cached = json!([{
        "title": "Stored",
        "link": "https://sspai.com/post/7",
        "author": "Wayne",
        "pubDate": 1_600_000_000_000_i64,
        "summary": "From the cache"
    }]);
    store.put("wayne", cached.to_string()).await.unwrap();
    let routes = feed_routes(handler_for(&server, store));

    let response = warp::test::request().path("/wayne").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["items"][0]["title"], "Stored");
    assert_eq!(body["items"][0]["date_published"], "2020-09-13T12:26:40.000Z");
}

#[tokio::test]
async fn test_concurrent_requests_for_different_authors() {
    let server = MockServer::start().await;
    mount_listing(&server, listing()).await;
    let store = Arc::new(MemoryStore::new());
    let routes = feed_routes(handler_for(&server, store.clone()));

    let authors = ["alice", "bob", "carol", "dave"];
    let responses = join_all(authors.iter().map(|author| {
        let routes = routes.clone();
        async move {
            warp::test::request()
                .path(&format!("/{author}"))
                .reply(&routes)
                .await
        }
    }))
    .await;

    for (author, response) in authors.iter().zip(responses) {
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["title"], format!("{author} - 少数派作者"));
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    for author in authors {
        wait_for_entry(&store, author).await;
    }
}

#[tokio::test]
async fn test_bound_listener_serves_and_shuts_down() {
    let server = MockServer::start().await;
    mount_listing(&server, listing()).await;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (addr, serving) = bind_feed_server(
        handler_for(&server, Arc::new(MemoryStore::new())),
        SocketAddr::from(([127, 0, 0, 1], 0)),
        async move {
            let _ = shutdown_rx.await;
        },
    )
    .unwrap();
    let serving = tokio::spawn(serving);

    let response = reqwest::get(format!("http://{addr}/wayne")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap();
}
