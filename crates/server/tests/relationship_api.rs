use affinity_server::cache::ExistenceCache;
use affinity_server::config::{AppState, ServerConfig};
use affinity_server::content::{EntityKind, SqliteContentStore};
use affinity_server::core::auth::SqliteSessionProvider;
use affinity_server::core::db::open_pool;
use affinity_server::relationships::{SqliteRelationshipStore, ToggleEngine};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

struct Harness {
    router: Router,
    alice: String,
    bob: String,
    carol: String,
    _dir: TempDir,
}

async fn setup(prefer_native_toggle: bool) -> Harness {
    let dir = tempdir().unwrap();
    let pool = open_pool(dir.path()).await.unwrap();

    let sessions = Arc::new(SqliteSessionProvider::new(pool.clone(), 30).await.unwrap());
    let content = Arc::new(SqliteContentStore::new(pool.clone()).await.unwrap());
    let store = Arc::new(SqliteRelationshipStore::new(pool).await.unwrap());

    for user in ["alice", "bob", "carol"] {
        content.register(user, EntityKind::User, None).await.unwrap();
    }
    content
        .register("post-1", EntityKind::Post, Some("alice"))
        .await
        .unwrap();

    let config = ServerConfig {
        prefer_native_toggle,
        ..ServerConfig::with_base_dir(dir.path())
    };
    let cache = Arc::new(ExistenceCache::new(config.cache_ttl()));
    let engine = Arc::new(ToggleEngine::new(
        store,
        content,
        cache,
        config.engine_options(),
    ));
    let state = AppState::new(engine, sessions.clone());

    Harness {
        router: affinity_server::build_router(state),
        alice: sessions.create_session("alice").await.unwrap(),
        bob: sessions.create_session("bob").await.unwrap(),
        carol: sessions.create_session("carol").await.unwrap(),
        _dir: dir,
    }
}

async fn call(router: &Router, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {}", t));
    }
    let req = builder.body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn toggle_like_on_then_off() {
    for native in [true, false] {
        let h = setup(native).await;
        let uri = "/relationships/like/post-1/toggle";

        let (s, body) = call(&h.router, "POST", uri, Some(&h.bob)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body, json!({"present": true, "count": 1}));

        let (s, body) = call(&h.router, "POST", uri, Some(&h.bob)).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body, json!({"present": false, "count": 0}));
    }
}

#[tokio::test]
async fn toggle_requires_session() {
    let h = setup(true).await;
    let uri = "/relationships/like/post-1/toggle";

    let (s, body) = call(&h.router, "POST", uri, None).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    let (s, _) = call(&h.router, "POST", uri, Some("not-a-session")).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn toggle_missing_target_is_404() {
    let h = setup(true).await;
    let (s, body) = call(&h.router, "POST", "/relationships/like/post-404/toggle", Some(&h.bob)).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    // A user id is not likeable content.
    let (s, _) = call(&h.router, "POST", "/relationships/like/alice/toggle", Some(&h.bob)).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggle_rejects_bad_input() {
    let h = setup(true).await;

    let (s, body) = call(&h.router, "POST", "/relationships/poke/post-1/toggle", Some(&h.bob)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (s, _) = call(&h.router, "POST", "/relationships/follow/alice/toggle", Some(&h.alice)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, _) = call(&h.router, "POST", "/relationships/like/post%201/toggle", Some(&h.bob)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn read_is_count_only_without_session() {
    let h = setup(true).await;
    call(&h.router, "POST", "/relationships/follow/alice/toggle", Some(&h.bob)).await;

    let (s, body) = call(&h.router, "GET", "/relationships/follow/alice", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body, json!({"count": 1}));

    let (_, body) = call(&h.router, "GET", "/relationships/follow/alice", Some(&h.bob)).await;
    assert_eq!(body, json!({"present": true, "count": 1}));

    let (_, body) = call(&h.router, "GET", "/relationships/follow/alice", Some(&h.carol)).await;
    assert_eq!(body, json!({"present": false, "count": 1}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_subjects_toggle_concurrently() {
    let h = setup(false).await;
    let uri = "/relationships/like/post-1/toggle";

    let (a, b) = tokio::join!(
        call(&h.router, "POST", uri, Some(&h.bob)),
        call(&h.router, "POST", uri, Some(&h.carol)),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(a.1["present"], true);
    assert_eq!(b.1["present"], true);

    let (_, body) = call(&h.router, "GET", "/relationships/like/post-1", None).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_subject_race_never_duplicates_or_conflicts() {
    for native in [false, true] {
        let h = setup(native).await;
        let uri = "/relationships/follow/alice/toggle";

        let calls = (0..16).map(|_| call(&h.router, "POST", uri, Some(&h.bob)));
        for (status, body) in futures::future::join_all(calls).await {
            assert_eq!(status, StatusCode::OK, "races are absorbed, never 409");
            assert!(body["count"].as_u64().unwrap() <= 1);
        }

        let (_, body) = call(&h.router, "GET", "/relationships/follow/alice", None).await;
        assert!(body["count"].as_u64().unwrap() <= 1);
    }
}

#[tokio::test]
async fn list_followers_paginates() {
    let h = setup(true).await;
    for token in [&h.bob, &h.carol] {
        call(&h.router, "POST", "/relationships/follow/alice/toggle", Some(token)).await;
    }
    call(&h.router, "POST", "/relationships/follow/bob/toggle", Some(&h.carol)).await;

    let (s, page1) = call(&h.router, "GET", "/relationships/follow/alice/subjects?page=1&limit=1", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(page1["items"].as_array().unwrap().len(), 1);
    assert_eq!(page1["pagination"]["total"], 2);
    assert_eq!(page1["pagination"]["hasMore"], true);

    let (_, page2) = call(&h.router, "GET", "/relationships/follow/alice/subjects?page=2&limit=1", None).await;
    assert_eq!(page2["items"].as_array().unwrap().len(), 1);
    assert!(page2["pagination"].get("total").is_none());
    assert_eq!(page2["pagination"]["hasMore"], false);
    assert_ne!(page1["items"][0]["id"], page2["items"][0]["id"]);

    let (_, following) = call(&h.router, "GET", "/subjects/carol/relationships/follow", None).await;
    let ids: Vec<&str> = following["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"alice") && ids.contains(&"bob"));
    assert_eq!(following["pagination"]["limit"], 20);

    let (_, capped) = call(&h.router, "GET", "/relationships/follow/alice/subjects?limit=1000", None).await;
    assert_eq!(capped["pagination"]["limit"], 50);
}

#[tokio::test]
async fn health_check_responds() {
    let h = setup(true).await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = h.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
