use std::sync::Arc;

use axum::{Json, Router};
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use nearby::auth::{SessionVerifier, TokenAuthority};
use nearby::auth::users::UserDirectory;
use nearby::blob::ObjectStoreConfig;
use nearby::blob::file::FileObjectStoreConfig;
use nearby::blob::memory::MemoryObjectStore;
use nearby::config::ServiceConfig;
use nearby::ingest::IngestPipeline;
use nearby::record::{MediaKind, POST_COLLECTION, Record};
use nearby::scoring::http::HttpScorerConfig;
use nearby::scoring::{FixedScorer, ScorerConfig};
use nearby::search::SearchEngine;
use nearby::server::{AppState, build_router};
use nearby::store::memory::MemoryDocumentStore;
use nearby::store::{DocumentStore, provision};

const BOUNDARY: &str = "nearby-test-boundary";

struct TestApp {
    router: Router,
    documents: Arc<MemoryDocumentStore>,
    objects: Arc<MemoryObjectStore>,
    tokens: Arc<TokenAuthority>,
}

async fn test_app() -> TestApp {
    let documents = Arc::new(MemoryDocumentStore::new());
    provision(documents.as_ref()).await.unwrap();
    let objects = Arc::new(MemoryObjectStore::default());
    let tokens = Arc::new(TokenAuthority::new(b"route-test-key"));

    let pipeline = IngestPipeline::new(
        objects.clone(),
        Arc::new(FixedScorer::new(Some(0.92)).unwrap()),
        documents.clone(),
    );
    let search = SearchEngine::new(documents.clone());
    let users = UserDirectory::new(documents.clone()).unwrap();
    let state = AppState::new(documents.clone(), pipeline, search, users, tokens.clone());

    TestApp {
        router: build_router(state),
        documents,
        objects,
        tokens,
    }
}

/// One multipart part; a part with a filename is a file part.
struct Part {
    name: &'static str,
    filename: Option<&'static str>,
    content: Vec<u8>,
}

fn text(name: &'static str, value: &str) -> Part {
    Part {
        name,
        filename: None,
        content: value.as_bytes().to_vec(),
    }
}

fn file(name: &'static str, filename: &'static str, content: &[u8]) -> Part {
    Part {
        name,
        filename: Some(filename),
        content: content.to_vec(),
    }
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                part.name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(&part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/post")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_healthz() {
    let app = test_app().await;
    let (status, body) = send(&app.router, get_request("/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_signup_then_login() {
    let app = test_app().await;

    let account = json!({"username": "dave_01", "password": "hunter2", "age": 30, "gender": "m"});
    let (status, body) = send(&app.router, json_request("/signup", account.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, body) = send(&app.router, json_request("/signup", account)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "User already exists");

    let (status, body) = send(
        &app.router,
        json_request("/login", json!({"username": "dave_01", "password": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = String::from_utf8(body).unwrap();
    let session = app.tokens.verify(&token).unwrap();
    assert_eq!(session.username, "dave_01");

    let (status, _) = send(
        &app.router,
        json_request("/login", json!({"username": "dave_01", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        json_request("/login", json!({"username": "nobody", "password": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_rejects_bad_usernames_and_bodies() {
    let app = test_app().await;

    let (status, _) = send(
        &app.router,
        json_request("/signup", json!({"username": "Dave!", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        json_request("/signup", json!({"username": "dave", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, json_request("/signup", json!({"password": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let app = test_app().await;

    for uri in ["/search?lat=1&lon=2", "/cluster?term=face"] {
        let (status, _) = send(&app.router, get_request(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

        let (status, _) = send(&app.router, get_request(uri, Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let body = multipart_body(&[text("lat", "1"), text("lon", "2")]);
    let (status, _) = send(&app.router, post_request(None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = TokenAuthority::new(b"another-key").issue("mallory").unwrap();
    let (status, _) = send(&app.router, get_request("/search?lat=1&lon=2", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.documents.document_count(POST_COLLECTION), 0);
}

#[tokio::test]
async fn test_post_then_search_and_cluster() {
    let app = test_app().await;
    let token = app.tokens.issue("erin").unwrap();

    let body = multipart_body(&[
        text("lat", "35.0"),
        text("lon", "139.0"),
        text("message", "cherry blossoms"),
        file("image", "tree.JPG", b"\xff\xd8\xff"),
    ]);
    let (status, body) = send(&app.router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let body = multipart_body(&[
        text("lat", "35.01"),
        text("lon", "139.0"),
        text("message", "just text"),
        file("image", "", b""),
    ]);
    let (status, _) = send(&app.router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.objects.object_count(), 1);

    let (status, body) = send(
        &app.router,
        get_request("/search?lat=35.0&lon=139.0&range=50", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].author, "erin");
    assert_eq!(records[0].message, "cherry blossoms");
    assert_eq!(records[0].media_kind, MediaKind::Image);
    assert_eq!(records[0].score, 0.92);
    assert_eq!(records[1].media_kind, MediaKind::Unknown);
    assert!(records[1].media_url.is_empty());

    let raw: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw[0]["user"], "erin");
    assert_eq!(raw[0]["type"], "image");

    let (status, body) = send(&app.router, get_request("/cluster?term=face", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "cherry blossoms");

    let (status, body) = send(
        &app.router,
        get_request("/cluster?term=face&min=0.95", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_author_comes_from_the_token() {
    let app = test_app().await;
    let token = app.tokens.issue("frank").unwrap();

    let body = multipart_body(&[
        text("lat", "1"),
        text("lon", "1"),
        text("user", "someone_else"),
        text("message", "hi"),
    ]);
    let (status, _) = send(&app.router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, get_request("/search?lat=1&lon=1", Some(&token))).await;
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].author, "frank");
}

#[tokio::test]
async fn test_unparsable_coordinates_default_to_zero() {
    let app = test_app().await;
    let token = app.tokens.issue("gina").unwrap();

    let body = multipart_body(&[text("lat", "north"), text("lon", ""), text("message", "x")]);
    let (status, _) = send(&app.router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, get_request("/search?lat=abc&lon=", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].location.lat, 0.0);
    assert_eq!(records[0].location.lon, 0.0);
}

#[tokio::test]
async fn test_bad_query_parameters_are_rejected() {
    let app = test_app().await;
    let token = app.tokens.issue("hank").unwrap();

    let cases = [
        "/search?lat=1&lon=2&range=-5",
        "/search?lat=1&lon=2&range=far",
        "/search?lat=1&lon=2&range=50m",
        "/search?lat=1&lon=2&range=50km",
        "/cluster",
        "/cluster?term=",
        "/cluster?term=face&min=high",
    ];
    for uri in cases {
        let (status, body) = send(&app.router, get_request(uri, Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_range_is_kilometers_and_term_is_exact() {
    let app = test_app().await;
    let token = app.tokens.issue("lena").unwrap();

    // Roughly 11 km north of the search center.
    let body = multipart_body(&[
        text("lat", "35.1"),
        text("lon", "139.0"),
        file("image", "hill.png", b"png"),
    ]);
    let (status, _) = send(&app.router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);

    let found = |uri: &'static str| {
        let router = app.router.clone();
        let token = token.clone();
        async move {
            let (status, body) = send(&router, get_request(uri, Some(&token))).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            serde_json::from_slice::<Vec<Record>>(&body).unwrap().len()
        }
    };

    assert_eq!(found("/search?lat=35.0&lon=139.0&range=50").await, 1);
    assert_eq!(found("/search?lat=35.0&lon=139.0&range=12.5").await, 1);
    assert_eq!(found("/search?lat=35.0&lon=139.0&range=5").await, 0);

    assert_eq!(found("/cluster?term=face").await, 1);
    assert_eq!(found("/cluster?term=%20face").await, 0);
    assert_eq!(found("/cluster?term=face%20").await, 0);
}

#[tokio::test]
async fn test_malformed_multipart_is_rejected() {
    let app = test_app().await;
    let token = app.tokens.issue("ivy").unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/post")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.documents.document_count(POST_COLLECTION), 0);
}

#[tokio::test]
async fn test_store_failure_is_a_generic_500() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let objects = Arc::new(MemoryObjectStore::default());
    let tokens = Arc::new(TokenAuthority::new(b"k"));
    // Without provisioning, a geo query has no geo_point mapping to run on.
    documents
        .upsert(POST_COLLECTION, "seed", json!({"kind": "post"}))
        .await
        .unwrap();
    let state = AppState::new(
        documents.clone(),
        IngestPipeline::new(objects, Arc::new(FixedScorer::new(None).unwrap()), documents.clone()),
        SearchEngine::new(documents.clone()),
        UserDirectory::new(documents.clone()).unwrap(),
        tokens.clone(),
    );
    let router = build_router(state);
    let token = tokens.issue("jo").unwrap();

    let (status, body) = send(&router, get_request("/search?lat=1&lon=2", Some(&token))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(!body["error"].as_str().unwrap().contains("geo"));
}

#[tokio::test]
async fn test_state_from_config() {
    let mut config = ServiceConfig {
        object_store: ObjectStoreConfig::Memory(Default::default()),
        scorer: ScorerConfig::Fixed {
            confidence: Some(0.99),
        },
        ..Default::default()
    };
    config.auth.signing_key = Some("config-key".to_string());

    let state = AppState::from_config(&config).unwrap();
    provision(state.documents.as_ref()).await.unwrap();
    let router = build_router(state);

    let (status, _) = send(
        &router,
        json_request("/signup", json!({"username": "kim", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &router,
        json_request("/login", json!({"username": "kim", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = String::from_utf8(body).unwrap();

    // Tokens are signed with the configured key.
    let session = TokenAuthority::new(b"config-key").verify(&token).unwrap();
    assert_eq!(session.username, "kim");

    let body = multipart_body(&[
        text("lat", "-33.9"),
        text("lon", "151.2"),
        file("image", "beach.gif", b"GIF89a"),
    ]);
    let (status, _) = send(&router, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, get_request("/cluster?term=face&min=0.99", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].author, "kim");
}

#[tokio::test]
async fn test_http_scorer_fetches_media_from_the_server() {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let mut config = ServiceConfig {
        object_store: ObjectStoreConfig::File(
            FileObjectStoreConfig::new(dir.path().join("media"))
                .with_fetch_base_url(format!("{base}/media")),
        ),
        scorer: ScorerConfig::Http(HttpScorerConfig {
            endpoint: format!("{base}/score"),
            api_key: None,
            timeout_secs: 5,
        }),
        ..Default::default()
    };
    config.auth.signing_key = Some("fetch-key".to_string());
    let state = AppState::from_config(&config).unwrap();
    provision(state.documents.as_ref()).await.unwrap();
    let token = state.tokens.issue("omar").unwrap();

    // Downloads whatever it is pointed at, then scores by content.
    let scoring = Router::new().route(
        "/score",
        axum::routing::post(|Json(body): Json<Value>| async move {
            let uri = body["uri"].as_str().unwrap_or_default().to_string();
            let fetched = match reqwest::get(&uri).await {
                Ok(response) if response.status().is_success() => response.bytes().await.ok(),
                _ => None,
            };
            let confidence = match fetched {
                Some(bytes) if bytes.as_ref() == b"\xff\xd8\xff" => 0.93,
                _ => 0.0,
            };
            Json(json!({"confidence": confidence}))
        }),
    );
    let router = build_router(state).merge(scoring);
    let app = router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let body = multipart_body(&[
        text("lat", "48.85"),
        text("lon", "2.35"),
        file("image", "cafe.jpg", b"\xff\xd8\xff"),
    ]);
    let (status, _) = send(&app, post_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get_request("/cluster?term=face", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let records: Vec<Record> = serde_json::from_slice(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].score, 0.93);
    assert_eq!(records[0].media_url, format!("/media/{}", records[0].id));
}
