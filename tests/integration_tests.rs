use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http_body_util::BodyExt;
use hyper::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use shloka::{
    create_app,
    handlers::AppState,
    rate_limiter::LocalWindows,
    store::{RetryPolicy, VerseStore},
};
use tower::ServiceExt;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/verses.csv");

fn app_with_store(store: VerseStore) -> Router {
    create_app(Arc::new(AppState::new(Arc::new(store), LocalWindows::new())))
}

fn fixture_app() -> Router {
    app_with_store(VerseStore::from_file(FIXTURE, RetryPolicy::Never))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn get_as(app: &Router, uri: &str, ip: &str) -> StatusCode {
    let request = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap();
    send(app, request).await.0
}

#[tokio::test]
async fn test_lookup_by_chapter_and_verse() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses?chapter=1&verse=2").await;

    assert_eq!(status, StatusCode::OK);
    let verses = body.as_array().unwrap();
    assert_eq!(verses.len(), 1);
    assert_eq!(verses[0]["verseId"], "BG1.2");
    assert_eq!(verses[0]["chapter"], 1);
    assert_eq!(verses[0]["verse"], 2);
    assert_eq!(verses[0]["id"], 2);
}

#[tokio::test]
async fn test_next_wraps_to_first() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses/next/BG2.1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verseId"], "BG1.1");
    assert_eq!(body["chapter"], 1);
    assert_eq!(body["verse"], 1);
}

#[tokio::test]
async fn test_previous_wraps_to_last() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses/previous/BG1.1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verseId"], "BG2.1");

    let (_, _, body) = get(&app, "/verses/previous/BG1.2").await;
    assert_eq!(body["verseId"], "BG1.1");
}

#[tokio::test]
async fn test_count() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses/count").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "count": 3 }));
}

#[tokio::test]
async fn test_multiline_fields_survive_parsing() {
    let app = fixture_app();
    let (_, _, body) = get(&app, "/verses?chapter=1&verse=1").await;
    let verse = &body[0];

    let shloka = verse["shloka"].as_str().unwrap();
    assert!(shloka.starts_with("धृतराष्ट्र उवाच\n"));
    let english = verse["engMeaning"].as_str().unwrap();
    assert!(english.contains("\"O Sanjaya,"));
    assert!(verse["wordMeaning"].as_str().unwrap().contains("King Dhritarashtra"));
}

#[tokio::test]
async fn test_lookup_errors() {
    let app = fixture_app();

    let (status, _, body) = get(&app, "/verses?chapter=19&verse=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid chapter number");

    let (status, _, body) = get(&app, "/verses?chapter=1&verse=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid verse number");

    let (status, _, body) = get(&app, "/verses?chapter=18&verse=78").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Verse not found");
}

#[tokio::test]
async fn test_search() {
    let app = fixture_app();

    let (status, _, body) = get(&app, "/verses?q=madhusudana").await;
    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["verseId"], "BG2.1");

    let (_, _, body) = get(&app, "/verses?q=SANJAYA").await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["verseId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["BG1.1", "BG1.2", "BG2.1"]);
}

#[tokio::test]
async fn test_search_rejects_query_that_sanitizes_to_nothing() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses?q=%3Cscript%3Ex%3C%2Fscript%3E").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid search query");
}

#[tokio::test]
async fn test_list_without_parameters() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    // An empty q falls through to the listing.
    let (_, _, body) = get(&app, "/verses?q=").await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_random() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses/random").await;

    assert_eq!(status, StatusCode::OK);
    let id = body["verseId"].as_str().unwrap();
    assert!(["BG1.1", "BG1.2", "BG2.1"].contains(&id));
}

#[tokio::test]
async fn test_percent_encoded_id() {
    let text = "id,c,v,s,t,h,e,w\nBG 1/1,1,1,s,t,h,e,w\nBG 1/2,1,2,s,t,h,e,w\n";
    let app = app_with_store(VerseStore::from_text(text));

    let (status, _, body) = get(&app, "/verses/next/BG%201%2F1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verseId"], "BG 1/2");
}

#[tokio::test]
async fn test_navigation_errors() {
    let app = fixture_app();

    let (status, _, body) = get(&app, "/verses/next/BG9.9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Verse not found");

    let (status, _, body) = get(&app, "/verses/previous/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid verse ID");
}

#[tokio::test]
async fn test_missing_source_fails_soft() {
    let app = app_with_store(VerseStore::from_file(
        "/nonexistent/verses.csv",
        RetryPolicy::Never,
    ));

    let (status, _, body) = get(&app, "/verses/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _, body) = get(&app, "/verses/random").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No verses found");

    let (status, _, body) = get(&app, "/verses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn test_non_get_method_rejected() {
    let app = fixture_app();
    let request = Request::builder()
        .method("POST")
        .uri("/verses")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get("allow").unwrap(), "GET");
    assert_eq!(body["error"], "Method not allowed");

    let request = Request::builder()
        .method("DELETE")
        .uri("/verses/next/BG1.1")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    for method in ["HEAD", "OPTIONS"] {
        for uri in ["/verses", "/verses/count", "/api/verses/previous/BG1.1"] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, headers, _) = send(&app, request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
            assert_eq!(headers.get("allow").unwrap(), "GET");
        }
    }
}

#[tokio::test]
async fn test_preflight_from_fresh_client_is_method_not_allowed() {
    let app = fixture_app();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/verses")
        .header("origin", "https://example.com")
        .header("access-control-request-method", "GET")
        .header("x-forwarded-for", "198.51.100.20")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get("allow").unwrap(), "GET");
    assert_eq!(body["error"], "Method not allowed");
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
}

#[tokio::test]
async fn test_options_is_rate_limited() {
    let app = fixture_app();
    for _ in 0..25 {
        get_as(&app, "/verses/count", "192.0.2.7").await;
    }

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/verses/count")
        .header("origin", "https://example.com")
        .header("access-control-request-method", "GET")
        .header("x-forwarded-for", "192.0.2.7")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Too many requests from this IP, please try again later."
    );

    // OPTIONS requests use up the budget like any other request.
    for _ in 0..25 {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/verses")
            .header("x-forwarded-for", "192.0.2.8")
            .body(Body::empty())
            .unwrap();
        send(&app, request).await;
    }
    assert_eq!(
        get_as(&app, "/verses/count", "192.0.2.8").await,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_unmatched_path_returns_json_error() {
    let app = fixture_app();

    for uri in ["/verses/next/a/b", "/api/verses/unknown", "/nothing"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "Not found");
    }
}

#[tokio::test]
async fn test_repeated_query_parameters() {
    let app = fixture_app();

    let (status, _, body) = get(&app, "/verses?q=madhusudana&q=sanjaya").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, _, body) = get(&app, "/verses?chapter=1&verse=2&chapter=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["verseId"], "BG1.2");
}

#[tokio::test]
async fn test_lookup_accepts_hex_numbers() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/verses?chapter=0x2&verse=0x1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["verseId"], "BG2.1");
}

#[tokio::test]
async fn test_security_headers() {
    let app = fixture_app();
    let (_, headers, _) = get(&app, "/verses/count").await;

    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-xss-protection").unwrap(), "1; mode=block");
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = fixture_app();
    let request = Request::builder()
        .uri("/verses/count")
        .header("origin", "https://example.com")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;

    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(headers.get("access-control-allow-methods").unwrap(), "GET");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let app = fixture_app();

    for i in 0..25 {
        let status = get_as(&app, "/verses/count", "203.0.113.5").await;
        assert_eq!(status, StatusCode::OK, "request {} was limited", i + 1);
    }

    let request = Request::builder()
        .uri("/verses/count")
        .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Too many requests from this IP, please try again later."
    );
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("retry-after").unwrap(), "60");

    assert_eq!(get_as(&app, "/verses/count", "198.51.100.1").await, StatusCode::OK);
    assert_eq!(get_as(&app, "/health", "203.0.113.5").await, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_checked_before_method() {
    let app = fixture_app();
    for _ in 0..25 {
        get_as(&app, "/verses", "192.0.2.1").await;
    }

    let request = Request::builder()
        .method("POST")
        .uri("/verses")
        .header("x-forwarded-for", "192.0.2.1")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_api_prefix() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/api/verses/count").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (_, _, body) = get(&app, "/api/verses/next/BG1.1").await;
    assert_eq!(body["verseId"], "BG1.2");
}

#[tokio::test]
async fn test_health() {
    let app = fixture_app();
    let (status, _, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["verses"], 3);
    assert_eq!(body["rate_limit"]["limit"], 25);
    assert_eq!(body["rate_limit"]["window"], "1m");
    assert_eq!(body["rate_limit"]["backend"], "memory");
}

#[tokio::test]
async fn test_peer_address_identity_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = fixture_app();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/verses/count", addr);
    for _ in 0..25 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Too many requests from this IP, please try again later."
    );
}
