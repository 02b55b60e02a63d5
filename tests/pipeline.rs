//! End-to-end tests of the request pipeline, driven without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use document_server::config::RuntimeConfig;
use document_server::http::static_files::{ASSETS_CACHE, PUBLIC_CACHE};
use document_server::http::{build_router, AppState, X_REQUEST_ID};
use document_server::render::{DocumentRenderer, ShellRenderer};

mod common;
use common::{RecordingMonitor, Script, ScriptedRenderer};

fn shell(config: &RuntimeConfig) -> Arc<dyn DocumentRenderer> {
    Arc::new(ShellRenderer::new(config.server_manifest_path(), config.mode))
}

fn app_with(
    config: RuntimeConfig,
    renderer: Arc<dyn DocumentRenderer>,
    deadline: Option<Duration>,
) -> (Router, Arc<RecordingMonitor>) {
    let monitor = Arc::new(RecordingMonitor::default());
    let mut state = AppState::new(config, renderer, monitor.clone());
    if let Some(deadline) = deadline {
        state = state.with_render_deadline(deadline);
    }
    (build_router(state), monitor)
}

fn app(config: RuntimeConfig) -> (Router, Arc<RecordingMonitor>) {
    let renderer = shell(&config);
    app_with(config, renderer, None)
}

fn nonce_from_csp(csp: &str) -> String {
    let start = csp.find("'nonce-").unwrap() + "'nonce-".len();
    let end = csp[start..].find('\'').unwrap();
    csp[start..start + end].to_string()
}

#[tokio::test]
async fn assets_are_served_with_immutable_cache() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router
        .oneshot(common::get("/assets/entry-abc123.js"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], ASSETS_CACHE);
    // Static hits answer before the security stage.
    assert!(!response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn public_root_depends_on_mode() {
    let dir = common::build_dir();

    let (router, _) = app(common::config(dir.path(), &[]));
    let response = router.oneshot(common::get("/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], PUBLIC_CACHE);

    let (router, _) = app(common::config(dir.path(), &[("APP_ENV", "development")]));
    let response = router.oneshot(common::get("/robots.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], PUBLIC_CACHE);
}

#[tokio::test]
async fn missing_asset_falls_through_to_document() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router
        .oneshot(common::get("/assets/missing.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
async fn document_carries_security_headers_and_matching_nonce() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(
        headers[header::STRICT_TRANSPORT_SECURITY],
        "max-age=15552000; includeSubDomains"
    );
    assert_eq!(headers[header::REFERRER_POLICY], "same-origin");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers["x-app-version"], "abc123");
    assert!(headers.contains_key(X_REQUEST_ID));
    assert!(!headers.contains_key("x-robots-tag"));

    let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
    let nonce = nonce_from_csp(csp);
    assert_eq!(nonce.len(), 32);

    let html = common::body_string(response).await;
    assert!(html.contains(&format!(r#"<script nonce="{}">window.ENV"#, nonce)));
    assert!(!html.contains("SESSION_SECRET"));
    assert!(!html.contains("integration-secret"));
}

#[tokio::test]
async fn each_request_gets_a_fresh_nonce() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let a = router.clone().oneshot(common::get("/")).await.unwrap();
    let b = router.oneshot(common::get("/")).await.unwrap();
    let csp = |r: &axum::response::Response| {
        nonce_from_csp(r.headers()[header::CONTENT_SECURITY_POLICY].to_str().unwrap())
    };
    assert_ne!(csp(&a), csp(&b));
}

#[tokio::test]
async fn report_only_policy_and_monitoring_headers() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(
        dir.path(),
        &[
            ("CSP_REPORT_ONLY", "true"),
            ("SENTRY_DSN", "https://key@o1.ingest.sentry.io/1"),
        ],
    ));

    let response = router.oneshot(common::get("/")).await.unwrap();
    let headers = response.headers();
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY_REPORT_ONLY));
    assert!(!headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert_eq!(headers["document-policy"], "js-profiling");

    let csp = headers[header::CONTENT_SECURITY_POLICY_REPORT_ONLY]
        .to_str()
        .unwrap();
    assert!(csp.contains("*.sentry.io"));
    assert!(!csp.contains("upgrade-insecure-requests"));
}

#[tokio::test]
async fn staged_rollout_sends_enforced_and_report_only_policies() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(
        dir.path(),
        &[
            ("CSP_MODE", "both"),
            ("CSP_REPORT_TO", "https://csp.example.com/report"),
        ],
    ));

    let response = router.oneshot(common::get("/")).await.unwrap();
    let headers = response.headers().clone();
    let enforced = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
    let candidate = headers[header::CONTENT_SECURITY_POLICY_REPORT_ONLY]
        .to_str()
        .unwrap();

    assert!(enforced.contains("upgrade-insecure-requests"));
    assert!(!candidate.contains("upgrade-insecure-requests"));
    assert!(candidate.contains("report-uri https://csp.example.com/report"));

    let nonce = nonce_from_csp(enforced);
    assert_eq!(nonce_from_csp(candidate), nonce);
    let html = common::body_string(response).await;
    assert!(html.contains(&format!(r#"<script nonce="{}">"#, nonce)));
}

#[tokio::test]
async fn indexing_can_be_disallowed() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[("ALLOW_INDEXING", "false")]));

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.headers()["x-robots-tag"], "noindex, nofollow");
    let html = common::body_string(response).await;
    assert!(html.contains(r#""ALLOW_INDEXING":false"#));
}

#[tokio::test]
async fn supplied_request_id_is_echoed() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let request = Request::builder()
        .uri("/healthcheck")
        .header(X_REQUEST_ID, "req-42")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
    assert_eq!(common::body_string(response).await, "OK");
}

#[tokio::test]
async fn documents_are_compressed_on_request() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn locale_follows_query_then_header() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router.clone().oneshot(common::get("/?lng=es")).await.unwrap();
    assert!(common::body_string(response)
        .await
        .contains(r#"<html lang="es""#));

    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_LANGUAGE, "fr;q=0.9, es-MX;q=0.8")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert!(common::body_string(response)
        .await
        .contains(r#"<html lang="es""#));
}

#[tokio::test]
async fn unknown_path_renders_not_found_document() {
    let dir = common::build_dir();
    let (router, monitor) = app(common::config(dir.path(), &[]));

    let response = router.oneshot(common::get("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(common::body_string(response).await.contains("<!DOCTYPE html>"));
    assert!(monitor.events().is_empty());
}

#[tokio::test]
async fn untouched_session_sets_no_session_cookie() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router.oneshot(common::get("/")).await.unwrap();
    let cookies = common::set_cookies(response.headers());
    assert!(cookies.iter().all(|c| !c.starts_with("session=")));
    assert!(cookies.iter().any(|c| c.starts_with("csrf=")));
}

/// GET the index and return the CSRF cookie pair and token.
async fn csrf_token(router: &Router) -> (String, String) {
    let response = router.clone().oneshot(common::get("/")).await.unwrap();
    let cookie = common::set_cookies(response.headers())
        .into_iter()
        .find(|c| c.starts_with("csrf="))
        .unwrap();
    let token = cookie.trim_start_matches("csrf=").to_string();
    (cookie, token)
}

fn post_form(cookie: &str, body: String) -> Request<Body> {
    post_form_as("application/x-www-form-urlencoded", cookie, body)
}

fn post_form_as(content_type: &str, cookie: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, content_type)
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

fn session_cookie(response: &axum::response::Response) -> Option<String> {
    common::set_cookies(response.headers())
        .into_iter()
        .find(|c| c.starts_with("session="))
}

fn with_cookies(method: Method, cookies: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/")
        .header(header::COOKIE, cookies)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn valid_submission_flashes_message_across_redirect() {
    let dir = common::build_dir();
    let (router, monitor) = app(common::config(dir.path(), &[("APP_ENV", "test")]));
    let (csrf_cookie, token) = csrf_token(&router).await;

    let response = router
        .clone()
        .oneshot(post_form(
            &csrf_cookie,
            format!("name__confirm=&csrf={}&message=hello+there", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let session_cookie = common::set_cookies(response.headers())
        .into_iter()
        .find(|c| c.starts_with("session="))
        .unwrap();
    let raw = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .find(|v| v.starts_with("session="))
        .unwrap();
    assert!(raw.contains("Max-Age=2592000"));
    assert!(raw.contains("HttpOnly"));

    let request = Request::builder()
        .uri("/")
        .header(header::COOKIE, format!("{}; {}", session_cookie, csrf_cookie))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert!(common::body_string(response).await.contains("hello there"));
    assert!(monitor.events().is_empty());
}

#[tokio::test]
async fn filled_honeypot_is_rejected_quietly() {
    let dir = common::build_dir();
    let (router, monitor) = app(common::config(dir.path(), &[("APP_ENV", "test")]));
    let (csrf_cookie, token) = csrf_token(&router).await;

    let response = router
        .oneshot(post_form(
            &csrf_cookie,
            format!("name__confirm=bot&csrf={}&message=spam", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        common::body_string(response).await,
        "Form not submitted properly"
    );
    assert!(monitor.events().is_empty());
}

#[tokio::test]
async fn head_request_leaves_the_flash_for_the_next_get() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[("APP_ENV", "test")]));
    let (csrf_cookie, token) = csrf_token(&router).await;

    let response = router
        .clone()
        .oneshot(post_form(
            &csrf_cookie,
            format!("name__confirm=&csrf={}&message=still+here", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let session = session_cookie(&response).unwrap();
    let cookies = format!("{}; {}", session, csrf_cookie);

    let response = router
        .clone()
        .oneshot(with_cookies(Method::HEAD, &cookies))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());

    let response = router
        .oneshot(with_cookies(Method::GET, &cookies))
        .await
        .unwrap();
    assert!(session_cookie(&response).is_some());
    assert!(common::body_string(response).await.contains("still here"));
}

#[tokio::test]
async fn form_media_type_is_matched_case_insensitively() {
    let dir = common::build_dir();
    let (router, monitor) = app(common::config(dir.path(), &[("APP_ENV", "test")]));
    let (csrf_cookie, token) = csrf_token(&router).await;

    let response = router
        .oneshot(post_form_as(
            "Application/X-WWW-Form-Urlencoded; charset=UTF-8",
            &csrf_cookie,
            format!("name__confirm=bot&csrf={}&message=spam", token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        common::body_string(response).await,
        "Form not submitted properly"
    );
    assert!(monitor.events().is_empty());
}

#[tokio::test]
async fn forged_csrf_token_is_rejected() {
    let dir = common::build_dir();
    let (router, monitor) = app(common::config(dir.path(), &[("APP_ENV", "test")]));
    let (csrf_cookie, _) = csrf_token(&router).await;

    let response = router
        .clone()
        .oneshot(post_form(
            &csrf_cookie,
            "name__confirm=&csrf=forged&message=hi".to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post_form("", "name__confirm=&message=hi".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(monitor.events().is_empty());
}

#[tokio::test]
async fn missing_build_fails_the_request_not_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let (router, monitor) = app(common::config(dir.path(), &[]));

    let response = router.clone().oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let events = monitor.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "build");
    assert_eq!(events[0].path, "/");

    common::write_build(dir.path());
    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn render_error_before_first_chunk_is_500() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(config, ScriptedRenderer::new(Script::Fail), None);

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // Security headers still apply to error responses.
    assert!(response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));
    assert_eq!(monitor.events()[0].kind, "render");
}

#[tokio::test]
async fn slow_render_hits_the_abort_deadline() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::Slow(Duration::from_millis(500))),
        Some(Duration::from_millis(50)),
    );

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(monitor.events()[0].kind, "timeout");
}

#[tokio::test]
async fn error_after_first_chunk_truncates_the_stream() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::ErrorAfterFirstChunk),
        None,
    );

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (received, errored) = common::body_until_error(response).await;
    assert!(errored);
    assert_eq!(received, "<!DOCTYPE html><html>");
    assert_eq!(monitor.events().len(), 1);
}

#[tokio::test]
async fn stalled_stream_is_aborted_at_the_deadline() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::StallAfterFirstChunk),
        Some(Duration::from_millis(100)),
    );

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, errored) = tokio::time::timeout(
        Duration::from_secs(5),
        common::body_until_error(response),
    )
    .await
    .unwrap();
    assert!(errored);
    assert_eq!(monitor.events()[0].kind, "timeout");
}

#[tokio::test]
async fn client_disconnect_is_not_reported() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::StallAfterFirstChunk),
        Some(Duration::from_millis(200)),
    );

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(monitor.events().is_empty());
}

const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

fn get_as(uri: &str, user_agent: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, user_agent)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn crawlers_receive_the_complete_document() {
    let dir = common::build_dir();
    let (router, _) = app(common::config(dir.path(), &[]));

    let response = router.clone().oneshot(get_as("/", GOOGLEBOT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().size_hint().exact().is_some());
    let html = common::body_string(response).await;
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.ends_with("</html>"));

    let response = router.oneshot(common::get("/")).await.unwrap();
    assert!(response.body().size_hint().exact().is_none());
}

#[tokio::test]
async fn crawler_render_failure_after_first_chunk_is_500() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::ErrorAfterFirstChunk),
        None,
    );

    let response = router.oneshot(get_as("/", GOOGLEBOT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(monitor.events()[0].kind, "render");
}

#[tokio::test]
async fn stalled_crawler_render_times_out_before_headers() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::StallAfterFirstChunk),
        Some(Duration::from_millis(100)),
    );

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        router.oneshot(get_as("/", GOOGLEBOT)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(monitor.events()[0].kind, "timeout");
}

#[tokio::test]
async fn head_document_ends_after_the_headers() {
    let dir = common::build_dir();
    let config = common::config(dir.path(), &[]);
    let (router, monitor) = app_with(
        config,
        ScriptedRenderer::new(Script::StallAfterFirstChunk),
        Some(Duration::from_millis(100)),
    );

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));

    let (body, errored) = tokio::time::timeout(
        Duration::from_secs(5),
        common::body_until_error(response),
    )
    .await
    .unwrap();
    assert!(body.is_empty());
    assert!(!errored);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(monitor.events().is_empty());
}
