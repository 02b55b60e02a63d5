//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, Response, StatusCode};
use futures_util::stream::{self, StreamExt};
use http_body_util::BodyExt;
use tempfile::TempDir;

use document_server::config::RuntimeConfig;
use document_server::observability::{ErrorEvent, ErrorMonitor};
use document_server::render::{DocumentRenderer, RenderError, RenderRequest, RenderedDocument};

pub const MANIFEST: &str =
    r#"{"version":"abc123","entry":"/assets/entry-abc123.js","stylesheets":["/assets/app-abc123.css"]}"#;

/// A build directory laid out like a real client/server build.
pub fn build_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_build(dir.path());
    dir
}

pub fn write_build(root: &Path) {
    let build = root.join("build");
    std::fs::create_dir_all(build.join("server")).unwrap();
    std::fs::create_dir_all(build.join("client/assets")).unwrap();
    std::fs::create_dir_all(root.join("public")).unwrap();
    std::fs::write(build.join("server/manifest.json"), MANIFEST).unwrap();
    std::fs::write(build.join("client/assets/entry-abc123.js"), "export {};").unwrap();
    std::fs::write(build.join("client/favicon.ico"), "ico").unwrap();
    std::fs::write(root.join("public/robots.txt"), "User-agent: *").unwrap();
}

/// Validated configuration rooted at `root`, with `extra` overriding defaults.
pub fn config(root: &Path, extra: &[(&str, &str)]) -> RuntimeConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("APP_ENV".into(), "production".into());
    vars.insert("SESSION_SECRET".into(), "integration-secret".into());
    vars.insert("BUILD_DIR".into(), root.join("build").display().to_string());
    vars.insert("PUBLIC_DIR".into(), root.join("public").display().to_string());
    vars.insert("SUPPORTED_LOCALES".into(), "en,es".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    RuntimeConfig::from_env(&vars).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect a body that may end in an error, returning what arrived.
pub async fn body_until_error(response: Response<Body>) -> (String, bool) {
    let mut body = response.into_body();
    let mut out = Vec::new();
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    out.extend_from_slice(&data);
                }
            }
            Err(_) => return (String::from_utf8_lossy(&out).into_owned(), true),
        }
    }
    (String::from_utf8_lossy(&out).into_owned(), false)
}

/// Cookie pairs (`name=value`) from every `Set-Cookie` header.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_owned)
        .collect()
}

/// Records captured events instead of logging them.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    events: Mutex<Vec<ErrorEvent>>,
}

impl RecordingMonitor {
    pub fn events(&self) -> Vec<ErrorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ErrorMonitor for RecordingMonitor {
    fn capture(&self, event: &ErrorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// How a scripted renderer behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Fail before producing a document.
    Fail,
    /// Take `delay` before producing a document.
    Slow(Duration),
    /// Emit one chunk, then never finish.
    StallAfterFirstChunk,
    /// Emit one chunk, then fail.
    ErrorAfterFirstChunk,
}

#[derive(Debug, Clone)]
pub struct ScriptedRenderer {
    pub script: Script,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

fn html_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "text/html; charset=utf-8".parse().unwrap());
    headers
}

#[async_trait]
impl DocumentRenderer for ScriptedRenderer {
    async fn render(&self, _request: RenderRequest) -> Result<RenderedDocument, RenderError> {
        let first: Result<Bytes, RenderError> = Ok(Bytes::from_static(b"<!DOCTYPE html><html>"));
        match &self.script {
            Script::Fail => Err(RenderError::Render("boom".into())),
            Script::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(RenderedDocument {
                    status: StatusCode::OK,
                    headers: html_headers(),
                    body: stream::iter(vec![first]).boxed(),
                })
            }
            Script::StallAfterFirstChunk => Ok(RenderedDocument {
                status: StatusCode::OK,
                headers: html_headers(),
                body: stream::iter(vec![first]).chain(stream::pending()).boxed(),
            }),
            Script::ErrorAfterFirstChunk => Ok(RenderedDocument {
                status: StatusCode::OK,
                headers: html_headers(),
                body: stream::iter(vec![first, Err(RenderError::Render("midway".into()))]).boxed(),
            }),
        }
    }
}
