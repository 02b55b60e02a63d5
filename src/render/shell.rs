//! Built-in document shell renderer.
//!
//! Produces the root HTML document around the example routes. The document
//! is streamed as three chunks (head, route content, scripts) so the head
//! can be flushed before the route body is assembled.

use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::stream::{self, StreamExt};

use crate::config::Mode;
use crate::render::build::ServerBuild;
use crate::render::routes::{
    escape, index_page, messages, not_found_page, validate_message, Messages, Page, Route,
};
use crate::render::{DocumentRenderer, RenderError, RenderRequest, RenderedDocument};
use crate::security::csp::{FONT_FILE_HOST, FONT_STYLE_HOST};

const APP_VERSION: &str = "x-app-version";
const FONT_STYLESHEET: &str = "https://fonts.googleapis.com/css2?family=Inter:ital,opsz,wght@0,14..32,100..900;1,14..32,100..900&display=swap";

/// Session key of the index form's flash message.
pub const FLASH_MESSAGE: &str = "message";

/// Renders the application document from the server build manifest.
#[derive(Debug, Clone)]
pub struct ShellRenderer {
    manifest_path: PathBuf,
    mode: Mode,
}

impl ShellRenderer {
    pub fn new(manifest_path: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            mode,
        }
    }

    fn version<'a>(&self, build: &'a ServerBuild) -> &'a str {
        if self.mode.is_production() {
            &build.version
        } else {
            "dev"
        }
    }

    fn head(&self, build: &ServerBuild, request: &RenderRequest, page: &Page) -> String {
        let mut html = format!(
            r#"<!DOCTYPE html><html lang="{}" class="light h-full overflow-x-hidden"><head>"#,
            escape(&request.context.locale)
        );
        html.push_str(r#"<meta charset="utf-8">"#);
        html.push_str(r#"<meta name="viewport" content="width=device-width,initial-scale=1">"#);
        html.push_str(&format!("<title>{}</title>", escape(&page.title)));
        html.push_str(&format!(
            r#"<meta name="description" content="{}">"#,
            escape(&page.description)
        ));
        if !request.env.allow_indexing {
            html.push_str(r#"<meta name="robots" content="noindex, nofollow">"#);
        }
        html.push_str(&format!(r#"<link rel="preconnect" href="{}">"#, FONT_STYLE_HOST));
        html.push_str(&format!(
            r#"<link rel="preconnect" href="{}" crossorigin="anonymous">"#,
            FONT_FILE_HOST
        ));
        html.push_str(&format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape(FONT_STYLESHEET)
        ));
        for stylesheet in &build.stylesheets {
            html.push_str(&format!(
                r#"<link rel="stylesheet" href="{}">"#,
                escape(stylesheet)
            ));
        }
        html.push_str("</head>");
        html
    }

    fn body(&self, messages: &Messages, page: &Page) -> String {
        format!(
            r#"<body class="bg-background text-foreground"><div class="flex h-screen flex-col"><header class="container py-6"><h1 class="text-2xl font-bold">{}</h1></header><main>{}</main></div>"#,
            escape(messages.greeting),
            page.content
        )
    }

    fn tail(&self, build: &ServerBuild, request: &RenderRequest) -> String {
        let nonce = escape(&request.context.nonce);
        format!(
            r#"<script nonce="{nonce}">window.ENV = {env}</script><script type="module" nonce="{nonce}" src="{entry}"></script></body></html>"#,
            nonce = nonce,
            env = request.env.to_script_json(),
            entry = escape(&build.entry)
        )
    }

    fn page(&self, request: &RenderRequest, messages: &Messages) -> Result<Routed, RenderError> {
        let route = Route::match_path(request.uri.path());
        if !route.allows(&request.method) {
            return Ok(Routed::MethodNotAllowed);
        }

        let page = match route {
            Route::HealthCheck => return Ok(Routed::Text(StatusCode::OK, "OK")),
            Route::NotFound => not_found_page(messages),
            Route::Index if request.method == Method::POST => {
                let Some(form) = request.form.as_ref() else {
                    return Ok(Routed::Text(
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "Expected a form submission",
                    ));
                };
                match validate_message(form.get("message")) {
                    Ok(message) => {
                        request
                            .session
                            .flash(FLASH_MESSAGE, &message)
                            .map_err(|e| RenderError::Render(e.to_string()))?;
                        return Ok(Routed::Redirect("/"));
                    }
                    Err(e) => index_page(
                        messages,
                        &request.forms,
                        None,
                        Some(e.text(messages)),
                        StatusCode::BAD_REQUEST,
                    ),
                }
            }
            Route::Index => {
                // Only a GET consumes the flash; HEAD leaves it for the next page view.
                let flash: Option<String> = if request.method == Method::GET {
                    request.session.take_flash(FLASH_MESSAGE)
                } else {
                    request.session.get(FLASH_MESSAGE)
                };
                index_page(messages, &request.forms, flash.as_deref(), None, StatusCode::OK)
            }
        };
        Ok(Routed::Page(page))
    }
}

/// Outcome of route dispatch.
enum Routed {
    Page(Page),
    Text(StatusCode, &'static str),
    Redirect(&'static str),
    MethodNotAllowed,
}

fn document(status: StatusCode, headers: HeaderMap, chunks: Vec<String>) -> RenderedDocument {
    RenderedDocument {
        status,
        headers,
        body: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed(),
    }
}

#[async_trait]
impl DocumentRenderer for ShellRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedDocument, RenderError> {
        let build = ServerBuild::load(&self.manifest_path).await?;
        let messages = messages(&request.context.locale);

        let mut headers = HeaderMap::new();
        if let Ok(version) = HeaderValue::from_str(self.version(&build)) {
            headers.insert(HeaderName::from_static(APP_VERSION), version);
        }

        match self.page(&request, messages)? {
            Routed::Page(page) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                let chunks = vec![
                    self.head(&build, &request, &page),
                    self.body(messages, &page),
                    self.tail(&build, &request),
                ];
                Ok(document(page.status, headers, chunks))
            }
            Routed::Text(status, text) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                Ok(document(status, headers, vec![text.to_string()]))
            }
            Routed::Redirect(location) => {
                headers.insert(header::LOCATION, HeaderValue::from_static(location));
                Ok(document(StatusCode::SEE_OTHER, headers, Vec::new()))
            }
            Routed::MethodNotAllowed => {
                headers.insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
                Ok(document(
                    StatusCode::METHOD_NOT_ALLOWED,
                    headers,
                    vec!["Method Not Allowed".to_string()],
                ))
            }
        }
    }
}
