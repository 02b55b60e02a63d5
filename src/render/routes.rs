//! Route table of the built-in document shell.

use axum::http::{Method, StatusCode};

use crate::render::FormContext;
use crate::security::csrf::CSRF_FIELD;
use crate::security::honeypot::NAME_FIELD;

/// Longest accepted message on the index form.
pub const MAX_MESSAGE_LEN: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    HealthCheck,
    NotFound,
}

impl Route {
    pub fn match_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "" => Route::Index,
            "/healthcheck" => Route::HealthCheck,
            _ => Route::NotFound,
        }
    }

    /// Methods a route answers to.
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Route::Index => matches!(*method, Method::GET | Method::HEAD | Method::POST),
            Route::HealthCheck | Route::NotFound => matches!(*method, Method::GET | Method::HEAD),
        }
    }
}

/// Strings for one locale.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub greeting: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub honeypot_label: &'static str,
    pub message_label: &'static str,
    pub send: &'static str,
    pub message_required: &'static str,
    pub message_too_long: &'static str,
    pub not_found: &'static str,
}

const EN: Messages = Messages {
    greeting: "Hello",
    title: "New App",
    description: "Welcome!",
    honeypot_label: "Please leave this field blank",
    message_label: "Message",
    send: "Send",
    message_required: "Message is required",
    message_too_long: "Message is too long",
    not_found: "We can't find this page",
};

const ES: Messages = Messages {
    greeting: "Hola",
    title: "Nueva aplicación",
    description: "¡Bienvenido!",
    honeypot_label: "Por favor deja este campo vacío",
    message_label: "Mensaje",
    send: "Enviar",
    message_required: "El mensaje es obligatorio",
    message_too_long: "El mensaje es demasiado largo",
    not_found: "No encontramos esta página",
};

/// Messages for a resolved locale; unknown languages read English.
pub fn messages(locale: &str) -> &'static Messages {
    match locale.split('-').next() {
        Some("es") => &ES,
        _ => &EN,
    }
}

/// Rendered route content placed inside `<main>`.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: StatusCode,
    pub title: String,
    pub description: String,
    pub content: String,
}

/// Why the index form's `message` field was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    Required,
    TooLong,
}

impl MessageError {
    pub fn text(&self, messages: &Messages) -> &'static str {
        match self {
            MessageError::Required => messages.message_required,
            MessageError::TooLong => messages.message_too_long,
        }
    }
}

pub fn validate_message(message: Option<&str>) -> Result<String, MessageError> {
    let message = message.map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(MessageError::Required);
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(MessageError::TooLong);
    }
    Ok(message.to_string())
}

pub fn index_page(
    messages: &Messages,
    forms: &FormContext,
    flash: Option<&str>,
    error: Option<&str>,
    status: StatusCode,
) -> Page {
    let mut content = String::new();
    content.push_str(r#"<div class="h-[144px] w-[434px]">"#);
    content.push_str(r#"<img src="/logo-light.png" alt="Logo">"#);
    if let Some(flash) = flash {
        content.push_str(&format!(
            r#"<p class="flash" role="status">{}</p>"#,
            escape(flash)
        ));
    }
    content.push_str(r#"<form method="post" action="/">"#);
    content.push_str(&honeypot_inputs(messages, forms));
    content.push_str(&format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        CSRF_FIELD,
        escape(&forms.csrf_token)
    ));
    content.push_str(&format!(
        r#"<label for="message">{}</label><input id="message" name="message" type="text" maxlength="{}">"#,
        escape(messages.message_label),
        MAX_MESSAGE_LEN
    ));
    if let Some(error) = error {
        content.push_str(&format!(
            r#"<p class="error" role="alert">{}</p>"#,
            escape(error)
        ));
    }
    content.push_str(&format!(
        r#"<button type="submit">{}</button></form></div>"#,
        escape(messages.send)
    ));

    Page {
        status,
        title: messages.title.to_string(),
        description: messages.description.to_string(),
        content,
    }
}

pub fn not_found_page(messages: &Messages) -> Page {
    Page {
        status: StatusCode::NOT_FOUND,
        title: messages.not_found.to_string(),
        description: messages.description.to_string(),
        content: format!(
            r#"<div class="container"><h2>404</h2><p>{}</p></div>"#,
            escape(messages.not_found)
        ),
    }
}

/// Hidden inputs of the honeypot contract. Hidden with the `hidden`
/// attribute because inline styles are not allowed by the CSP.
fn honeypot_inputs(messages: &Messages, forms: &FormContext) -> String {
    let mut html = format!(
        r#"<div id="{name}__wrap" hidden aria-hidden="true"><label for="{name}">{label}</label><input id="{name}" name="{name}" type="text" value="" autocomplete="nope" tabindex="-1">"#,
        name = NAME_FIELD,
        label = escape(messages.honeypot_label)
    );
    if let Some(valid_from) = forms.honeypot.valid_from_field_name {
        html.push_str(&format!(
            r#"<input name="{}" type="text" value="{}" readonly autocomplete="off" tabindex="-1">"#,
            valid_from,
            escape(&forms.honeypot.encrypted_valid_from)
        ));
    }
    html.push_str("</div>");
    html
}

/// Escape text for HTML content and double-quoted attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
