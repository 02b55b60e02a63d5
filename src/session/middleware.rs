//! Session attachment stage.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;
use crate::session::store::Session;

/// Load the session, expose it to inner stages, commit it on the way out.
pub async fn attach_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let record = state.sessions.load(request.headers());
    let session = Session::new(record);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(cookie) = state.sessions.commit_if_changed(&session) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// Handlers behind the session stage can take `Session` as an argument.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session stage is not installed",
        ))
    }
}
