use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use url::Url;

use crate::web::flash::Flash;

pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<h1>Not found</h1><p>The requested item does not exist.</p>".to_string()),
    )
        .into_response()
}

pub fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>Server error</h1><p>Please try again later.</p>".to_string()),
    )
        .into_response()
}

/// Where a form submission should land: an explicit `next`, else the referring page, else `fallback`.
///
/// Only same-site paths are honoured; anything else falls through to the next candidate.
pub fn redirect_target(next: Option<&str>, headers: &HeaderMap, fallback: &str) -> String {
    if let Some(next) = next.and_then(local_path) {
        return next;
    }

    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(referer_path);

    referer.unwrap_or_else(|| fallback.to_string())
}

/// Redirect back with a flash code attached.
pub fn redirect_with_flash(
    next: Option<&str>,
    headers: &HeaderMap,
    fallback: &str,
    flash: Flash,
) -> Response {
    let target = redirect_target(next, headers, fallback);
    Redirect::to(&flash.attach_to(&target)).into_response()
}

fn local_path(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.starts_with('/') && !candidate.starts_with("//") && !candidate.contains('\\') {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn referer_path(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }
    local_path(&path)
}
