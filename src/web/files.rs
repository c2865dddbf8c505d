use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, error, warn};

use crate::{
    documents::{DocumentRow, store},
    web::{
        AppState,
        auth::{self, AuthUser},
        escape_html,
        responses,
        storage::{self, Disposition},
        templates::{NavLink, PageLayout, render_page},
    },
};

/// `GET /files/:name`: download.
pub async fn download(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<Response, Response> {
    let (user, document) = authorize(&state, &jar, &name).await?;
    let path = stored_path(&state, &document)?;
    debug!(user_id = user.id, document_id = document.id, "serving download");
    Ok(storage::stream_file(&path, &document.filename, Disposition::Attachment).await)
}

/// `GET /preview/:name`: inline for images, text and PDFs, a short notice otherwise.
pub async fn preview(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<Response, Response> {
    let (user, document) = authorize(&state, &jar, &name).await?;

    let mime = storage::guess_mime(&document.filename);
    if !storage::is_inline_previewable(&mime) {
        return Ok(Html(render_preview_unsupported(&user, &document.filename)).into_response());
    }

    let path = stored_path(&state, &document)?;
    Ok(storage::stream_file(&path, &document.filename, Disposition::Inline).await)
}

/// Looks up the document behind a stored filename and checks the caller may see it.
async fn authorize(
    state: &AppState,
    jar: &CookieJar,
    name: &str,
) -> Result<(AuthUser, DocumentRow), Response> {
    let user = auth::require_user(state, jar).await?;

    if storage::resolve_stored_path(&state.config().upload_dir, name).is_none() {
        return Err(responses::not_found());
    }

    let document = store::fetch_document_by_filename(state.pool_ref(), name)
        .await
        .map_err(|err| {
            error!(?err, %name, "failed to look up document by filename");
            responses::server_error()
        })?
        .ok_or_else(responses::not_found)?;

    if !user.can_access_document_of(document.user_id) {
        warn!(user_id = user.id, document_id = document.id, "file access refused");
        return Err(responses::forbidden());
    }

    Ok((user, document))
}

fn stored_path(state: &AppState, document: &DocumentRow) -> Result<std::path::PathBuf, Response> {
    storage::resolve_stored_path(&state.config().upload_dir, &document.filename)
        .ok_or_else(responses::not_found)
}

fn render_preview_unsupported(user: &AuthUser, filename: &str) -> String {
    let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC);
    let body_html = format!(
        r#"<section class="panel">
    <h2>Preview not available</h2>
    <p class="note">The browser cannot display <strong>{name}</strong> directly.</p>
    <p class="actions"><a href="/files/{encoded}">Download the file</a></p>
</section>"#,
        name = escape_html(filename),
    );

    render_page(PageLayout {
        meta_title: "Preview not available",
        page_heading: "Preview",
        note_html: Cow::Borrowed(""),
        flash_html: Cow::Borrowed(""),
        nav_links: vec![NavLink {
            href: user.role.home_path(),
            label: "Back",
        }],
        body_html: Cow::Owned(body_html),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::auth::Role;

    #[test]
    fn unsupported_preview_links_to_download() {
        let user = AuthUser {
            id: 2,
            email: "client@example.com".to_string(),
            name: None,
            role: Role::Client,
        };
        let html = render_preview_unsupported(&user, "abc_form <1>.docx");
        assert!(html.contains("abc_form &lt;1&gt;.docx"));
        assert!(html.contains(r#"href="/files/abc%5Fform%20%3C1%3E%2Edocx""#));
        assert!(html.contains(r#"href="/client""#));
    }
}
