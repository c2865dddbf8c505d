use std::{borrow::Cow, collections::HashMap};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    documents::{DocType, DocumentRow, store},
    web::{
        AppState,
        auth::{self, AuthUser, RoleGate},
        escape_html,
        flash::{Flash, FlashQuery, compose_flash_message},
        responses::{self, redirect_with_flash},
        storage,
        templates::{PageLayout, format_local, render_page, status_tag},
        uploads::{UploadPolicy, receive_upload},
    },
};

const CLIENT_HOME: &str = "/client";
const FILE_FIELD: &str = "file";

/// `GET /client`: the client's document slots.
pub async fn client_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Client).await?;

    let documents = store::fetch_documents_for_user(state.pool_ref(), user.id)
        .await
        .map_err(|err| {
            error!(?err, user_id = user.id, "failed to load client documents");
            responses::server_error()
        })?;

    let flash = compose_flash_message(&params, state.config());
    Ok(Html(render_client_page(
        &user,
        &documents,
        &flash,
        state.config(),
    )))
}

/// `POST /client`: fill or refill a slot.
pub async fn upload_document(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Client).await?;
    let config = state.config();

    let mut outcome = match receive_upload(
        multipart,
        &config.upload_dir,
        UploadPolicy::for_config(config, FILE_FIELD),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(%err, user_id = user.id, "client upload rejected");
            return Ok(redirect_with_flash(None, &headers, CLIENT_HOME, err.flash()));
        }
    };

    let next = outcome.text("next").map(str::to_string);
    let back = |flash: Flash| redirect_with_flash(next.as_deref(), &headers, CLIENT_HOME, flash);

    let Some(doc_type) = outcome.text("doc_type").and_then(DocType::from_key) else {
        outcome.discard().await;
        return Ok(back(Flash::Error("invalid_doc_type")));
    };

    let file = match outcome.require_file() {
        Ok(file) => file,
        Err(err) => return Ok(back(err.flash())),
    };

    match store::upsert_slot(
        state.pool_ref(),
        user.id,
        doc_type,
        &file.stored_name,
        Utc::now(),
    )
    .await
    {
        Ok(slot) => {
            info!(
                user_id = user.id,
                document_id = slot.document_id,
                doc_type = doc_type.key(),
                original = %file.original_name,
                bytes = file.file_size,
                "document uploaded"
            );
            let flash = match slot.previous_filename {
                Some(previous) => {
                    if previous != file.stored_name {
                        storage::remove_stored_file(&config.upload_dir, &previous).await;
                    }
                    Flash::Status("replaced")
                }
                None => Flash::Status("uploaded"),
            };
            Ok(back(flash))
        }
        Err(err) => {
            error!(?err, user_id = user.id, "failed to record uploaded document");
            storage::remove_file_best_effort(&file.stored_path).await;
            Ok(back(Flash::Error("unknown")))
        }
    }
}

/// `POST /client/docs/:id/replace`: re-upload a specific document.
pub async fn replace_document(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(document_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Client).await?;
    let config = state.config();

    let document = store::fetch_document(state.pool_ref(), document_id)
        .await
        .map_err(|err| {
            error!(?err, document_id, "failed to load document for replace");
            responses::server_error()
        })?
        .ok_or_else(responses::not_found)?;

    if document.user_id != user.id {
        warn!(user_id = user.id, document_id, "client tried to replace another client's document");
        return Err(responses::forbidden());
    }

    let mut outcome = match receive_upload(
        multipart,
        &config.upload_dir,
        UploadPolicy::for_config(config, FILE_FIELD),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(%err, user_id = user.id, document_id, "replacement upload rejected");
            return Ok(redirect_with_flash(None, &headers, CLIENT_HOME, err.flash()));
        }
    };

    let next = outcome.text("next").map(str::to_string);
    let back = |flash: Flash| redirect_with_flash(next.as_deref(), &headers, CLIENT_HOME, flash);

    let file = match outcome.require_file() {
        Ok(file) => file,
        Err(err) => return Ok(back(err.flash())),
    };

    match store::replace_document_file(state.pool_ref(), document_id, &file.stored_name, Utc::now())
        .await
    {
        Ok(Some(previous)) => {
            if previous != file.stored_name {
                storage::remove_stored_file(&config.upload_dir, &previous).await;
            }
            info!(user_id = user.id, document_id, "document re-uploaded");
            Ok(back(Flash::Status("reuploaded")))
        }
        Ok(None) => {
            storage::remove_file_best_effort(&file.stored_path).await;
            Err(responses::not_found())
        }
        Err(err) => {
            error!(?err, document_id, "failed to record replacement upload");
            storage::remove_file_best_effort(&file.stored_path).await;
            Ok(back(Flash::Error("unknown")))
        }
    }
}

fn render_client_page(
    user: &AuthUser,
    documents: &[DocumentRow],
    flash_html: &str,
    config: &AppConfig,
) -> String {
    let by_type: HashMap<&str, &DocumentRow> = documents
        .iter()
        .map(|doc| (doc.doc_type.as_str(), doc))
        .collect();
    let accept = config
        .allowed_extensions
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");
    let offset = config.time_offset_hours;

    let mut rows = String::new();
    for doc_type in DocType::ALL {
        let (status_html, uploaded, reviewed, files_html, form_action) =
            match by_type.get(doc_type.key()) {
                Some(doc) => {
                    let mut status_html = status_tag(doc.status());
                    if let Some(reason) = doc.reason.as_deref() {
                        status_html.push_str(&format!(
                            r#"<div class="reason">Reason: {}</div>"#,
                            escape_html(reason)
                        ));
                    }
                    (
                        status_html,
                        format_local(Some(doc.created_at), offset),
                        format_local(doc.reviewed_at, offset),
                        file_links(&doc.filename),
                        format!("/client/docs/{}/replace", doc.id),
                    )
                }
                None => (
                    r#"<span class="status-tag missing">Not uploaded</span>"#.to_string(),
                    "—".to_string(),
                    "—".to_string(),
                    String::new(),
                    CLIENT_HOME.to_string(),
                ),
            };

        rows.push_str(&format!(
            r#"<tr>
    <td>{label}</td>
    <td>{status_html}</td>
    <td>{uploaded}</td>
    <td>{reviewed}</td>
    <td class="actions">{files_html}
        <form class="inline-form" method="post" action="{form_action}" enctype="multipart/form-data">
            <input type="hidden" name="doc_type" value="{key}">
            <input type="hidden" name="next" value="{CLIENT_HOME}">
            <input type="file" name="{FILE_FIELD}" accept="{accept}" required>
            <button type="submit">Upload</button>
        </form>
    </td>
</tr>"#,
            label = escape_html(doc_type.label()),
            key = doc_type.key(),
            accept = escape_html(&accept),
        ));
    }

    let other_rows = documents
        .iter()
        .filter(|doc| DocType::from_key(&doc.doc_type).is_none())
        .map(|doc| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"actions\">{}</td></tr>",
                escape_html(&doc.doc_type),
                status_tag(doc.status()),
                format_local(Some(doc.created_at), offset),
                file_links(&doc.filename),
            )
        })
        .collect::<String>();
    let other_section = if other_rows.is_empty() {
        String::new()
    } else {
        format!(
            r#"<section class="panel">
    <h2>Other documents</h2>
    <table><thead><tr><th>Type</th><th>Status</th><th>Uploaded</th><th>Files</th></tr></thead><tbody>{other_rows}</tbody></table>
</section>"#
        )
    };

    let body_html = format!(
        r#"<section class="panel">
    <h2>Required documents</h2>
    <p class="note">Allowed formats: {formats}. Maximum size: {limit}. Uploading again replaces the previous file and restarts the review.</p>
    <table>
        <thead><tr><th>Document</th><th>Status</th><th>Uploaded</th><th>Reviewed</th><th>Actions</th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>
{other_section}"#,
        formats = escape_html(&accept),
        limit = config.max_content_length_label(),
    );

    let note_html = format!(
        "Signed in as <strong>{}</strong>.",
        escape_html(user.display_name())
    );

    render_page(PageLayout {
        meta_title: "My documents",
        page_heading: "My documents",
        note_html: Cow::Owned(note_html),
        flash_html: Cow::Borrowed(flash_html),
        nav_links: Vec::new(),
        body_html: Cow::Owned(body_html),
    })
}

/// Preview and download links for a stored file.
pub fn file_links(filename: &str) -> String {
    let encoded = percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    format!(
        r#"<a href="/preview/{encoded}" target="_blank">Preview</a><a href="/files/{encoded}">Download</a>"#
    )
}
