use std::borrow::Cow;

use axum::{
    extract::{Path, Query, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use sqlx::{FromRow, PgPool};
use tracing::error;

use crate::{
    config::AppConfig,
    documents::{DocumentRow, store},
    web::{
        AppState,
        auth::{self, AuthUser, RoleGate},
        dashboard::document_cells,
        escape_html,
        flash::{FlashQuery, compose_flash_message},
        responses,
        templates::{NavLink, PageLayout, render_page},
    },
};

#[derive(Debug, Clone, FromRow)]
struct ClientProfile {
    id: i64,
    email: String,
    name: Option<String>,
}

impl ClientProfile {
    fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

/// `GET /clients/:user_id`: one client's documents for reviewers.
pub async fn client_detail(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(user_id): Path<i64>,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Response> {
    let reviewer = auth::require_role(&state, &jar, RoleGate::Reviewer).await?;

    let profile = fetch_profile(state.pool_ref(), user_id)
        .await
        .map_err(|err| {
            error!(?err, user_id, "failed to load client profile");
            responses::server_error()
        })?
        .ok_or_else(responses::not_found)?;

    let documents = store::fetch_documents_for_user(state.pool_ref(), user_id)
        .await
        .map_err(|err| {
            error!(?err, user_id, "failed to load client documents");
            responses::server_error()
        })?;

    let flash = compose_flash_message(&params, state.config());
    Ok(Html(render_client_detail(
        &reviewer,
        &profile,
        &documents,
        &flash,
        state.config(),
    )))
}

async fn fetch_profile(pool: &PgPool, user_id: i64) -> sqlx::Result<Option<ClientProfile>> {
    sqlx::query_as::<_, ClientProfile>("SELECT id, email, name FROM hr_users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

fn render_client_detail(
    reviewer: &AuthUser,
    profile: &ClientProfile,
    documents: &[DocumentRow],
    flash_html: &str,
    config: &AppConfig,
) -> String {
    let return_to = format!("/clients/{}", profile.id);
    let rows = if documents.is_empty() {
        "<tr><td colspan=\"5\">This client has not uploaded anything yet.</td></tr>".to_string()
    } else {
        documents
            .iter()
            .map(|doc| {
                format!(
                    "<tr>{}</tr>",
                    document_cells(doc, &return_to, config.time_offset_hours)
                )
            })
            .collect()
    };

    let body_html = format!(
        r#"<section class="panel">
    <h2>Documents</h2>
    <table>
        <thead><tr><th>Document</th><th>Status</th><th>Uploaded</th><th>Reviewed</th><th>Actions</th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>"#
    );

    let heading = escape_html(&format!("Client: {}", profile.display_name()));
    render_page(PageLayout {
        meta_title: "Client documents",
        page_heading: &heading,
        note_html: Cow::Owned(escape_html(&profile.email)),
        flash_html: Cow::Borrowed(flash_html),
        nav_links: vec![NavLink {
            href: reviewer.role.home_path(),
            label: "Dashboard",
        }],
        body_html: Cow::Owned(body_html),
    })
}
