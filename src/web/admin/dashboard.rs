use axum::{
    extract::{Query, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::web::{
    AppState,
    auth::{self, AuthUser, Role, RoleGate},
    dashboard::{BoardPage, ReviewBoard, render_review_board},
    flash::{FlashQuery, compose_flash_message},
    responses,
    templates::NavLink,
};

use super::ADMIN_HOME;

/// `GET /admin`: the review board, plus user creation for admins.
///
/// Supervisors may view it too; they just don't get the create form.
pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Reviewer).await?;

    let board = ReviewBoard::load(state.pool_ref()).await.map_err(|err| {
        error!(?err, "failed to load admin dashboard");
        responses::server_error()
    })?;

    let flash = compose_flash_message(&params, state.config());
    Ok(Html(render_review_board(
        &user,
        &board,
        admin_board_page(&user),
        &flash,
        state.config(),
    )))
}

fn admin_board_page(user: &AuthUser) -> BoardPage<'static> {
    match user.role {
        Role::Admin => BoardPage {
            title: "Admin dashboard",
            home: ADMIN_HOME,
            nav_links: vec![NavLink {
                href: "/admin/manage",
                label: "Manage users",
            }],
            lead_html: create_user_form(),
        },
        Role::Supervisor | Role::Client => BoardPage {
            title: "Admin dashboard",
            home: ADMIN_HOME,
            nav_links: vec![NavLink {
                href: "/supervisor",
                label: "Supervisor dashboard",
            }],
            lead_html: String::new(),
        },
    }
}

fn create_user_form() -> String {
    format!(
        r#"<section class="panel">
    <h2>Create user</h2>
    <form method="post" action="{ADMIN_HOME}" class="inline-form">
        <input type="hidden" name="next" value="{ADMIN_HOME}">
        <input name="name" placeholder="Name" required>
        <input type="email" name="email" placeholder="Email" required>
        <input type="password" name="password" placeholder="Password" required>
        <select name="role">
            <option value="{client}">{client_label}</option>
            <option value="{supervisor}">{supervisor_label}</option>
        </select>
        <button type="submit">Create</button>
    </form>
</section>"#,
        client = Role::Client.as_str(),
        client_label = Role::Client.label(),
        supervisor = Role::Supervisor.as_str(),
        supervisor_label = Role::Supervisor.label(),
    )
}
