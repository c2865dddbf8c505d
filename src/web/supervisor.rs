use axum::{
    extract::{Query, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::web::{
    AppState,
    auth::{self, RoleGate},
    dashboard::{BoardPage, ReviewBoard, render_review_board},
    flash::{FlashQuery, compose_flash_message},
    responses,
};

pub async fn supervisor_dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Supervisor).await?;

    let board = ReviewBoard::load(state.pool_ref()).await.map_err(|err| {
        error!(?err, "failed to load supervisor dashboard");
        responses::server_error()
    })?;

    let flash = compose_flash_message(&params, state.config());
    Ok(Html(render_review_board(
        &user,
        &board,
        BoardPage {
            title: "Supervisor dashboard",
            home: user.role.home_path(),
            nav_links: Vec::new(),
            lead_html: String::new(),
        },
        &flash,
        state.config(),
    )))
}
