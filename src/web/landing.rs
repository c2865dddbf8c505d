use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::web::{
    AppState, auth,
    flash::{FlashQuery, compose_flash_message},
    render_login_page,
};

/// `GET /`: the login form, or the role's home page for an active session.
pub async fn landing_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Response {
    if let Some(user) = auth::current_user(&state, &jar).await {
        return Redirect::to(user.role.home_path()).into_response();
    }

    let flash = compose_flash_message(&params, state.config());
    Html(render_login_page(&flash)).into_response()
}
