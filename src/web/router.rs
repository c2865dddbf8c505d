use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{
    AppState, admin, auth, client, clients, files, landing, review, supervisor,
};

/// Room for the multipart framing and text fields around the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config()
        .max_content_length
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(landing::landing_page).post(auth::process_login))
        .route("/logout", get(auth::logout))
        .route("/healthz", get(healthz))
        .route(
            "/client",
            get(client::client_page).post(client::upload_document),
        )
        .route("/client/docs/:id/replace", post(client::replace_document))
        .route("/admin", get(admin::dashboard).post(admin::create_user))
        .route("/admin/manage", get(admin::manage_users))
        .route("/admin/password/change", post(admin::change_password))
        .route("/admin/users/:id/delete", post(admin::delete_user))
        .route("/supervisor", get(supervisor::supervisor_dashboard))
        .route("/review/:id/reject", post(review::reject))
        .route("/review/:id/:status", get(review::set_status))
        .route("/files/:name", get(files::download))
        .route("/preview/:name", get(files::preview))
        .route("/clients/:user_id", get(clients::client_detail))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
