use axum::{
    extract::{Form, Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    documents::{DocumentStatus, ReviewAction, store},
    web::{
        AppState,
        auth::{self, AuthUser, RoleGate},
        flash::Flash,
        responses::{self, redirect_with_flash},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectForm {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /review/:id/:status`
pub async fn set_status(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path((document_id, status)): Path<(i64, String)>,
    Query(query): Query<NextQuery>,
) -> Result<Response, Response> {
    let reviewer = auth::require_role(&state, &jar, RoleGate::Reviewer).await?;
    let fallback = reviewer.role.home_path();

    let Some(status) = DocumentStatus::parse(&status) else {
        return Ok(redirect_with_flash(
            query.next.as_deref(),
            &headers,
            fallback,
            Flash::Error("invalid_status"),
        ));
    };

    review(
        &state,
        &reviewer,
        document_id,
        ReviewAction::SetStatus(status),
    )
    .await?;

    Ok(redirect_with_flash(
        query.next.as_deref(),
        &headers,
        fallback,
        Flash::Status("reviewed"),
    ))
}

/// `POST /review/:id/reject`
pub async fn reject(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(document_id): Path<i64>,
    Form(form): Form<RejectForm>,
) -> Result<Response, Response> {
    let reviewer = auth::require_role(&state, &jar, RoleGate::Reviewer).await?;

    review(
        &state,
        &reviewer,
        document_id,
        ReviewAction::Reject {
            reason: form.reason,
        },
    )
    .await?;

    Ok(redirect_with_flash(
        form.next.as_deref(),
        &headers,
        reviewer.role.home_path(),
        Flash::Status("reviewed"),
    ))
}

async fn review(
    state: &AppState,
    reviewer: &AuthUser,
    document_id: i64,
    action: ReviewAction,
) -> Result<(), Response> {
    match store::apply_review(state.pool_ref(), document_id, action, Utc::now()).await {
        Ok(Some(next)) => {
            info!(
                reviewer_id = reviewer.id,
                document_id,
                status = next.status.as_str(),
                "document reviewed"
            );
            Ok(())
        }
        Ok(None) => Err(responses::not_found()),
        Err(err) => {
            error!(?err, document_id, "failed to apply review");
            Err(responses::server_error())
        }
    }
}
