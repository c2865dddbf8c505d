use axum::{
    extract::{Form, Path, State},
    http::HeaderMap,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use tracing::{error, info, warn};

use crate::web::{
    AppState,
    auth::{self, Role, RoleGate},
    flash::Flash,
    responses::{self, redirect_with_flash},
    storage,
};

use super::{ADMIN_HOME, MANAGE_PATH};

#[derive(Deserialize)]
pub(crate) struct CreateUserForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ChangePasswordForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct DeleteUserForm {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ManagedUserRow {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

/// Result of removing an account.
#[derive(Debug, PartialEq, Eq)]
pub enum AccountRemoval {
    Missing,
    RefusedAdmin,
    /// Stored filenames that belonged to the removed user.
    Removed(Vec<String>),
}

/// Roles an admin may hand out from the create form.
fn creatable_role(value: &str) -> Option<Role> {
    match Role::parse(value)? {
        role @ (Role::Client | Role::Supervisor) => Some(role),
        Role::Admin => None,
    }
}

/// `POST /admin`
pub async fn create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<CreateUserForm>,
) -> Result<Response, Response> {
    let user = auth::require_role(&state, &jar, RoleGate::Reviewer).await?;
    let back = |flash: Flash| redirect_with_flash(form.next.as_deref(), &headers, ADMIN_HOME, flash);

    if user.role != Role::Admin {
        warn!(user_id = user.id, "non-admin tried to create a user");
        return Ok(back(Flash::Error("not_authorized")));
    }

    let name = form.name.trim();
    let email = form.email.trim();
    let password = form.password.trim();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Ok(back(Flash::Error("invalid_fields")));
    }
    let Some(role) = creatable_role(form.role.trim()) else {
        return Ok(back(Flash::Error("invalid_fields")));
    };

    let password_hash = match auth::hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password while creating user");
            return Ok(back(Flash::Error("unknown")));
        }
    };

    let result = sqlx::query("INSERT INTO hr_users (name, email, password, role) VALUES ($1, $2, $3, $4)")
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(state.pool_ref())
        .await;

    match result {
        Ok(_) => {
            info!(admin_id = user.id, %email, role = role.as_str(), "user created");
            Ok(back(Flash::Status("created")))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
            Ok(back(Flash::Error("duplicate")))
        }
        Err(err) => {
            error!(?err, "failed to create user");
            Ok(back(Flash::Error("unknown")))
        }
    }
}

/// `POST /admin/password/change`
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response, Response> {
    let admin = auth::require_role(&state, &jar, RoleGate::Admin).await?;
    let back = |flash: Flash| redirect_with_flash(form.next.as_deref(), &headers, MANAGE_PATH, flash);

    let email = form.email.trim();
    let password = form.new_password.trim();
    if email.is_empty() || password.is_empty() {
        return Ok(back(Flash::Error("invalid_fields")));
    }

    let password_hash = match auth::hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password while resetting user password");
            return Ok(back(Flash::Error("unknown")));
        }
    };

    let result = sqlx::query("UPDATE hr_users SET password = $2 WHERE email = $1")
        .bind(email)
        .bind(password_hash)
        .execute(state.pool_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() > 0 => {
            info!(admin_id = admin.id, %email, "password changed by admin");
            Ok(back(Flash::Status("password_updated")))
        }
        Ok(_) => Ok(back(Flash::Error("user_missing"))),
        Err(err) => {
            error!(?err, "failed to update user password");
            Ok(back(Flash::Error("unknown")))
        }
    }
}

/// `POST /admin/users/:id/delete`: removes a client or supervisor with all their files.
pub async fn delete_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Form(form): Form<DeleteUserForm>,
) -> Result<Response, Response> {
    let admin = auth::require_role(&state, &jar, RoleGate::Admin).await?;
    let back = |flash: Flash| redirect_with_flash(form.next.as_deref(), &headers, ADMIN_HOME, flash);

    if admin.id == user_id {
        return Ok(back(Flash::Error("cannot_delete_self")));
    }

    match remove_account(state.pool_ref(), user_id).await {
        Ok(AccountRemoval::Missing) => Err(responses::not_found()),
        Ok(AccountRemoval::RefusedAdmin) => Ok(back(Flash::Error("cannot_delete_admin"))),
        Ok(AccountRemoval::Removed(filenames)) => {
            for filename in &filenames {
                storage::remove_stored_file(&state.config().upload_dir, filename).await;
            }
            info!(
                admin_id = admin.id,
                user_id,
                files = filenames.len(),
                "user deleted"
            );
            Ok(back(Flash::Status("user_deleted")))
        }
        Err(err) => {
            error!(?err, user_id, "failed to delete user");
            Ok(back(Flash::Error("unknown")))
        }
    }
}

/// Deletes a non-admin user, their documents and their sessions in one transaction.
pub async fn remove_account(pool: &PgPool, user_id: i64) -> sqlx::Result<AccountRemoval> {
    let mut tx = pool.begin().await?;

    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM hr_users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(role) = role else {
        return Ok(AccountRemoval::Missing);
    };
    if Role::parse(&role) == Some(Role::Admin) {
        return Ok(AccountRemoval::RefusedAdmin);
    }

    let filenames: Vec<String> =
        sqlx::query_scalar("DELETE FROM hr_documents WHERE user_id = $1 RETURNING filename")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM hr_users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(AccountRemoval::Removed(filenames))
}

pub async fn fetch_managed_users(pool: &PgPool) -> sqlx::Result<Vec<ManagedUserRow>> {
    sqlx::query_as::<_, ManagedUserRow>(
        "SELECT id, email, name, role FROM hr_users ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await
}
