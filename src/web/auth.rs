use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::{AppState, responses};

pub const SESSION_COOKIE: &str = "intake_session";
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Admin,
    Supervisor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "client" => Some(Role::Client),
            "admin" => Some(Role::Admin),
            "supervisor" => Some(Role::Supervisor),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Admin => "Administrator",
            Role::Supervisor => "Supervisor",
        }
    }

    /// Landing page after login and default redirect target.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Client => "/client",
            Role::Admin => "/admin",
            Role::Supervisor => "/supervisor",
        }
    }
}

/// Which roles a route admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    Client,
    Admin,
    Supervisor,
    /// Admins and supervisors: review actions and reviewer dashboards.
    Reviewer,
}

impl RoleGate {
    pub fn admits(self, role: Role) -> bool {
        match (self, role) {
            (RoleGate::Client, Role::Client) => true,
            (RoleGate::Client, Role::Admin | Role::Supervisor) => false,
            (RoleGate::Admin, Role::Admin) => true,
            (RoleGate::Admin, Role::Client | Role::Supervisor) => false,
            (RoleGate::Supervisor, Role::Supervisor) => true,
            (RoleGate::Supervisor, Role::Client | Role::Admin) => false,
            (RoleGate::Reviewer, Role::Admin | Role::Supervisor) => true,
            (RoleGate::Reviewer, Role::Client) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }

    /// Owners see their own files; reviewers see everyone's.
    pub fn can_access_document_of(&self, owner_id: i64) -> bool {
        match self.role {
            Role::Admin | Role::Supervisor => true,
            Role::Client => self.id == owner_id,
        }
    }
}

#[derive(Clone, sqlx::FromRow)]
struct DbUserAuth {
    id: i64,
    password: String,
    role: String,
}

#[derive(Clone, sqlx::FromRow)]
struct DbSessionUser {
    id: i64,
    email: String,
    name: Option<String>,
    role: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: Option<String>,
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), Redirect> {
    let email = form.email.trim();

    let user = match fetch_user_by_email(state.pool_ref(), email).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(Redirect::to("/?error=login_failed")),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(Redirect::to("/?error=unknown"));
        }
    };

    if !verify_password(&form.password, &user.password) {
        return Err(Redirect::to("/?error=login_failed"));
    }

    let Some(role) = Role::parse(&user.role) else {
        warn!(user_id = user.id, role = %user.role, "login refused for unknown role");
        return Err(Redirect::to("/?error=login_failed"));
    };

    let session_token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    if let Err(err) =
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_token)
            .bind(user.id)
            .bind(expires_at)
            .execute(state.pool_ref())
            .await
    {
        error!(?err, "failed to create session");
        return Err(Redirect::to("/?error=unknown"));
    }

    info!(user_id = user.id, role = role.as_str(), "user logged in");

    let remember = form.remember.is_some();
    let cookie = session_cookie(
        session_token.to_string(),
        state.config().cookie_secure,
        remember.then(|| CookieDuration::days(SESSION_TTL_DAYS)),
    );

    Ok((jar.add(cookie), Redirect::to(role.home_path())))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(token) = session_token(&jar) {
        if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(token)
            .execute(state.pool_ref())
            .await
        {
            error!(?err, "failed to remove session during logout");
        }
    }

    let removal = session_cookie(
        String::new(),
        state.config().cookie_secure,
        Some(CookieDuration::seconds(0)),
    );

    (jar.remove(removal), Redirect::to("/?status=logged_out"))
}

fn session_cookie(
    value: String,
    secure: bool,
    max_age: Option<CookieDuration>,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    if let Some(max_age) = max_age {
        cookie.set_max_age(max_age);
    }
    cookie
}

fn session_token(jar: &CookieJar) -> Option<Uuid> {
    let cookie = jar.get(SESSION_COOKIE)?;
    Uuid::parse_str(cookie.value()).ok()
}

/// Resolves the logged-in user, if any. Lookup failures are logged and treated as anonymous.
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Option<AuthUser> {
    let token = session_token(jar)?;

    match fetch_user_by_session(state.pool_ref(), token).await {
        Ok(user) => user,
        Err(err) => {
            error!(?err, "failed to resolve session");
            None
        }
    }
}

/// Any logged-in user; anonymous requests go back to the login page.
pub async fn require_user(state: &AppState, jar: &CookieJar) -> Result<AuthUser, Response> {
    current_user(state, jar)
        .await
        .ok_or_else(|| Redirect::to("/").into_response())
}

/// Logged-in user admitted by `gate`; other roles get a plain 403.
pub async fn require_role(
    state: &AppState,
    jar: &CookieJar,
    gate: RoleGate,
) -> Result<AuthUser, Response> {
    let user = require_user(state, jar).await?;

    if !gate.admits(user.role) {
        warn!(user_id = user.id, role = user.role.as_str(), ?gate, "role gate refused access");
        return Err(responses::forbidden());
    }

    Ok(user)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

async fn fetch_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>("SELECT id, password, role FROM hr_users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_user_by_session(pool: &PgPool, token: Uuid) -> sqlx::Result<Option<AuthUser>> {
    let row = sqlx::query_as::<_, DbSessionUser>(
        "SELECT hr_users.id, hr_users.email, hr_users.name, hr_users.role
         FROM sessions JOIN hr_users ON hr_users.id = sessions.user_id
         WHERE sessions.id = $1 AND sessions.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|row| {
        let Some(role) = Role::parse(&row.role) else {
            warn!(user_id = row.id, role = %row.role, "session user has unknown role");
            return None;
        };
        Some(AuthUser {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
        })
    }))
}
