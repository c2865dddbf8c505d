use std::env;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, header},
};
use doc_intake::{
    config::AppConfig,
    documents::{DocumentRow, store},
    web::{AppState, auth::SESSION_COOKIE, router::build_router},
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Router and pool backed by the database named in `TEST_DATABASE_URL`.
///
/// Every test creates its own users with unique emails, so tests can share one database
/// and run concurrently.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    upload_dir: TempDir,
    user_ids: std::sync::Mutex<Vec<i64>>,
}

impl TestApp {
    /// Returns `None` when no test database is configured, so the suite is skipped.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return Ok(None);
        };

        let upload_dir = tempfile::tempdir().context("failed to create upload dir")?;
        let upload_path = upload_dir.path().to_string_lossy().into_owned();
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "DATABASE_MAX_CONNECTIONS" => Some("2".to_string()),
            "UPLOAD_FOLDER" => Some(upload_path.clone()),
            _ => None,
        })?;

        let state = AppState::new(config).await?;
        let router = build_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            upload_dir,
            user_ids: std::sync::Mutex::new(Vec::new()),
        }))
    }

    pub fn upload_path(&self, name: &str) -> std::path::PathBuf {
        self.upload_dir.path().join(name)
    }

    pub async fn insert_user(&self, role: &str) -> Result<i64> {
        let email = format!("{role}-{}@example.test", Uuid::new_v4().simple());
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO hr_users (email, password, role, name) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&email)
        .bind("not-a-hash")
        .bind(role)
        .bind(format!("Test {role}"))
        .fetch_one(self.state.pool_ref())
        .await
        .context("failed to insert user")?;

        if let Ok(mut ids) = self.user_ids.lock() {
            ids.push(id);
        }
        Ok(id)
    }

    /// Opens a session for the user and returns the cookie header value.
    pub async fn session_cookie(&self, user_id: i64) -> Result<String> {
        let token = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, NOW() + INTERVAL '1 day')",
        )
        .bind(token)
        .bind(user_id)
        .execute(self.state.pool_ref())
        .await
        .context("failed to insert session")?;
        Ok(format!("{SESSION_COOKIE}={token}"))
    }

    pub async fn documents_of(&self, user_id: i64) -> Result<Vec<DocumentRow>> {
        store::fetch_documents_for_user(self.state.pool_ref(), user_id)
            .await
            .context("failed to load documents")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Result<Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Result<Response<Body>> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string()))?).await
    }

    pub async fn upload(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        filename: &str,
        data: &[u8],
        cookie: &str,
    ) -> Result<Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))?;
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Removes the users this app created; their documents and sessions cascade.
    pub async fn cleanup(&self) -> Result<()> {
        let ids = self.user_ids.lock().map(|ids| ids.clone()).unwrap_or_default();
        sqlx::query("DELETE FROM hr_users WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.state.pool_ref())
            .await
            .context("failed to clean up users")?;
        Ok(())
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[allow(dead_code)]
pub async fn body_text(response: Response<Body>) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
