use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, warn};

use crate::{config::AppConfig, web::auth::Role};

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    config: Arc<AppConfig>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .with_context(|| {
                format!(
                    "failed to connect to Postgres at {}",
                    config.redacted_database_url()
                )
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to ensure upload directory at {}",
                    config.upload_dir.display()
                )
            })?;

        Ok(Self::from_parts(pool, config))
    }

    pub fn from_parts(pool: PgPool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let has_admin: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hr_users WHERE role = $1)")
                .bind(Role::Admin.as_str())
                .fetch_one(&self.pool)
                .await
                .context("failed to verify admin presence")?;

        if has_admin {
            return Ok(());
        }

        let email = self.config.seed_admin_email.trim();
        let password_hash = crate::web::auth::hash_password(&self.config.seed_admin_password)
            .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

        let inserted = sqlx::query(
            "INSERT INTO hr_users (email, password, role, name) VALUES ($1, $2, $3, $4)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .bind(Role::Admin.as_str())
        .bind("Administrator")
        .execute(&self.pool)
        .await
        .context("failed to insert seed admin user")?
        .rows_affected();

        if inserted == 0 {
            warn!(%email, "no admin exists and the seed admin email is already taken");
            return Ok(());
        }

        info!(%email, "seeded default admin user");
        if self.config.seed_admin_password == "change-me" {
            warn!("seed admin uses the default password 'change-me'; update it promptly");
        }

        Ok(())
    }

    pub fn pool_ref(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
