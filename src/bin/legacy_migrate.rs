//! One-off upgrade of a database created by the previous deployment.
//!
//! Renames `"user"`/`document` to `hr_users`/`hr_documents`, adds columns that older
//! schemas lack, widens ids to BIGINT, converts naive timestamps (stored as UTC) to
//! TIMESTAMPTZ, and collapses duplicate `(user_id, doc_type)` rows so the unique slot
//! index can be created. Run it once before starting the server against an old database.

use anyhow::{Context, Result};
use doc_intake::config::AppConfig;
use dotenvy::dotenv;
use sqlx::{Postgres, Transaction, postgres::PgPoolOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const LEGACY_RENAMES: &[(&str, &str)] = &[("user", "hr_users"), ("document", "hr_documents")];

const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("hr_users", "name", "VARCHAR(120)"),
    ("hr_documents", "doc_type", "VARCHAR(50)"),
    ("hr_documents", "status", "VARCHAR(20)"),
    ("hr_documents", "created_at", "TIMESTAMPTZ"),
    ("hr_documents", "reviewed_at", "TIMESTAMPTZ"),
    ("hr_documents", "reason", "TEXT"),
];

const BIGINT_COLUMNS: &[(&str, &str)] = &[
    ("hr_users", "id"),
    ("hr_documents", "id"),
    ("hr_documents", "user_id"),
];

const TIMESTAMP_COLUMNS: &[(&str, &str)] = &[
    ("hr_documents", "created_at"),
    ("hr_documents", "reviewed_at"),
];

/// Slot key given to rows that predate document types.
const UNTYPED_DOC_TYPE: &str = "other";

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        error!(?err, "legacy migration failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    info!(database = %config.redacted_database_url(), "starting legacy migration");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let mut tx = pool.begin().await.context("failed to open transaction")?;

    for (legacy, current) in LEGACY_RENAMES {
        rename_table(&mut tx, legacy, current).await?;
    }

    if !table_exists(&mut tx, "hr_users").await? || !table_exists(&mut tx, "hr_documents").await? {
        warn!("no legacy tables found; nothing to migrate");
        tx.rollback().await.ok();
        return Ok(());
    }

    for (table, column, sql_type) in ADDED_COLUMNS {
        sqlx::query(&format!(
            "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {column} {sql_type}"
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to add {table}.{column}"))?;
    }

    for (table, column) in BIGINT_COLUMNS {
        if column_type(&mut tx, table, column).await?.as_deref() == Some("integer") {
            sqlx::query(&format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE BIGINT"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to widen {table}.{column}"))?;
            info!(%table, %column, "widened to BIGINT");
        }
    }

    for (table, column) in TIMESTAMP_COLUMNS {
        if column_type(&mut tx, table, column).await?.as_deref()
            == Some("timestamp without time zone")
        {
            sqlx::query(&format!(
                "ALTER TABLE {table} ALTER COLUMN {column} TYPE TIMESTAMPTZ USING {column} AT TIME ZONE 'UTC'"
            ))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to convert {table}.{column}"))?;
            info!(%table, %column, "converted to TIMESTAMPTZ");
        }
    }

    let backfilled = sqlx::query(
        "UPDATE hr_documents
         SET status = COALESCE(status, 'pending'),
             created_at = COALESCE(created_at, NOW()),
             doc_type = COALESCE(NULLIF(doc_type, ''), $1)
         WHERE status IS NULL OR created_at IS NULL OR doc_type IS NULL OR doc_type = ''",
    )
    .bind(UNTYPED_DOC_TYPE)
    .execute(&mut *tx)
    .await
    .context("failed to backfill document columns")?
    .rows_affected();
    info!(rows = backfilled, "backfilled missing document values");

    let removed = remove_duplicate_slots(&mut tx).await?;
    if !removed.is_empty() {
        warn!(
            rows = removed.len(),
            files = ?removed,
            "removed duplicate slot rows; their files are left on disk"
        );
    }

    tx.commit().await.context("failed to commit legacy migration")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    info!("legacy migration complete");
    pool.close().await;
    Ok(())
}

async fn rename_table(tx: &mut Transaction<'_, Postgres>, legacy: &str, current: &str) -> Result<()> {
    if table_exists(tx, current).await? || !table_exists(tx, legacy).await? {
        return Ok(());
    }

    sqlx::query(&format!("ALTER TABLE \"{legacy}\" RENAME TO {current}"))
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to rename {legacy} to {current}"))?;
    info!(%legacy, %current, "renamed legacy table");
    Ok(())
}

async fn table_exists(tx: &mut Transaction<'_, Postgres>, table: &str) -> Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables
                        WHERE table_schema = 'public' AND table_name = $1)",
    )
    .bind(table)
    .fetch_one(&mut **tx)
    .await
    .with_context(|| format!("failed to check for table {table}"))
}

async fn column_type(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
) -> Result<Option<String>> {
    sqlx::query_scalar(
        "SELECT data_type::text FROM information_schema.columns
         WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_optional(&mut **tx)
    .await
    .with_context(|| format!("failed to inspect {table}.{column}"))
}

/// Keeps the newest row of each `(user_id, doc_type)` slot and returns the filenames of the rest.
async fn remove_duplicate_slots(tx: &mut Transaction<'_, Postgres>) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "DELETE FROM hr_documents d
         USING (
             SELECT id, ROW_NUMBER() OVER (
                 PARTITION BY user_id, doc_type ORDER BY created_at DESC, id DESC
             ) AS slot_rank
             FROM hr_documents
         ) ranked
         WHERE d.id = ranked.id AND ranked.slot_rank > 1
         RETURNING d.filename",
    )
    .fetch_all(&mut **tx)
    .await
    .context("failed to remove duplicate document slots")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
