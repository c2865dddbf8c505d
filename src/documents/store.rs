use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    ClientActivityRow, DocType, DocumentRow, OwnedDocumentRow, ReviewAction, ReviewState,
};

const DOCUMENT_COLUMNS: &str =
    "d.id, d.user_id, d.doc_type, d.filename, d.status, d.created_at, d.reviewed_at, d.reason";

/// Result of filling a slot for a client.
#[derive(Debug, Clone)]
pub struct SlotUpload {
    pub document_id: i64,
    /// Stored filename of the file this upload displaced, if the slot was already filled.
    pub previous_filename: Option<String>,
}

pub async fn fetch_documents_for_user(
    pool: &PgPool,
    user_id: i64,
) -> sqlx::Result<Vec<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM hr_documents d WHERE d.user_id = $1 ORDER BY d.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_document(pool: &PgPool, id: i64) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM hr_documents d WHERE d.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_document_by_filename(
    pool: &PgPool,
    filename: &str,
) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM hr_documents d WHERE d.filename = $1 LIMIT 1"
    ))
    .bind(filename)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_documents_with_owner(pool: &PgPool) -> sqlx::Result<Vec<OwnedDocumentRow>> {
    sqlx::query_as::<_, OwnedDocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS}, COALESCE(NULLIF(u.name, ''), u.email) AS owner_name
         FROM hr_documents d JOIN hr_users u ON u.id = d.user_id
         ORDER BY d.id"
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch_latest_documents(
    pool: &PgPool,
    limit: i64,
) -> sqlx::Result<Vec<OwnedDocumentRow>> {
    sqlx::query_as::<_, OwnedDocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS}, COALESCE(NULLIF(u.name, ''), u.email) AS owner_name
         FROM hr_documents d JOIN hr_users u ON u.id = d.user_id
         ORDER BY d.created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Per-client upload counts and most recent upload, for clients with at least one file.
pub async fn fetch_client_activity(pool: &PgPool) -> sqlx::Result<Vec<ClientActivityRow>> {
    sqlx::query_as::<_, ClientActivityRow>(
        "SELECT u.id AS user_id,
                COALESCE(NULLIF(u.name, ''), u.email) AS display_name,
                u.email,
                COUNT(d.id) AS file_count,
                MAX(d.created_at) AS last_upload
         FROM hr_documents d JOIN hr_users u ON u.id = d.user_id
         GROUP BY u.id, u.name, u.email
         ORDER BY last_upload DESC NULLS LAST",
    )
    .fetch_all(pool)
    .await
}

/// Fills the `(user_id, doc_type)` slot, replacing whatever was there.
///
/// The previous row is locked before the upsert, and the unique index on the slot
/// serializes concurrent first uploads, so a slot never holds two rows.
pub async fn upsert_slot(
    pool: &PgPool,
    user_id: i64,
    doc_type: DocType,
    filename: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<SlotUpload> {
    let mut tx = pool.begin().await?;

    let previous_filename: Option<String> = sqlx::query_scalar(
        "SELECT filename FROM hr_documents WHERE user_id = $1 AND doc_type = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(doc_type.key())
    .fetch_optional(&mut *tx)
    .await?;

    let fresh = ReviewState::fresh_upload();
    let document_id: i64 = sqlx::query_scalar(
        "INSERT INTO hr_documents (user_id, doc_type, filename, status, created_at, reviewed_at, reason)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (user_id, doc_type) DO UPDATE
         SET filename = EXCLUDED.filename,
             status = EXCLUDED.status,
             created_at = EXCLUDED.created_at,
             reviewed_at = EXCLUDED.reviewed_at,
             reason = EXCLUDED.reason
         RETURNING id",
    )
    .bind(user_id)
    .bind(doc_type.key())
    .bind(filename)
    .bind(fresh.status.as_str())
    .bind(now)
    .bind(fresh.reviewed_at)
    .bind(fresh.reason)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(SlotUpload {
        document_id,
        previous_filename,
    })
}

/// Swaps the file behind an existing document and restarts its review.
///
/// Returns the displaced filename, or `None` when the document no longer exists.
pub async fn replace_document_file(
    pool: &PgPool,
    document_id: i64,
    filename: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<String>> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM hr_documents d WHERE d.id = $1 FOR UPDATE"
    ))
    .bind(document_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(current) = current else {
        return Ok(None);
    };

    let next = review_state_of(&current).apply(ReviewAction::Reupload, now);
    sqlx::query(
        "UPDATE hr_documents
         SET filename = $2, status = $3, reviewed_at = $4, reason = $5, created_at = $6
         WHERE id = $1",
    )
    .bind(document_id)
    .bind(filename)
    .bind(next.status.as_str())
    .bind(next.reviewed_at)
    .bind(next.reason)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(current.filename))
}

/// Applies a reviewer action to a document, returning the new review state.
pub async fn apply_review(
    pool: &PgPool,
    document_id: i64,
    action: ReviewAction,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<ReviewState>> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, DocumentRow>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM hr_documents d WHERE d.id = $1 FOR UPDATE"
    ))
    .bind(document_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(current) = current else {
        return Ok(None);
    };

    let next = review_state_of(&current).apply(action, now);
    sqlx::query("UPDATE hr_documents SET status = $2, reviewed_at = $3, reason = $4 WHERE id = $1")
        .bind(document_id)
        .bind(next.status.as_str())
        .bind(next.reviewed_at)
        .bind(next.reason.as_deref())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(next))
}

fn review_state_of(row: &DocumentRow) -> ReviewState {
    ReviewState {
        status: row.status(),
        reviewed_at: row.reviewed_at,
        reason: row.reason.clone(),
    }
}
