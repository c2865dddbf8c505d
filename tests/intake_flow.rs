mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::Utc;
use common::{TestApp, body_text, location};
use doc_intake::documents::{DocumentStatus, ReviewAction, store};

#[tokio::test]
async fn repeated_uploads_keep_one_row_per_slot() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let client = app.insert_user("client").await?;
    let cookie = app.session_cookie(client).await?;

    let response = app
        .upload("/client", &[("doc_type", "passport")], "passport.pdf", b"%PDF-1", &cookie)
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/client?status=uploaded");

    let first = app.documents_of(client).await?;
    assert_eq!(first.len(), 1);
    let first_name = first[0].filename.clone();
    assert!(app.upload_path(&first_name).exists());

    let response = app
        .upload("/client", &[("doc_type", "passport")], "passport-v2.pdf", b"%PDF-2", &cookie)
        .await?;
    assert_eq!(location(&response), "/client?status=replaced");

    let second = app.documents_of(client).await?;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_ne!(second[0].filename, first_name);
    assert_eq!(second[0].status(), DocumentStatus::Pending);
    assert!(!app.upload_path(&first_name).exists());
    assert!(app.upload_path(&second[0].filename).exists());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unknown_doc_type_stores_nothing() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let client = app.insert_user("client").await?;
    let cookie = app.session_cookie(client).await?;

    let response = app
        .upload("/client", &[("doc_type", "visa")], "visa.pdf", b"%PDF", &cookie)
        .await?;
    assert_eq!(location(&response), "/client?error=invalid_doc_type");

    assert!(app.documents_of(client).await?.is_empty());
    let leftovers = std::fs::read_dir(app.upload_path(""))?.count();
    assert_eq!(leftovers, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn clients_only_reach_their_own_files() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.insert_user("client").await?;
    let other = app.insert_user("client").await?;
    let supervisor = app.insert_user("supervisor").await?;
    let owner_cookie = app.session_cookie(owner).await?;
    let other_cookie = app.session_cookie(other).await?;
    let supervisor_cookie = app.session_cookie(supervisor).await?;

    app.upload(
        "/client",
        &[("doc_type", "bank_statement")],
        "scan..final.pdf",
        b"%PDF-statement",
        &owner_cookie,
    )
    .await?;
    let documents = app.documents_of(owner).await?;
    assert_eq!(documents.len(), 1);
    let name = &documents[0].filename;
    assert!(name.ends_with("scan..final.pdf"));

    let response = app.get(&format!("/files/{name}"), Some(&owner_cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await?, "%PDF-statement");

    let response = app.get(&format!("/preview/{name}"), Some(&owner_cookie)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/files/{name}"), Some(&other_cookie)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get(&format!("/files/{name}"), Some(&supervisor_cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/files/nobody_owns_this.pdf", Some(&owner_cookie)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn reviews_move_documents_between_states() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let client = app.insert_user("client").await?;
    let supervisor = app.insert_user("supervisor").await?;
    let client_cookie = app.session_cookie(client).await?;
    let supervisor_cookie = app.session_cookie(supervisor).await?;

    app.upload("/client", &[("doc_type", "photo")], "me.png", b"png", &client_cookie)
        .await?;
    let id = app.documents_of(client).await?[0].id;

    let response = app
        .get(&format!("/review/{id}/approved?next=/supervisor"), Some(&supervisor_cookie))
        .await?;
    assert_eq!(location(&response), "/supervisor?status=reviewed");
    let doc = &app.documents_of(client).await?[0];
    assert_eq!(doc.status(), DocumentStatus::Approved);
    assert!(doc.reviewed_at.is_some());

    let response = app
        .post_form(
            &format!("/review/{id}/reject"),
            "reason=too+blurry&next=/supervisor",
            Some(&supervisor_cookie),
        )
        .await?;
    assert_eq!(location(&response), "/supervisor?status=reviewed");
    let doc = &app.documents_of(client).await?[0];
    assert_eq!(doc.status(), DocumentStatus::Rejected);
    assert_eq!(doc.reason.as_deref(), Some("too blurry"));

    let response = app
        .get(&format!("/review/{id}/archived"), Some(&supervisor_cookie))
        .await?;
    assert_eq!(location(&response), "/supervisor?error=invalid_status");
    assert_eq!(app.documents_of(client).await?[0].status(), DocumentStatus::Rejected);

    let response = app
        .get(&format!("/review/{id}/approved"), Some(&client_cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .upload(
            &format!("/client/docs/{id}/replace"),
            &[],
            "me-again.png",
            b"png2",
            &client_cookie,
        )
        .await?;
    assert_eq!(location(&response), "/client?status=reuploaded");
    let doc = &app.documents_of(client).await?[0];
    assert_eq!(doc.status(), DocumentStatus::Pending);
    assert_eq!(doc.reason, None);
    assert_eq!(doc.reviewed_at, None);

    let missing = store::apply_review(
        app.state.pool_ref(),
        i64::MAX,
        ReviewAction::SetStatus(DocumentStatus::Approved),
        Utc::now(),
    )
    .await?;
    assert!(missing.is_none());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn replacing_another_clients_document_is_forbidden() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let owner = app.insert_user("client").await?;
    let intruder = app.insert_user("client").await?;
    let owner_cookie = app.session_cookie(owner).await?;
    let intruder_cookie = app.session_cookie(intruder).await?;

    app.upload("/client", &[("doc_type", "form")], "form.pdf", b"%PDF", &owner_cookie)
        .await?;
    let original = app.documents_of(owner).await?.remove(0);

    let response = app
        .upload(
            &format!("/client/docs/{}/replace", original.id),
            &[],
            "evil.pdf",
            b"%PDF-evil",
            &intruder_cookie,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.documents_of(owner).await?[0].filename, original.filename);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deleting_a_client_removes_rows_sessions_and_files() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let admin = app.insert_user("admin").await?;
    let other_admin = app.insert_user("admin").await?;
    let client = app.insert_user("client").await?;
    let admin_cookie = app.session_cookie(admin).await?;
    let client_cookie = app.session_cookie(client).await?;

    for (doc_type, file) in [("passport", "passport.pdf"), ("id_card", "id.jpg")] {
        app.upload("/client", &[("doc_type", doc_type)], file, b"data", &client_cookie)
            .await?;
    }
    let stored: Vec<String> = app
        .documents_of(client)
        .await?
        .into_iter()
        .map(|doc| doc.filename)
        .collect();
    assert_eq!(stored.len(), 2);

    let response = app
        .post_form(
            &format!("/admin/users/{client}/delete"),
            "next=/admin/manage",
            Some(&admin_cookie),
        )
        .await?;
    assert_eq!(location(&response), "/admin/manage?status=user_deleted");

    let pool = app.state.pool_ref();
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hr_users WHERE id = $1")
        .bind(client)
        .fetch_one(pool)
        .await?;
    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
        .bind(client)
        .fetch_one(pool)
        .await?;
    assert_eq!(users, 0);
    assert_eq!(sessions, 0);
    assert!(app.documents_of(client).await?.is_empty());
    for name in &stored {
        assert!(!app.upload_path(name).exists(), "{name} left on disk");
    }

    let response = app.get("/client", Some(&client_cookie)).await?;
    assert_eq!(location(&response), "/");

    let response = app
        .post_form(
            &format!("/admin/users/{other_admin}/delete"),
            "next=/admin/manage",
            Some(&admin_cookie),
        )
        .await?;
    assert_eq!(location(&response), "/admin/manage?error=cannot_delete_admin");

    let response = app
        .post_form(
            &format!("/admin/users/{admin}/delete"),
            "next=/admin/manage",
            Some(&admin_cookie),
        )
        .await?;
    assert_eq!(location(&response), "/admin/manage?error=cannot_delete_self");

    let response = app
        .post_form(&format!("/admin/users/{client}/delete"), "", Some(&admin_cookie))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
