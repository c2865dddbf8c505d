use std::borrow::Cow;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sqlx::PgPool;

use crate::{
    config::AppConfig,
    documents::{ClientActivityRow, DocumentRow, DocumentStatus, OwnedDocumentRow, store},
    web::{
        auth::AuthUser,
        client::file_links,
        escape_html,
        templates::{NavLink, PageLayout, format_local, render_page, status_tag},
    },
};

const LATEST_UPLOADS: i64 = 10;

/// Everything the admin and supervisor dashboards show.
pub struct ReviewBoard {
    pub clients: Vec<ClientActivityRow>,
    pub latest: Vec<OwnedDocumentRow>,
    pub documents: Vec<OwnedDocumentRow>,
}

impl ReviewBoard {
    pub async fn load(pool: &PgPool) -> sqlx::Result<Self> {
        Ok(Self {
            clients: store::fetch_client_activity(pool).await?,
            latest: store::fetch_latest_documents(pool, LATEST_UPLOADS).await?,
            documents: store::fetch_documents_with_owner(pool).await?,
        })
    }
}

pub struct BoardPage<'a> {
    pub title: &'a str,
    /// Page the review actions return to.
    pub home: &'a str,
    pub nav_links: Vec<NavLink<'a>>,
    /// Rendered above the document tables.
    pub lead_html: String,
}

pub fn render_review_board(
    user: &AuthUser,
    board: &ReviewBoard,
    page: BoardPage<'_>,
    flash_html: &str,
    config: &AppConfig,
) -> String {
    let offset = config.time_offset_hours;

    let client_rows = if board.clients.is_empty() {
        "<tr><td colspan=\"4\">No client has uploaded anything yet.</td></tr>".to_string()
    } else {
        board
            .clients
            .iter()
            .map(|client| {
                format!(
                    r#"<tr><td><a href="/clients/{id}">{name}</a></td><td>{email}</td><td>{count}</td><td>{last}</td></tr>"#,
                    id = client.user_id,
                    name = escape_html(&client.display_name),
                    email = escape_html(&client.email),
                    count = client.file_count,
                    last = format_local(client.last_upload, offset),
                )
            })
            .collect()
    };

    let latest_rows = if board.latest.is_empty() {
        "<tr><td colspan=\"4\">No uploads yet.</td></tr>".to_string()
    } else {
        board
            .latest
            .iter()
            .map(|row| {
                format!(
                    "<tr><td>{owner}</td><td>{doc_type}</td><td>{status}</td><td>{uploaded}</td></tr>",
                    owner = escape_html(&row.owner_name),
                    doc_type = escape_html(row.document.doc_type_label()),
                    status = status_tag(row.document.status()),
                    uploaded = format_local(Some(row.document.created_at), offset),
                )
            })
            .collect()
    };

    let document_rows = if board.documents.is_empty() {
        "<tr><td colspan=\"6\">No documents.</td></tr>".to_string()
    } else {
        board
            .documents
            .iter()
            .map(|row| {
                format!(
                    "<tr><td>{owner}</td>{cells}</tr>",
                    owner = escape_html(&row.owner_name),
                    cells = document_cells(&row.document, page.home, offset),
                )
            })
            .collect()
    };

    let body_html = format!(
        r#"{lead}
<section class="panel">
    <h2>Clients with uploads</h2>
    <table>
        <thead><tr><th>Client</th><th>Email</th><th>Files</th><th>Last upload</th></tr></thead>
        <tbody>{client_rows}</tbody>
    </table>
</section>
<section class="panel">
    <h2>Latest uploads</h2>
    <table>
        <thead><tr><th>Client</th><th>Document</th><th>Status</th><th>Uploaded</th></tr></thead>
        <tbody>{latest_rows}</tbody>
    </table>
</section>
<section class="panel">
    <h2>All documents</h2>
    <table>
        <thead><tr><th>Client</th><th>Document</th><th>Status</th><th>Uploaded</th><th>Reviewed</th><th>Actions</th></tr></thead>
        <tbody>{document_rows}</tbody>
    </table>
</section>"#,
        lead = page.lead_html,
    );

    let note_html = format!(
        "Signed in as <strong>{}</strong> ({}).",
        escape_html(user.display_name()),
        user.role.label()
    );

    render_page(PageLayout {
        meta_title: page.title,
        page_heading: page.title,
        note_html: Cow::Owned(note_html),
        flash_html: Cow::Borrowed(flash_html),
        nav_links: page.nav_links,
        body_html: Cow::Owned(body_html),
    })
}

/// Type, status, dates and review actions of one document as table cells.
pub fn document_cells(document: &DocumentRow, return_to: &str, offset_hours: i32) -> String {
    let mut status_html = status_tag(document.status());
    if let Some(reason) = document.reason.as_deref() {
        status_html.push_str(&format!(
            r#"<div class="reason">Reason: {}</div>"#,
            escape_html(reason)
        ));
    }

    format!(
        r#"<td>{doc_type}</td><td>{status_html}</td><td>{uploaded}</td><td>{reviewed}</td><td class="actions">{files}{actions}</td>"#,
        doc_type = escape_html(document.doc_type_label()),
        uploaded = format_local(Some(document.created_at), offset_hours),
        reviewed = format_local(document.reviewed_at, offset_hours),
        files = file_links(&document.filename),
        actions = review_actions(document.id, return_to),
    )
}

/// Approve / back-to-pending links plus the reject-with-reason form.
pub fn review_actions(document_id: i64, return_to: &str) -> String {
    let next = utf8_percent_encode(return_to, NON_ALPHANUMERIC).to_string();
    let approve = DocumentStatus::Approved.as_str();
    let pending = DocumentStatus::Pending.as_str();

    format!(
        r#"<a href="/review/{document_id}/{approve}?next={next}">Approve</a><a href="/review/{document_id}/{pending}?next={next}">Mark pending</a>
<form class="inline-form" method="post" action="/review/{document_id}/reject">
    <input type="hidden" name="next" value="{return_to}">
    <input type="text" name="reason" placeholder="Rejection reason">
    <button type="submit" class="danger">Reject</button>
</form>"#,
        return_to = escape_html(return_to),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::web::auth::Role;

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/intake".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn document(id: i64, status: &str) -> DocumentRow {
        DocumentRow {
            id,
            user_id: 9,
            doc_type: "id_card".to_string(),
            filename: format!("{id}_card.png"),
            status: status.to_string(),
            created_at: Utc::now(),
            reviewed_at: None,
            reason: None,
        }
    }

    #[test]
    fn review_actions_carry_return_path() {
        let html = review_actions(7, "/clients/3");
        assert!(html.contains("/review/7/approved?next=%2Fclients%2F3"));
        assert!(html.contains("/review/7/pending?next=%2Fclients%2F3"));
        assert!(html.contains(r#"action="/review/7/reject""#));
        assert!(html.contains(r#"name="next" value="/clients/3""#));
    }

    #[test]
    fn board_lists_clients_and_documents() {
        let user = AuthUser {
            id: 1,
            email: "sup@example.com".to_string(),
            name: None,
            role: Role::Supervisor,
        };
        let board = ReviewBoard {
            clients: vec![ClientActivityRow {
                user_id: 9,
                display_name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
                file_count: 2,
                last_upload: Some(Utc::now()),
            }],
            latest: vec![OwnedDocumentRow {
                document: document(4, "approved"),
                owner_name: "Dana".to_string(),
            }],
            documents: vec![
                OwnedDocumentRow {
                    document: document(4, "approved"),
                    owner_name: "Dana".to_string(),
                },
                OwnedDocumentRow {
                    document: document(5, "pending"),
                    owner_name: "Dana".to_string(),
                },
            ],
        };

        let html = render_review_board(
            &user,
            &board,
            BoardPage {
                title: "Supervisor dashboard",
                home: "/supervisor",
                nav_links: Vec::new(),
                lead_html: String::new(),
            },
            "",
            &config(),
        );

        assert!(html.contains(r#"<a href="/clients/9">Dana</a>"#));
        assert!(html.contains("/review/5/approved?next=%2Fsupervisor"));
        assert!(html.contains("sup@example.com"));
    }

    #[test]
    fn empty_board_renders_placeholders() {
        let user = AuthUser {
            id: 1,
            email: "admin@example.com".to_string(),
            name: Some("Admin".to_string()),
            role: Role::Admin,
        };
        let board = ReviewBoard {
            clients: Vec::new(),
            latest: Vec::new(),
            documents: Vec::new(),
        };
        let html = render_review_board(
            &user,
            &board,
            BoardPage {
                title: "Admin dashboard",
                home: "/admin",
                nav_links: Vec::new(),
                lead_html: String::new(),
            },
            "",
            &config(),
        );
        assert!(html.contains("No client has uploaded anything yet."));
        assert!(html.contains("No uploads yet."));
    }
}
