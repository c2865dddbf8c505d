use std::borrow::Cow;

use axum::{
    extract::{Query, State},
    response::{Html, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use crate::web::{
    AppState,
    auth::{self, AuthUser, Role, RoleGate},
    escape_html,
    flash::{FlashQuery, compose_flash_message},
    responses,
    templates::{NavLink, PageLayout, render_page},
};

use super::{
    ADMIN_HOME, MANAGE_PATH,
    users::{ManagedUserRow, fetch_managed_users},
};

/// `GET /admin/manage`: every account, newest first, with password and delete controls.
pub async fn manage_users(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Result<Html<String>, Response> {
    let admin = auth::require_role(&state, &jar, RoleGate::Admin).await?;

    let users = fetch_managed_users(state.pool_ref()).await.map_err(|err| {
        error!(?err, "failed to load users for management");
        responses::server_error()
    })?;

    let flash = compose_flash_message(&params, state.config());
    Ok(Html(render_manage_page(&admin, &users, &flash)))
}

fn render_manage_page(admin: &AuthUser, users: &[ManagedUserRow], flash_html: &str) -> String {
    let rows = if users.is_empty() {
        "<tr><td colspan=\"5\">No users yet.</td></tr>".to_string()
    } else {
        users
            .iter()
            .map(|user| user_row(admin, user))
            .collect::<String>()
    };

    let body_html = format!(
        r#"<section class="panel">
    <h2>Users</h2>
    <table>
        <thead><tr><th>Name</th><th>Email</th><th>Role</th><th>New password</th><th></th></tr></thead>
        <tbody>{rows}</tbody>
    </table>
</section>"#
    );

    render_page(PageLayout {
        meta_title: "Manage users",
        page_heading: "Manage users",
        note_html: Cow::Owned(format!(
            "Signed in as <strong>{}</strong>.",
            escape_html(admin.display_name())
        )),
        flash_html: Cow::Borrowed(flash_html),
        nav_links: vec![NavLink {
            href: ADMIN_HOME,
            label: "Dashboard",
        }],
        body_html: Cow::Owned(body_html),
    })
}

fn user_row(admin: &AuthUser, user: &ManagedUserRow) -> String {
    let role = Role::parse(&user.role);
    let role_label = role.map(Role::label).unwrap_or(user.role.as_str());
    let email = escape_html(&user.email);

    // Admin accounts and the current session's own account cannot be removed.
    let delete_html = match role {
        Some(Role::Admin) => String::new(),
        _ if user.id == admin.id => String::new(),
        _ => format!(
            r#"<form class="inline-form" method="post" action="/admin/users/{id}/delete" onsubmit="return confirm('Delete this user and all of their files?');">
    <input type="hidden" name="next" value="{MANAGE_PATH}">
    <button type="submit" class="danger">Delete</button>
</form>"#,
            id = user.id,
        ),
    };

    format!(
        r#"<tr>
    <td>{name}</td>
    <td>{email}</td>
    <td>{role_label}</td>
    <td>
        <form class="inline-form" method="post" action="/admin/password/change">
            <input type="hidden" name="email" value="{email}">
            <input type="hidden" name="next" value="{MANAGE_PATH}">
            <input type="password" name="new_password" placeholder="New password" required>
            <button type="submit">Change</button>
        </form>
    </td>
    <td>{delete_html}</td>
</tr>"#,
        name = escape_html(user.name.as_deref().unwrap_or("—")),
        role_label = escape_html(role_label),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthUser {
        AuthUser {
            id: 1,
            email: "admin@example.com".to_string(),
            name: Some("Admin".to_string()),
            role: Role::Admin,
        }
    }

    fn row(id: i64, role: &str) -> ManagedUserRow {
        ManagedUserRow {
            id,
            email: format!("user{id}@example.com"),
            name: None,
            role: role.to_string(),
        }
    }

    #[test]
    fn delete_is_offered_only_for_other_non_admins() {
        let admin = admin();
        assert!(user_row(&admin, &row(2, "client")).contains("/admin/users/2/delete"));
        assert!(user_row(&admin, &row(3, "supervisor")).contains("/admin/users/3/delete"));
        assert!(!user_row(&admin, &row(4, "admin")).contains("/delete"));
        assert!(!user_row(&admin, &row(1, "client")).contains("/delete"));
    }

    #[test]
    fn every_row_can_change_password() {
        let html = render_manage_page(&admin(), &[row(2, "client"), row(4, "admin")], "");
        assert_eq!(html.matches(r#"action="/admin/password/change""#).count(), 2);
        assert!(html.contains(r#"value="user2@example.com""#));
    }

    #[test]
    fn confirm_prompt_never_embeds_the_email() {
        let mut user = row(5, "client");
        user.email = "o'brien@example.com');alert(1);('".to_string();
        let html = user_row(&admin(), &user);
        let onsubmit = html
            .split("onsubmit=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        assert_eq!(onsubmit, "return confirm('Delete this user and all of their files?');");
    }
}
