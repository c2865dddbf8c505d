use std::borrow::Cow;

use chrono::{DateTime, Datelike, FixedOffset, Utc};

use crate::documents::DocumentStatus;

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 2rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .nav-link { display: inline-flex; align-items: center; gap: 0.4rem; color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.5rem 0.95rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        .nav-link:hover { background: #bfdbfe; border-color: #93c5fd; }
        .logout-link { display: inline-flex; align-items: center; color: #0f172a; background: #fee2e2; border: 1px solid #fecaca; padding: 0.45rem 0.9rem; border-radius: 999px; text-decoration: none; font-weight: 600; }
        main { padding: 2rem 1.5rem; max-width: 1100px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2.5rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.5rem; font-weight: 600; color: #0f172a; }
        input, select { padding: 0.6rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; }
        button { padding: 0.6rem 1rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        button.danger { background: #dc2626; }
        button.danger:hover { background: #b91c1c; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; border: 1px solid #e2e8f0; }
        th, td { padding: 0.65rem 0.85rem; border-bottom: 1px solid #e2e8f0; text-align: left; vertical-align: top; font-size: 0.92rem; }
        th { background: #f1f5f9; font-weight: 600; }
        .inline-form { display: inline-flex; gap: 0.4rem; align-items: center; flex-wrap: wrap; margin: 0.15rem 0; }
        .actions a { margin-right: 0.6rem; color: #2563eb; text-decoration: none; font-weight: 600; }
        .actions a:hover { text-decoration: underline; }
        .flash { margin-bottom: 1.5rem; padding: 0.9rem 1.1rem; border-radius: 10px; font-weight: 600; }
        .flash.success { background: #dcfce7; color: #166534; }
        .flash.error { background: #fee2e2; color: #b91c1c; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .status-tag { display: inline-flex; padding: 0.2rem 0.7rem; border-radius: 999px; font-size: 0.85rem; font-weight: 600; }
        .status-tag.pending { background: #fef3c7; color: #92400e; }
        .status-tag.approved { background: #dcfce7; color: #166534; }
        .status-tag.rejected { background: #fee2e2; color: #b91c1c; }
        .status-tag.missing { background: #e2e8f0; color: #475569; }
        .reason { color: #b91c1c; font-size: 0.88rem; margin-top: 0.3rem; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            header { padding: 1.5rem 1rem; }
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            th, td { padding: 0.5rem; }
        }
"#;

pub struct NavLink<'a> {
    pub href: &'a str,
    pub label: &'a str,
}

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub page_heading: &'a str,
    pub note_html: Cow<'a, str>,
    pub flash_html: Cow<'a, str>,
    pub nav_links: Vec<NavLink<'a>>,
    pub body_html: Cow<'a, str>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        page_heading,
        note_html,
        flash_html,
        nav_links,
        body_html,
    } = layout;

    let nav_html = nav_links
        .iter()
        .map(|link| {
            format!(
                r#"<a class="nav-link" href="{href}">{label}</a>"#,
                href = link.href,
                label = link.label,
            )
        })
        .collect::<Vec<_>>()
        .join("\n                ");
    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{page_heading}</h1>
            <div style="display:flex; gap:0.75rem; align-items:center; flex-wrap:wrap;">
                {nav_html}
                <a class="logout-link" href="/logout">Log out</a>
            </div>
        </div>
        <p class="note">{note_html}</p>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        styles = PAGE_BASE_STYLES,
    )
}

pub fn render_login_page(flash_html: &str) -> String {
    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Document intake</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
        :root {{ color-scheme: light; }}
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; gap: 1.5rem; }}
        main {{ width: 100%; max-width: 480px; display: flex; flex-direction: column; align-items: center; gap: 1.5rem; }}
        .panel {{ background: #ffffff; padding: 2.5rem 2.25rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); width: 100%; border: 1px solid #e2e8f0; box-sizing: border-box; }}
        h1 {{ margin: 0 0 1rem; font-size: 1.8rem; text-align: center; }}
        p.description {{ margin: 0 0 1.75rem; color: #475569; text-align: center; font-size: 0.95rem; }}
        label {{ display: block; margin-top: 1.2rem; font-weight: 600; color: #0f172a; }}
        input {{ width: 100%; padding: 0.85rem; margin-top: 0.65rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; font-size: 1rem; box-sizing: border-box; }}
        input[type="checkbox"] {{ width: auto; margin: 0 0.5rem 0 0; }}
        label.remember {{ display: flex; align-items: center; font-weight: 500; }}
        button {{ margin-top: 2rem; width: 100%; padding: 0.95rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; }}
        button:hover {{ background: #1d4ed8; }}
        .flash {{ width: 100%; box-sizing: border-box; padding: 0.9rem 1.1rem; border-radius: 10px; font-weight: 600; }}
        .flash.success {{ background: #dcfce7; color: #166534; }}
        .flash.error {{ background: #fee2e2; color: #b91c1c; }}
        .app-footer {{ margin-top: 2.5rem; text-align: center; font-size: 0.85rem; color: #64748b; }}
    </style>
</head>
<body>
    <main>
        {flash_html}
        <section class="panel">
            <h1>Document intake</h1>
            <p class="description">Sign in with the account your administrator created for you.</p>
            <form method="post" action="/">
                <label for="email">Email</label>
                <input id="email" type="email" name="email" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <label class="remember"><input type="checkbox" name="remember" value="on"> Remember me</label>
                <button type="submit">Sign in</button>
            </form>
        </section>
        {footer}
    </main>
</body>
</html>"#,
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} Document intake. Internal use only.</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Renders a UTC timestamp in the configured display offset.
pub fn format_local(value: Option<DateTime<Utc>>, offset_hours: i32) -> String {
    let Some(value) = value else {
        return "—".to_string();
    };

    match FixedOffset::east_opt(offset_hours * 3600) {
        Some(offset) => value
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => value.format("%Y-%m-%d %H:%M").to_string(),
    }
}

pub fn status_tag(status: DocumentStatus) -> String {
    format!(
        r#"<span class="status-tag {class}">{label}</span>"#,
        class = status.as_str(),
        label = status.label(),
    )
}
