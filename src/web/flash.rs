use serde::Deserialize;

use crate::{config::AppConfig, web::escape_html};

/// Outcome code carried across a redirect as `status=` or `error=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Status(&'static str),
    Error(&'static str),
}

impl Flash {
    /// Appends the code to `target`, replacing any flash already present there.
    pub fn attach_to(self, target: &str) -> String {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let mut pairs: Vec<String> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                key != "status" && key != "error"
            })
            .map(str::to_string)
            .collect();

        pairs.push(match self {
            Flash::Status(code) => format!("status={code}"),
            Flash::Error(code) => format!("error={code}"),
        });

        format!("{path}?{}", pairs.join("&"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(query: &FlashQuery, config: &AppConfig) -> String {
    if let Some(status) = query.status.as_deref() {
        let message = match status {
            "uploaded" => "File uploaded successfully.",
            "replaced" => "File replaced successfully.",
            "reuploaded" => "File re-uploaded.",
            "created" => "User created successfully.",
            "password_updated" => "Password changed.",
            "user_deleted" => "User and all of their files were deleted.",
            "reviewed" => "Review saved.",
            "logged_out" => "You have been logged out.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = query.error.as_deref() {
        let message = match error {
            "login_failed" => "Login failed.".to_string(),
            "invalid_doc_type" => "Please choose a valid document type.".to_string(),
            "missing_file" => "Please choose a file.".to_string(),
            "disallowed_extension" => {
                let allowed = config
                    .allowed_extensions
                    .iter()
                    .map(|ext| ext.to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Please upload a file in an allowed format: {allowed}.")
            }
            "file_too_large" => format!(
                "The file is larger than the allowed limit ({}).",
                config.max_content_length_label()
            ),
            "upload_failed" => "The upload could not be read. Please try again.".to_string(),
            "invalid_fields" => "Invalid data.".to_string(),
            "duplicate" => "A user with this email already exists.".to_string(),
            "user_missing" => "No such user.".to_string(),
            "not_authorized" => "Not allowed.".to_string(),
            "cannot_delete_self" => "You cannot delete yourself.".to_string(),
            "cannot_delete_admin" => "Administrators cannot be deleted.".to_string(),
            "invalid_status" => "Unknown review status.".to_string(),
            _ => "Something went wrong. Please check the logs.".to_string(),
        };

        return format!(
            r#"<div class="flash error">{}</div>"#,
            escape_html(&message)
        );
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/intake".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn attaches_to_bare_path() {
        assert_eq!(
            Flash::Status("uploaded").attach_to("/client"),
            "/client?status=uploaded"
        );
    }

    #[test]
    fn replaces_previous_flash_and_keeps_other_params() {
        assert_eq!(
            Flash::Error("missing_file").attach_to("/client?status=uploaded&tab=docs"),
            "/client?tab=docs&error=missing_file"
        );
    }

    #[test]
    fn renders_success_message() {
        let query = FlashQuery {
            status: Some("replaced".to_string()),
            error: None,
        };
        let html = compose_flash_message(&query, &config());
        assert!(html.contains("flash success"));
        assert!(html.contains("replaced"));
    }

    #[test]
    fn error_messages_reflect_configuration() {
        let query = FlashQuery {
            status: None,
            error: Some("file_too_large".to_string()),
        };
        assert!(compose_flash_message(&query, &config()).contains("20MB"));

        let query = FlashQuery {
            status: None,
            error: Some("disallowed_extension".to_string()),
        };
        let html = compose_flash_message(&query, &config());
        assert!(html.contains("PDF"));
        assert!(html.contains("JPEG"));
    }

    #[test]
    fn unknown_status_renders_nothing() {
        let query = FlashQuery {
            status: Some("<script>".to_string()),
            error: None,
        };
        assert_eq!(compose_flash_message(&query, &config()), "");
    }
}
