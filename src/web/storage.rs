use std::path::{Component, Path, PathBuf};

use axum::{
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{error, warn};

use crate::web::responses;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// Resolves a stored filename inside the upload directory, refusing anything path-like.
///
/// Only a single normal path component passes; dots inside a name such as
/// `scan..final.pdf` are fine.
pub fn resolve_stored_path(upload_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.contains(['/', '\\']) {
        return None;
    }
    let mut components = Path::new(name).components();
    let is_plain =
        matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    is_plain.then(|| upload_dir.join(name))
}

/// Deletes a file, logging instead of failing. Missing files are not an error.
pub async fn remove_file_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(?err, file = %path.display(), "failed to remove stored file"),
    }
}

/// Deletes a previously stored upload by name.
pub async fn remove_stored_file(upload_dir: &Path, name: &str) {
    match resolve_stored_path(upload_dir, name) {
        Some(path) => remove_file_best_effort(&path).await,
        None => warn!(%name, "refusing to remove file with a path-like name"),
    }
}

/// MIME type guessed from the filename, falling back to `application/octet-stream`.
pub fn guess_mime(name: &str) -> mime::Mime {
    mime_guess::from_path(name).first_or_octet_stream()
}

/// Whether browsers can render the type themselves.
pub fn is_inline_previewable(mime: &mime::Mime) -> bool {
    mime.type_() == mime::IMAGE
        || mime.type_() == mime::TEXT
        || (mime.type_() == mime::APPLICATION && mime.subtype() == mime::PDF)
}

fn content_disposition(disposition: Disposition, filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();

    let encoded = utf8_percent_encode(&sanitized, NON_ALPHANUMERIC);
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition.as_str(),
        sanitized.replace(|c: char| !c.is_ascii(), "_"),
        encoded
    )
}

/// Serve a stored file with the given disposition.
pub async fn stream_file(path: &Path, filename: &str, disposition: Disposition) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return responses::not_found();
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read stored file");
            return responses::server_error();
        }
    };

    let mime = guess_mime(filename);
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(mime.as_ref()) {
        Ok(value) => {
            headers.insert(header::CONTENT_TYPE, value);
        }
        Err(_) => {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
        }
    }

    match HeaderValue::from_str(&content_disposition(disposition, filename)) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(err) => {
            error!(?err, %filename, "invalid content disposition header");
            return responses::server_error();
        }
    }
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    (headers, bytes).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn refuses_path_like_names() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_stored_path(root, "abc_passport.pdf"),
            Some(PathBuf::from("/srv/uploads/abc_passport.pdf"))
        );
        assert_eq!(resolve_stored_path(root, "../secret"), None);
        assert_eq!(resolve_stored_path(root, "a/b.pdf"), None);
        assert_eq!(resolve_stored_path(root, "a\\b.pdf"), None);
        assert_eq!(resolve_stored_path(root, ".."), None);
        assert_eq!(resolve_stored_path(root, "."), None);
        assert_eq!(resolve_stored_path(root, ""), None);
    }

    #[test]
    fn dots_inside_a_name_are_allowed() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_stored_path(root, "abc_scan..final.pdf"),
            Some(PathBuf::from("/srv/uploads/abc_scan..final.pdf"))
        );
        assert_eq!(
            resolve_stored_path(root, "abc_..pdf"),
            Some(PathBuf::from("/srv/uploads/abc_..pdf"))
        );
    }

    #[test]
    fn previews_images_text_and_pdf_only() {
        assert!(is_inline_previewable(&guess_mime("scan.PNG")));
        assert!(is_inline_previewable(&guess_mime("photo.jpeg")));
        assert!(is_inline_previewable(&guess_mime("notes.txt")));
        assert!(is_inline_previewable(&guess_mime("passport.pdf")));
        assert!(!is_inline_previewable(&guess_mime("form.docx")));
        assert!(!is_inline_previewable(&guess_mime("blob")));
    }

    #[test]
    fn disposition_is_quoted_safely() {
        let header = content_disposition(Disposition::Attachment, "my \"file\".pdf");
        assert!(header.starts_with("attachment; filename=\"my _file_.pdf\""));
        assert!(header.contains("filename*=UTF-8''"));

        let inline = content_disposition(Disposition::Inline, "صورة.png");
        assert!(inline.starts_with("inline; filename=\"____.png\""));
    }

    #[tokio::test]
    async fn serves_existing_file_with_headers() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("note.txt");
        tokio::fs::write(&path, b"hello").await.expect("write");

        let response = stream_file(&path, "note.txt", Disposition::Inline).await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert!(
            headers[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .starts_with("inline;")
        );
    }

    #[tokio::test]
    async fn removes_stored_files_quietly() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("abc_id.png");
        tokio::fs::write(&path, b"png").await.expect("write");

        remove_stored_file(dir.path(), "abc_id.png").await;
        assert!(!path.exists());

        remove_stored_file(dir.path(), "abc_id.png").await;
        remove_stored_file(dir.path(), "../abc_id.png").await;
    }

    #[tokio::test]
    async fn removes_files_with_repeated_dots() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("abc_scan..final.pdf");
        tokio::fs::write(&path, b"%PDF").await.expect("write");

        remove_stored_file(dir.path(), "abc_scan..final.pdf").await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let response =
            stream_file(&dir.path().join("gone.pdf"), "gone.pdf", Disposition::Attachment).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
