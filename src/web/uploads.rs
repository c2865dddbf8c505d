use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use axum::{extract::Multipart, http::StatusCode};
use tokio::{fs::File, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    web::{flash::Flash, storage::remove_file_best_effort},
};

/// Longest sanitized original name kept in a stored filename.
const MAX_ORIGINAL_NAME_CHARS: usize = 150;

/// Result type used by the upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting an uploaded file.
#[derive(Debug)]
pub enum UploadError {
    MissingFile,
    DisallowedExtension(String),
    TooLarge,
    Malformed(String),
    Io(std::io::Error),
}

impl UploadError {
    pub fn flash(&self) -> Flash {
        match self {
            UploadError::MissingFile => Flash::Error("missing_file"),
            UploadError::DisallowedExtension(_) => Flash::Error("disallowed_extension"),
            UploadError::TooLarge => Flash::Error("file_too_large"),
            UploadError::Malformed(_) => Flash::Error("upload_failed"),
            UploadError::Io(_) => Flash::Error("unknown"),
        }
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::MissingFile => write!(f, "no file was submitted"),
            UploadError::DisallowedExtension(ext) => {
                write!(f, "file extension `{ext}` is not allowed")
            }
            UploadError::TooLarge => write!(f, "upload exceeds the configured size limit"),
            UploadError::Malformed(message) => write!(f, "malformed upload form: {message}"),
            UploadError::Io(err) => write!(f, "failed to store upload: {err}"),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(value: std::io::Error) -> Self {
        UploadError::Io(value)
    }
}

/// What a single-file upload form must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a BTreeSet<String>,
    pub max_bytes: usize,
}

impl<'a> UploadPolicy<'a> {
    pub fn for_config(config: &'a AppConfig, field_name: &'a str) -> Self {
        Self {
            field_name,
            allowed_extensions: &config.allowed_extensions,
            max_bytes: config.max_content_length,
        }
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Parsed upload form: the text fields plus the stored file, if one was sent.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub file: Option<SavedFile>,
    pub text_fields: HashMap<String, String>,
}

impl UploadOutcome {
    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.text_fields.get(field_name).map(|value| value.as_str())
    }

    /// Takes the stored file, or reports that none was submitted.
    pub fn require_file(&mut self) -> UploadResult<SavedFile> {
        self.file.take().ok_or(UploadError::MissingFile)
    }

    /// Removes the stored file again, for forms rejected after the file was written.
    pub async fn discard(self) {
        if let Some(file) = self.file {
            remove_file_best_effort(&file.stored_path).await;
        }
    }
}

/// Reads a multipart form, writing the single file field into `dest_dir`.
///
/// Text fields are collected as-is; a file part with an empty filename counts as "no file".
/// On error nothing is left behind on disk.
pub async fn receive_upload(
    mut multipart: Multipart,
    dest_dir: &Path,
    policy: UploadPolicy<'_>,
) -> UploadResult<UploadOutcome> {
    let mut outcome = UploadOutcome::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let error = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    UploadError::TooLarge
                } else {
                    UploadError::Malformed(err.body_text())
                };
                return Err(abandon(outcome, error).await);
            }
        };

        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            match field.text().await {
                Ok(value) => {
                    outcome.text_fields.insert(field_name, value);
                }
                Err(err) => {
                    let error = UploadError::Malformed(err.body_text());
                    return Err(abandon(outcome, error).await);
                }
            }
            continue;
        };

        if field_name != policy.field_name || file_name.trim().is_empty() {
            // Browsers send an empty part when no file was chosen.
            continue;
        }

        if outcome.file.is_some() {
            return Err(abandon(outcome, UploadError::Malformed("more than one file".into())).await);
        }

        let extension = extension_of(&file_name);
        if !policy.allowed_extensions.contains(&extension) {
            return Err(abandon(outcome, UploadError::DisallowedExtension(extension)).await);
        }

        if let Err(err) = tokio::fs::create_dir_all(dest_dir).await {
            return Err(abandon(outcome, err.into()).await);
        }

        let stored_name = stored_name_for(&file_name, &extension);
        let stored_path = dest_dir.join(&stored_name);
        match write_field(field, &stored_path, policy.max_bytes).await {
            Ok(file_size) => {
                outcome.file = Some(SavedFile {
                    original_name: file_name,
                    stored_name,
                    stored_path,
                    file_size,
                });
            }
            Err(err) => {
                remove_file_best_effort(&stored_path).await;
                return Err(abandon(outcome, err).await);
            }
        }
    }

    Ok(outcome)
}

async fn write_field(
    mut field: axum::extract::multipart::Field<'_>,
    path: &Path,
    max_bytes: usize,
) -> UploadResult<u64> {
    let mut file = File::create(path).await?;
    let mut total_bytes: u64 = 0;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(UploadError::TooLarge);
            }
            Err(err) => return Err(UploadError::Malformed(err.body_text())),
        };

        total_bytes += chunk.len() as u64;
        if total_bytes > max_bytes as u64 {
            return Err(UploadError::TooLarge);
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total_bytes)
}

async fn abandon(outcome: UploadOutcome, error: UploadError) -> UploadError {
    outcome.discard().await;
    error
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// `{token}_{sanitized original}`; the token keeps identical client filenames apart.
fn stored_name_for(file_name: &str, extension: &str) -> String {
    let mut sanitized = sanitize_filename::sanitize(file_name).replace(' ', "_");
    if sanitized.trim_matches(|c| c == '.' || c == '_').is_empty() {
        sanitized = if extension.is_empty() {
            "upload".to_string()
        } else {
            format!("upload.{extension}")
        };
    }

    format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        truncate_name(&sanitized, extension)
    )
}

fn truncate_name(name: &str, extension: &str) -> String {
    if name.chars().count() <= MAX_ORIGINAL_NAME_CHARS {
        return name.to_string();
    }

    let suffix = if extension.is_empty() {
        String::new()
    } else {
        format!(".{extension}")
    };
    let keep = MAX_ORIGINAL_NAME_CHARS.saturating_sub(suffix.chars().count());
    let stem: String = name.chars().take(keep).collect();
    format!("{stem}{suffix}")
}
