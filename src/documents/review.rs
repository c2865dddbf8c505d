use chrono::{DateTime, Utc};

use super::DocumentStatus;

/// Review-related columns of a document slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewState {
    pub status: DocumentStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl ReviewState {
    /// State of a slot that was just filled or refilled by its owner.
    pub fn fresh_upload() -> Self {
        Self {
            status: DocumentStatus::Pending,
            reviewed_at: None,
            reason: None,
        }
    }

    pub fn apply(&self, action: ReviewAction, now: DateTime<Utc>) -> ReviewState {
        match action {
            ReviewAction::SetStatus(status) => {
                let reviewed_at = match status {
                    DocumentStatus::Approved | DocumentStatus::Rejected => Some(now),
                    DocumentStatus::Pending => None,
                };
                let reason = match status {
                    DocumentStatus::Approved | DocumentStatus::Pending => None,
                    DocumentStatus::Rejected => self.reason.clone(),
                };
                ReviewState {
                    status,
                    reviewed_at,
                    reason,
                }
            }
            ReviewAction::Reject { reason } => {
                let reason = reason.trim();
                ReviewState {
                    status: DocumentStatus::Rejected,
                    reviewed_at: Some(now),
                    reason: (!reason.is_empty()).then(|| reason.to_string()),
                }
            }
            ReviewAction::Reupload => ReviewState::fresh_upload(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    /// Reviewer moves the document to an explicit status.
    SetStatus(DocumentStatus),
    /// Reviewer rejects with a free-text reason; blank means no reason.
    Reject { reason: String },
    /// Owner replaces the file, restarting the review cycle.
    Reupload,
}
