pub mod review;
pub mod store;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub use review::{ReviewAction, ReviewState};

/// The fixed set of document slots every client is asked to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocType {
    Passport,
    IdCard,
    Invitation,
    FamilyRecord,
    BankStatement,
    EmploymentProof,
    MilitaryCertificate,
    Form,
    Photo,
    WorkHistory,
}

impl DocType {
    pub const ALL: [DocType; 10] = [
        DocType::Passport,
        DocType::IdCard,
        DocType::Invitation,
        DocType::FamilyRecord,
        DocType::BankStatement,
        DocType::EmploymentProof,
        DocType::MilitaryCertificate,
        DocType::Form,
        DocType::Photo,
        DocType::WorkHistory,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DocType::Passport => "passport",
            DocType::IdCard => "id_card",
            DocType::Invitation => "invitation",
            DocType::FamilyRecord => "family_record",
            DocType::BankStatement => "bank_statement",
            DocType::EmploymentProof => "employment_proof",
            DocType::MilitaryCertificate => "military_certificate",
            DocType::Form => "form",
            DocType::Photo => "photo",
            DocType::WorkHistory => "work_history",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocType::Passport => "Passport",
            DocType::IdCard => "National ID card",
            DocType::Invitation => "Invitation letter",
            DocType::FamilyRecord => "Family / individual civil record",
            DocType::BankStatement => "Bank statement",
            DocType::EmploymentProof => "Proof of employment",
            DocType::MilitaryCertificate => "Military service certificate",
            DocType::Form => "Application form",
            DocType::Photo => "Personal photo",
            DocType::WorkHistory => "Work history (last 10 years)",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|doc_type| doc_type.key() == value)
    }

    /// Label for a raw key read back from storage, falling back to the key itself.
    pub fn label_for_key(value: &str) -> &str {
        match Self::from_key(value) {
            Some(doc_type) => doc_type.label(),
            None => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "Pending review",
            DocumentStatus::Approved => "Approved",
            DocumentStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DocumentStatus::Pending),
            "approved" => Some(DocumentStatus::Approved),
            "rejected" => Some(DocumentStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: i64,
    pub user_id: i64,
    pub doc_type: String,
    pub filename: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl DocumentRow {
    /// Unknown legacy values are shown as pending so they stay in the review queue.
    pub fn status(&self) -> DocumentStatus {
        DocumentStatus::parse(&self.status).unwrap_or(DocumentStatus::Pending)
    }

    pub fn doc_type_label(&self) -> &str {
        DocType::label_for_key(&self.doc_type)
    }
}

/// Document joined with its owner's display name, for reviewer dashboards.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedDocumentRow {
    #[sqlx(flatten)]
    pub document: DocumentRow,
    pub owner_name: String,
}

/// One line of the per-client upload activity summary.
#[derive(Debug, Clone, FromRow)]
pub struct ClientActivityRow {
    pub user_id: i64,
    pub display_name: String,
    pub email: String,
    pub file_count: i64,
    pub last_upload: Option<DateTime<Utc>>,
}
