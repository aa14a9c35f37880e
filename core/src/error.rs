use crate::types::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Identifier '{public_id}' already exists")]
    DuplicateIdentifier { public_id: String },

    #[error("Profile '{profile_id}' not found")]
    ProfileNotFound { profile_id: String },

    #[error("Profile '{profile_id}' is a {actual}, expected {expected}")]
    RoleMismatch {
        profile_id: String,
        expected: &'static str,
        actual: Role,
    },

    #[error("Referral cycle detected at profile '{profile_id}'")]
    ReferralCycle { profile_id: String },

    #[error("Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Errors caused by bad rows rather than by the database itself.
    /// Maintenance tasks report these per record and keep going.
    pub fn is_data_defect(&self) -> bool {
        matches!(
            self,
            Self::ProfileNotFound { .. } | Self::RoleMismatch { .. } | Self::ReferralCycle { .. }
        )
    }
}
