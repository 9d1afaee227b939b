use serde::{Deserialize, Serialize};

use crate::cpf;

/// Status tracked for every enrollment. Only `Approved` and `Rejected` are
/// ever persisted by the finalization worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "PENDING",
            EnrollmentStatus::Approved => "APPROVED",
            EnrollmentStatus::Rejected => "REJECTED",
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = EnrollmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(EnrollmentError::UnknownStatus(value.to_string())),
        }
    }
}

/// Immutable enrollment value. Fields are only reachable through accessors so
/// the cpf layout and the approved-implies-enrolled invariant always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnrollmentFields")]
pub struct Enrollment {
    name: String,
    age: u32,
    cpf: String,
    status: EnrollmentStatus,
    requested_at: Option<i64>,
    enrolled_at: Option<i64>,
    age_group_name: Option<String>,
}

/// Unvalidated field set used to build an [`Enrollment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentFields {
    pub name: String,
    pub age: u32,
    pub cpf: String,
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub requested_at: Option<i64>,
    #[serde(default)]
    pub enrolled_at: Option<i64>,
    #[serde(default)]
    pub age_group_name: Option<String>,
}

impl TryFrom<EnrollmentFields> for Enrollment {
    type Error = EnrollmentError;

    fn try_from(fields: EnrollmentFields) -> Result<Self, Self::Error> {
        Enrollment::new(fields)
    }
}

impl Enrollment {
    pub fn new(fields: EnrollmentFields) -> Result<Self, EnrollmentError> {
        if !cpf::is_display_format(&fields.cpf) {
            return Err(EnrollmentError::InvalidCpfFormat(fields.cpf));
        }
        if fields.status == EnrollmentStatus::Approved && fields.enrolled_at.is_none() {
            return Err(EnrollmentError::MissingEnrollmentDate(fields.cpf));
        }

        Ok(Self {
            name: fields.name,
            age: fields.age,
            cpf: fields.cpf,
            status: fields.status,
            requested_at: fields.requested_at,
            enrolled_at: fields.enrolled_at,
            age_group_name: fields.age_group_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn age(&self) -> u32 {
        self.age
    }

    pub fn cpf(&self) -> &str {
        &self.cpf
    }

    pub const fn status(&self) -> EnrollmentStatus {
        self.status
    }

    pub const fn requested_at(&self) -> Option<i64> {
        self.requested_at
    }

    pub const fn enrolled_at(&self) -> Option<i64> {
        self.enrolled_at
    }

    pub fn age_group_name(&self) -> Option<&str> {
        self.age_group_name.as_deref()
    }

    pub const fn is_approved(&self) -> bool {
        matches!(self.status, EnrollmentStatus::Approved)
    }

    /// Build a candidate and decide it against the record stored for the same
    /// cpf.
    pub fn create_final(
        fields: EnrollmentFields,
        existing: Option<&Enrollment>,
    ) -> Result<MergeOutcome, EnrollmentError> {
        let candidate = Enrollment::new(fields)?;
        Ok(merge(existing, candidate))
    }
}

/// Result of applying a candidate to the stored record for its cpf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The candidate supersedes whatever was stored.
    Changed(Enrollment),
    /// The stored record is approved and stays as it is.
    Unchanged,
}

impl MergeOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, MergeOutcome::Unchanged)
    }
}

/// Last final write wins until an approval is stored; approval is absorbing.
pub fn merge(existing: Option<&Enrollment>, candidate: Enrollment) -> MergeOutcome {
    match existing {
        Some(stored) if stored.is_approved() => MergeOutcome::Unchanged,
        _ => MergeOutcome::Changed(candidate),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("cpf '{0}' must match 999.999.999-99 format")]
    InvalidCpfFormat(String),
    #[error("approved enrollment for '{0}' is missing enrolled_at")]
    MissingEnrollmentDate(String),
    #[error("unknown enrollment status '{0}'")]
    UnknownStatus(String),
}
