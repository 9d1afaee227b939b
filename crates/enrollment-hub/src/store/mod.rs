//! Persistence seams for age groups and enrollments.
//!
//! Repositories are synchronous: the JSON file store does blocking I/O under a
//! cross-process advisory lock. Async callers go through [`blocking`].

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};

use crate::enrollment::{merge, Enrollment, EnrollmentStatus, MergeOutcome};
use crate::registry::{AgeGroup, AgeRange};

/// Storage abstraction for the age bracket registry.
pub trait AgeGroupRepository: Send + Sync {
    fn insert(&self, group: AgeGroup) -> Result<AgeGroup, RepositoryError>;
    fn find_by_name(&self, name: &str) -> Result<Option<AgeGroup>, RepositoryError>;
    fn exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.find_by_name(name)?.is_some())
    }
    fn find_covering(&self, age: u32) -> Result<Option<AgeGroup>, RepositoryError>;
    fn find_overlapping(&self, range: AgeRange) -> Result<Vec<AgeGroup>, RepositoryError>;
    /// Returns `true` when a group was removed.
    fn remove(&self, name: &str) -> Result<bool, RepositoryError>;
    fn list(&self, page: PageRequest) -> Result<Vec<AgeGroup>, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
}

/// Storage abstraction for enrollment records, keyed by cpf.
pub trait EnrollmentRepository: Send + Sync {
    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Enrollment>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the cpf is already stored.
    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError>;
    /// Merge `candidate` against the record stored for its cpf and persist the
    /// result, all under one write lock.
    fn apply_final(&self, candidate: Enrollment) -> Result<ApplyOutcome, RepositoryError>;
    /// Replace the record stored under `enrollment.cpf()`. Returns `false` when
    /// no record matched.
    fn update_by_cpf(&self, enrollment: &Enrollment) -> Result<bool, RepositoryError>;
    fn search(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    fn count(&self, filter: &EnrollmentFilter) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("store write lock not acquired within {0:?}")]
    LockTimeout(std::time::Duration),
    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("an enrollment for cpf '{0}' is already stored")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// What [`EnrollmentRepository::apply_final`] did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Updated,
    /// An approved record was already stored and stays as it is.
    Unchanged,
}

/// Apply the merge rule to an in-memory table. Callers hold the write lock.
pub(crate) fn apply_merge(records: &mut Vec<Enrollment>, candidate: Enrollment) -> ApplyOutcome {
    let position = records.iter().position(|r| r.cpf() == candidate.cpf());
    match merge(position.map(|index| &records[index]), candidate) {
        MergeOutcome::Unchanged => ApplyOutcome::Unchanged,
        MergeOutcome::Changed(next) => match position {
            Some(index) => {
                records[index] = next;
                ApplyOutcome::Updated
            }
            None => {
                records.push(next);
                ApplyOutcome::Inserted
            }
        },
    }
}

/// Run a synchronous store call on the blocking pool so lock waits never
/// stall a runtime worker thread.
pub async fn blocking<T, E, F>(call: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<RepositoryError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(join) => Err(RepositoryError::Unavailable(format!("store task failed: {join}")).into()),
    }
}

/// Field-equality predicates for enrollment queries. Empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentFilter {
    pub name: Option<String>,
    pub status: Option<EnrollmentStatus>,
    pub age_group_name: Option<String>,
}

impl EnrollmentFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn by_status(status: EnrollmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn by_age_group(name: impl Into<String>) -> Self {
        Self {
            age_group_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: EnrollmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.name.as_deref().map_or(true, |name| enrollment.name() == name)
            && self.status.map_or(true, |status| enrollment.status() == status)
            && self
                .age_group_name
                .as_deref()
                .map_or(true, |group| enrollment.age_group_name() == Some(group))
    }
}

/// Offset/limit window derived from a 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Clamp to `page >= 1` and `page_size >= 1`.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn slice<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        items.skip(self.offset()).take(self.page_size).collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// A page of results plus the total count behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: usize, request: PageRequest) -> Self {
        Self {
            items,
            total_items,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
