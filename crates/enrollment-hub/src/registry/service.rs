use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::domain::{AgeGroup, AgeGroupError, AgeRange};
use crate::enrollment::EnrollmentStatus;
use crate::store::{
    AgeGroupRepository, EnrollmentFilter, EnrollmentRepository, Page, PageRequest, RepositoryError,
};

/// Brackets registered by the `seed` command.
pub const DEFAULT_AGE_GROUPS: [(&str, u32, u32); 4] = [
    ("Child", 0, 12),
    ("Teen", 13, 17),
    ("Adult", 18, 64),
    ("Senior", 65, 120),
];

/// Admin-facing operations over the age bracket registry.
pub struct AgeGroupRegistry<G, E> {
    groups: Arc<G>,
    enrollments: Arc<E>,
    // Serializes check-then-write steps issued from this process.
    write_gate: Mutex<()>,
}

impl<G, E> AgeGroupRegistry<G, E>
where
    G: AgeGroupRepository + 'static,
    E: EnrollmentRepository + 'static,
{
    pub fn new(groups: Arc<G>, enrollments: Arc<E>) -> Self {
        Self {
            groups,
            enrollments,
            write_gate: Mutex::new(()),
        }
    }

    /// Register a bracket after checking name uniqueness and range overlap
    /// against the stored groups.
    pub fn create(
        &self,
        name: &str,
        min_age: u32,
        max_age: u32,
    ) -> Result<AgeGroup, RegistryError> {
        let range = AgeRange::new(min_age, max_age)?;
        let _gate = self.gate()?;

        let mut conflicts = self.find_overlapping(range)?;
        if let Some(same_name) = self.groups.find_by_name(name)? {
            conflicts.push(same_name);
        }

        let group = AgeGroup::create(name, min_age, max_age, &conflicts)?;
        let stored = self.groups.insert(group)?;
        info!(group = stored.name(), min_age, max_age, "age group registered");
        Ok(stored)
    }

    /// Remove a bracket unless an approved enrollment still points at it.
    pub fn delete(&self, name: &str) -> Result<(), RegistryError> {
        let _gate = self.gate()?;

        if !self.groups.exists(name)? {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        let in_use = EnrollmentFilter::by_age_group(name).with_status(EnrollmentStatus::Approved);
        let approved = self.enrollments.count(&in_use)?;
        if approved > 0 {
            warn!(group = name, approved, "refusing to delete age group in use");
            return Err(RegistryError::InUse {
                name: name.to_string(),
                approved,
            });
        }

        self.groups.remove(name)?;
        info!(group = name, "age group removed");
        Ok(())
    }

    pub fn find_covering(&self, age: u32) -> Result<Option<AgeGroup>, RegistryError> {
        Ok(self.groups.find_covering(age)?)
    }

    pub fn find_overlapping(&self, range: AgeRange) -> Result<Vec<AgeGroup>, RegistryError> {
        Ok(self.groups.find_overlapping(range)?)
    }

    pub fn list(&self, page: PageRequest) -> Result<Page<AgeGroup>, RegistryError> {
        let total = self.groups.count()?;
        let items = self.groups.list(page)?;
        Ok(Page::new(items, total, page))
    }

    /// Register [`DEFAULT_AGE_GROUPS`], skipping names that already exist.
    pub fn seed_defaults(&self) -> Result<SeedReport, RegistryError> {
        let mut report = SeedReport::default();
        for (name, min_age, max_age) in DEFAULT_AGE_GROUPS {
            match self.create(name, min_age, max_age) {
                Ok(group) => report.created.push(group),
                Err(RegistryError::Invalid(AgeGroupError::DuplicateName(name))) => {
                    report.skipped.push(name)
                }
                Err(RegistryError::Invalid(err)) => report.conflicts.push(err),
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }

    fn gate(&self) -> Result<std::sync::MutexGuard<'_, ()>, RegistryError> {
        self.write_gate.lock().map_err(|_| {
            RegistryError::Repository(RepositoryError::Unavailable(
                "registry write gate poisoned".to_string(),
            ))
        })
    }
}

/// Outcome of [`AgeGroupRegistry::seed_defaults`].
#[derive(Debug, Default)]
pub struct SeedReport {
    pub created: Vec<AgeGroup>,
    pub skipped: Vec<String>,
    pub conflicts: Vec<AgeGroupError>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] AgeGroupError),
    #[error("age group '{0}' not found")]
    NotFound(String),
    #[error("age group '{name}' is in use by {approved} approved enrollment(s)")]
    InUse { name: String, approved: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
