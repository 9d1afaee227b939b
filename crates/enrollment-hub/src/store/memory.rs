use std::sync::{Mutex, MutexGuard};

use super::{
    apply_merge, AgeGroupRepository, ApplyOutcome, EnrollmentFilter, EnrollmentRepository,
    PageRequest, RepositoryError,
};
use crate::enrollment::Enrollment;
use crate::registry::{AgeGroup, AgeRange};

/// Process-local store used by tests and the in-process demo. Records keep
/// insertion order so listings page the same way the file store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    age_groups: Mutex<Vec<AgeGroup>>,
    enrollments: Mutex<Vec<Enrollment>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("memory store mutex poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgeGroupRepository for MemoryStore {
    fn insert(&self, group: AgeGroup) -> Result<AgeGroup, RepositoryError> {
        lock(&self.age_groups)?.push(group.clone());
        Ok(group)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<AgeGroup>, RepositoryError> {
        Ok(lock(&self.age_groups)?
            .iter()
            .find(|group| group.name() == name)
            .cloned())
    }

    fn find_covering(&self, age: u32) -> Result<Option<AgeGroup>, RepositoryError> {
        Ok(lock(&self.age_groups)?
            .iter()
            .find(|group| group.age_range().contains(age))
            .cloned())
    }

    fn find_overlapping(&self, range: AgeRange) -> Result<Vec<AgeGroup>, RepositoryError> {
        Ok(lock(&self.age_groups)?
            .iter()
            .filter(|group| group.age_range().overlaps(&range))
            .cloned()
            .collect())
    }

    fn remove(&self, name: &str) -> Result<bool, RepositoryError> {
        let mut groups = lock(&self.age_groups)?;
        let before = groups.len();
        groups.retain(|group| group.name() != name);
        Ok(groups.len() != before)
    }

    fn list(&self, page: PageRequest) -> Result<Vec<AgeGroup>, RepositoryError> {
        Ok(page.slice(lock(&self.age_groups)?.iter().cloned()))
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(lock(&self.age_groups)?.len())
    }
}

impl EnrollmentRepository for MemoryStore {
    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(lock(&self.enrollments)?
            .iter()
            .find(|enrollment| enrollment.cpf() == cpf)
            .cloned())
    }

    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut records = lock(&self.enrollments)?;
        if records.iter().any(|r| r.cpf() == enrollment.cpf()) {
            return Err(RepositoryError::Conflict(enrollment.cpf().to_string()));
        }
        records.push(enrollment.clone());
        Ok(enrollment)
    }

    fn apply_final(&self, candidate: Enrollment) -> Result<ApplyOutcome, RepositoryError> {
        Ok(apply_merge(&mut *lock(&self.enrollments)?, candidate))
    }

    fn update_by_cpf(&self, enrollment: &Enrollment) -> Result<bool, RepositoryError> {
        let mut records = lock(&self.enrollments)?;
        let mut matched = false;
        for record in records.iter_mut().filter(|r| r.cpf() == enrollment.cpf()) {
            *record = enrollment.clone();
            matched = true;
        }
        Ok(matched)
    }

    fn search(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let records = lock(&self.enrollments)?;
        Ok(page.slice(records.iter().filter(|r| filter.matches(r)).cloned()))
    }

    fn count(&self, filter: &EnrollmentFilter) -> Result<usize, RepositoryError> {
        Ok(lock(&self.enrollments)?
            .iter()
            .filter(|r| filter.matches(r))
            .count())
    }
}
