use std::sync::Arc;

use super::domain::{Enrollment, EnrollmentStatus};
use crate::store::{EnrollmentFilter, EnrollmentRepository, Page, PageRequest, RepositoryError};

/// Read-only administrative queries over stored enrollments.
pub struct EnrollmentAdmin<E> {
    enrollments: Arc<E>,
}

impl<E> EnrollmentAdmin<E>
where
    E: EnrollmentRepository + 'static,
{
    pub fn new(enrollments: Arc<E>) -> Self {
        Self { enrollments }
    }

    pub fn get_by_cpf(&self, cpf: &str) -> Result<Option<Enrollment>, RepositoryError> {
        self.enrollments.find_by_cpf(cpf)
    }

    pub fn list_all(&self, page: PageRequest) -> Result<Page<Enrollment>, RepositoryError> {
        self.page(&EnrollmentFilter::default(), page)
    }

    pub fn list_by_age_group(
        &self,
        name: &str,
        page: PageRequest,
    ) -> Result<Page<Enrollment>, RepositoryError> {
        self.page(&EnrollmentFilter::by_age_group(name), page)
    }

    pub fn list_by_name(
        &self,
        name: &str,
        page: PageRequest,
    ) -> Result<Page<Enrollment>, RepositoryError> {
        self.page(&EnrollmentFilter::by_name(name), page)
    }

    pub fn list_by_status(
        &self,
        status: EnrollmentStatus,
        page: PageRequest,
    ) -> Result<Page<Enrollment>, RepositoryError> {
        self.page(&EnrollmentFilter::by_status(status), page)
    }

    pub fn count_all(&self) -> Result<usize, RepositoryError> {
        self.enrollments.count(&EnrollmentFilter::default())
    }

    pub fn count_by_age_group(&self, name: &str) -> Result<usize, RepositoryError> {
        self.enrollments.count(&EnrollmentFilter::by_age_group(name))
    }

    pub fn count_by_name(&self, name: &str) -> Result<usize, RepositoryError> {
        self.enrollments.count(&EnrollmentFilter::by_name(name))
    }

    pub fn count_by_status(&self, status: EnrollmentStatus) -> Result<usize, RepositoryError> {
        self.enrollments.count(&EnrollmentFilter::by_status(status))
    }

    fn page(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Page<Enrollment>, RepositoryError> {
        let total = self.enrollments.count(filter)?;
        let items = self.enrollments.search(filter, page)?;
        Ok(Page::new(items, total, page))
    }
}
