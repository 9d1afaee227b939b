use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::enrollment::{
    Enrollment, EnrollmentApi, EnrollmentFields, EnrollmentStatus, Finalizer, IntakeService,
};
use crate::messaging::{EnrollmentPayload, EnrollmentPublisher, InMemoryQueue, PublishError};
use crate::registry::{AgeGroup, AgeRange};
use crate::store::{
    AgeGroupRepository, ApplyOutcome, EnrollmentFilter, EnrollmentRepository, MemoryStore,
    PageRequest, RepositoryError,
};

pub(super) const ALICE_CPF: &str = "441.354.448-06";

/// Memory store that counts enrollment writes. A record queued with
/// [`CountingStore::land_before_next_apply`] is stored by a competing writer
/// just ahead of the next `apply_final`.
#[derive(Default)]
pub(super) struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    competing: Mutex<Option<Enrollment>>,
}

impl CountingStore {
    pub(super) fn with_kids() -> Arc<Self> {
        let store = Arc::new(Self::default());
        AgeGroupRepository::insert(store.as_ref(), kids()).expect("seed KIDS");
        store
    }

    pub(super) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(super) fn land_before_next_apply(&self, record: Enrollment) {
        *self.competing.lock().expect("competing slot") = Some(record);
    }

    fn count_write(&self, outcome: ApplyOutcome) -> ApplyOutcome {
        if outcome != ApplyOutcome::Unchanged {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        outcome
    }
}

impl AgeGroupRepository for CountingStore {
    fn insert(&self, group: AgeGroup) -> Result<AgeGroup, RepositoryError> {
        AgeGroupRepository::insert(&self.inner, group)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<AgeGroup>, RepositoryError> {
        self.inner.find_by_name(name)
    }

    fn find_covering(&self, age: u32) -> Result<Option<AgeGroup>, RepositoryError> {
        self.inner.find_covering(age)
    }

    fn find_overlapping(&self, range: AgeRange) -> Result<Vec<AgeGroup>, RepositoryError> {
        self.inner.find_overlapping(range)
    }

    fn remove(&self, name: &str) -> Result<bool, RepositoryError> {
        self.inner.remove(name)
    }

    fn list(&self, page: PageRequest) -> Result<Vec<AgeGroup>, RepositoryError> {
        self.inner.list(page)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        AgeGroupRepository::count(&self.inner)
    }
}

impl EnrollmentRepository for CountingStore {
    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Enrollment>, RepositoryError> {
        self.inner.find_by_cpf(cpf)
    }

    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        EnrollmentRepository::insert(&self.inner, enrollment)
    }

    fn apply_final(&self, candidate: Enrollment) -> Result<ApplyOutcome, RepositoryError> {
        let competing = self.competing.lock().expect("competing slot").take();
        if let Some(record) = competing {
            let outcome = self.inner.apply_final(record)?;
            self.count_write(outcome);
        }
        let outcome = self.inner.apply_final(candidate)?;
        Ok(self.count_write(outcome))
    }

    fn update_by_cpf(&self, enrollment: &Enrollment) -> Result<bool, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_by_cpf(enrollment)
    }

    fn search(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        self.inner.search(filter, page)
    }

    fn count(&self, filter: &EnrollmentFilter) -> Result<usize, RepositoryError> {
        EnrollmentRepository::count(&self.inner, filter)
    }
}

/// Publisher whose broker is always down.
#[derive(Default)]
pub(super) struct DownPublisher {
    pub(super) attempts: AtomicUsize,
}

#[async_trait]
impl EnrollmentPublisher for DownPublisher {
    async fn publish(&self, _payload: &EnrollmentPayload) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PublishError::Connect("connection refused".to_string()))
    }

    async fn close(&self) {}
}

pub(super) fn kids() -> AgeGroup {
    AgeGroup::create("KIDS", 5, 12, &[]).expect("valid group")
}

pub(super) fn stored(status: EnrollmentStatus, group: Option<&str>) -> Enrollment {
    Enrollment::new(EnrollmentFields {
        name: "Alice".to_string(),
        age: 11,
        cpf: ALICE_CPF.to_string(),
        status,
        requested_at: Some(1_700_000_000),
        enrolled_at: (status == EnrollmentStatus::Approved).then_some(1_700_000_100),
        age_group_name: group.map(str::to_string),
    })
    .expect("valid enrollment")
}

pub(super) fn payload(cpf: &str, group: Option<&str>) -> EnrollmentPayload {
    EnrollmentPayload {
        name: "Alice".to_string(),
        age: 11,
        cpf: cpf.to_string(),
        requested_at: Some(1_700_000_000),
        age_group_name: group.map(str::to_string),
        status: EnrollmentStatus::Pending,
    }
}

pub(super) fn finalizer(store: &Arc<CountingStore>) -> Finalizer<CountingStore, CountingStore> {
    Finalizer::new(store.clone(), store.clone(), Duration::ZERO)
}

pub(super) fn intake(
    store: &Arc<CountingStore>,
    queue: &Arc<InMemoryQueue>,
) -> IntakeService<CountingStore, CountingStore, InMemoryQueue> {
    IntakeService::new(store.clone(), store.clone(), queue.clone())
}

pub(super) fn api<P>(store: &Arc<CountingStore>, publisher: Arc<P>) -> Arc<EnrollmentApi<CountingStore, P>>
where
    P: EnrollmentPublisher + 'static,
{
    Arc::new(EnrollmentApi::new(store.clone(), publisher))
}
