use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    apply_merge, AgeGroupRepository, ApplyOutcome, EnrollmentFilter, EnrollmentRepository,
    PageRequest, RepositoryError,
};
use crate::config::StoreConfig;
use crate::enrollment::Enrollment;
use crate::registry::{AgeGroup, AgeRange};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// On-disk layout: one JSON document holding both tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    age_groups: Vec<AgeGroup>,
    #[serde(default)]
    enrollments: Vec<Enrollment>,
}

/// JSON document store shared by the API and any number of worker processes.
///
/// Reads never take the lock. Every mutation runs load → modify → save while
/// holding an exclusive advisory lock on `<path>.lock`; the save goes through a
/// temporary file and a rename so readers only ever see whole documents.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

/// Held advisory lock; released when dropped.
struct WriteLock {
    file: File,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(error = %err, "failed to release store lock explicitly");
        }
    }
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, "lock");
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone(), config.lock_timeout)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn load(&self) -> Result<StoreDocument, RepositoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, document: &StoreDocument) -> Result<(), RepositoryError> {
        let staging = sibling_with_suffix(&self.path, "tmp");
        let body = serde_json::to_vec_pretty(document)?;
        fs::write(&staging, body)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn acquire(&self) -> Result<WriteLock, RepositoryError> {
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;

        let started = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(WriteLock { file }),
                Err(err) if is_contended(&err) => {
                    if started.elapsed() >= self.lock_timeout {
                        warn!(lock = %self.lock_path.display(), "store write lock timed out");
                        return Err(RepositoryError::LockTimeout(self.lock_timeout));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run `mutate` against the freshest document while holding the lock and
    /// persist the result.
    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut StoreDocument) -> T,
    ) -> Result<T, RepositoryError> {
        self.transact(|document| Ok((mutate(document), true)))
    }

    /// Like [`write`](Self::write), but `mutate` may fail and decides whether
    /// the document needs saving. Nothing is saved on error.
    fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut StoreDocument) -> Result<(T, bool), RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let _guard = self.acquire()?;
        let mut document = self.load()?;
        let (result, dirty) = mutate(&mut document)?;
        if dirty {
            self.save(&document)?;
            debug!(path = %self.path.display(), "store document written");
        }
        Ok(result)
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl AgeGroupRepository for JsonFileStore {
    fn insert(&self, group: AgeGroup) -> Result<AgeGroup, RepositoryError> {
        self.write(|doc| doc.age_groups.push(group.clone()))?;
        Ok(group)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<AgeGroup>, RepositoryError> {
        Ok(self
            .load()?
            .age_groups
            .into_iter()
            .find(|group| group.name() == name))
    }

    fn find_covering(&self, age: u32) -> Result<Option<AgeGroup>, RepositoryError> {
        Ok(self
            .load()?
            .age_groups
            .into_iter()
            .find(|group| group.age_range().contains(age)))
    }

    fn find_overlapping(&self, range: AgeRange) -> Result<Vec<AgeGroup>, RepositoryError> {
        Ok(self
            .load()?
            .age_groups
            .into_iter()
            .filter(|group| group.age_range().overlaps(&range))
            .collect())
    }

    fn remove(&self, name: &str) -> Result<bool, RepositoryError> {
        self.write(|doc| {
            let before = doc.age_groups.len();
            doc.age_groups.retain(|group| group.name() != name);
            doc.age_groups.len() != before
        })
    }

    fn list(&self, page: PageRequest) -> Result<Vec<AgeGroup>, RepositoryError> {
        Ok(page.slice(self.load()?.age_groups.into_iter()))
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.load()?.age_groups.len())
    }
}

impl EnrollmentRepository for JsonFileStore {
    fn find_by_cpf(&self, cpf: &str) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self
            .load()?
            .enrollments
            .into_iter()
            .find(|enrollment| enrollment.cpf() == cpf))
    }

    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        self.transact(|doc| {
            if doc.enrollments.iter().any(|r| r.cpf() == enrollment.cpf()) {
                return Err(RepositoryError::Conflict(enrollment.cpf().to_string()));
            }
            doc.enrollments.push(enrollment.clone());
            Ok(((), true))
        })?;
        Ok(enrollment)
    }

    fn apply_final(&self, candidate: Enrollment) -> Result<ApplyOutcome, RepositoryError> {
        self.transact(|doc| {
            let outcome = apply_merge(&mut doc.enrollments, candidate);
            Ok((outcome, outcome != ApplyOutcome::Unchanged))
        })
    }

    fn update_by_cpf(&self, enrollment: &Enrollment) -> Result<bool, RepositoryError> {
        self.write(|doc| {
            let mut matched = false;
            for record in doc
                .enrollments
                .iter_mut()
                .filter(|r| r.cpf() == enrollment.cpf())
            {
                *record = enrollment.clone();
                matched = true;
            }
            matched
        })
    }

    fn search(
        &self,
        filter: &EnrollmentFilter,
        page: PageRequest,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let document = self.load()?;
        Ok(page.slice(document.enrollments.into_iter().filter(|r| filter.matches(r))))
    }

    fn count(&self, filter: &EnrollmentFilter) -> Result<usize, RepositoryError> {
        Ok(self
            .load()?
            .enrollments
            .iter()
            .filter(|r| filter.matches(r))
            .count())
    }
}
