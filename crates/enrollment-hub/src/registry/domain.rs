use serde::{Deserialize, Serialize};

/// Inclusive age interval. Construction guarantees `min_age <= max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAgeRange")]
pub struct AgeRange {
    min_age: u32,
    max_age: u32,
}

#[derive(Deserialize)]
struct RawAgeRange {
    min_age: u32,
    max_age: u32,
}

impl TryFrom<RawAgeRange> for AgeRange {
    type Error = AgeGroupError;

    fn try_from(raw: RawAgeRange) -> Result<Self, Self::Error> {
        AgeRange::new(raw.min_age, raw.max_age)
    }
}

impl AgeRange {
    pub fn new(min_age: u32, max_age: u32) -> Result<Self, AgeGroupError> {
        if min_age > max_age {
            return Err(AgeGroupError::InvalidRange { min_age, max_age });
        }
        Ok(Self { min_age, max_age })
    }

    pub const fn min_age(&self) -> u32 {
        self.min_age
    }

    pub const fn max_age(&self) -> u32 {
        self.max_age
    }

    /// Ranges sharing a single boundary point overlap.
    pub const fn overlaps(&self, other: &AgeRange) -> bool {
        self.min_age <= other.max_age && other.min_age <= self.max_age
    }

    pub const fn contains(&self, age: u32) -> bool {
        self.min_age <= age && age <= self.max_age
    }
}

/// A named age bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeGroup {
    name: String,
    #[serde(flatten)]
    age_range: AgeRange,
}

impl AgeGroup {
    /// Validate a new bracket against every group it could conflict with.
    ///
    /// `existing` must contain at least the groups sharing `name` and the
    /// groups whose range overlaps `[min_age, max_age]`; the registry service
    /// passes exactly that set.
    pub fn create(
        name: &str,
        min_age: u32,
        max_age: u32,
        existing: &[AgeGroup],
    ) -> Result<AgeGroup, AgeGroupError> {
        if existing.iter().any(|group| group.name == name) {
            return Err(AgeGroupError::DuplicateName(name.to_string()));
        }

        let age_range = AgeRange::new(min_age, max_age)?;
        if let Some(conflict) = existing
            .iter()
            .find(|group| group.age_range.overlaps(&age_range))
        {
            return Err(AgeGroupError::RangeOverlap {
                name: name.to_string(),
                conflicting: conflict.name.clone(),
            });
        }

        Ok(AgeGroup {
            name: name.to_string(),
            age_range,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn age_range(&self) -> AgeRange {
        self.age_range
    }
}

/// Validation failures raised while building an age group.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgeGroupError {
    #[error("age group name '{0}' already exists")]
    DuplicateName(String),
    #[error("age range of '{name}' overlaps existing group '{conflicting}'")]
    RangeOverlap { name: String, conflicting: String },
    #[error("min_age ({min_age}) must be <= max_age ({max_age})")]
    InvalidRange { min_age: u32, max_age: u32 },
}
