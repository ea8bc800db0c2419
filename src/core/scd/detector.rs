//! Change detection
//!
//! Compares a dimension's source snapshot with its current versions and sorts
//! every entity into new, changed or unchanged. Only tracked attributes take
//! part in the comparison; a missing attribute compares as `NULL`.

use crate::config::DimensionConfig;
use crate::domain::{
    attribute_or_null, BusinessKey, DimensionVersion, Result, SourceEntity, StarloadError,
};
use std::collections::{BTreeMap, HashSet};

/// Classification of one source entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// No version exists for the business key
    New,
    /// At least one tracked attribute differs from the current version
    Changed,
    /// Every tracked attribute matches the current version
    Unchanged,
}

/// Entities of one snapshot grouped by classification, in business key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub new: Vec<SourceEntity>,
    /// Changed entities paired with the version they supersede
    pub changed: Vec<(SourceEntity, DimensionVersion)>,
    pub unchanged: usize,
}

impl ChangeSet {
    /// Whether applying this change set writes nothing
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty()
    }
}

fn tracked_equal(
    tracked: &[String],
    left: &crate::domain::Attributes,
    right: &crate::domain::Attributes,
) -> bool {
    tracked
        .iter()
        .all(|name| attribute_or_null(left, name) == attribute_or_null(right, name))
}

/// Classifies one entity against its current version
pub fn classify(
    entity: &SourceEntity,
    current: Option<&DimensionVersion>,
    tracked: &[String],
) -> ChangeKind {
    match current {
        None => ChangeKind::New,
        Some(version) if tracked_equal(tracked, &entity.attributes, &version.attributes) => {
            ChangeKind::Unchanged
        }
        Some(_) => ChangeKind::Changed,
    }
}

/// Builds the change set of one dimension
///
/// `current_versions` are the versions flagged current and
/// `keys_without_current` the business keys with history but no current
/// version, both as read inside the run's unit of work.
///
/// # Errors
///
/// - [`StarloadError::SourceConflict`] if a business key appears more than
///   once in the snapshot with different tracked values.
/// - [`StarloadError::InvariantViolation`] if a snapshot key has more than one
///   current version, or history without a current version.
pub fn detect_changes(
    dimension: &DimensionConfig,
    snapshot: Vec<SourceEntity>,
    current_versions: Vec<DimensionVersion>,
    keys_without_current: &[BusinessKey],
) -> Result<ChangeSet> {
    let tracked = &dimension.tracked_attributes;

    let mut entities: BTreeMap<BusinessKey, SourceEntity> = BTreeMap::new();
    let mut duplicates = 0usize;
    for entity in snapshot {
        match entities.get(&entity.business_key) {
            Some(first) => {
                if !tracked_equal(tracked, &first.attributes, &entity.attributes) {
                    return Err(StarloadError::SourceConflict {
                        dimension: dimension.name.clone(),
                        business_key: entity.business_key.to_string(),
                        detail: "the snapshot carries the key more than once with different tracked values"
                            .to_string(),
                    });
                }
                duplicates += 1;
            }
            None => {
                entities.insert(entity.business_key.clone(), entity);
            }
        }
    }
    if duplicates > 0 {
        tracing::debug!(
            dimension = %dimension.name,
            duplicates,
            "Collapsed identical duplicate source rows"
        );
    }

    let mut current: BTreeMap<BusinessKey, DimensionVersion> = BTreeMap::new();
    let mut multiple_current: HashSet<BusinessKey> = HashSet::new();
    for version in current_versions {
        if current.contains_key(&version.business_key) {
            multiple_current.insert(version.business_key.clone());
        } else {
            current.insert(version.business_key.clone(), version);
        }
    }
    let orphaned: HashSet<&BusinessKey> = keys_without_current.iter().collect();

    let mut changes = ChangeSet::default();
    for (key, entity) in entities {
        if multiple_current.contains(&key) {
            return Err(StarloadError::invariant(
                &dimension.name,
                key.as_str(),
                "more than one current version",
            ));
        }
        if orphaned.contains(&key) {
            return Err(StarloadError::invariant(
                &dimension.name,
                key.as_str(),
                "history exists but no version is current",
            ));
        }

        let existing = current.remove(&key);
        match classify(&entity, existing.as_ref(), tracked) {
            ChangeKind::New => changes.new.push(entity),
            ChangeKind::Unchanged => changes.unchanged += 1,
            ChangeKind::Changed => {
                if let Some(version) = existing {
                    changes.changed.push((entity, version));
                }
            }
        }
    }

    Ok(changes)
}
