//! Dimension version manager
//!
//! Applies a [`ChangeSet`] to the warehouse inside the run's unit of work:
//! new entities get version 1, changed entities have their current version
//! closed and a successor inserted, unchanged entities are left alone.

use super::detector::{detect_changes, ChangeSet};
use crate::adapters::database::traits::UnitOfWork;
use crate::config::DimensionConfig;
use crate::domain::{
    Attributes, BusinessKey, NewVersion, Result, SourceEntity, StarloadError, SurrogateKey,
};
use chrono::NaiveDate;
use serde::Serialize;

/// Counts of what one dimension load wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DimensionOutcome {
    pub dimension: String,
    pub new_entities: usize,
    pub versions_closed: usize,
    pub versions_inserted: usize,
    pub unchanged: usize,
}

/// Writes Type-2 versions of one dimension
pub struct VersionManager<'a> {
    dimension: &'a DimensionConfig,
    run_date: NaiveDate,
}

impl<'a> VersionManager<'a> {
    /// `run_date` is the as-of date for entities that carry none
    pub fn new(dimension: &'a DimensionConfig, run_date: NaiveDate) -> Self {
        Self {
            dimension,
            run_date,
        }
    }

    /// Closes the current version of `business_key` as of `as_of_date`
    ///
    /// # Errors
    ///
    /// Returns [`StarloadError::InvariantViolation`] if the key has no
    /// current version, or more than one.
    pub async fn close_current_version(
        &self,
        uow: &mut dyn UnitOfWork,
        business_key: &BusinessKey,
        as_of_date: NaiveDate,
    ) -> Result<()> {
        let closed = uow
            .close_current_version(self.dimension, business_key, as_of_date)
            .await?;

        match closed {
            1 => Ok(()),
            0 => Err(StarloadError::invariant(
                &self.dimension.name,
                business_key.as_str(),
                "no current version to close",
            )),
            n => Err(StarloadError::invariant(
                &self.dimension.name,
                business_key.as_str(),
                format!("closed {n} current versions"),
            )),
        }
    }

    /// Inserts version `version` of `business_key`, effective `as_of_date`
    pub async fn insert_new_version(
        &self,
        uow: &mut dyn UnitOfWork,
        business_key: &BusinessKey,
        attributes: Attributes,
        as_of_date: NaiveDate,
        version: u32,
    ) -> Result<SurrogateKey> {
        let new_version = NewVersion {
            business_key: business_key.clone(),
            attributes: self.project(attributes),
            version,
            effective_date: as_of_date,
        };
        uow.insert_version(self.dimension, &new_version).await
    }

    /// Applies a change set; changed keys are closed before their successor is inserted
    ///
    /// # Errors
    ///
    /// Returns [`StarloadError::InvariantViolation`] if a change would not
    /// take effect strictly after the version it supersedes.
    pub async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        changes: ChangeSet,
    ) -> Result<DimensionOutcome> {
        let mut outcome = DimensionOutcome {
            dimension: self.dimension.name.clone(),
            unchanged: changes.unchanged,
            ..Default::default()
        };

        for entity in changes.new {
            let as_of = entity.effective_on(self.run_date);
            self.insert_new_version(uow, &entity.business_key, entity.attributes, as_of, 1)
                .await?;
            outcome.new_entities += 1;
            outcome.versions_inserted += 1;
        }

        for (entity, current) in changes.changed {
            let SourceEntity {
                business_key,
                attributes,
                ..
            } = &entity;
            let as_of = entity.effective_on(self.run_date);
            if as_of <= current.effective_date {
                return Err(StarloadError::invariant(
                    &self.dimension.name,
                    business_key.as_str(),
                    format!(
                        "change as of {as_of} does not follow version {} effective {}",
                        current.version, current.effective_date
                    ),
                ));
            }

            self.close_current_version(uow, business_key, as_of).await?;
            outcome.versions_closed += 1;

            self.insert_new_version(uow, business_key, attributes.clone(), as_of, current.version + 1)
                .await?;
            outcome.versions_inserted += 1;
        }

        Ok(outcome)
    }

    /// Reads current state, detects changes and applies them
    pub async fn load(
        &self,
        uow: &mut dyn UnitOfWork,
        snapshot: Vec<SourceEntity>,
    ) -> Result<DimensionOutcome> {
        let current = uow.current_versions(self.dimension).await?;
        let orphaned = uow.keys_without_current(self.dimension).await?;

        let changes = detect_changes(self.dimension, snapshot, current, &orphaned)?;
        tracing::debug!(
            dimension = %self.dimension.name,
            new = changes.new.len(),
            changed = changes.changed.len(),
            unchanged = changes.unchanged,
            "Detected changes"
        );

        self.apply(uow, changes).await
    }

    /// Keeps only configured attributes, dropping `NULL`s
    fn project(&self, mut attributes: Attributes) -> Attributes {
        attributes.retain(|name, value| {
            !value.is_null() && self.dimension.attribute_columns().any(|c| c == name)
        });
        attributes
    }
}
