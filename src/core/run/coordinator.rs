//! Run coordinator - main orchestrator for a load run
//!
//! A run reads every feed first, then performs all writes in one unit of
//! work: calendar, then every dimension, then every fact. Any structural
//! failure or a shutdown signal rolls the whole run back.

use super::summary::{RunFailure, RunStep, RunSummary};
use crate::adapters::database::create_source_and_warehouse;
use crate::adapters::database::traits::{SourceReader, UnitOfWork, Warehouse};
use crate::config::StarloadConfig;
use crate::core::calendar::ensure_calendar;
use crate::core::facts::FactLoader;
use crate::core::scd::VersionManager;
use crate::domain::{Result, SourceEntity, StarloadError, TransactionLine};
use crate::{log_dimension_applied, log_error_with_context, log_run_complete, log_run_start};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// Everything read from the sources before the unit of work opens
struct RunInput {
    entities: Vec<Vec<SourceEntity>>,
    transactions: Vec<Vec<TransactionLine>>,
}

enum StepError {
    Failed(RunStep, StarloadError),
    Interrupted(RunStep),
}

impl StepError {
    fn into_failure(self) -> RunFailure {
        match self {
            StepError::Failed(step, error) => {
                log_error_with_context!(&error, format!("Run failed at step {step}"));
                RunFailure::from_error(step, &error)
            }
            StepError::Interrupted(step) => {
                tracing::warn!(step = %step, "Run interrupted");
                RunFailure::interrupted(step)
            }
        }
    }
}

/// Run coordinator
pub struct RunCoordinator {
    config: StarloadConfig,
    source: Arc<dyn SourceReader>,
    warehouse: Arc<dyn Warehouse>,
    shutdown_signal: Option<watch::Receiver<bool>>,
}

impl RunCoordinator {
    /// Create a coordinator with the source and warehouse named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if either side cannot be created.
    pub fn new(config: StarloadConfig) -> Result<Self> {
        let (source, warehouse) = create_source_and_warehouse(&config)?;
        Ok(Self::with_components(config, source, warehouse))
    }

    /// Create a coordinator over explicit components
    pub fn with_components(
        config: StarloadConfig,
        source: Arc<dyn SourceReader>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            config,
            source,
            warehouse,
            shutdown_signal: None,
        }
    }

    /// Abort between steps once `signal` turns `true`
    pub fn with_shutdown_signal(mut self, signal: watch::Receiver<bool>) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    pub fn config(&self) -> &StarloadConfig {
        &self.config
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// As-of date for entities that carry none
    pub fn run_date(&self) -> NaiveDate {
        self.config
            .load
            .as_of_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Execute the run
    ///
    /// 1. Read every dimension snapshot and fact feed
    /// 2. Begin the unit of work
    /// 3. Ensure the calendar covers the configured and pending dates
    /// 4. Version every dimension
    /// 5. Load every fact table
    /// 6. Commit, or roll back on dry runs and failures
    ///
    /// Failures are reported in the summary, never as an `Err`.
    pub async fn execute_run(&self) -> RunSummary {
        let start_time = Instant::now();
        let dry_run = self.config.application.dry_run;
        let mut summary = RunSummary::new(Uuid::new_v4(), self.run_date(), dry_run);
        log_run_start!(summary.run_id, summary.run_date, dry_run);

        match self.read_input().await {
            Ok(input) => self.write(input, &mut summary).await,
            Err(error) => summary.fail(error.into_failure()),
        }

        summary = summary.with_duration(start_time.elapsed());
        log_run_complete!(summary.run_id, summary.status, summary.duration);
        summary.log_summary();
        summary
    }

    fn check_interrupt(&self, next: RunStep) -> std::result::Result<(), StepError> {
        let interrupted = self
            .shutdown_signal
            .as_ref()
            .map(|signal| *signal.borrow())
            .unwrap_or(false);
        if interrupted {
            Err(StepError::Interrupted(next))
        } else {
            Ok(())
        }
    }

    async fn read_input(&self) -> std::result::Result<RunInput, StepError> {
        let mut input = RunInput {
            entities: Vec::with_capacity(self.config.dimensions.len()),
            transactions: Vec::with_capacity(self.config.facts.len()),
        };

        for dimension in &self.config.dimensions {
            let step = RunStep::ReadSource(dimension.name.clone());
            self.check_interrupt(step.clone())?;
            let entities = self
                .source
                .read_entities(dimension)
                .await
                .map_err(|e| StepError::Failed(step, e))?;
            tracing::info!(
                source = %self.source.source_name(),
                dimension = %dimension.name,
                entities = entities.len(),
                "Read dimension snapshot"
            );
            input.entities.push(entities);
        }

        for fact in &self.config.facts {
            let step = RunStep::ReadSource(fact.name.clone());
            self.check_interrupt(step.clone())?;
            let lines = self
                .source
                .read_pending_transactions(fact)
                .await
                .map_err(|e| StepError::Failed(step, e))?;
            tracing::info!(
                source = %self.source.source_name(),
                fact = %fact.name,
                lines = lines.len(),
                "Read pending transactions"
            );
            input.transactions.push(lines);
        }

        Ok(input)
    }

    async fn write(&self, input: RunInput, summary: &mut RunSummary) {
        if let Err(error) = self.check_interrupt(RunStep::Begin) {
            summary.fail(error.into_failure());
            return;
        }

        let mut uow = match self.warehouse.begin().await {
            Ok(uow) => uow,
            Err(error) => {
                summary.fail(StepError::Failed(RunStep::Begin, error).into_failure());
                return;
            }
        };
        tracing::info!(warehouse = %self.warehouse.warehouse_name(), "Unit of work started");

        if let Err(error) = self.apply(uow.as_mut(), input, summary).await {
            summary.fail(error.into_failure());
            if let Err(e) = uow.rollback().await {
                log_error_with_context!(&e, "Rollback failed");
            }
            return;
        }

        if summary.dry_run {
            tracing::info!("DRY RUN: rolling back all writes");
            match uow.rollback().await {
                Ok(()) => summary.complete(false),
                Err(e) => summary.fail(StepError::Failed(RunStep::Commit, e).into_failure()),
            }
            return;
        }

        if let Err(error) = self.check_interrupt(RunStep::Commit) {
            summary.fail(error.into_failure());
            if let Err(e) = uow.rollback().await {
                log_error_with_context!(&e, "Rollback failed");
            }
            return;
        }

        match uow.commit().await {
            Ok(()) => summary.complete(true),
            Err(e) => summary.fail(StepError::Failed(RunStep::Commit, e).into_failure()),
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        input: RunInput,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), StepError> {
        if self.config.calendar.enabled {
            self.check_interrupt(RunStep::Calendar)?;
            let dates = input
                .transactions
                .iter()
                .flatten()
                .map(|line| line.transaction_date);
            summary.calendar_days_inserted = ensure_calendar(uow, &self.config.calendar, dates)
                .await
                .map_err(|e| StepError::Failed(RunStep::Calendar, e))?;
        }

        for (dimension, entities) in self.config.dimensions.iter().zip(input.entities) {
            let step = RunStep::Dimension(dimension.name.clone());
            self.check_interrupt(step.clone())?;
            let outcome = VersionManager::new(dimension, summary.run_date)
                .load(uow, entities)
                .await
                .map_err(|e| StepError::Failed(step, e))?;
            log_dimension_applied!(dimension.name, outcome);
            summary.dimensions.push(outcome);
        }

        for (fact, lines) in self.config.facts.iter().zip(input.transactions) {
            let step = RunStep::Fact(fact.name.clone());
            self.check_interrupt(step.clone())?;
            let outcome = FactLoader::new(&self.config, fact)
                .load(uow, lines)
                .await
                .map_err(|e| StepError::Failed(step, e))?;
            summary.facts.push(outcome);
        }

        Ok(())
    }
}
