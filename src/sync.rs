//! This module fetches the tasks and mirrors them into the calendar
//!
//! A run is one-way and stateless: the calendar is compared with the current upstream snapshot each time,
//! so an interrupted run is simply caught up by the next one.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use futures::future::join_all;

use crate::error::{SourceError, SyncError};
use crate::normalize::normalize;
use crate::reconcile::{self, Plan};
use crate::retry::RetryPolicy;
use crate::task::Origin;
use crate::traits::{CalendarStore, TaskSource};
use crate::writer::{Report, Writer};

/// What a source gave during a run
#[derive(Clone, Debug, PartialEq)]
pub struct SourceOutcome {
    pub origin: Origin,
    /// The number of tasks fetched, or why there are none
    pub result: Result<usize, SourceError>,
}

/// What happened during a run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncReport {
    pub sources: Vec<SourceOutcome>,
    /// Origins whose entries were protected from deletion
    pub degraded: Vec<Origin>,
    /// Tasks left after normalization
    pub task_count: usize,
    pub plan: Plan,
    /// `None` when nothing has been applied (dry run, or no source could be fetched)
    pub writes: Option<Report>,
}

impl SyncReport {
    pub fn all_sources_failed(&self) -> bool {
        self.sources.iter().all(|s| s.result.is_err())
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = (Origin, &SourceError)> {
        self.sources.iter().filter_map(|s| s.result.as_ref().err().map(|err| (s.origin, err)))
    }

    /// A run succeeds when at least one source could be fetched, and every write went through.
    pub fn is_success(&self) -> bool {
        if self.all_sources_failed() {
            return false;
        }
        self.writes.as_ref().map(|w| w.is_success()).unwrap_or(true)
    }

    /// The process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for source in &self.sources {
            match &source.result {
                Ok(n) => writeln!(f, "{}: {} tasks", source.origin, n)?,
                Err(err) => writeln!(f, "{}: unavailable ({})", source.origin, err)?,
            }
        }
        if self.degraded.is_empty() == false {
            let names: Vec<String> = self.degraded.iter().map(|o| o.to_string()).collect();
            writeln!(f, "Entries kept as they are for: {}", names.join(", "))?;
        }

        match &self.writes {
            None if self.all_sources_failed() => write!(f, "No source could be fetched, the calendar was left untouched"),
            None => write!(f, "Dry run: {} to create, {} to update, {} to delete",
                self.plan.create.len(), self.plan.update.len(), self.plan.delete.len()),
            Some(report) => {
                write!(f, "{} created, {} updated, {} deleted, {} failed",
                    report.created, report.updated, report.deleted, report.failed.len())?;
                for failure in &report.failed {
                    write!(f, "\n  could not {} {}: {}", failure.kind, failure.uid, failure.error)?;
                }
                Ok(())
            },
        }
    }
}


/// Mirrors task sources into a calendar
pub struct Synchronizer<S: CalendarStore> {
    sources: Vec<Box<dyn TaskSource>>,
    store: S,
    policy: RetryPolicy,
    dry_run: bool,
}

impl<S: CalendarStore> Synchronizer<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { sources: Vec::new(), store, policy, dry_run: false }
    }

    pub fn with_source(mut self, source: Box<dyn TaskSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Only compute the plan
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a sync.
    ///
    /// Source and write failures end up in the report. This only fails when the calendar cannot be listed.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        log::info!("Starting a sync.");
        let mut report = SyncReport::default();

        let results = join_all(self.sources.iter().map(|source| source.fetch())).await;

        // Origins without a source have not been fetched either
        let mut degraded: HashSet<Origin> = Origin::ALL.iter().copied().collect();
        let mut snapshots = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            let origin = source.origin();
            match result {
                Ok(tasks) => {
                    log::debug!("{} returned {} tasks", origin, tasks.len());
                    degraded.remove(&origin);
                    report.sources.push(SourceOutcome { origin, result: Ok(tasks.len()) });
                    snapshots.push(tasks);
                },
                Err(err) => {
                    log::warn!("Unable to fetch tasks from {}: {}", origin, err);
                    report.sources.push(SourceOutcome { origin, result: Err(err) });
                },
            }
        }
        let mut degraded_list: Vec<Origin> = degraded.iter().copied().collect();
        degraded_list.sort();
        report.degraded = degraded_list;

        if report.all_sources_failed() {
            log::error!("No source could be fetched, leaving the calendar untouched");
            return Ok(report);
        }

        let tasks = normalize(snapshots);
        report.task_count = tasks.len();

        let existing = self.policy.run("Listing the calendar", || self.store.list_entries()).await?;
        log::debug!("The calendar has {} to-dos", existing.len());

        report.plan = reconcile::plan(&tasks, &existing, &degraded);
        log::info!("{} tasks, {} changes to make", tasks.len(), report.plan.len());

        if self.dry_run {
            log::info!("Dry run, not applying anything");
            return Ok(report);
        }

        let writes = Writer::new(&self.store, self.policy.clone()).apply(&report.plan).await;
        if writes.is_success() {
            log::info!("Sync ended successfully");
        } else {
            log::warn!("Sync ended with {} failed operations", writes.failed.len());
        }
        report.writes = Some(writes);
        Ok(report)
    }
}
