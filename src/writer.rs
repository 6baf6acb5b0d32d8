//! Applies a [`Plan`] to a calendar

use std::fmt::{Display, Formatter};

use crate::error::WriteError;
use crate::reconcile::Plan;
use crate::retry::RetryPolicy;
use crate::traits::CalendarStore;

/// The kind of change an operation makes to the calendar
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// An operation that could not be applied
#[derive(Clone, Debug, PartialEq)]
pub struct FailedOperation {
    pub kind: OperationKind,
    pub uid: String,
    pub error: WriteError,
}

/// What happened when a plan was applied
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: Vec<FailedOperation>,
}

impl Report {
    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: OperationKind, uid: &str, result: Result<(), WriteError>) {
        match result {
            Ok(()) => match kind {
                OperationKind::Create => self.created += 1,
                OperationKind::Update => self.updated += 1,
                OperationKind::Delete => self.deleted += 1,
            },
            Err(error) => {
                log::error!("Unable to {} {}: {}", kind, uid, error);
                self.failed.push(FailedOperation { kind, uid: uid.to_string(), error });
            },
        }
    }
}


/// Applies plans, one operation at a time.
///
/// Operations are serialized, since CalDAV servers rarely support concurrent writes to one calendar.
/// A failed operation never prevents the next ones from being tried.
pub struct Writer<'a, S: CalendarStore + ?Sized> {
    store: &'a S,
    policy: RetryPolicy,
}

impl<'a, S: CalendarStore + ?Sized> Writer<'a, S> {
    pub fn new(store: &'a S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn apply(&self, plan: &Plan) -> Report {
        let mut report = Report::default();
        let store = self.store;

        for entry in &plan.create {
            log::debug!("> Creating {}", entry.uid());
            let description = format!("Creating {}", entry.uid());
            let result = self.policy.run(&description, || store.create_entry(entry)).await;
            report.record(OperationKind::Create, entry.uid(), result);
        }

        for update in &plan.update {
            log::debug!("> Updating {}", update.existing);
            let description = format!("Updating {}", update.existing);
            let result = self.policy.run(&description, || store.update_entry(&update.existing, &update.desired)).await;
            report.record(OperationKind::Update, update.desired.uid(), result);
        }

        for remote in &plan.delete {
            log::debug!("> Deleting {}", remote);
            let description = format!("Deleting {}", remote);
            let result = self.policy.run(&description, || store.delete_entry(remote)).await;
            report.record(OperationKind::Delete, remote.uid(), result);
        }

        report
    }
}
