//! Traits used at the boundaries of the sync pipeline

use async_trait::async_trait;

use crate::entry::{CalendarEntry, RemoteEntry};
use crate::error::{SourceError, WriteError};
use crate::task::{Origin, Task};

/// A service that tasks are read from
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// The origin of every task this source returns
    fn origin(&self) -> Origin;

    /// Fetch the current snapshot of tasks.
    ///
    /// This returns either the complete list, or an error. A partial list must never be returned,
    /// since missing tasks would be deleted from the calendar.
    async fn fetch(&self) -> Result<Vec<Task>, SourceError>;
}

/// A calendar that entries are mirrored to
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Returns every to-do of the calendar, including the ones we do not own
    async fn list_entries(&self) -> Result<Vec<RemoteEntry>, WriteError>;

    /// Store a new entry
    async fn create_entry(&self, entry: &CalendarEntry) -> Result<(), WriteError>;

    /// Overwrite an existing entry with new content
    async fn update_entry(&self, existing: &RemoteEntry, entry: &CalendarEntry) -> Result<(), WriteError>;

    /// Remove an entry
    async fn delete_entry(&self, existing: &RemoteEntry) -> Result<(), WriteError>;
}
