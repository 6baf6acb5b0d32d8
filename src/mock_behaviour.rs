//! This module provides an in-memory calendar whose operations can be told to fail, for unit tests
#![cfg(test)]

use std::sync::Mutex;

use async_trait::async_trait;

use crate::entry::{CalendarEntry, RemoteEntry};
use crate::error::WriteError;
use crate::traits::CalendarStore;

/// This stores some behaviour tweaks, that describe how a mocked instance will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter.
/// Failures are reported as `error`, which is transient unless told otherwise.
#[derive(Clone, Debug)]
pub struct MockBehaviour {
    pub list_entries_behaviour: (u32, u32),
    pub create_entry_behaviour: (u32, u32),
    pub update_entry_behaviour: (u32, u32),
    pub delete_entry_behaviour: (u32, u32),
    pub error: WriteError,
}

impl Default for MockBehaviour {
    fn default() -> Self {
        Self {
            list_entries_behaviour: (0, 0),
            create_entry_behaviour: (0, 0),
            update_entry_behaviour: (0, 0),
            delete_entry_behaviour: (0, 0),
            error: WriteError::Transient("mocked failure".to_string()),
        }
    }
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All items will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            list_entries_behaviour: (0, n_fails),
            create_entry_behaviour: (0, n_fails),
            update_entry_behaviour: (0, n_fails),
            delete_entry_behaviour: (0, n_fails),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: WriteError) -> Self {
        self.error = error;
        self
    }

    pub fn can_list_entries(&mut self) -> Result<(), WriteError> {
        decrement(&mut self.list_entries_behaviour, "list_entries", &self.error)
    }
    pub fn can_create_entry(&mut self) -> Result<(), WriteError> {
        decrement(&mut self.create_entry_behaviour, "create_entry", &self.error)
    }
    pub fn can_update_entry(&mut self) -> Result<(), WriteError> {
        decrement(&mut self.update_entry_behaviour, "update_entry", &self.error)
    }
    pub fn can_delete_entry(&mut self) -> Result<(), WriteError> {
        decrement(&mut self.delete_entry_behaviour, "delete_entry", &self.error)
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str, error: &WriteError) -> Result<(), WriteError> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(error.clone())
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}


/// A calendar that lives in memory
#[derive(Debug, Default)]
pub struct MockCalendar {
    entries: Mutex<Vec<RemoteEntry>>,
    behaviour: Mutex<MockBehaviour>,
    /// Every mutating call that reached the calendar, failed or not
    calls: Mutex<Vec<String>>,
}

impl MockCalendar {
    pub fn new(entries: Vec<RemoteEntry>, behaviour: MockBehaviour) -> Self {
        Self {
            entries: Mutex::new(entries),
            behaviour: Mutex::new(behaviour),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn href_for(uid: &str) -> url::Url {
    format!("https://cal.example.com/dav/tasks/{}.ics", uid).parse().unwrap()
}

#[async_trait]
impl CalendarStore for MockCalendar {
    async fn list_entries(&self) -> Result<Vec<RemoteEntry>, WriteError> {
        self.behaviour.lock().unwrap().can_list_entries()?;
        Ok(self.entries())
    }

    async fn create_entry(&self, entry: &CalendarEntry) -> Result<(), WriteError> {
        self.record(format!("create {}", entry.uid()));
        self.behaviour.lock().unwrap().can_create_entry()?;
        let remote = RemoteEntry::new(href_for(entry.uid()), Some("\"1\"".to_string()), entry.clone());
        self.entries.lock().unwrap().push(remote);
        Ok(())
    }

    async fn update_entry(&self, existing: &RemoteEntry, entry: &CalendarEntry) -> Result<(), WriteError> {
        self.record(format!("update {}", entry.uid()));
        self.behaviour.lock().unwrap().can_update_entry()?;
        let mut entries = self.entries.lock().unwrap();
        for e in entries.iter_mut() {
            if e.href() == existing.href() {
                *e = RemoteEntry::new(existing.href().clone(), Some("\"2\"".to_string()), entry.clone());
                return Ok(());
            }
        }
        Err(WriteError::Permanent(format!("{} does not exist", existing)))
    }

    async fn delete_entry(&self, existing: &RemoteEntry) -> Result<(), WriteError> {
        self.record(format!("delete {}", existing.uid()));
        self.behaviour.lock().unwrap().can_delete_entry()?;
        self.entries.lock().unwrap().retain(|e| e.href() != existing.href());
        Ok(())
    }
}
