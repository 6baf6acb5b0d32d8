//! Computes what has to change in the calendar so that it mirrors the tasks

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::entry::{CalendarEntry, RemoteEntry};
use crate::task::{Origin, Task};

/// An entry that exists but whose content is outdated
#[derive(Clone, Debug, PartialEq)]
pub struct EntryUpdate {
    pub existing: RemoteEntry,
    pub desired: CalendarEntry,
}

/// The operations needed to make the calendar converge.
///
/// Every list is sorted by uid, so that a plan does not depend on the order of its inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    pub create: Vec<CalendarEntry>,
    pub update: Vec<EntryUpdate>,
    pub delete: Vec<RemoteEntry>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

/// Compare the desired tasks with the entries found in the calendar.
///
/// * Entries that we do not own are ignored.
/// * Completed tasks are removed from the calendar rather than kept.
/// * Entries of a `degraded` origin (whose fetch failed, or that is disabled) are never deleted,
///   since we do not know whether their task still exists.
///
/// `desired` should hold one task per uid, as [`normalize`](crate::normalize::normalize) returns.
/// Should a uid appear more than once anyway, the winner is picked by content, not by position.
pub fn plan(desired: &[Task], existing: &[RemoteEntry], degraded: &HashSet<Origin>) -> Plan {
    // uid -> owned entries with this uid, ordered by href so that the kept one is deterministic
    let mut existing_by_uid: BTreeMap<&str, Vec<&RemoteEntry>> = BTreeMap::new();
    for remote in existing {
        if remote.entry().is_program_owned() == false {
            log::trace!("Ignoring {}, which has not been created by us", remote);
            continue;
        }
        existing_by_uid.entry(remote.uid()).or_default().push(remote);
    }
    for entries in existing_by_uid.values_mut() {
        entries.sort_by(|a, b| a.href().as_str().cmp(b.href().as_str()));
    }

    let mut desired_by_uid: BTreeMap<String, &Task> = BTreeMap::new();
    for task in desired {
        match desired_by_uid.entry(task.uid()) {
            Entry::Vacant(slot) => { slot.insert(task); },
            Entry::Occupied(mut slot) => {
                log::debug!("{} is desired more than once", slot.key());
                if content_key(task) > content_key(slot.get()) {
                    slot.insert(task);
                }
            },
        }
    }

    let mut plan = Plan::default();

    for (uid, task) in &desired_by_uid {
        let wanted = CalendarEntry::from_task(task);
        match existing_by_uid.get(uid.as_str()).and_then(|entries| entries.first()) {
            None => {
                if task.completed() {
                    log::trace!("{} is completed and not in the calendar", uid);
                } else {
                    log::debug!("{} is a new task", uid);
                    plan.create.push(wanted);
                }
            },
            Some(current) => {
                if task.completed() {
                    log::debug!("{} has been completed", uid);
                    plan.delete.push((*current).clone());
                } else if current.entry().has_same_content_as(&wanted) {
                    log::trace!("{} is up to date", uid);
                } else {
                    log::debug!("{} has changed", uid);
                    plan.update.push(EntryUpdate {
                        existing: (*current).clone(),
                        desired: wanted,
                    });
                }
            },
        }
    }

    for (uid, entries) in &existing_by_uid {
        let duplicates = if desired_by_uid.contains_key(*uid) {
            // The first one has been handled above
            &entries[1..]
        } else {
            log::debug!("{} has no matching task anymore", uid);
            &entries[..]
        };
        for remote in duplicates {
            match remote.entry().owner() {
                Some(origin) if degraded.contains(&origin) => {
                    log::info!("Not deleting {}, since {} data is unavailable for this run", remote, origin);
                },
                _ => plan.delete.push((*remote).clone()),
            }
        }
    }

    plan.delete.sort_by(|a, b| a.uid().cmp(b.uid()).then_with(|| a.href().as_str().cmp(b.href().as_str())));
    plan
}

/// A total order on the content of tasks that share a uid
fn content_key(task: &Task) -> (bool, &str, Option<&DateTime<Utc>>, Option<&str>, Option<&str>) {
    (task.completed(), task.title(), task.due_at(), task.course_label(), task.url())
}
