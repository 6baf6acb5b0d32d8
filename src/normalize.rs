//! Merges the task lists of every source into a single ordered sequence

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::task::{Origin, Task};

/// Deduplicate tasks by `(origin, source_id)` and sort them.
///
/// When a key appears more than once, the later occurrence wins.
/// Tasks are sorted by due date (undated last), then by origin, then by source id.
pub fn normalize<I>(task_lists: I) -> Vec<Task>
where
    I: IntoIterator<Item = Vec<Task>>,
{
    let mut by_key: HashMap<(Origin, String), Task> = HashMap::new();
    for list in task_lists {
        for task in list {
            let (origin, source_id) = task.key();
            let key = (origin, source_id.to_string());
            if by_key.insert(key, task).is_some() {
                log::debug!("Duplicate task in upstream data, keeping the later one");
            }
        }
    }

    let mut tasks: Vec<Task> = by_key.into_iter().map(|(_, task)| task).collect();
    tasks.sort_by(compare_tasks);
    tasks
}

fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    let by_due = match (a.due_at(), b.due_at()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_due
        .then_with(|| a.origin().cmp(&b.origin()))
        .then_with(|| a.source_id().cmp(b.source_id()))
}
