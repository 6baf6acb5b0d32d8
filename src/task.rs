//! Tasks fetched from upstream services, in their canonical form

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};

/// The upstream service a task comes from
///
/// The variant order is part of the task ordering (see [`crate::normalize`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Gradescope,
    Canvas,
}

impl Origin {
    pub const ALL: [Origin; 2] = [Origin::Gradescope, Origin::Canvas];

    /// The prefix used in calendar uids
    pub fn uid_prefix(&self) -> &'static str {
        match self {
            Origin::Gradescope => "gradescope",
            Origin::Canvas => "canvas",
        }
    }

    /// Human-readable name, used as an iCal category
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Gradescope => "Gradescope",
            Origin::Canvas => "Canvas",
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}


/// An assignment (or any to-do) as reported by its origin
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    origin: Origin,
    /// Stable identifier within the origin
    source_id: String,
    title: String,
    due_at: Option<DateTime<Utc>>,
    course_label: Option<String>,
    /// Link back to the assignment page
    url: Option<String>,
    completed: bool,
}

impl Task {
    pub fn new<S: ToString, T: ToString>(origin: Origin, source_id: S, title: T) -> Self {
        Self {
            origin,
            source_id: source_id.to_string(),
            title: title.to_string(),
            due_at: None,
            course_label: None,
            url: None,
            completed: false,
        }
    }

    pub fn with_due(mut self, due_at: Option<DateTime<Utc>>) -> Self {
        self.due_at = due_at;
        self
    }

    pub fn with_course(mut self, course_label: Option<String>) -> Self {
        self.course_label = course_label;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn origin(&self) -> Origin                  { self.origin }
    pub fn source_id(&self) -> &str                 { &self.source_id }
    pub fn title(&self) -> &str                     { &self.title }
    pub fn due_at(&self) -> Option<&DateTime<Utc>>  { self.due_at.as_ref() }
    pub fn course_label(&self) -> Option<&str>      { self.course_label.as_deref() }
    pub fn url(&self) -> Option<&str>               { self.url.as_deref() }
    pub fn completed(&self) -> bool                 { self.completed }

    /// The identity of this task across runs
    pub fn key(&self) -> (Origin, &str) {
        (self.origin, &self.source_id)
    }

    /// The calendar uid this task is mirrored to
    pub fn uid(&self) -> String {
        uid(self.origin, &self.source_id)
    }
}


/// Build the calendar uid of a task. This only depends on the task identity.
pub fn uid(origin: Origin, source_id: &str) -> String {
    format!("{}-{}", origin.uid_prefix(), source_id)
}

/// Recover `(origin, source_id)` from a uid, if this uid belongs to us
pub fn parse_uid(uid: &str) -> Option<(Origin, &str)> {
    Origin::ALL.iter().find_map(|origin| {
        let source_id = uid.strip_prefix(origin.uid_prefix())?.strip_prefix('-')?;
        if source_id.is_empty() {
            None
        } else {
            Some((*origin, source_id))
        }
    })
}
