//! Calendar items (iCal `VTODO`) that mirror tasks

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Timelike, Utc};
use url::Url;

use crate::task::{parse_uid, Origin, Task};

/// Secondary data mirrored from a task
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub course_label: Option<String>,
    pub url: Option<String>,
}

/// The content of a calendar to-do, as we write it (or read it back)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEntry {
    uid: String,
    summary: String,
    /// Second precision, since this is what iCal stores
    due_at: Option<DateTime<Utc>>,
    metadata: EntryMetadata,
}

impl CalendarEntry {
    /// Text fields are stored the way they read back from a server: with `\n` line breaks and no trailing whitespace
    pub fn new(uid: String, summary: String, due_at: Option<DateTime<Utc>>, metadata: EntryMetadata) -> Self {
        Self {
            uid,
            summary: canonical_text(&summary),
            due_at: due_at.and_then(|dt| dt.with_nanosecond(0)),
            metadata: EntryMetadata {
                course_label: metadata.course_label.as_deref().map(canonical_text),
                url: metadata.url.as_deref().map(canonical_text),
            },
        }
    }

    /// Build the entry a task should be mirrored to
    pub fn from_task(task: &Task) -> Self {
        Self::new(
            task.uid(),
            task.title().to_string(),
            task.due_at().cloned(),
            EntryMetadata {
                course_label: task.course_label().map(String::from),
                url: task.url().map(String::from),
            },
        )
    }

    pub fn uid(&self) -> &str                       { &self.uid }
    pub fn summary(&self) -> &str                   { &self.summary }
    pub fn due_at(&self) -> Option<&DateTime<Utc>>  { self.due_at.as_ref() }
    pub fn metadata(&self) -> &EntryMetadata        { &self.metadata }

    /// The origin of this entry, or `None` if it has not been created by us
    pub fn owner(&self) -> Option<Origin> {
        parse_uid(&self.uid).map(|(origin, _)| origin)
    }

    pub fn is_program_owned(&self) -> bool {
        self.owner().is_some()
    }

    /// Whether both entries would look the same in a calendar app.
    /// The uid is not compared.
    pub fn has_same_content_as(&self, other: &CalendarEntry) -> bool {
           self.summary == other.summary
        && self.due_at == other.due_at
        && self.metadata == other.metadata
    }
}


fn canonical_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}


/// An entry that exists on the CalDAV server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    href: Url,
    /// The `ETag` the server gave us, if any
    etag: Option<String>,
    entry: CalendarEntry,
}

impl RemoteEntry {
    pub fn new(href: Url, etag: Option<String>, entry: CalendarEntry) -> Self {
        Self { href, etag, entry }
    }

    pub fn href(&self) -> &Url              { &self.href }
    pub fn etag(&self) -> Option<&str>      { self.etag.as_deref() }
    pub fn entry(&self) -> &CalendarEntry   { &self.entry }
    pub fn uid(&self) -> &str               { self.entry.uid() }
}

impl Display for RemoteEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.entry.uid(), self.href)
    }
}
