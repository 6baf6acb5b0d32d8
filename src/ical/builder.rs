//! A module to build ICal files

use chrono::{DateTime, Utc};
use ics::components::Property;
use ics::properties::{Categories, Description, Due, Status, Summary};
use ics::{escape_text, ICalendar, ToDo};

use crate::entry::CalendarEntry;
use crate::ical::{default_prod_id, COURSE_PROPERTY};

/// Create an iCal `VTODO` for an entry.
///
/// `dtstamp` is the creation time of this iCal object (usually now).
/// The status is always `NEEDS-ACTION`: the calendar user is free to change it, and it will
/// be preserved until the entry is rewritten because its task has changed.
pub fn build_from(entry: &CalendarEntry, dtstamp: &DateTime<Utc>) -> String {
    let mut todo = ToDo::new(entry.uid(), format_date_time(dtstamp));
    todo.push(Summary::new(escape_text(entry.summary())));

    if let Some(due) = entry.due_at() {
        todo.push(Due::new(format_date_time(due)));
    }

    let mut categories = Vec::new();
    if let Some(origin) = entry.owner() {
        categories.push(escape_text(origin.label()).to_string());
    }
    if let Some(course) = &entry.metadata().course_label {
        categories.push(escape_text(course.as_str()).to_string());
        todo.push(Property::new(COURSE_PROPERTY, escape_text(course.as_str())));
    }
    if categories.is_empty() == false {
        todo.push(Categories::new(categories.join(",")));
    }

    if let Some(url) = &entry.metadata().url {
        todo.push(Description::new(escape_text(url.as_str())));
    }
    todo.push(Status::needs_action());

    let mut calendar = ICalendar::new("2.0", default_prod_id());
    calendar.add_todo(todo);

    calendar.to_string()
}

pub(crate) fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
