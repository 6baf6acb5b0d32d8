//! A module to parse ICal files

use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ical::parser::ical::component::IcalTodo;
use ical::property::Property;

use crate::entry::{CalendarEntry, EntryMetadata};
use crate::ical::COURSE_PROPERTY;

/// Parse an iCal file into a [`CalendarEntry`]
///
/// Only the first `VTODO` is considered. Properties that we do not write are ignored.
pub fn parse(content: &str) -> Result<CalendarEntry, Box<dyn Error>> {
    let mut reader = ical::IcalParser::new(content.as_bytes());
    let calendar = match reader.next() {
        None => return Err("Empty iCal data".into()),
        Some(Err(err)) => return Err(format!("Unable to parse iCal data: {}", err).into()),
        Some(Ok(calendar)) => calendar,
    };

    let todo: &IcalTodo = match calendar.todos.first() {
        None => return Err("No VTODO in iCal data".into()),
        Some(todo) => todo,
    };

    let mut uid = None;
    let mut summary = None;
    let mut due_at = None;
    let mut metadata = EntryMetadata::default();
    for prop in &todo.properties {
        match prop.name.as_str() {
            "UID" => uid = prop.value.clone(),
            "SUMMARY" => summary = prop.value.as_deref().map(unescape_text),
            "DUE" => due_at = parse_date_time(prop)?,
            "DESCRIPTION" => metadata.url = prop.value.as_deref().map(unescape_text),
            name if name == COURSE_PROPERTY => metadata.course_label = prop.value.as_deref().map(unescape_text),
            _ => continue,
        }
    }

    let uid = match uid {
        Some(uid) if uid.is_empty() == false => uid,
        _ => return Err("Missing UID in VTODO".into()),
    };

    Ok(CalendarEntry::new(uid, summary.unwrap_or_default(), due_at, metadata))
}

/// Parse a `DUE`-like property.
///
/// Floating times and times with a `TZID` are read as UTC, dates as midnight UTC.
fn parse_date_time(prop: &Property) -> Result<Option<DateTime<Utc>>, Box<dyn Error>> {
    let value = match &prop.value {
        None => return Ok(None),
        Some(v) => v.trim(),
    };

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")?;
        return Ok(Some(Utc.from_utc_datetime(&naive)));
    }
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or("Invalid date")?;
        return Ok(Some(Utc.from_utc_datetime(&midnight)));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")?;
    log::trace!("Reading floating or zoned date {} as UTC", value);
    Ok(Some(Utc.from_utc_datetime(&naive)))
}

/// Revert the escaping of iCal TEXT values (RFC 5545, 3.3.11)
fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}


#[cfg(test)]
mod test {
    const EXAMPLE_ICAL: &str = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//coursework-sync//coursework-sync//EN
BEGIN:VTODO
UID:gradescope-101
DTSTAMP:20240820T083000Z
SUMMARY:HW1\; with ÜTF-8\, and a comma
DUE:20240901T235900Z
X-COURSEWORK-COURSE:CS 61A
CATEGORIES:Gradescope,CS 61A
DESCRIPTION:https://www.gradescope.com/courses/1/assignments/101
STATUS:COMPLETED
END:VTODO
END:VCALENDAR
"#;

    const NEXTCLOUD_ICAL: &str = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Nextcloud Tasks v0.13.6
BEGIN:VTODO
UID:0633de27-8c32-42be-bcb8-63bc879c6185
CREATED:20210321T001600
LAST-MODIFIED:20210321T001600
DTSTAMP:20210321T001600
SUMMARY:Do not forget to do this
DUE;VALUE=DATE:20210401
END:VTODO
END:VCALENDAR
"#;

    const NO_UID_ICAL: &str = r#"BEGIN:VCALENDAR
VERSION:2.0
BEGIN:VTODO
SUMMARY:Orphan
END:VTODO
END:VCALENDAR
"#;

    use super::*;
    use chrono::Utc;
    use crate::ical::build_from;

    #[test]
    fn test_ical_parsing() {
        let entry = parse(EXAMPLE_ICAL).unwrap();

        assert_eq!(entry.uid(), "gradescope-101");
        assert_eq!(entry.summary(), "HW1; with ÜTF-8, and a comma");
        assert_eq!(entry.due_at().unwrap().to_rfc3339(), "2024-09-01T23:59:00+00:00");
        assert_eq!(entry.metadata().course_label.as_deref(), Some("CS 61A"));
        assert_eq!(entry.metadata().url.as_deref(), Some("https://www.gradescope.com/courses/1/assignments/101"));
    }

    #[test]
    fn test_foreign_ical_parsing() {
        let entry = parse(NEXTCLOUD_ICAL).unwrap();
        assert_eq!(entry.summary(), "Do not forget to do this");
        assert_eq!(entry.due_at().unwrap().to_rfc3339(), "2021-04-01T00:00:00+00:00");
        assert!(entry.is_program_owned() == false);
    }

    #[test]
    fn test_missing_uid() {
        assert!(parse(NO_UID_ICAL).is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_built_entries_read_back_identical() {
        let entry = parse(EXAMPLE_ICAL).unwrap();
        let rebuilt = parse(&build_from(&entry, &Utc::now())).unwrap();
        assert_eq!(rebuilt, entry);
    }

    #[test]
    fn test_whitespace_and_line_breaks_read_back_identical() {
        let summaries = ["  Leading and trailing spaces  ", "Line one\r\nLine two", "Tab\tand back\\slash", "Trailing newline\n"];
        for summary in summaries.iter() {
            let metadata = EntryMetadata { course_label: Some("  Course  ".to_string()), url: None };
            let entry = CalendarEntry::new("canvas-quiz-7".to_string(), summary.to_string(), None, metadata);
            let read_back = parse(&build_from(&entry, &Utc::now())).unwrap();
            assert!(read_back.has_same_content_as(&entry), "{:?} read back as {:?}", entry, read_back);
        }
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_text(r"a\,b\;c\\d\ne"), "a,b;c\\d\ne");
        assert_eq!(unescape_text(r"trailing\"), "trailing\\");
    }
}
