//! This module provides a client to connect to a CalDAV calendar
//!
//! The configured URL may point to the calendar collection itself. Otherwise, the calendar is discovered
//! from the principal of the user, through its calendar home set.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use minidom::Element;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, Response};
use url::Url;

use crate::config::CalDavConfig;
use crate::entry::{CalendarEntry, RemoteEntry};
use crate::error::WriteError;
use crate::resource::Resource;
use crate::traits::CalendarStore;
use crate::utils::{find_elem, find_elems};

static DAVCLIENT_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:resourcetype />
           <d:current-user-principal />
       </d:prop>
    </d:propfind>
"#;

static HOMESET_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
      <d:self/>
      <d:prop>
        <c:calendar-home-set />
      </d:prop>
    </d:propfind>
"#;

static CAL_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
       <d:prop>
         <d:displayname />
         <d:resourcetype />
         <c:supported-calendar-component-set />
       </d:prop>
    </d:propfind>
"#;

static TASKS_BODY: &str = r#"
    <c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
        <d:prop>
            <d:getetag />
            <c:calendar-data />
        </d:prop>
        <c:filter>
            <c:comp-filter name="VCALENDAR">
                <c:comp-filter name="VTODO" />
            </c:comp-filter>
        </c:filter>
    </c:calendar-query>
"#;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);


/// A calendar collection listed in a calendar home set
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveredCalendar {
    pub url: Url,
    pub display_name: Option<String>,
}

/// A CalDAV calendar collection, reached over HTTP with basic authentication
pub struct Client {
    resource: Resource,
    http: reqwest::Client,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new(calendar_url: Url, username: String, password: String) -> Result<Self, WriteError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            resource: Resource::new(calendar_url, username, password),
            http,
        })
    }

    /// Create a client and point it to the configured calendar, discovering it if needed
    pub async fn from_config(config: &CalDavConfig) -> Result<Self, WriteError> {
        let mut client = Self::new(config.calendar_url.clone(), config.username.clone(), config.password.clone())?;
        client.discover(config.calendar_name.as_deref()).await?;
        Ok(client)
    }

    /// Find the calendar collection this client should work on.
    ///
    /// When no `calendar_name` is given and the current URL already is a calendar collection, it is kept as is.
    /// Otherwise, the calendars of the current user are listed, and the one whose display name is `calendar_name`
    /// is chosen. The first calendar is used when there is no such calendar.
    pub async fn discover(&mut self, calendar_name: Option<&str>) -> Result<(), WriteError> {
        let url = self.resource.url().clone();
        let root = self.propfind(&url, DAVCLIENT_BODY, 0).await?;
        if calendar_name.is_none() && is_calendar(&root) {
            log::debug!("{} is a calendar collection", url);
            return Ok(());
        }

        let principal = self.find_href(&root, "current-user-principal")
            .ok_or_else(|| WriteError::Permanent(format!("{} does not tell the principal URL", url)))?;
        log::debug!("Principal URL is {}", principal);

        let root = self.propfind(&principal, HOMESET_BODY, 0).await?;
        let home_set = self.find_href(&root, "calendar-home-set")
            .ok_or_else(|| WriteError::Permanent(format!("{} does not tell its calendar home set", principal)))?;
        log::debug!("Calendar home set URL is {:?}", home_set.path());

        let calendars = self.list_calendars(&home_set).await?;
        let chosen = select_calendar(&calendars, calendar_name)
            .ok_or_else(|| WriteError::Permanent(format!("No task calendar found in {}", home_set)))?;
        log::info!("Using calendar {} at {}", chosen.display_name.as_deref().unwrap_or("<no name>"), chosen.url);

        self.resource = self.resource.with_url(chosen.url.clone());
        Ok(())
    }

    /// The calendars of a calendar home set that can hold to-dos
    pub async fn list_calendars(&self, home_set: &Url) -> Result<Vec<DiscoveredCalendar>, WriteError> {
        let root = self.propfind(home_set, CAL_BODY, 1).await?;

        let mut calendars = Vec::new();
        for rep in find_elems(&root, "response") {
            let display_name = find_elem(rep, "displayname")
                .map(|e| e.text().trim().to_string())
                .filter(|name| name.is_empty() == false);
            log::debug!("Considering calendar {}", display_name.as_deref().unwrap_or("<no name>"));

            if is_calendar(rep) == false {
                continue;
            }

            // The root calendar collection has an empty supported-calendar-component-set
            let el_supported_comps = match find_elem(rep, "supported-calendar-component-set") {
                None => continue,
                Some(comps) => comps,
            };
            if el_supported_comps.children().count() == 0 {
                continue;
            }
            let supports_todos = el_supported_comps.children()
                .any(|comp| comp.attr("name").map(|name| name.eq_ignore_ascii_case("VTODO")).unwrap_or(false));
            if supports_todos == false {
                log::debug!("Calendar {:?} cannot hold to-dos, ignoring it", display_name);
                continue;
            }

            let url = match find_elem(rep, "href") {
                None => {
                    log::warn!("Calendar {:?} has no URL! Ignoring it.", display_name);
                    continue;
                },
                Some(h) => self.resolve_href(h.text().trim()),
            };
            calendars.push(DiscoveredCalendar { url, display_name });
        }
        Ok(calendars)
    }

    async fn propfind(&self, url: &Url, body: &'static str, depth: u32) -> Result<Element, WriteError> {
        let method = Method::from_bytes(b"PROPFIND")
            .expect("cannot create PROPFIND method.");

        let response = self.resource.authenticate(self.http.request(method, url.clone()))
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;

        if response.status().is_success() == false {
            return Err(WriteError::from_status(response.status(), &format!("PROPFIND {}", url)));
        }
        let text = response.text().await?;
        text.parse()
            .map_err(|err| WriteError::Permanent(format!("Invalid PROPFIND response from {}: {}", url, err)))
    }

    /// The URL held by the `href` of a property
    fn find_href(&self, root: &Element, property: &str) -> Option<Url> {
        find_elem(root, property)
            .and_then(|prop| find_elem(prop, "href"))
            .map(|href| href.text().trim().to_string())
            .filter(|href| href.is_empty() == false)
            .map(|href| self.resolve_href(&href))
    }

    pub fn url(&self) -> &Url {
        self.resource.url()
    }

    /// The URL a new entry is stored at
    fn entry_url(&self, entry: &CalendarEntry) -> Url {
        let file_name = format!("{}.ics", sanitize_filename::sanitize(entry.uid()));
        self.resource.child(&file_name).url().clone()
    }

    fn resolve_href(&self, href: &str) -> Url {
        match Url::parse(href) {
            Ok(absolute) => absolute,
            Err(_) => self.resource.combine(href).url().clone(),
        }
    }

    async fn put(&self, url: Url, entry: &CalendarEntry, precondition: (&'static str, &str)) -> Result<(), WriteError> {
        let ical_text = crate::ical::build_from(entry, &Utc::now());
        log::trace!("PUT {}\n{}", url, ical_text);

        let response = self.resource.authenticate(self.http.put(url.clone()))
            .header(precondition.0, precondition.1)
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .header(CONTENT_LENGTH, ical_text.len())
            .body(ical_text)
            .send()
            .await?;

        expect_success(response, &format!("PUT {}", url))
    }
}

/// Whether the first `resourcetype` of a PROPFIND response says "calendar"
fn is_calendar(root: &Element) -> bool {
    find_elem(root, "resourcetype")
        .map(|rt| rt.children().any(|resource_type| resource_type.name() == "calendar"))
        .unwrap_or(false)
}

fn select_calendar<'a>(calendars: &'a [DiscoveredCalendar], name: Option<&str>) -> Option<&'a DiscoveredCalendar> {
    if let Some(name) = name {
        match calendars.iter().find(|cal| cal.display_name.as_deref() == Some(name)) {
            Some(cal) => return Some(cal),
            None => log::warn!("No calendar is named {:?}, falling back to the first one", name),
        }
    }
    calendars.first()
}

fn expect_success(response: Response, context: &str) -> Result<(), WriteError> {
    if response.status().is_success() == false {
        return Err(WriteError::from_status(response.status(), context));
    }
    Ok(())
}

#[async_trait]
impl CalendarStore for Client {
    async fn list_entries(&self) -> Result<Vec<RemoteEntry>, WriteError> {
        let method = Method::from_bytes(b"REPORT")
            .expect("cannot create REPORT method.");

        let response = self.resource.authenticate(self.http.request(method, self.resource.url().clone()))
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml")
            .body(TASKS_BODY)
            .send()
            .await?;

        if response.status().is_success() == false {
            return Err(WriteError::from_status(response.status(), &format!("REPORT {}", self.resource.url())));
        }
        let text = response.text().await?;

        let root: Element = text.parse()
            .map_err(|err| WriteError::Permanent(format!("Invalid REPORT response from {}: {}", self.resource.url(), err)))?;

        let mut entries = Vec::new();
        for response in find_elems(&root, "response") {
            let href = match find_elem(response, "href") {
                None => {
                    log::warn!("Unable to extract HREF");
                    continue;
                },
                Some(elem) => self.resolve_href(elem.text().trim()),
            };

            let etag = find_elem(response, "getetag")
                .map(|elem| elem.text().trim().to_string())
                .filter(|etag| etag.is_empty() == false);

            let data = match find_elem(response, "calendar-data") {
                None => {
                    log::debug!("No calendar data for {}, ignoring it", href);
                    continue;
                },
                Some(elem) => elem.text(),
            };

            match crate::ical::parse(&data) {
                Err(err) => log::debug!("Skipping {}, which we could not parse: {}", href, err),
                Ok(entry) => entries.push(RemoteEntry::new(href, etag, entry)),
            }
        }

        log::debug!("Found {} to-dos in {}", entries.len(), self.resource.url());
        Ok(entries)
    }

    async fn create_entry(&self, entry: &CalendarEntry) -> Result<(), WriteError> {
        let url = self.entry_url(entry);
        self.put(url, entry, ("If-None-Match", "*")).await
    }

    async fn update_entry(&self, existing: &RemoteEntry, entry: &CalendarEntry) -> Result<(), WriteError> {
        match existing.etag() {
            Some(etag) => self.put(existing.href().clone(), entry, ("If-Match", etag)).await,
            None => {
                log::debug!("No ETag known for {}, overwriting it unconditionally", existing);
                self.put(existing.href().clone(), entry, ("If-Match", "*")).await
            },
        }
    }

    async fn delete_entry(&self, existing: &RemoteEntry) -> Result<(), WriteError> {
        let mut request = self.resource.authenticate(self.http.delete(existing.href().clone()));
        if let Some(etag) = existing.etag() {
            request = request.header("If-Match", etag);
        }
        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            log::debug!("{} was already deleted", existing);
            return Ok(());
        }
        expect_success(response, &format!("DELETE {}", existing.href()))
    }
}
