//! Tests of the CalDAV client, against a mocked server

use chrono::{DateTime, Utc};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coursework_sync::client::Client;
use coursework_sync::entry::{CalendarEntry, EntryMetadata, RemoteEntry};
use coursework_sync::error::WriteError;
use coursework_sync::traits::CalendarStore;

const BASIC_AUTH: &str = "Basic am9objpzZWNyZXQ=";
const CALENDAR_PATH: &str = "/dav/calendars/john/school/";

const FOREIGN_TODO: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Nextcloud Tasks v0.13.6
BEGIN:VTODO
UID:0633de27-8c32-42be-bcb8-63bc879c6185
SUMMARY:Buy milk
STATUS:NEEDS-ACTION
END:VTODO
END:VCALENDAR
";

const NO_UID_TODO: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Someone//EN
BEGIN:VTODO
SUMMARY:Who am I
END:VTODO
END:VCALENDAR
";


fn client(server: &MockServer) -> Client {
    let url: Url = format!("{}{}", server.uri(), CALENDAR_PATH).parse().unwrap();
    Client::new(url, "john".to_string(), "secret".to_string()).unwrap()
}

fn hw1() -> CalendarEntry {
    let due: DateTime<Utc> = "2024-09-01T23:59:00Z".parse().unwrap();
    CalendarEntry::new(
        "gradescope-456".to_string(),
        "HW 1".to_string(),
        Some(due),
        EntryMetadata {
            course_label: Some("CS 61A".to_string()),
            url: Some("https://www.gradescope.com/courses/1/assignments/456".to_string()),
        },
    )
}

fn remote(server: &MockServer, file_name: &str, etag: Option<&str>) -> RemoteEntry {
    let href: Url = format!("{}{}{}", server.uri(), CALENDAR_PATH, file_name).parse().unwrap();
    RemoteEntry::new(href, etag.map(String::from), hw1())
}

fn multistatus_response(file_name: &str, etag: &str, ical: &str) -> String {
    format!(r#"<d:response>
        <d:href>{}{}</d:href>
        <d:propstat>
            <d:prop>
                <d:getetag>{}</d:getetag>
                <cal:calendar-data>{}</cal:calendar-data>
            </d:prop>
            <d:status>HTTP/1.1 200 OK</d:status>
        </d:propstat>
    </d:response>"#, CALENDAR_PATH, file_name, etag, ical)
}

fn multistatus(responses: &[String]) -> String {
    format!(r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">{}</d:multistatus>"#, responses.join(""))
}


#[tokio::test]
async fn test_list_entries() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    let now: DateTime<Utc> = "2024-08-20T08:30:00Z".parse().unwrap();
    let body = multistatus(&[
        multistatus_response("gradescope-456.ics", "\"abc\"", &coursework_sync::ical::build_from(&hw1(), &now)),
        multistatus_response("milk.ics", "\"def\"", FOREIGN_TODO),
        multistatus_response("broken.ics", "\"ghi\"", NO_UID_TODO),
    ]);

    Mock::given(method("REPORT"))
        .and(path(CALENDAR_PATH))
        .and(header("Depth", "1"))
        .and(header("Authorization", BASIC_AUTH))
        .and(body_string_contains("VTODO"))
        .respond_with(ResponseTemplate::new(207).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let entries = client(&server).list_entries().await.unwrap();
    assert_eq!(entries.len(), 2);

    let owned = &entries[0];
    assert_eq!(owned.uid(), "gradescope-456");
    assert_eq!(owned.etag(), Some("\"abc\""));
    assert_eq!(owned.href().as_str(), format!("{}{}gradescope-456.ics", server.uri(), CALENDAR_PATH));
    assert!(owned.entry().has_same_content_as(&hw1()));

    let foreign = &entries[1];
    assert_eq!(foreign.entry().summary(), "Buy milk");
    assert!(foreign.entry().is_program_owned() == false);
}

#[tokio::test]
async fn test_create_entry() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("{}gradescope-456.ics", CALENDAR_PATH)))
        .and(header("If-None-Match", "*"))
        .and(header("Authorization", BASIC_AUTH))
        .and(body_string_contains("UID:gradescope-456"))
        .and(body_string_contains("SUMMARY:HW 1"))
        .and(body_string_contains("DUE:20240901T235900Z"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).create_entry(&hw1()).await.unwrap();
}

#[tokio::test]
async fn test_update_entry_uses_etag() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("{}some-other-name.ics", CALENDAR_PATH)))
        .and(header("If-Match", "\"abc\""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let existing = remote(&server, "some-other-name.ics", Some("\"abc\""));
    client(&server).update_entry(&existing, &hw1()).await.unwrap();
}

#[tokio::test]
async fn test_delete_entry() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}gradescope-456.ics", CALENDAR_PATH)))
        .and(header("If-Match", "\"abc\""))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}already-gone.ics", CALENDAR_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.delete_entry(&remote(&server, "gradescope-456.ics", Some("\"abc\""))).await.unwrap();
    // Already deleted is just as good
    client.delete_entry(&remote(&server, "already-gone.ics", None)).await.unwrap();
}

#[tokio::test]
async fn test_status_classification() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    Mock::given(method("REPORT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}gradescope-456.ics", CALENDAR_PATH)))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}locked.ics", CALENDAR_PATH)))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client(&server);

    let listed = client.list_entries().await;
    assert!(matches!(listed, Err(WriteError::Transient(_))), "{:?}", listed);

    let created = client.create_entry(&hw1()).await;
    assert!(matches!(created, Err(WriteError::Permanent(_))), "{:?}", created);

    let updated = client.update_entry(&remote(&server, "locked.ics", None), &hw1()).await;
    assert!(matches!(updated, Err(WriteError::AuthFailure(_))), "{:?}", updated);
}


fn propfind_response(href: &str, props: &str) -> String {
    format!(r#"<d:response>
        <d:href>{}</d:href>
        <d:propstat>
            <d:prop>{}</d:prop>
            <d:status>HTTP/1.1 200 OK</d:status>
        </d:propstat>
    </d:response>"#, href, props)
}

fn calendar_props(name: &str, components: &[&str]) -> String {
    let comps: Vec<String> = components.iter().map(|c| format!(r#"<cal:comp name="{}"/>"#, c)).collect();
    format!(r#"<d:displayname>{}</d:displayname>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
        <cal:supported-calendar-component-set>{}</cal:supported-calendar-component-set>"#, name, comps.join(""))
}

/// A server whose root leads to the calendars of john: Personal, Birthdays (events only) and School
async fn mount_discovery(server: &MockServer) {
    let root = propfind_response("/", r#"<d:resourcetype><d:collection/></d:resourcetype>
        <d:current-user-principal><d:href>/dav/principals/john/</d:href></d:current-user-principal>"#);
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .and(header("Depth", "0"))
        .and(header("Authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[root])))
        .mount(server)
        .await;

    let principal = propfind_response("/dav/principals/john/",
        r#"<cal:calendar-home-set><d:href>/dav/calendars/john/</d:href></cal:calendar-home-set>"#);
    Mock::given(method("PROPFIND"))
        .and(path("/dav/principals/john/"))
        .and(body_string_contains("calendar-home-set"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[principal])))
        .mount(server)
        .await;

    let calendars = vec![
        propfind_response("/dav/calendars/john/", r#"<d:resourcetype><d:collection/></d:resourcetype>"#),
        propfind_response("/dav/calendars/john/personal/", &calendar_props("Personal", &["VEVENT", "VTODO"])),
        propfind_response("/dav/calendars/john/birthdays/", &calendar_props("Birthdays", &["VEVENT"])),
        propfind_response(CALENDAR_PATH, &calendar_props("School", &["VTODO"])),
    ];
    Mock::given(method("PROPFIND"))
        .and(path("/dav/calendars/john/"))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&calendars)))
        .mount(server)
        .await;
}

fn root_client(server: &MockServer) -> Client {
    let url: Url = format!("{}/", server.uri()).parse().unwrap();
    Client::new(url, "john".to_string(), "secret".to_string()).unwrap()
}

#[tokio::test]
async fn test_discover_calendar_by_name() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let mut client = root_client(&server);
    client.discover(Some("School")).await.unwrap();
    assert_eq!(client.url().as_str(), format!("{}{}", server.uri(), CALENDAR_PATH));
}

#[tokio::test]
async fn test_discover_falls_back_to_first_calendar() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let mut client = root_client(&server);
    client.discover(None).await.unwrap();
    assert_eq!(client.url().as_str(), format!("{}/dav/calendars/john/personal/", server.uri()));

    let mut client = root_client(&server);
    client.discover(Some("Homework")).await.unwrap();
    assert_eq!(client.url().as_str(), format!("{}/dav/calendars/john/personal/", server.uri()));

    // Birthdays cannot hold to-dos
    let mut client = root_client(&server);
    client.discover(Some("Birthdays")).await.unwrap();
    assert_eq!(client.url().as_str(), format!("{}/dav/calendars/john/personal/", server.uri()));
}

#[tokio::test]
async fn test_calendar_url_is_used_as_is() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;

    let itself = propfind_response(CALENDAR_PATH, r#"<d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
        <d:current-user-principal><d:href>/dav/principals/john/</d:href></d:current-user-principal>"#);
    Mock::given(method("PROPFIND"))
        .and(path(CALENDAR_PATH))
        .and(header("Depth", "0"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[itself])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav/principals/john/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.discover(None).await.unwrap();
    assert_eq!(client.url().as_str(), format!("{}{}", server.uri(), CALENDAR_PATH));
}

#[tokio::test]
async fn test_discovery_errors() {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut client = root_client(&server);
    assert!(matches!(client.discover(None).await, Err(WriteError::AuthFailure(_))));

    // No calendar at all
    let server = MockServer::start().await;
    let root = propfind_response("/", r#"<d:current-user-principal><d:href>/dav/principals/john/</d:href></d:current-user-principal>"#);
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[root])))
        .mount(&server)
        .await;
    let principal = propfind_response("/dav/principals/john/",
        r#"<cal:calendar-home-set><d:href>/dav/calendars/john/</d:href></cal:calendar-home-set>"#);
    Mock::given(method("PROPFIND"))
        .and(path("/dav/principals/john/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[principal])))
        .mount(&server)
        .await;
    let home = propfind_response("/dav/calendars/john/", r#"<d:resourcetype><d:collection/></d:resourcetype>"#);
    Mock::given(method("PROPFIND"))
        .and(path("/dav/calendars/john/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[home])))
        .mount(&server)
        .await;

    let mut client = root_client(&server);
    assert!(matches!(client.discover(Some("School")).await, Err(WriteError::Permanent(_))));
    assert_eq!(client.url().as_str(), format!("{}/", server.uri()));
}
