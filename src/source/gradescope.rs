//! Assignments from Gradescope
//!
//! Gradescope has no public API for students, so [`GradescopeSession`] logs in like a browser
//! and reads the course and assignment pages.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Local, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::GradescopeConfig;
use crate::error::SourceError;
use crate::task::{Origin, Task};
use crate::traits::TaskSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DUE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

static TOKEN_SEL: Lazy<Selector> = Lazy::new(|| selector(r#"input[name="authenticity_token"], meta[name="csrf-token"]"#));
static HEADING_OR_LIST_SEL: Lazy<Selector> = Lazy::new(|| selector("h1.pageHeading, div.courseList"));
static COURSE_BOX_SEL: Lazy<Selector> = Lazy::new(|| selector("a.courseBox"));
static SHORT_NAME_SEL: Lazy<Selector> = Lazy::new(|| selector(".courseBox--shortname"));
static NAME_SEL: Lazy<Selector> = Lazy::new(|| selector(".courseBox--name"));
static ROW_SEL: Lazy<Selector> = Lazy::new(|| selector("#assignments-student-table tbody tr"));
static PRIMARY_CELL_SEL: Lazy<Selector> = Lazy::new(|| selector("th.table--primaryLink, td.table--primaryLink"));
static LINK_OR_BUTTON_SEL: Lazy<Selector> = Lazy::new(|| selector("a[href], button[data-assignment-id]"));
static STATUS_SEL: Lazy<Selector> = Lazy::new(|| selector(".submissionStatus--text"));
static DUE_SEL: Lazy<Selector> = Lazy::new(|| selector("time.submissionTimeChart--dueDate"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid built-in CSS selector")
}


/// A course, as listed on the account page
#[derive(Clone, Debug, PartialEq)]
pub struct GradescopeCourse {
    pub id: String,
    pub short_name: String,
    pub name: String,
    /// e.g. `Fall`
    pub semester: String,
    /// e.g. `2024`
    pub year: String,
}

/// A row of the assignment table of a course, as little interpreted as possible
#[derive(Clone, Debug, PartialEq)]
pub struct GradescopeAssignment {
    /// Assignments that are not released yet have no id
    pub id: Option<String>,
    pub name: String,
    /// e.g. `Submitted`, `No Submission`, or a score such as `8.0 / 10.0`
    pub status: String,
    pub due_date: Option<DateTime<FixedOffset>>,
}

/// A logged-in view of Gradescope
#[async_trait]
pub trait GradescopeApi: Send + Sync {
    async fn login(&self) -> Result<(), SourceError>;
    /// Courses the user is enrolled in as a student
    async fn student_courses(&self) -> Result<Vec<GradescopeCourse>, SourceError>;
    async fn assignments(&self, course_id: &str) -> Result<Vec<GradescopeAssignment>, SourceError>;
}


/// A Gradescope web session. Cookies are kept between requests.
pub struct GradescopeSession {
    base_url: Url,
    email: String,
    password: String,
    http: reqwest::Client,
}

impl GradescopeSession {
    pub fn new(base_url: Url, email: String, password: String) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url, email, password, http })
    }

    fn url(&self, path: &str) -> Result<Url, SourceError> {
        self.base_url.join(path)
            .map_err(|err| SourceError::Unavailable(format!("invalid Gradescope URL for {}: {}", path, err)))
    }

    async fn get_page(&self, path: &str) -> Result<(Url, String), SourceError> {
        let url = self.url(path)?;
        log::trace!("GET {}", url);
        let response = self.http.get(url).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        let text = response.text().await?;
        Ok((final_url, text))
    }
}

#[async_trait]
impl GradescopeApi for GradescopeSession {
    async fn login(&self) -> Result<(), SourceError> {
        let (_, home) = self.get_page("/").await?;
        let token = parse_authenticity_token(&home)
            .ok_or_else(|| SourceError::Unavailable("no authenticity token on the Gradescope home page".to_string()))?;

        let form = [
            ("utf8", "✓"),
            ("session[email]", self.email.as_str()),
            ("session[password]", self.password.as_str()),
            ("session[remember_me]", "0"),
            ("commit", "Log In"),
            ("session[remember_me_sso]", "0"),
            ("authenticity_token", token.as_str()),
        ];
        let response = self.http.post(self.url("/login")?)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        // A failed login renders the login form again
        if response.url().path().starts_with("/login") {
            return Err(SourceError::AuthFailure(format!("Gradescope rejected the credentials of {}", self.email)));
        }
        log::debug!("Logged in to Gradescope as {}", self.email);
        Ok(())
    }

    async fn student_courses(&self) -> Result<Vec<GradescopeCourse>, SourceError> {
        let (url, page) = self.get_page("/account").await?;
        if url.path().starts_with("/login") {
            return Err(SourceError::AuthFailure("Gradescope session is not logged in".to_string()));
        }
        Ok(parse_student_courses(&page))
    }

    async fn assignments(&self, course_id: &str) -> Result<Vec<GradescopeAssignment>, SourceError> {
        let (_, page) = self.get_page(&format!("/courses/{}", course_id)).await?;
        Ok(parse_assignments(&page))
    }
}


/// The Gradescope task source
pub struct GradescopeSource<A: GradescopeApi> {
    api: A,
    base_url: Url,
    semester: String,
    year: String,
}

impl GradescopeSource<GradescopeSession> {
    pub fn from_config(config: &GradescopeConfig) -> Result<Self, SourceError> {
        let session = GradescopeSession::new(config.base_url.clone(), config.email.clone(), config.password.clone())?;
        Ok(Self::new(session, config.base_url.clone(), config.semester.clone()))
    }
}

impl<A: GradescopeApi> GradescopeSource<A> {
    /// Create a source for the courses of `semester` this year
    pub fn new(api: A, base_url: Url, semester: String) -> Self {
        let year = Local::now().year().to_string();
        Self { api, base_url, semester, year }
    }

    /// Use another year than the current one
    pub fn for_year(mut self, year: i32) -> Self {
        self.year = year.to_string();
        self
    }

    fn is_current(&self, course: &GradescopeCourse) -> bool {
        course.semester.eq_ignore_ascii_case(&self.semester) && course.year == self.year
    }

    fn to_task(&self, course: &GradescopeCourse, assignment: GradescopeAssignment) -> Option<Task> {
        let id = match assignment.id {
            None => {
                log::debug!("Ignoring Gradescope assignment {:?} of {}, which has no id", assignment.name, course.short_name);
                return None;
            },
            Some(id) => id,
        };

        let url = self.base_url
            .join(&format!("/courses/{}/assignments/{}", course.id, id))
            .map(|u| u.to_string())
            .ok();
        let course_label = if course.name.is_empty() { &course.short_name } else { &course.name };

        Some(
            Task::new(Origin::Gradescope, id, assignment.name)
                .with_due(assignment.due_date.map(|dt| dt.with_timezone(&Utc)))
                .with_course(Some(course_label.clone()))
                .with_url(url)
                .with_completed(is_completed(&assignment.status))
        )
    }
}

#[async_trait]
impl<A: GradescopeApi> TaskSource for GradescopeSource<A> {
    fn origin(&self) -> Origin {
        Origin::Gradescope
    }

    async fn fetch(&self) -> Result<Vec<Task>, SourceError> {
        self.api.login().await?;
        let courses = self.api.student_courses().await?;

        let mut tasks = Vec::new();
        let mut n_courses = 0;
        for course in courses.iter().filter(|c| self.is_current(c)) {
            n_courses += 1;
            // A course that fails makes the whole source fail: its assignments must not look deleted
            let assignments = self.api.assignments(&course.id).await?;
            log::debug!("{} assignments in Gradescope course {}", assignments.len(), course.short_name);
            tasks.extend(assignments.into_iter().filter_map(|a| self.to_task(course, a)));
        }

        log::info!("Fetched {} tasks from {} Gradescope courses ({} {})", tasks.len(), n_courses, self.semester, self.year);
        Ok(tasks)
    }
}


/// Whether a submission status means there is nothing left to do
fn is_completed(status: &str) -> bool {
    let status = status.trim();
    if status.eq_ignore_ascii_case("Submitted") {
        return true;
    }
    // Graded assignments show their score instead
    match status.split_once('/') {
        Some((score, total)) => score.trim().parse::<f64>().is_ok() && total.trim().parse::<f64>().is_ok(),
        None => false,
    }
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_class(element: &ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

pub(crate) fn parse_authenticity_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let token = document.select(&TOKEN_SEL)
        .find_map(|el| el.value().attr("value").or_else(|| el.value().attr("content")))
        .map(String::from);
    token
}

/// Parse the account page.
///
/// Users that also teach have a heading before each course list. Lists that follow a heading other
/// than the student one are skipped.
pub(crate) fn parse_student_courses(html: &str) -> Vec<GradescopeCourse> {
    let document = Html::parse_document(html);
    let mut courses = Vec::new();
    let mut in_student_section = true;

    for element in document.select(&HEADING_OR_LIST_SEL) {
        if element.value().name() == "h1" {
            in_student_section = text_of(&element).contains("Student");
            continue;
        }
        if in_student_section == false {
            continue;
        }

        let mut term = String::new();
        for child in element.children().filter_map(ElementRef::wrap) {
            if has_class(&child, "courseList--term") {
                term = text_of(&child);
            } else if has_class(&child, "courseList--coursesForTerm") {
                let (semester, year) = match term.rsplit_once(' ') {
                    Some((s, y)) => (s.to_string(), y.to_string()),
                    None => (term.clone(), String::new()),
                };
                for course_box in child.select(&COURSE_BOX_SEL) {
                    let id = course_box.value().attr("href")
                        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
                        .filter(|id| id.is_empty() == false);
                    let id = match id {
                        None => continue,
                        Some(id) => id.to_string(),
                    };
                    courses.push(GradescopeCourse {
                        id,
                        short_name: course_box.select(&SHORT_NAME_SEL).next().map(|e| text_of(&e)).unwrap_or_default(),
                        name: course_box.select(&NAME_SEL).next().map(|e| text_of(&e)).unwrap_or_default(),
                        semester: semester.clone(),
                        year: year.clone(),
                    });
                }
            }
        }
    }
    courses
}

/// Parse the assignment table of a course page
pub(crate) fn parse_assignments(html: &str) -> Vec<GradescopeAssignment> {
    let document = Html::parse_document(html);
    let mut assignments = Vec::new();

    for row in document.select(&ROW_SEL) {
        let cell = match row.select(&PRIMARY_CELL_SEL).next() {
            None => continue,
            Some(cell) => cell,
        };
        let name = text_of(&cell);

        let id = cell.select(&LINK_OR_BUTTON_SEL).next().and_then(|el| {
            if let Some(id) = el.value().attr("data-assignment-id") {
                return Some(id.to_string());
            }
            let href = el.value().attr("href")?;
            let mut segments = href.split('/');
            segments.find(|s| *s == "assignments")?;
            segments.next().filter(|id| id.is_empty() == false).map(String::from)
        });

        let status = row.select(&STATUS_SEL).next().map(|e| text_of(&e)).unwrap_or_default();

        let due_date = row.select(&DUE_SEL).next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(|dt| match DateTime::parse_from_str(dt.trim(), DUE_DATE_FORMAT) {
                Ok(dt) => Some(dt),
                Err(err) => {
                    log::warn!("Unable to parse Gradescope due date {:?}: {}", dt, err);
                    None
                },
            });

        assignments.push(GradescopeAssignment { id, name, status, due_date });
    }
    assignments
}
