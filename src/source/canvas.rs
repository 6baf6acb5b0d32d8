//! Planner items from Canvas

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LINK;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::CanvasConfig;
use crate::error::SourceError;
use crate::task::{Origin, Task};
use crate::traits::TaskSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "100";
/// Following more pages than that most likely means the server keeps linking to itself
const MAX_PAGES: usize = 50;

/// Planner items of these types are not things to do
const IGNORED_TYPES: [&str; 2] = ["announcement", "calendar_event"];


/// An item of `/api/v1/planner/items`.
///
/// Only the fields we use are deserialized.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CanvasPlannerItem {
    /// Either a number or a string, depending on the Canvas version
    pub plannable_id: Value,
    pub plannable_type: String,
    pub plannable_date: Option<DateTime<Utc>>,
    pub context_name: Option<String>,
    pub html_url: Option<String>,
    #[serde(default)]
    pub plannable: Plannable,
    pub planner_override: Option<PlannerOverride>,
    /// `false`, or an object describing the submission
    #[serde(default)]
    pub submissions: Value,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Plannable {
    pub title: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub todo_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PlannerOverride {
    #[serde(default)]
    pub marked_complete: bool,
}

impl CanvasPlannerItem {
    fn id(&self) -> Option<String> {
        match &self.plannable_id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if s.is_empty() == false => Some(s.clone()),
            _ => None,
        }
    }

    fn due_at(&self) -> Option<DateTime<Utc>> {
        self.plannable.due_at
            .or(self.plannable.todo_date)
            .or(self.plannable_date)
    }

    fn is_completed(&self) -> bool {
        let marked_complete = self.planner_override.as_ref().map(|o| o.marked_complete).unwrap_or(false);
        let submitted = self.submissions.get("submitted").and_then(Value::as_bool).unwrap_or(false);
        marked_complete || submitted
    }
}


/// Read access to the Canvas planner
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// Every planner item from `start_date` on, across all pages
    async fn planner_items(&self, start_date: DateTime<Utc>) -> Result<Vec<CanvasPlannerItem>, SourceError>;
}

/// A Canvas REST client, authenticated with an access token
pub struct CanvasClient {
    base_url: Url,
    token: String,
    http: reqwest::Client,
}

impl CanvasClient {
    pub fn new(base_url: Url, token: String) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url, token, http })
    }

    fn first_page_url(&self, start_date: &DateTime<Utc>) -> Result<Url, SourceError> {
        let mut url = self.base_url.join("/api/v1/planner/items")
            .map_err(|err| SourceError::Unavailable(format!("invalid Canvas URL {}: {}", self.base_url, err)))?;
        url.query_pairs_mut()
            .append_pair("start_date", &start_date.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .append_pair("per_page", PAGE_SIZE);
        Ok(url)
    }
}

#[async_trait]
impl CanvasApi for CanvasClient {
    async fn planner_items(&self, start_date: DateTime<Utc>) -> Result<Vec<CanvasPlannerItem>, SourceError> {
        let mut items = Vec::new();
        let mut next = Some(self.first_page_url(&start_date)?);
        let mut n_pages = 0;

        while let Some(url) = next.take() {
            n_pages += 1;
            if n_pages > MAX_PAGES {
                return Err(SourceError::Unavailable(format!("Canvas returned more than {} pages of planner items", MAX_PAGES)));
            }

            log::trace!("GET {}", url);
            let response = self.http.get(url.clone())
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(SourceError::AuthFailure(format!("Canvas refused the access token ({})", status)));
            }
            if status.is_success() == false {
                return Err(SourceError::Unavailable(format!("GET {}: unexpected HTTP status {}", url, status)));
            }

            next = response.headers()
                .get_all(LINK)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .find_map(next_link);

            let page: Vec<CanvasPlannerItem> = response.json().await?;
            log::debug!("Page {} of Canvas planner items has {} items", n_pages, page.len());
            items.extend(page);
        }

        Ok(items)
    }
}

/// Find the `rel="next"` URL in a `Link` header
fn next_link(header: &str) -> Option<Url> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });
        if is_next == false {
            return None;
        }
        target.strip_prefix('<')?.strip_suffix('>')?.parse().ok()
    })
}


/// The Canvas task source
pub struct CanvasSource<A: CanvasApi> {
    api: A,
    base_url: Url,
    lookback_days: i64,
}

impl CanvasSource<CanvasClient> {
    pub fn from_config(config: &CanvasConfig) -> Result<Self, SourceError> {
        let client = CanvasClient::new(config.base_url.clone(), config.token.clone())?;
        Ok(Self::new(client, config.base_url.clone(), config.lookback_days))
    }
}

impl<A: CanvasApi> CanvasSource<A> {
    pub fn new(api: A, base_url: Url, lookback_days: i64) -> Self {
        Self { api, base_url, lookback_days }
    }

    fn to_task(&self, item: CanvasPlannerItem) -> Option<Task> {
        if IGNORED_TYPES.contains(&item.plannable_type.as_str()) {
            log::trace!("Ignoring Canvas {} {:?}", item.plannable_type, item.plannable_id);
            return None;
        }
        let id = match item.id() {
            None => {
                log::debug!("Ignoring a Canvas {} without id", item.plannable_type);
                return None;
            },
            Some(id) => id,
        };

        let url = item.html_url.as_deref()
            .and_then(|href| self.base_url.join(href).ok())
            .map(|url| url.to_string());
        let title = item.plannable.title.clone().unwrap_or_else(|| item.plannable_type.clone());

        Some(
            Task::new(Origin::Canvas, format!("{}-{}", item.plannable_type, id), title)
                .with_due(item.due_at())
                .with_course(item.context_name.clone())
                .with_url(url)
                .with_completed(item.is_completed())
        )
    }
}

#[async_trait]
impl<A: CanvasApi> TaskSource for CanvasSource<A> {
    fn origin(&self) -> Origin {
        Origin::Canvas
    }

    async fn fetch(&self) -> Result<Vec<Task>, SourceError> {
        let start_date = chrono::Duration::try_days(self.lookback_days)
            .and_then(|lookback| Utc::now().checked_sub_signed(lookback))
            .ok_or_else(|| SourceError::Unavailable(format!("cannot look {} days back", self.lookback_days)))?;
        let items = self.api.planner_items(start_date).await?;
        let n_items = items.len();

        let tasks: Vec<Task> = items.into_iter().filter_map(|item| self.to_task(item)).collect();
        log::info!("Fetched {} tasks from {} Canvas planner items", tasks.len(), n_items);
        Ok(tasks)
    }
}
