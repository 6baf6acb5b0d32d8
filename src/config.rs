//! Support for configuration options
//!
//! Everything is read from environment variables. A `.env` file in the working directory is loaded first, if any.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Part of the ProdID string that describes the organization (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
pub const ORG_NAME: &str = "coursework-sync";

/// Part of the ProdID string that describes the product name (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
pub const PRODUCT_NAME: &str = "coursework-sync";

pub const DEFAULT_GRADESCOPE_URL: &str = "https://www.gradescope.com";
pub const DEFAULT_CANVAS_LOOKBACK_DAYS: i64 = 14;
pub const MAX_CANVAS_LOOKBACK_DAYS: i64 = 3650;


/// Credentials and settings for Gradescope
#[derive(Clone, Debug, PartialEq)]
pub struct GradescopeConfig {
    pub base_url: Url,
    pub email: String,
    pub password: String,
    /// Only courses of this term (e.g. `Fall`) of the current year are synced
    pub semester: String,
}

/// Credentials and settings for the Canvas planner
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasConfig {
    pub base_url: Url,
    pub token: String,
    /// How far in the past planner items are fetched
    pub lookback_days: i64,
}

/// The calendar collection tasks are mirrored to
#[derive(Clone, Debug, PartialEq)]
pub struct CalDavConfig {
    /// Either the calendar collection itself, or any URL of the server to discover calendars from
    pub calendar_url: Url,
    pub username: String,
    pub password: String,
    /// Display name of the calendar to pick among the discovered ones
    pub calendar_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub gradescope: Option<GradescopeConfig>,
    pub canvas: Option<CanvasConfig>,
    pub caldav: CalDavConfig,
    pub retry: RetryPolicy,
    /// Compute and print the plan, but do not change the calendar
    pub dry_run: bool,
}

impl Config {
    /// Read the configuration from the process environment (and `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            log::debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration from any key-value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let caldav = CalDavConfig {
            calendar_url: vars.url("CALDAV_URL")?.ok_or(ConfigError::Missing("CALDAV_URL"))?,
            username: vars.required("CALDAV_USERNAME")?,
            password: vars.required("CALDAV_PASSWORD")?,
            calendar_name: vars.get("CALDAV_CALENDAR_NAME").map(|name| name.trim().to_string()),
        };

        let gradescope = if vars.source_enabled("GRADESCOPE_ENABLED", &["GRADESCOPE_EMAIL", "GRADESCOPE_PASSWORD"])? {
            Some(GradescopeConfig {
                base_url: vars.url("GRADESCOPE_URL")?.map_or_else(|| parse_url("GRADESCOPE_URL", DEFAULT_GRADESCOPE_URL), Ok)?,
                email: vars.required("GRADESCOPE_EMAIL")?,
                password: vars.required("GRADESCOPE_PASSWORD")?,
                semester: vars.required("GRADESCOPE_SEMESTER")?,
            })
        } else {
            None
        };

        let canvas = if vars.source_enabled("CANVAS_ENABLED", &["CANVAS_URL", "CANVAS_TOKEN"])? {
            let lookback_days = vars.parsed("CANVAS_LOOKBACK_DAYS")?.unwrap_or(DEFAULT_CANVAS_LOOKBACK_DAYS);
            if (0..=MAX_CANVAS_LOOKBACK_DAYS).contains(&lookback_days) == false {
                return Err(ConfigError::Invalid {
                    var: "CANVAS_LOOKBACK_DAYS",
                    reason: format!("must be between 0 and {}", MAX_CANVAS_LOOKBACK_DAYS),
                });
            }
            Some(CanvasConfig {
                base_url: vars.url("CANVAS_URL")?.ok_or(ConfigError::Missing("CANVAS_URL"))?,
                token: vars.required("CANVAS_TOKEN")?,
                lookback_days,
            })
        } else {
            None
        };

        if gradescope.is_none() && canvas.is_none() {
            return Err(ConfigError::NoSourceEnabled);
        }

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = vars.parsed::<u32>("SYNC_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(ConfigError::Invalid { var: "SYNC_MAX_ATTEMPTS", reason: "must be at least 1".to_string() });
            }
            retry.max_attempts = attempts;
        }
        if let Some(ms) = vars.parsed::<u64>("SYNC_BACKOFF_MS")? {
            retry.initial_backoff = Duration::from_millis(ms);
        }

        Ok(Self {
            gradescope,
            canvas,
            caldav,
            retry,
            dry_run: vars.flag("SYNC_DRY_RUN")?.unwrap_or(false),
        })
    }
}


struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var).filter(|value| value.trim().is_empty() == false)
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn url(&self, var: &'static str) -> Result<Option<Url>, ConfigError> {
        self.get(var).map(|value| parse_url(var, &value)).transpose()
    }

    fn parsed<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(var)
            .map(|value| value.trim().parse::<T>().map_err(|err| ConfigError::Invalid { var, reason: err.to_string() }))
            .transpose()
    }

    fn flag(&self, var: &'static str) -> Result<Option<bool>, ConfigError> {
        match self.get(var) {
            None => Ok(None),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                other => Err(ConfigError::Invalid { var, reason: format!("{:?} is not a boolean", other) }),
            },
        }
    }

    /// An explicit flag wins. Otherwise, a source is enabled when its credentials are present.
    fn source_enabled(&self, flag: &'static str, credentials: &[&'static str]) -> Result<bool, ConfigError> {
        match self.flag(flag)? {
            Some(enabled) => Ok(enabled),
            None => Ok(credentials.iter().all(|var| self.get(var).is_some())),
        }
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|err| ConfigError::Invalid { var, reason: err.to_string() })
}
