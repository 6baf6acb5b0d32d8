//! This module handles conversion between iCal files and calendar entries
//!
//! It is a wrapper around different Rust third-party libraries, since there is no single library that is able to parse _and_ generate iCal files

mod parser;
pub use parser::parse;
mod builder;
pub use builder::build_from;

use crate::config::{ORG_NAME, PRODUCT_NAME};

/// Non-standard property that holds the course label of an entry
pub(crate) const COURSE_PROPERTY: &str = "X-COURSEWORK-COURSE";

pub fn default_prod_id() -> String {
    format!("-//{}//{}//EN", ORG_NAME, PRODUCT_NAME)
}
