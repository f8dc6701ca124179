//! Page/limit query parsing and the paginated response shape.

use serde::{Deserialize, Serialize};

use super::error::ApiError;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
/// Highest page whose offset fits in an `i64` at any allowed limit.
const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// Raw query parameters. Kept as strings so bad numbers become a 400 with a
/// useful message instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl PageQuery {
    pub fn parse(&self) -> Result<Page, ApiError> {
        let page = parse_number(self.page.as_deref(), "page", 1)?;
        if page < 1 {
            return Err(ApiError::bad_request("page must be at least 1"));
        }
        if page > MAX_PAGE {
            return Err(ApiError::bad_request(format!(
                "page must be at most {}",
                MAX_PAGE
            )));
        }
        let limit = parse_number(self.limit.as_deref(), "limit", DEFAULT_LIMIT)?;
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::bad_request(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(Page { page, limit })
    }
}

fn parse_number(value: Option<&str>, name: &str, default: i64) -> Result<i64, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{} must be a number", name))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T: Serialize> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: Page) -> Self {
        let total_pages = if total_docs == 0 {
            0
        } else {
            (total_docs + page.limit - 1) / page.limit
        };
        Self {
            docs,
            total_docs,
            limit: page.limit,
            page: page.page,
            total_pages,
            has_prev_page: page.page > 1,
            has_next_page: page.page < total_pages,
        }
    }
}
