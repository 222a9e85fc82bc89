// src/utils/pagination.rs

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts},
};
use serde::Serialize;
use url::Url;

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page-number pagination driven by the `page` and `limit` query parameters.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    offset: i64,
    base_url: Option<Url>,
}

/// Paginated response envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl Pagination {
    /// Parses `page`/`limit` from a raw query string.
    ///
    /// A non-numeric or non-positive `page`, or one whose offset does not fit
    /// in an `i64`, is an invalid page (404); a bad `limit` silently falls back
    /// to the default size.
    pub fn from_query(query: Option<&str>, base_url: Option<Url>) -> Result<Self, AppError> {
        let mut page = 1;
        let mut limit = DEFAULT_PAGE_SIZE;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
            match &*key {
                "page" => {
                    page = value
                        .parse::<i64>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(invalid_page)?;
                }
                "limit" => {
                    limit = value
                        .parse::<i64>()
                        .ok()
                        .filter(|l| *l > 0)
                        .map(|l| l.min(MAX_PAGE_SIZE))
                        .unwrap_or(DEFAULT_PAGE_SIZE);
                }
                _ => {}
            }
        }

        let offset = (page - 1).checked_mul(limit).ok_or_else(invalid_page)?;

        Ok(Self {
            page,
            limit,
            offset,
            base_url,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Rejects pages past the end. Page 1 is always valid.
    pub fn ensure_in_range(&self, count: i64) -> Result<(), AppError> {
        let last_page = (count.max(0) + self.limit - 1) / self.limit;
        if self.page > last_page.max(1) {
            return Err(invalid_page());
        }
        Ok(())
    }

    pub fn into_page<T>(self, count: i64, results: Vec<T>) -> Page<T> {
        let has_next = self
            .offset
            .checked_add(self.limit)
            .is_some_and(|end| end < count);
        let next = has_next
            .then(|| self.link(Some(self.page + 1)))
            .flatten();
        let previous = match self.page {
            1 => None,
            2 => self.link(None),
            p => self.link(Some(p - 1)),
        };

        Page {
            count,
            next,
            previous,
            results,
        }
    }

    /// Same URL with the `page` parameter replaced (or dropped for `None`).
    fn link(&self, page: Option<i64>) -> Option<String> {
        let mut url = self.base_url.clone()?;
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "page")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if let Some(page) = page {
            pairs.push(("page".to_string(), page.to_string()));
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        Some(url.to_string())
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let base_url = Url::parse(&format!("http://{}{}", host, path_and_query)).ok();

        Pagination::from_query(uri.query(), base_url)
    }
}
