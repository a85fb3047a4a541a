// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page-number pagination with absolute `next`/`previous` links.

use crate::db::Window;
use crate::error::AppError;
use axum::extract::{FromRequestParts, Query};
use axum::http::{header, request::Parts};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Results per page.
pub const PAGE_SIZE: i64 = 20;

/// One page of a collection.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Requested page plus what is needed to link to its neighbours.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: i64,
    base_url: String,
    /// Query parameters other than `page`
    params: Vec<(String, String)>,
}

impl PageRequest {
    /// Build from the request URI and Host.
    pub fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        let Query(mut params) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let raw_page = params
            .iter()
            .rev()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| v.clone());
        params.retain(|(k, _)| k != "page");
        params.sort();

        let page = match raw_page.as_deref() {
            None | Some("") => 1,
            Some("last") => i64::MAX,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(invalid_page)?,
        };

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.host())
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("X-Forwarded-Proto")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("http");

        Ok(Self {
            page,
            base_url: format!("{}://{}{}", scheme, host, parts.uri.path()),
            params,
        })
    }

    /// Rows to fetch for this page. `last` resolves once the count is known.
    pub fn window(&self, count: i64) -> Result<Window, AppError> {
        let page = self.resolve(count)?;
        Ok(Window {
            limit: PAGE_SIZE,
            offset: (page - 1) * PAGE_SIZE,
        })
    }

    fn resolve(&self, count: i64) -> Result<i64, AppError> {
        let pages = num_pages(count);
        let page = if self.page == i64::MAX { pages } else { self.page };
        if page > pages {
            return Err(invalid_page());
        }
        Ok(page)
    }

    /// Wrap a fetched page of results.
    pub fn paginate<T>(&self, count: i64, results: Vec<T>) -> Result<Paginated<T>, AppError> {
        let page = self.resolve(count)?;
        let pages = num_pages(count);
        Ok(Paginated {
            count,
            next: (page < pages).then(|| self.link(page + 1)),
            previous: (page > 1).then(|| self.link(page - 1)),
            results,
        })
    }

    /// Absolute URL of this request with its query in canonical order.
    ///
    /// Two requests for the same page through the same host map to the
    /// same string regardless of parameter order.
    pub fn canonical_url(&self) -> String {
        let page = match self.page {
            i64::MAX => "last".to_string(),
            n => n.to_string(),
        };
        format!("{}#page={}", self.link(1), page)
    }

    fn link(&self, page: i64) -> String {
        let mut pairs: Vec<(String, String)> = self.params.clone();
        if page > 1 {
            pairs.push(("page".to_string(), page.to_string()));
            pairs.sort();
        }
        if pairs.is_empty() {
            return self.base_url.clone();
        }
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.base_url, query)
    }
}

impl<S> FromRequestParts<S> for PageRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        PageRequest::from_parts(parts)
    }
}

/// Pages needed for `count` rows; an empty collection still has page 1.
fn num_pages(count: i64) -> i64 {
    ((count + PAGE_SIZE - 1) / PAGE_SIZE).max(1)
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}
