// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTML sanitizing of JSON request bodies.
//!
//! Every string in a POST/PUT/PATCH JSON body is reduced to a small set of
//! formatting tags before any handler deserializes it.

use crate::error::AppError;
use axum::{
    body::Body,
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Largest request body accepted anywhere in the API.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_TAGS: [&str; 9] = ["p", "br", "strong", "em", "u", "a", "ul", "ol", "li"];

const SAFE_URL_SCHEMES: [&str; 3] = ["http://", "https://", "mailto:"];

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("static regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").expect("static regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static regex")
});

fn safe_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    SAFE_URL_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn clean_anchor(attributes: &str) -> String {
    let mut out = String::from("<a");
    for attr in ATTRIBUTE.captures_iter(attributes) {
        let name = attr[1].to_ascii_lowercase();
        let value = attr
            .get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let keep = match name.as_str() {
            "href" => safe_url(value),
            "title" => true,
            _ => false,
        };
        if keep {
            out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
        }
    }
    out.push('>');
    out
}

/// Upper bound on strip passes over one string.
const MAX_PASSES: usize = 16;

fn strip_once(input: &str) -> String {
    let without_comments = COMMENT.replace_all(input, "");
    TAG.replace_all(&without_comments, |caps: &Captures<'_>| {
        let name = caps[2].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            return String::new();
        }
        if !caps[1].is_empty() {
            format!("</{}>", name)
        } else if name == "a" {
            clean_anchor(&caps[3])
        } else {
            format!("<{}>", name)
        }
    })
    .into_owned()
}

/// Strip every tag outside the allowlist (keeping its text) and trim.
///
/// Stripping repeats until the text is stable, since removing an inner tag
/// can join the surrounding fragments into a new one.
pub fn sanitize_string(input: &str) -> String {
    if !input.contains('<') {
        return input.trim().to_string();
    }

    let mut current = strip_once(input);
    for _ in 1..MAX_PASSES {
        let next = strip_once(&current);
        if next == current {
            return current.trim().to_string();
        }
        current = next;
    }

    // Still changing: neutralize whatever markup is left.
    current.replace('<', "&lt;").replace('>', "&gt;").trim().to_string()
}

/// Sanitize every string value in a JSON document. Keys are left alone.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_value(v)))
                .collect(),
        ),
        other => other,
    }
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Rewrite JSON bodies of writes with sanitized strings.
///
/// Bodies that are not valid JSON pass through untouched so the handler's
/// extractor reports the parse error.
pub async fn sanitize_json_body(request: Request, next: Next) -> Result<Response, AppError> {
    let is_write = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
    if !is_write || !is_json(&request) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Ok((
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response())
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => {
            let cleaned = serde_json::to_vec(&sanitize_value(value)).map_err(anyhow::Error::from)?;
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from(cleaned)
        }
        Err(_) => Body::from(bytes),
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    #[test]
    fn test_strips_disallowed_tags_keeping_text() {
        assert_eq!(
            sanitize_string("<script>alert(1)</script>Rice"),
            "alert(1)Rice"
        );
        assert_eq!(
            sanitize_string("  <div class=\"x\"><p>Clean <b>water</b></p></div> "),
            "<p>Clean water</p>"
        );
    }

    #[test]
    fn test_keeps_allowed_tags_without_attributes() {
        assert_eq!(
            sanitize_string("<P onclick=\"x()\">hi<BR/></P>"),
            "<p>hi<br></p>"
        );
    }

    #[test]
    fn test_anchor_attributes_filtered() {
        assert_eq!(
            sanitize_string(
                "<a href=\"https://relief.example\" title='Map' onclick=\"evil()\">map</a>"
            ),
            "<a href=\"https://relief.example\" title=\"Map\">map</a>"
        );
        assert_eq!(
            sanitize_string("<a href=\"javascript:alert(1)\">x</a>"),
            "<a>x</a>"
        );
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(sanitize_string("a<!-- hidden -->b"), "ab");
        assert_eq!(sanitize_string("a<!-- never closed"), "a");
    }

    #[test]
    fn test_nested_tags_cannot_reassemble() {
        assert_eq!(
            sanitize_string("<<script>script>alert(1)<</script>/script>"),
            "alert(1)"
        );
        assert_eq!(sanitize_string("<<b>img src=x onerror=alert(1)>"), "");
        assert_eq!(sanitize_string("<!<!-- x -->-- hidden -->ok"), "ok");
        assert_eq!(
            sanitize_string("<p>Water <<i>script>x</p>"),
            "<p>Water x</p>"
        );
    }

    #[test]
    fn test_clean_output_is_stable() {
        let once = sanitize_string(
            "<a href='https://relief.example' title=Map>map</a><br/><b>x</b>",
        );
        assert_eq!(sanitize_string(&once), once);
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize_string("Food & water, 2 < 3"), "Food & water, 2 < 3");
    }

    #[test]
    fn test_sanitize_value_recurses() {
        let value = json!({
            "title": " <b>Rice</b> ",
            "tags": ["<i>x</i>", 3],
            "nested": {"notes": "<em>ok</em>"},
            "quantity": 5
        });
        assert_eq!(
            sanitize_value(value),
            json!({
                "title": "Rice",
                "tags": ["x", 3],
                "nested": {"notes": "<em>ok</em>"},
                "quantity": 5
            })
        );
    }

    #[tokio::test]
    async fn test_middleware_rewrites_json_body() {
        let app = Router::new()
            .route("/", post(|body: String| async move { body }))
            .layer(axum::middleware::from_fn(sanitize_json_body));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"title":"<script>x</script>Water"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"title": "xWater"}));
    }
}
