//! Markup stripping for request input.
//!
//! Every string value of a JSON body and every query-string value is
//! rewritten with HTML tags removed. The content of `<script>` and `<style>`
//! elements is dropped with the element; any `<` or `>` that does not form a
//! tag is escaped. Bodies that are not valid JSON pass through untouched so
//! the handler can reject them.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderMap, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::error::AppError;

/// Largest request body the sanitizer will buffer, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

pub async fn sanitize_request(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    if let Some(uri) = sanitize_query(&parts.uri) {
        parts.uri = uri;
    }

    let bytes = axum::body::to_bytes(body, limit).await.map_err(|err| {
        debug!(error = %err, limit, "request body rejected");
        AppError::payload_too_large(format!("request body exceeds {} bytes", limit))
    })?;

    let bytes = if is_json(&parts.headers) && !bytes.is_empty() {
        sanitize_json(bytes)
    } else {
        bytes
    };

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));

    Ok(next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await)
}

fn sanitize_json(bytes: Bytes) -> Bytes {
    let mut value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return bytes,
    };
    sanitize_value(&mut value);
    match serde_json::to_vec(&value) {
        Ok(rewritten) => Bytes::from(rewritten),
        Err(_) => bytes,
    }
}

fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(text) => *text = sanitize_text(text),
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(fields) => fields.values_mut().for_each(sanitize_value),
        _ => {}
    }
}

/// Returns a rewritten URI when any query value changed.
fn sanitize_query(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let mut changed = false;
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| {
            let clean = sanitize_text(&value);
            changed |= clean != value;
            (key.into_owned(), clean)
        })
        .collect();

    if !changed {
        return None;
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    let path_and_query = PathAndQuery::try_from(format!("{}?{}", uri.path(), query)).ok()?;

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}

struct Tag<'a> {
    len: usize,
    name: &'a str,
    closing: bool,
}

/// Parse a tag at the start of `input`, which begins with `<`.
fn tag_at(input: &str) -> Option<Tag<'_>> {
    let after = &input[1..];
    let first = after.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '/' || first == '!') {
        return None;
    }

    let end = input.find('>')?;
    let closing = first == '/';
    let name_start = if closing { 2 } else { 1 };
    let name_len = input[name_start..end]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(end - name_start);

    Some(Tag {
        len: end + 1,
        name: &input[name_start..name_start + name_len],
        closing,
    })
}

/// Skip past `</name ...>`; an unterminated element swallows the rest.
fn skip_element_body<'a>(input: &'a str, name: &str) -> &'a str {
    let lowered = input.to_ascii_lowercase();
    let needle = format!("</{}", name);
    let Some(start) = lowered.find(&needle) else {
        return "";
    };
    match input[start..].find('>') {
        Some(end) => &input[start + end + 1..],
        None => "",
    }
}

pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['<', '>']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with('>') {
            out.push_str("&gt;");
            rest = &tail[1..];
            continue;
        }

        match tag_at(tail) {
            Some(tag) => {
                rest = &tail[tag.len..];
                let name = tag.name.to_ascii_lowercase();
                if !tag.closing && (name == "script" || name == "style") {
                    rest = skip_element_body(rest, &name);
                }
            }
            None => {
                out.push_str("&lt;");
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Same test axum's `Json` extractor applies: `application/json` or any
/// `application/*+json`, case-insensitive.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
    else {
        return false;
    };

    let json_suffix = mime.suffix().is_some_and(|suffix| suffix == mime::JSON);
    mime.type_() == mime::APPLICATION && (mime.subtype() == mime::JSON || json_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(sanitize_text("The Left Hand of Darkness"), "The Left Hand of Darkness");
        assert_eq!(sanitize_text(""), "");
    }

    #[test]
    fn tags_are_stripped() {
        assert_eq!(sanitize_text("<b>Frank</b> Herbert"), "Frank Herbert");
        assert_eq!(sanitize_text("<a href=\"x\">link</a>"), "link");
        assert_eq!(sanitize_text("<!-- note -->Dune"), "Dune");
    }

    #[test]
    fn script_and_style_content_is_dropped() {
        assert_eq!(sanitize_text("<script>alert(1)</script>Dune"), "Dune");
        assert_eq!(sanitize_text("a<STYLE>p{}</Style>b"), "ab");
        assert_eq!(sanitize_text("x<script>never closed"), "x");
    }

    #[test]
    fn stray_angle_brackets_are_escaped() {
        assert_eq!(sanitize_text("1 < 2 > 0"), "1 &lt; 2 &gt; 0");
        assert_eq!(sanitize_text("a<b"), "a&lt;b");
    }

    #[test]
    fn non_ascii_text_survives() {
        assert_eq!(sanitize_text("<i>Café</i> naïve"), "Café naïve");
    }

    #[test]
    fn json_strings_are_sanitized_recursively() {
        let mut value = json!({
            "title": "<script>x</script>Dune",
            "tags": ["<b>sf</b>", 3],
            "meta": {"author": "<i>Herbert</i>"},
            "pages": 412
        });
        sanitize_value(&mut value);
        assert_eq!(
            value,
            json!({
                "title": "Dune",
                "tags": ["sf", 3],
                "meta": {"author": "Herbert"},
                "pages": 412
            })
        );
    }

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn json_media_types_match_like_the_json_extractor() {
        for value in [
            "application/json",
            "application/json; charset=utf-8",
            "Application/JSON",
            "application/merge-patch+json",
        ] {
            assert!(is_json(&content_type(value)), "{value}");
        }
        for value in ["text/plain", "text/json", "application/jsonx", "multipart/form-data"] {
            assert!(!is_json(&content_type(value)), "{value}");
        }
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn invalid_json_passes_through() {
        let raw = Bytes::from_static(b"{\"title\": <b>");
        assert_eq!(sanitize_json(raw.clone()), raw);
    }

    #[test]
    fn query_values_are_sanitized() {
        let uri: Uri = "/api/v1/books?limit=%3Cb%3E5%3C%2Fb%3E&offset=0".parse().unwrap();
        let rewritten = sanitize_query(&uri).unwrap();
        assert_eq!(rewritten.path(), "/api/v1/books");
        assert_eq!(rewritten.query(), Some("limit=5&offset=0"));
    }

    #[test]
    fn clean_query_is_left_alone() {
        let uri: Uri = "/api/v1/books?limit=5".parse().unwrap();
        assert!(sanitize_query(&uri).is_none());
    }
}
