//! Human-readable rendering of a request/response pair for debug logs.
//!
//! Secrets never reach the output: the `Authorization` header is masked, request bodies
//! (which carry signed assertions) are reduced to their length, and token fields in
//! JSON response bodies are replaced.

use http::header::{AUTHORIZATION, HeaderMap};
use http::{Method, StatusCode};
use std::fmt;
use url::Url;

/// Response headers worth showing
pub const RESPONSE_HEADERS_TO_PRINT: [&str; 4] =
    ["cookie", "cache-control", "content-type", "host"];

const REDACTED: &str = "<redacted>";
const SECRET_FIELDS: [&str; 2] = ["access_token", "refresh_token"];

pub struct Exchange<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub request_headers: &'a HeaderMap,
    pub request_body_len: usize,
    pub status: StatusCode,
    pub response_headers: &'a HeaderMap,
    pub response_body: &'a str,
}

impl fmt::Display for Exchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------REQUEST-----------")?;
        writeln!(f, "{} {}", self.method, self.url)?;
        for (name, value) in self.request_headers {
            if *name == AUTHORIZATION {
                writeln!(f, "{}: {}", name, REDACTED)?;
            } else {
                writeln!(f, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
            }
        }
        if self.request_body_len > 0 {
            writeln!(f, "<{} byte body>", self.request_body_len)?;
        }
        writeln!(f, "-----------RESPONSE-----------")?;
        writeln!(f, "{}", self.status)?;
        for name in RESPONSE_HEADERS_TO_PRINT {
            for value in self.response_headers.get_all(name) {
                writeln!(f, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
            }
        }
        write!(f, "{}", render_body(self.response_body))
    }
}

/// Pretty-print JSON bodies with secrets masked; other bodies pass through unchanged.
pub fn render_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut value) => {
            redact(&mut value);
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        Err(_) => body.to_string(),
    }
}

/// Redacted body cut to at most `max_chars` characters, for one-line log events.
pub fn summarize(body: &str, max_chars: usize) -> String {
    let rendered = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(mut value) => {
            redact(&mut value);
            value.to_string()
        }
        Err(_) => body.trim().to_string(),
    };
    match rendered.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &rendered[..cut]),
        None => rendered,
    }
}

fn redact(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if SECRET_FIELDS.contains(&key.as_str()) {
                    *v = serde_json::Value::String(REDACTED.to_string());
                } else {
                    redact(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
