//! Minimal HTTP/1.1 request framing for the configuration server.

use core::{fmt::Write as _, str};

use heapless::String;

use crate::error::ApiError;

pub const MAX_REQUEST_BYTES: usize = 2_048;
pub const RESPONSE_HEAD_BYTES: usize = 160;

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Other,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Request<'a> {
    pub method: Method,
    /// Request target without query string.
    pub path: &'a str,
    pub body: &'a [u8],
}

/// Parses a buffered request.
///
/// Returns `Ok(None)` while the head or the `Content-Length` body is still
/// incomplete.
pub fn parse_request(buf: &[u8]) -> Result<Option<Request<'_>>, ApiError> {
    let Some(head_len) = buf.windows(HEADER_END.len()).position(|w| w == HEADER_END) else {
        if buf.len() >= MAX_REQUEST_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }
        return Ok(None);
    };

    let head = str::from_utf8(&buf[..head_len]).map_err(|_| ApiError::MalformedRequest)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ApiError::MalformedRequest)?;
    let mut parts = request_line.split_ascii_whitespace();
    let method = match parts.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        Some(_) => Method::Other,
        None => return Err(ApiError::MalformedRequest),
    };
    let target = parts.next().ok_or(ApiError::MalformedRequest)?;
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(ApiError::MalformedRequest),
    }
    let path = target.split('?').next().unwrap_or(target);

    let mut content_length = 0usize;
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(ApiError::MalformedRequest)?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| ApiError::MalformedRequest)?;
        }
    }

    let body_start = head_len + HEADER_END.len();
    let body_end = match body_start.checked_add(content_length) {
        Some(end) if end <= MAX_REQUEST_BYTES => end,
        _ => return Err(ApiError::PayloadTooLarge),
    };
    if buf.len() < body_end {
        return Ok(None);
    }

    Ok(Some(Request {
        method,
        path,
        body: &buf[body_start..body_end],
    }))
}

pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

/// Status line and headers for a `Connection: close` response.
pub fn response_head(
    status: u16,
    content_type: &str,
    body_len: usize,
) -> Option<String<RESPONSE_HEAD_BYTES>> {
    let mut head = String::new();
    write!(
        head,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason_phrase(status),
        content_type,
        body_len
    )
    .ok()?;
    Some(head)
}
