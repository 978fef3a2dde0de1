//! Translation between FastCGI params and HTTP messages.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{self, header, Request, Version};
use bytes::{BufMut, Bytes, BytesMut};

use crate::fcgi::FcgiError;
use crate::http::handler::attach_peer;
use crate::net::PeerAddr;

/// Why a request could not be built from its params.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no REQUEST_METHOD in params")]
    MissingMethod,
    #[error(transparent)]
    Params(#[from] FcgiError),
    #[error("invalid request: {0}")]
    Http(#[from] http::Error),
}

/// Build the HTTP request described by CGI-style params.
///
/// The target comes from `REQUEST_URI`, falling back to
/// `SCRIPT_NAME` + `PATH_INFO` + `?QUERY_STRING`. Every `HTTP_*` param
/// becomes a header.
pub fn build_request(params: &HashMap<String, String>, body: Body) -> Result<Request<Body>, RequestError> {
    let method = params
        .get("REQUEST_METHOD")
        .filter(|m| !m.is_empty())
        .ok_or(RequestError::MissingMethod)?;

    let version = match params.get("SERVER_PROTOCOL").map(String::as_str) {
        Some("HTTP/1.0") => Version::HTTP_10,
        Some("HTTP/2") | Some("HTTP/2.0") => Version::HTTP_2,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder()
        .method(method.as_str())
        .uri(request_target(params))
        .version(version);

    for (name, value) in params {
        let header_name = if let Some(suffix) = name.strip_prefix("HTTP_") {
            suffix.replace('_', "-").to_ascii_lowercase()
        } else if name == "CONTENT_TYPE" {
            header::CONTENT_TYPE.to_string()
        } else if name == "CONTENT_LENGTH" {
            header::CONTENT_LENGTH.to_string()
        } else {
            continue;
        };
        if value.is_empty() && !name.starts_with("HTTP_") {
            continue;
        }
        builder = builder.header(header_name.as_str(), value.as_str());
    }

    let mut request = builder.body(body)?;
    if let Some(peer) = remote_peer(params) {
        attach_peer(&mut request, peer);
    }
    Ok(request)
}

fn request_target(params: &HashMap<String, String>) -> String {
    if let Some(uri) = params.get("REQUEST_URI").filter(|u| !u.is_empty()) {
        return uri.clone();
    }

    let param = |name: &str| params.get(name).map(String::as_str).unwrap_or("");
    let mut target = format!("{}{}", param("SCRIPT_NAME"), param("PATH_INFO"));
    if target.is_empty() {
        target.push('/');
    }
    let query = param("QUERY_STRING");
    if !query.is_empty() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn remote_peer(params: &HashMap<String, String>) -> Option<PeerAddr> {
    let addr = params.get("REMOTE_ADDR").filter(|a| !a.is_empty())?;
    let port: u16 = params
        .get("REMOTE_PORT")
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    let host = if addr.contains(':') {
        format!("[{addr}]")
    } else {
        addr.clone()
    };
    Some(PeerAddr::Remote(format!("{host}:{port}")))
}

/// CGI response head: `Status:` line, headers, blank line.
pub fn response_head(parts: &http::response::Parts) -> Bytes {
    let mut head = BytesMut::with_capacity(256);
    let status = parts.status;
    head.put_slice(
        format!(
            "Status: {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    for (name, value) in &parts.headers {
        head.put_slice(name.as_str().as_bytes());
        head.put_slice(b": ");
        head.put_slice(value.as_bytes());
        head.put_slice(b"\r\n");
    }
    head.put_slice(b"\r\n");
    head.freeze()
}
