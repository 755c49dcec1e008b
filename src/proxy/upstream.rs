//! Upstream connection and request forwarding
//!
//! This module connects to the upstream target and relays a single request
//! and its response. Redirects are relayed as-is, never followed.

use crate::http::parser::find_headers_end;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

/// Default buffer size for streaming
const BUFFER_SIZE: usize = 8192;

/// Largest upstream response head accepted
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// Headers that only make sense on a single connection. `Expect` is
/// included because the request body is already fully buffered.
const HOP_BY_HOP: &[&str] = &[
    "Connection",
    "Expect",
    "Keep-Alive",
    "Proxy-Connection",
    "Transfer-Encoding",
    "Upgrade",
    "TE",
    "Trailer",
];

/// Why forwarding failed, so the caller can choose 502 or 504.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Handles proxying requests to the upstream target
pub struct ProxyHandler {
    /// Upstream base URL
    target: Url,

    /// Connection timeout duration
    connection_timeout: Duration,

    /// Request timeout duration
    request_timeout: Duration,
}

impl ProxyHandler {
    /// Create a new proxy handler
    pub fn new(target: Url, connection_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            target,
            connection_timeout,
            request_timeout,
        }
    }

    /// Forward an HTTP request to the upstream and return its response.
    pub async fn forward_request(&self, request: &Request) -> Result<Response, ForwardError> {
        tracing::debug!(
            target_url = %self.target,
            method = %request.method,
            path = %request.path,
            "Forwarding request to upstream"
        );

        let host = self
            .target
            .host_str()
            .context("Target URL missing host")?;
        let port = self
            .target
            .port_or_known_default()
            .context("Target URL missing port")?;

        let stream = timeout(self.connection_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ForwardError::Timeout(self.connection_timeout))?
            .context("Failed to connect to upstream")?;

        tracing::trace!("Connected to upstream");

        let response = timeout(
            self.request_timeout,
            self.send_request_and_receive_response(stream, request),
        )
        .await
        .map_err(|_| ForwardError::Timeout(self.request_timeout))??;

        tracing::debug!(
            status = response.status.as_u16(),
            method = %request.method,
            path = %request.path,
            "Upstream responded"
        );

        Ok(response)
    }

    /// Send request to upstream and receive response
    async fn send_request_and_receive_response(
        &self,
        mut stream: TcpStream,
        request: &Request,
    ) -> Result<Response> {
        let request_bytes = self.build_http_request(request);
        stream.write_all(&request_bytes).await?;
        stream.flush().await?;

        tracing::trace!("Request sent to upstream");

        read_http_response(&mut stream, request.method == Method::HEAD).await
    }

    /// Build HTTP request bytes to send to the upstream
    pub fn build_http_request(&self, request: &Request) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(512 + request.body.len());

        // Request line
        let path = self.upstream_path(&request.path);
        buffer.extend_from_slice(
            format!("{} {} {}\r\n", request.method, path, request.version).as_bytes(),
        );

        // Drop hop-by-hop headers and the client's Host
        let tokens = connection_tokens(&request.headers);
        let mut headers: Vec<(&str, &str)> = request
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("Host") && !is_hop_by_hop(k, &tokens))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        // Host header points at the upstream
        let host_value = match (self.target.host_str(), self.target.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        headers.insert(0, ("Host", host_value.as_str()));

        // One request per upstream connection
        headers.push(("Connection", "close"));

        for (key, value) in headers {
            buffer.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
        }

        // End of headers
        buffer.extend_from_slice(b"\r\n");

        if !request.body.is_empty() {
            buffer.extend_from_slice(&request.body);
        }

        buffer
    }

    /// Joins the target's base path with the client's request target.
    fn upstream_path(&self, path: &str) -> String {
        let path = if path.is_empty() { "/" } else { path };
        let base = self.target.path().trim_end_matches('/');

        if base.is_empty() || !path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}{}", base, path)
        }
    }
}

/// Names listed in `Connection` headers, lower-cased.
fn connection_tokens(headers: &[(String, String)]) -> Vec<String> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("Connection"))
        .flat_map(|(_, v)| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_hop_by_hop(name: &str, connection_tokens: &[String]) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
        || connection_tokens.contains(&name.to_ascii_lowercase())
}

fn is_chunked(value: &str) -> bool {
    value.to_ascii_lowercase().contains("chunked")
}

/// Removes upstream connection headers from a response.
///
/// A chunked `Transfer-Encoding` stays because the body is relayed with its
/// chunk framing intact.
fn strip_hop_by_hop(headers: &mut Vec<(String, String)>) {
    let tokens = connection_tokens(headers);
    headers.retain(|(k, v)| {
        if k.eq_ignore_ascii_case("Transfer-Encoding") {
            return is_chunked(v);
        }
        !is_hop_by_hop(k, &tokens)
    });
}

/// Read an HTTP response from the upstream
///
/// Interim 1xx responses (other than 101) are skipped; the first final
/// response is returned.
pub async fn read_http_response<S>(stream: &mut S, head_request: bool) -> Result<Response>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        if let Some(headers_end) = find_headers_end(&buffer) {
            let headers_bytes = buffer.split_to(headers_end + 4);
            let (status, reason, mut headers) = parse_response_head(&headers_bytes)?;

            if (100..200).contains(&status.as_u16()) && status != StatusCode::SWITCHING_PROTOCOLS {
                tracing::trace!(status = status.as_u16(), "Skipping interim response");
                continue;
            }

            let body = if head_request || status.is_bodiless() {
                Vec::new()
            } else {
                read_response_body(stream, &mut buffer, &mut headers).await?
            };

            strip_hop_by_hop(&mut headers);

            return Ok(Response {
                status,
                reason,
                headers,
                body,
            });
        }

        if buffer.len() > MAX_RESPONSE_HEAD {
            anyhow::bail!("Response headers too large");
        }

        let n = stream.read_buf(&mut buffer).await?;

        if n == 0 {
            anyhow::bail!("Connection closed before complete response received");
        }
    }
}

/// Parse the status line and headers
fn parse_response_head(
    head: &[u8],
) -> Result<(StatusCode, Option<String>, Vec<(String, String)>)> {
    let head = std::str::from_utf8(head).context("Invalid UTF-8 in response headers")?;

    let mut lines = head.split("\r\n");

    let status_line = lines.next().context("Empty response")?;
    let mut parts = status_line.splitn(3, ' ');

    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        anyhow::bail!("Invalid status line: {}", status_line);
    }

    let code: u16 = parts
        .next()
        .context("Missing status code")?
        .parse()
        .context("Invalid status code")?;
    let status = StatusCode::from_u16(code).context("Status code out of range")?;
    let reason = parts
        .next()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok((status, reason, headers))
}

/// Read the response body.
///
/// Content-Length bodies are read exactly. Anything else is read until the
/// upstream closes; chunked framing is kept so the client can decode it, and
/// unframed bodies get a Content-Length.
async fn read_response_body<S>(
    stream: &mut S,
    buffer: &mut BytesMut,
    headers: &mut Vec<(String, String)>,
) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let chunked = headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("Transfer-Encoding") && is_chunked(v));

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.parse::<usize>())
        .transpose()
        .context("Invalid Content-Length from upstream")?;

    let content_length = match content_length {
        Some(len) if !chunked => len,
        _ => {
            let mut body = buffer.split().to_vec();
            stream.read_to_end(&mut body).await?;

            if !chunked {
                headers.push(("Content-Length".to_string(), body.len().to_string()));
            }
            return Ok(body);
        }
    };

    let mut body = Vec::with_capacity(content_length.min(1024 * 1024));

    // Use existing buffer data first
    let from_buffer = buffer.len().min(content_length);
    body.extend_from_slice(&buffer[..from_buffer]);
    buffer.advance(from_buffer);

    let mut chunk = [0u8; BUFFER_SIZE];
    while body.len() < content_length {
        let to_read = (content_length - body.len()).min(BUFFER_SIZE);
        let n = stream.read(&mut chunk[..to_read]).await?;

        if n == 0 {
            anyhow::bail!("Connection closed before complete body received");
        }

        body.extend_from_slice(&chunk[..n]);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(target: &str) -> ProxyHandler {
        ProxyHandler::new(
            Url::parse(target).unwrap(),
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn target_base_path_is_prefixed() {
        let h = handler("http://backend.internal:9000/app/");
        assert_eq!(h.upstream_path("/login?next=/"), "/app/login?next=/");

        let h = handler("http://backend.internal:9000");
        assert_eq!(h.upstream_path("/login"), "/login");
        assert_eq!(h.upstream_path(""), "/");
    }

    #[tokio::test]
    async fn chunked_body_is_relayed_raw() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false).await.unwrap();

        assert_eq!(response.body, b"5\r\nhello\r\n0\r\n\r\n".to_vec());
        assert!(response.header("Content-Length").is_none());
        assert_eq!(response.header("Transfer-Encoding"), Some("chunked"));
    }

    #[tokio::test]
    async fn interim_continue_is_skipped() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false).await.unwrap();

        assert_eq!(response.status, StatusCode::from_u16(201).unwrap());
        assert_eq!(response.reason.as_deref(), Some("Created"));
        assert_eq!(response.body, b"ok".to_vec());
    }

    #[tokio::test]
    async fn upstream_connection_headers_are_dropped() {
        let raw = b"HTTP/1.1 200 OK\r\nConnection: close, X-Upstream-Only\r\nKeep-Alive: timeout=5\r\nX-Upstream-Only: 1\r\nX-Kept: yes\r\nContent-Length: 2\r\n\r\nok";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false).await.unwrap();

        assert!(response.header("Connection").is_none());
        assert!(response.header("Keep-Alive").is_none());
        assert!(response.header("X-Upstream-Only").is_none());
        assert_eq!(response.header("X-Kept"), Some("yes"));
        assert_eq!(response.header("Content-Length"), Some("2"));
    }

    #[test]
    fn expect_header_is_not_forwarded() {
        let request = Request {
            method: Method::POST,
            path: "/upload".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: vec![
                ("Expect".to_string(), "100-continue".to_string()),
                ("Content-Length".to_string(), "2".to_string()),
            ],
            body: b"ok".to_vec(),
        };

        let bytes = handler("http://backend.internal:9000").build_http_request(&request);
        let text = String::from_utf8(bytes).unwrap();

        assert!(!text.contains("Expect"));
        assert!(text.contains("Content-Length: 2\r\n"));
    }

    #[tokio::test]
    async fn unframed_body_gets_content_length() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\nuntil close";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false).await.unwrap();

        assert_eq!(response.body, b"until close".to_vec());
        assert_eq!(response.header("content-length"), Some("11"));
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 42\r\n\r\n";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, true).await.unwrap();

        assert!(response.body.is_empty());
        assert_eq!(response.header("Content-Length"), Some("42"));
    }
}
