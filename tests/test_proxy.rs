//! Tests for upstream request building

use filter_proxy::http::request::{Method, Request};
use filter_proxy::proxy::upstream::ProxyHandler;
use std::time::Duration;

fn request(method: Method, path: &str, headers: &[(&str, &str)], body: &[u8]) -> Request {
    Request {
        method,
        path: path.to_string(),
        version: "HTTP/1.1".to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: body.to_vec(),
    }
}

fn build(target: &str, request: Request) -> String {
    let handler = ProxyHandler::new(
        url::Url::parse(target).unwrap(),
        Duration::from_secs(5),
        Duration::from_secs(30),
    );
    String::from_utf8(handler.build_http_request(&request)).unwrap()
}

#[test]
fn test_build_http_request() {
    let request = request(
        Method::GET,
        "/api/users?page=2",
        &[("Host", "proxy.example.com:8080"), ("User-Agent", "Test")],
        b"",
    );

    let request_str = build("http://backend.internal:9000", request);

    assert!(request_str.starts_with("GET /api/users?page=2 HTTP/1.1\r\n"));
    assert!(request_str.contains("Host: backend.internal:9000\r\n"));
    assert!(!request_str.contains("proxy.example.com"));
    assert!(request_str.contains("User-Agent: Test\r\n"));
    assert!(request_str.ends_with("Connection: close\r\n\r\n"));
}

#[test]
fn test_build_http_request_default_port_host() {
    let request = request(
        Method::POST,
        "/api/data",
        &[("Content-Type", "application/json")],
        b"{}",
    );

    let request_str = build("http://backend.internal", request);

    assert!(request_str.starts_with("POST /api/data HTTP/1.1\r\n"));
    assert!(request_str.contains("Host: backend.internal\r\n"));
    assert!(request_str.contains("Content-Type: application/json\r\n"));
    assert!(request_str.ends_with("\r\n\r\n{}"));
}

#[test]
fn test_build_http_request_removes_hop_by_hop_headers() {
    let request = request(
        Method::GET,
        "/",
        &[
            ("Connection", "keep-alive, X-Client-Hop"),
            ("Keep-Alive", "timeout=5"),
            ("Upgrade", "websocket"),
            ("X-Client-Hop", "1"),
            ("Expect", "100-continue"),
            ("User-Agent", "Test"),
        ],
        b"",
    );

    let request_str = build("http://localhost:3000", request);

    assert!(request_str.contains("Connection: close"));
    assert!(!request_str.contains("keep-alive"));
    assert!(!request_str.contains("Keep-Alive"));
    assert!(!request_str.contains("Upgrade: websocket"));
    assert!(!request_str.contains("X-Client-Hop"));
    assert!(!request_str.contains("Expect"));
    assert!(request_str.contains("User-Agent: Test"));
}

#[test]
fn test_build_http_request_extension_method() {
    let request = request(Method::Extension("PROPFIND".to_string()), "", &[], b"");

    let request_str = build("http://localhost:3000", request);

    // Empty path should default to "/"
    assert!(request_str.starts_with("PROPFIND / HTTP/1.1\r\n"));
}

#[test]
fn test_build_http_request_target_base_path() {
    let request = request(Method::GET, "/login", &[], b"");

    let request_str = build("http://localhost:3000/app", request);

    assert!(request_str.starts_with("GET /app/login HTTP/1.1\r\n"));
}
