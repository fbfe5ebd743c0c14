mod common;

use common::http::{get, parse_parts, post};
use common::test_server::{setup_may_runtime, start_service};
use jsonroute::server::AppService;
use jsonroute::JsonEndpoint;
use serde_json::json;
use std::fs;

fn static_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bundle.js"), "console.log('hi');\n").unwrap();
    fs::write(dir.path().join("index.html"), "<h1>Home</h1>").unwrap();
    fs::create_dir(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("assets").join("logo.svg"), "<svg/>").unwrap();
    dir
}

fn start(dir: &tempfile::TempDir) -> (jsonroute::ServerHandle, std::net::SocketAddr) {
    setup_may_runtime();
    let mut service = AppService::new();
    service
        .add_route("/api/ping$", JsonEndpoint::new("ping").get(|_| Ok(json!("pong"))))
        .unwrap();
    service.set_static_dir(dir.path());
    start_service(service)
}

#[test]
fn test_js_served() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = get(&addr, "/bundle.js");
    handle.stop();
    let parts = parse_parts(&resp);
    assert_eq!(parts.status, 200);
    assert_eq!(parts.content_type(), "application/javascript; charset=utf-8");
    assert_eq!(parts.body, "console.log('hi');\n");
}

#[test]
fn test_routes_take_precedence() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = get(&addr, "/api/ping");
    handle.stop();
    let parts = parse_parts(&resp);
    assert_eq!(parts.status, 200);
    assert_eq!(parts.json(), json!("pong"));
}

#[test]
fn test_root_serves_index() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = get(&addr, "/");
    handle.stop();
    let parts = parse_parts(&resp);
    assert_eq!(parts.status, 200);
    assert_eq!(parts.content_type(), "text/html; charset=utf-8");
    assert_eq!(parts.body, "<h1>Home</h1>");
}

#[test]
fn test_directory_listing_refused() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = get(&addr, "/assets/");
    handle.stop();
    let parts = parse_parts(&resp);
    assert_eq!(parts.status, 405);
    assert_eq!(parts.json(), json!({"error": "405 Not allowed"}));
    assert!(!parts.body.contains("logo.svg"));
}

#[test]
fn test_traversal_blocked() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = get(&addr, "/../Cargo.toml");
    handle.stop();
    assert_eq!(parse_parts(&resp).status, 404);
}

#[test]
fn test_static_is_get_only() {
    let dir = static_fixture();
    let (handle, addr) = start(&dir);
    let resp = post(&addr, "/bundle.js", "text/plain", "x");
    handle.stop();
    assert_eq!(parse_parts(&resp).status, 404);
}
