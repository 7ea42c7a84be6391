use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use waypoint::config::ConfigCache;
use waypoint::endpoint::{Endpoint, EndpointBuilder, RequestContext};
use waypoint::pipeline::Plug;

use tracing_util::TestTracing;

fn overrides(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(obj) => obj.into_iter().collect(),
        _ => panic!("expected object"),
    }
}

fn build_endpoint(config: Value) -> (Endpoint, Arc<ConfigCache>) {
    let cache = Arc::new(ConfigCache::new());
    let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
        .compile(overrides(config), Arc::clone(&cache))
        .expect("endpoint should compile");
    (endpoint, cache)
}

#[test]
fn test_handle_stamps_identity_and_secret() {
    let _tracing = TestTracing::init();
    let cache = Arc::new(ConfigCache::new());
    let echo: Arc<dyn Plug> = Arc::new(|ctx: RequestContext| ctx);
    let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
        .plug("echo", echo)
        .compile(
            overrides(json!({ "secret_key_base": "s3cr3t" })),
            cache,
        )
        .unwrap();

    let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/"));
    assert_eq!(ctx.endpoint.as_deref(), Some("MyAppEndpoint"));
    assert_eq!(ctx.secret_key_base.as_deref(), Some("s3cr3t"));
}

#[test]
fn test_root_prefix_leaves_script_name_empty() {
    let (endpoint, _cache) = build_endpoint(json!({}));
    let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/pets"));
    assert!(ctx.script_name.is_empty());
}

#[test]
fn test_non_root_prefix_splits_onto_script_name() {
    let (endpoint, _cache) = build_endpoint(json!({ "url": { "path": "/api/v1" } }));
    let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/api/v1/pets"));
    assert_eq!(ctx.script_name, vec!["api".to_string(), "v1".to_string()]);
}

#[test]
fn test_path_with_configured_prefix() {
    let (endpoint, _cache) = build_endpoint(json!({ "url": { "path": "/api" } }));
    assert_eq!(endpoint.path("/"), "/api/");
    assert_eq!(endpoint.path("/pets"), "/api/pets");
}

#[test]
fn test_path_at_root_is_identity() {
    let (endpoint, _cache) = build_endpoint(json!({}));
    assert_eq!(endpoint.path("/"), "/");
    assert_eq!(endpoint.path("/pets"), "/pets");
}

#[test]
fn test_static_path_uses_static_url_prefix_and_memoizes() {
    let (endpoint, cache) = build_endpoint(json!({
        "url": { "path": "/app" },
        "static_url": { "host": "cdn.example.com", "path": "/assets" }
    }));
    assert_eq!(endpoint.static_path("/js/app.js"), "/assets/js/app.js");
    assert_eq!(cache.derived_len("MyAppEndpoint"), 1);

    // second lookup reads the memo, no new derivation
    assert_eq!(endpoint.static_path("/js/app.js"), "/assets/js/app.js");
    assert_eq!(cache.derived_len("MyAppEndpoint"), 1);

    assert_eq!(endpoint.static_path("/css/app.css"), "/assets/css/app.css");
    assert_eq!(cache.derived_len("MyAppEndpoint"), 2);
}

#[test]
fn test_static_path_consults_digest_manifest() {
    use std::io::Write;
    let mut manifest = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        manifest,
        "{}",
        json!({ "js/app.js": "js/app-d1a2b3.js" })
    )
    .unwrap();

    let (endpoint, _cache) = build_endpoint(json!({
        "cache_static_manifest": manifest.path().to_str().unwrap()
    }));
    assert_eq!(endpoint.static_path("/js/app.js"), "/js/app-d1a2b3.js");
    // assets missing from the manifest fall back to the plain path
    assert_eq!(endpoint.static_path("/img/logo.png"), "/img/logo.png");
}

#[test]
fn test_url_resolves_deferred_port_lazily() {
    std::env::set_var("WAYPOINT_ENDPOINT_PORT", "4009");
    let (endpoint, _cache) = build_endpoint(json!({
        "url": { "host": "example.com", "port": { "system": "WAYPOINT_ENDPOINT_PORT" } }
    }));
    assert_eq!(endpoint.url(), "http://example.com:4009");
    std::env::remove_var("WAYPOINT_ENDPOINT_PORT");
}

#[test]
fn test_url_memo_invalidated_by_config_update() {
    let (endpoint, _cache) = build_endpoint(json!({ "url": { "host": "old.example.com" } }));
    assert_eq!(endpoint.url(), "http://old.example.com");

    endpoint.update_config(
        HashMap::from([("url".to_string(), json!({ "host": "new.example.com" }))]),
        &[],
    );
    assert_eq!(endpoint.url(), "http://new.example.com");
}

#[test]
fn test_config_lookup_defaults_and_updates() {
    let (endpoint, _cache) = build_endpoint(json!({}));
    assert_eq!(endpoint.config("missing", json!("dflt")), json!("dflt"));

    endpoint.update_config(HashMap::from([("root".to_string(), json!("/srv/app"))]), &[]);
    assert_eq!(endpoint.config("root", Value::Null), json!("/srv/app"));

    endpoint.update_config(HashMap::new(), &["root"]);
    assert_eq!(endpoint.config("root", json!("gone")), json!("gone"));
}

#[test]
fn test_pipeline_fault_recovers_to_error_response() {
    let _tracing = TestTracing::init();
    let faulty: Arc<dyn Plug> = Arc::new(|_ctx: RequestContext| -> RequestContext {
        panic!("database exploded");
    });
    let cache = Arc::new(ConfigCache::new());
    let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
        .plug("faulty", faulty)
        .compile(HashMap::new(), cache)
        .unwrap();

    let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/boom"));
    assert_eq!(ctx.status, 500);
    assert!(ctx.is_halted());
    // debug_errors is off, so no introspection detail leaks
    assert!(ctx.resp_body.get("detail").is_none());
}

#[test]
fn test_pipeline_fault_renders_detail_with_debug_errors() {
    let faulty: Arc<dyn Plug> = Arc::new(|_ctx: RequestContext| -> RequestContext {
        panic!("database exploded");
    });
    let cache = Arc::new(ConfigCache::new());
    let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
        .plug("faulty", faulty)
        .compile(overrides(json!({ "debug_errors": true })), cache)
        .unwrap();

    let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/boom"));
    assert_eq!(ctx.status, 500);
    assert_eq!(ctx.resp_body["detail"], json!("database exploded"));
    assert_eq!(ctx.resp_body["path"], json!("/boom"));
}

#[test]
fn test_duplicate_socket_mounts_preserved_in_order() {
    let cache = Arc::new(ConfigCache::new());
    let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
        .socket("/ws", "SocketX")
        .socket("/ws", "SocketY")
        .compile(HashMap::new(), cache)
        .unwrap();

    let mounts = endpoint.socket_mounts();
    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[0].handler, "SocketX");
    assert_eq!(mounts[1].handler, "SocketY");
    assert_eq!(mounts[0].path, "/ws");
    assert_eq!(mounts[1].path, "/ws");
}

#[test]
fn test_multiple_endpoints_share_one_cache() {
    let cache = Arc::new(ConfigCache::new());
    let a = EndpointBuilder::new("my_app", "EndpointA")
        .compile(
            overrides(json!({ "url": { "path": "/a" } })),
            Arc::clone(&cache),
        )
        .unwrap();
    let b = EndpointBuilder::new("my_app", "EndpointB")
        .compile(
            overrides(json!({ "url": { "path": "/b" } })),
            Arc::clone(&cache),
        )
        .unwrap();

    assert_eq!(a.path("/x"), "/a/x");
    assert_eq!(b.path("/x"), "/b/x");

    a.update_config(HashMap::from([("root".to_string(), json!("/only-a"))]), &[]);
    assert_eq!(b.config("root", Value::Null), Value::Null);
}
