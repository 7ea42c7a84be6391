use super::core::Plug;
use crate::endpoint::RequestContext;
use serde_json::{json, Value};

/// Redirects plain-HTTP requests to HTTPS.
///
/// Only compiled into the chain when `force_ssl` is configured; an endpoint
/// without it pays nothing. Options may pin the redirect host, otherwise the
/// request host is reused.
pub struct ForceSslPlug {
    host: Option<String>,
}

impl ForceSslPlug {
    pub fn from_options(options: &Value) -> Self {
        Self {
            host: options
                .get("host")
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

impl Plug for ForceSslPlug {
    fn call(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.scheme == "https" {
            return ctx;
        }
        let host = self.host.as_deref().unwrap_or(&ctx.host);
        let location = format!("https://{}{}", host, ctx.path);
        ctx.set_resp_header("location", location);
        ctx.respond(301, Value::Null)
    }
}

/// Marks the context so faults render with introspection detail.
///
/// Only compiled in when `debug_errors` is true; the error renderer reads
/// the assign to decide how much it may show.
pub struct DebugErrorsPlug;

impl Plug for DebugErrorsPlug {
    fn call(&self, mut ctx: RequestContext) -> RequestContext {
        ctx.assign("debug_errors", json!(true));
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_force_ssl_redirects_http() {
        let plug = ForceSslPlug::from_options(&json!({}));
        let mut ctx = RequestContext::new(Method::GET, "/admin");
        ctx.host = "example.com".to_string();
        let ctx = plug.call(ctx);
        assert!(ctx.is_halted());
        assert_eq!(ctx.status, 301);
        assert_eq!(
            ctx.resp_headers
                .iter()
                .find(|(k, _)| k.as_ref() == "location")
                .map(|(_, v)| v.as_str()),
            Some("https://example.com/admin")
        );
    }

    #[test]
    fn test_force_ssl_passes_https_through() {
        let plug = ForceSslPlug::from_options(&json!({ "host": "ssl.example.com" }));
        let mut ctx = RequestContext::new(Method::GET, "/admin");
        ctx.scheme = "https".to_string();
        let ctx = plug.call(ctx);
        assert!(!ctx.is_halted());
        assert_eq!(ctx.status, 0);
    }

    #[test]
    fn test_debug_errors_sets_assign() {
        let ctx = DebugErrorsPlug.call(RequestContext::new(Method::GET, "/"));
        assert_eq!(ctx.get_assign("debug_errors"), Some(&json!(true)));
        assert!(!ctx.is_halted());
    }
}
