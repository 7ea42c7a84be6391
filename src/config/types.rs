use serde_json::{json, Value};
use std::collections::HashMap;

/// Keys baked into the compiled endpoint. Changing one requires recompiling
/// the endpoint (a new [`crate::endpoint::EndpointBuilder::compile`] call);
/// everything else lives in the runtime partition held by the config cache.
pub const COMPILE_TIME_KEYS: [&str; 5] = [
    "code_reloader",
    "debug_errors",
    "force_ssl",
    "render_errors",
    "instrumenters",
];

/// Boolean-valued keys the loader validates up front.
pub(crate) const BOOLEAN_KEYS: [&str; 5] = [
    "code_reloader",
    "debug_errors",
    "server",
    "cache_static_lookup",
    "longpoll_crossdomain",
];

/// Resolved configuration for one endpoint.
///
/// A flat map of recognized key to [`serde_json::Value`], produced by
/// [`super::load`] from declared defaults merged with application-supplied
/// overrides. Immutable once built; the runtime partition is copied into the
/// [`super::ConfigCache`] at compile time and mutated only through
/// [`super::ConfigCache::update`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Owning application identifier
    pub otp_app: String,
    /// Endpoint identity the config belongs to
    pub endpoint: String,
    values: HashMap<String, Value>,
}

impl EndpointConfig {
    pub(crate) fn new(otp_app: &str, endpoint: &str, values: HashMap<String, Value>) -> Self {
        Self {
            otp_app: otp_app.to_string(),
            endpoint: endpoint.to_string(),
            values,
        }
    }

    /// Declared defaults for the recognized key families.
    pub fn defaults() -> HashMap<String, Value> {
        let map = json!({
            "code_reloader": false,
            "debug_errors": false,
            "render_errors": { "formats": ["html", "json"] },
            "instrumenters": [],
            "root": Value::Null,
            "cache_static_lookup": true,
            "cache_static_manifest": Value::Null,
            "check_origin": true,
            "http": Value::Null,
            "https": Value::Null,
            "force_ssl": Value::Null,
            "secret_key_base": Value::Null,
            "server": false,
            "url": { "host": "localhost", "path": "/" },
            "static_url": Value::Null,
            "watchers": [],
            "live_reload": [],
            "pubsub": Value::Null,
        });
        match map {
            Value::Object(obj) => obj.into_iter().collect(),
            _ => HashMap::new(),
        }
    }

    /// Look up a key; `None` when absent (distinct from an explicit null).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a boolean flag, treating absent or null as `false`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    /// Whether `key` belongs to the compile-time partition.
    pub fn is_compile_time(key: &str) -> bool {
        COMPILE_TIME_KEYS.contains(&key)
    }

    /// The runtime partition: every key that may change without recompiling
    /// the endpoint. This is what seeds the config cache at boot.
    pub fn runtime_partition(&self) -> HashMap<String, Value> {
        self.values
            .iter()
            .filter(|(k, _)| !Self::is_compile_time(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// View the `url` family (or any url-shaped value) through [`UrlConfig`].
    pub fn url(&self) -> UrlConfig<'_> {
        UrlConfig {
            value: self.values.get("url"),
        }
    }

    /// View the `static_url` family; falls back to `url` when unset, which
    /// matches how asset paths are served from the main host by default.
    pub fn static_url(&self) -> UrlConfig<'_> {
        let value = match self.values.get("static_url") {
            Some(Value::Null) | None => self.values.get("url"),
            other => other,
        };
        UrlConfig { value }
    }
}

/// Accessor over a `url`/`static_url` config value.
///
/// The `port` entry may be the deferred indirection `{"system": "ENV_VAR"}`:
/// the environment variable is read at lookup time, not at load time, so a
/// release image can bake its config and still pick the port up from the
/// deployment environment.
#[derive(Debug, Clone, Copy)]
pub struct UrlConfig<'a> {
    value: Option<&'a Value>,
}

impl<'a> UrlConfig<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        Self { value: Some(value) }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        self.value.and_then(|v| v.get(name))
    }

    pub fn scheme(&self) -> &'a str {
        self.field("scheme").and_then(Value::as_str).unwrap_or("http")
    }

    pub fn host(&self) -> &'a str {
        self.field("host").and_then(Value::as_str).unwrap_or("localhost")
    }

    /// Path prefix the endpoint is mounted under. Root by default.
    pub fn path(&self) -> &'a str {
        self.field("path").and_then(Value::as_str).unwrap_or("/")
    }

    /// Resolve the configured port, honoring `{"system": "ENV_VAR"}`
    /// indirection by reading the environment now rather than at load time.
    pub fn port(&self) -> Option<u16> {
        match self.field("port") {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Object(obj)) => {
                let var = obj.get("system").and_then(Value::as_str)?;
                std::env::var(var).ok().and_then(|p| p.parse().ok())
            }
            _ => None,
        }
    }
}
