use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::request::RequestContext;
use crate::broadcast::PubSub;
use crate::config::{ConfigCache, UrlConfig};
use crate::error::{BroadcastError, ConfigError};
use crate::instrument::InstrumenterRegistry;
use crate::pipeline::CompiledPipeline;
use crate::sockets::{SocketMount, SocketMountRegistry};
use crate::transport::Transport;

/// An unrecoverable fault raised by a pipeline step, captured for the error
/// renderer. Created per fault, never persisted.
#[derive(Debug, Clone)]
pub struct PipelineFault {
    /// Panic payload rendered to a message
    pub message: String,
    /// Method of the faulting request
    pub method: http::Method,
    /// Path of the faulting request
    pub path: String,
}

/// Collaborator that turns a captured fault into a response.
///
/// The endpoint recovers plug panics and defers here; if the renderer itself
/// faults, the fault propagates to the transport layer, which owns the
/// generic failure response.
pub trait ErrorRenderer: Send + Sync {
    /// Produce `(status, body)` for the fault. `debug` reflects the
    /// endpoint's `debug_errors` compile-time flag.
    fn render(&self, fault: &PipelineFault, debug: bool) -> (u16, Value);
}

/// Plain 500 renderer; shows the fault message only under `debug_errors`.
pub struct DefaultErrorRenderer;

impl ErrorRenderer for DefaultErrorRenderer {
    fn render(&self, fault: &PipelineFault, debug: bool) -> (u16, Value) {
        if debug {
            (
                500,
                json!({
                    "error": "internal server error",
                    "detail": fault.message,
                    "method": fault.method.as_str(),
                    "path": fault.path,
                }),
            )
        } else {
            (500, json!({ "error": "internal server error" }))
        }
    }
}

/// A compiled endpoint definition: configuration, pipeline, socket mounts,
/// and instrumentation frozen into one value.
///
/// Built by [`super::EndpointBuilder::compile`]; immutable afterward except
/// for the runtime-config subset held by the shared [`ConfigCache`].
/// Endpoints are plain values; several independent ones can coexist in a
/// process against the same or separate caches.
pub struct Endpoint {
    pub(super) otp_app: String,
    pub(super) name: Arc<str>,
    pub(super) pipeline: CompiledPipeline,
    pub(super) mounts: SocketMountRegistry,
    pub(super) instrumenters: InstrumenterRegistry,
    pub(super) cache: Arc<ConfigCache>,
    pub(super) renderer: Arc<dyn ErrorRenderer>,
    pub(super) pubsub: Option<Arc<dyn PubSub>>,
    pub(super) pubsub_name: OnceCell<Option<String>>,
    /// Compile-time `url.path` setting, normalized without a trailing slash
    /// (except for the bare root)
    pub(super) url_path: String,
    pub(super) prefix_segments: Vec<String>,
    pub(super) debug_errors: bool,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("otp_app", &self.otp_app)
            .field("name", &self.name)
            .field("url_path", &self.url_path)
            .field("prefix_segments", &self.prefix_segments)
            .field("debug_errors", &self.debug_errors)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn otp_app(&self) -> &str {
        &self.otp_app
    }

    /// Registered socket mounts, in declaration order. Duplicates at the
    /// same path are preserved.
    pub fn socket_mounts(&self) -> &[SocketMount] {
        self.mounts.mounts()
    }

    /// Number of steps compiled into the pipeline.
    pub fn pipeline_len(&self) -> usize {
        self.pipeline.len()
    }

    /// Validate mandatory boot configuration and start the transport
    /// listener when `server` is true.
    ///
    /// Fails fast: an endpoint with a missing `secret_key_base` never starts.
    pub fn start(&self, transport: &dyn Transport) -> anyhow::Result<()> {
        let secret = self.config("secret_key_base", Value::Null);
        if secret.as_str().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingSecretKeyBase {
                endpoint: self.name.to_string(),
            }
            .into());
        }

        if self.config("server", json!(false)) == json!(true) {
            info!(endpoint = %self.name, "Starting transport listener");
            transport.start(&self.name)?;
        } else {
            info!(endpoint = %self.name, "Server disabled by config; transport not started");
        }
        Ok(())
    }

    /// Per-request entry point.
    ///
    /// Stamps the context with the endpoint identity and secret material,
    /// splits the configured non-root path prefix onto the script-name
    /// accumulator, then invokes the compiled pipeline. An unrecoverable
    /// fault in a step is recovered into a structured error response via the
    /// [`ErrorRenderer`]; a fault inside the renderer itself propagates.
    pub fn handle(&self, mut ctx: RequestContext) -> RequestContext {
        ctx.endpoint = Some(Arc::clone(&self.name));
        let secret = self.config("secret_key_base", Value::Null);
        ctx.secret_key_base = secret.as_str().map(String::from);

        if self.url_path != "/" {
            ctx.script_name.extend(self.prefix_segments.iter().cloned());
        }

        let method = ctx.method.clone();
        let path = ctx.path.clone();

        match catch_unwind(AssertUnwindSafe(|| self.pipeline.call(ctx))) {
            Ok(ctx) => ctx,
            Err(payload) => {
                let message = panic_message(payload);
                error!(
                    endpoint = %self.name,
                    method = %method,
                    path = %path,
                    fault = %message,
                    "Pipeline step faulted"
                );
                let fault = PipelineFault {
                    message,
                    method: method.clone(),
                    path: path.clone(),
                };
                let (status, body) = self.renderer.render(&fault, self.debug_errors);
                let mut recovered = RequestContext::new(method, &path);
                recovered.endpoint = Some(Arc::clone(&self.name));
                recovered.respond(status, body)
            }
        }
    }

    /// Concatenate the configured path prefix with `suffix`. Pure; a
    /// root-mounted endpoint returns `suffix` unchanged.
    pub fn path(&self, suffix: &str) -> String {
        if self.url_path == "/" {
            suffix.to_string()
        } else {
            format!("{}{}", self.url_path, suffix)
        }
    }

    /// Resolve an asset path against the static-asset prefix, consulting the
    /// digest manifest when one is configured.
    ///
    /// Memoized per distinct asset via the config cache: the manifest read
    /// touches the filesystem on first access only, and `update` invalidates
    /// the memo.
    pub fn static_path(&self, asset: &str) -> String {
        let key = format!("static:{asset}");
        let value = self.cache.derive(&self.name, &key, || {
            let resolved = self.lookup_static(asset);
            Value::String(resolved)
        });
        value.as_str().unwrap_or(asset).to_string()
    }

    fn lookup_static(&self, asset: &str) -> String {
        let asset = self
            .manifest_entry(asset)
            .unwrap_or_else(|| asset.to_string());
        let static_url = self.config("static_url", Value::Null);
        let url = self.config("url", Value::Null);
        let base = if static_url.is_null() { &url } else { &static_url };
        let prefix = UrlConfig::from_value(base).path().trim_end_matches('/').to_string();
        format!("{prefix}{asset}")
    }

    /// Look the asset up in the on-disk digest manifest, if configured and
    /// lookups are enabled.
    fn manifest_entry(&self, asset: &str) -> Option<String> {
        if self.config("cache_static_lookup", json!(true)) == json!(false) {
            return None;
        }
        let manifest_path = self.config("cache_static_manifest", Value::Null);
        let manifest_path = manifest_path.as_str()?;
        let content = match std::fs::read_to_string(manifest_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    endpoint = %self.name,
                    manifest = manifest_path,
                    error = %e,
                    "Static manifest unreadable; serving undigested paths"
                );
                return None;
            }
        };
        let manifest: Value = serde_json::from_str(&content).ok()?;
        manifest
            .get(asset.trim_start_matches('/'))
            .and_then(Value::as_str)
            .map(|digested| format!("/{}", digested.trim_start_matches('/')))
    }

    /// Base URL string for the endpoint, derived lazily and memoized.
    /// Deferred `{"system": ENV}` ports resolve here, at lookup time.
    pub fn url(&self) -> String {
        self.cache
            .derive(&self.name, "derived:url", || {
                let value = self.config("url", json!({}));
                Value::String(render_base_url(&value))
            })
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Base URL for static assets; falls back to [`Endpoint::url`] when
    /// `static_url` is unset.
    pub fn static_url(&self) -> String {
        self.cache
            .derive(&self.name, "derived:static_url", || {
                let static_url = self.config("static_url", Value::Null);
                let value = if static_url.is_null() {
                    self.config("url", json!({}))
                } else {
                    static_url
                };
                Value::String(render_base_url(&value))
            })
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Read a runtime config key; absent keys yield `default`.
    pub fn config(&self, key: &str, default: Value) -> Value {
        self.cache.get(&self.name, key, default)
    }

    /// Apply a config-change event to the runtime partition.
    pub fn update_config(&self, changed: HashMap<String, Value>, removed: &[&str]) {
        self.cache.update(&self.name, changed, removed);
    }

    /// The endpoint's compiled instrumenter dispatch table.
    pub fn instrumenters(&self) -> &InstrumenterRegistry {
        &self.instrumenters
    }

    /// Wrap `work` with the observers registered for `event`; see
    /// [`InstrumenterRegistry::instrument`].
    pub fn instrument<T, F>(
        &self,
        event: &str,
        compile_meta: &Value,
        runtime_meta: &Value,
        work: F,
    ) -> T
    where
        F: FnOnce() -> T,
    {
        self.instrumenters
            .instrument(event, compile_meta, runtime_meta, work)
    }

    fn pubsub_target(&self) -> Option<String> {
        self.pubsub_name
            .get_or_init(|| {
                let pubsub = self.config("pubsub", Value::Null);
                pubsub
                    .get("name")
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .clone()
    }

    /// Forward a broadcast to the pub/sub collaborator, returning the
    /// failure indicator.
    pub fn try_broadcast(
        &self,
        topic: &str,
        event: &str,
        message: Value,
    ) -> Result<(), BroadcastError> {
        let adapter = self.pubsub.as_ref().ok_or(BroadcastError::NotConfigured)?;
        let name = self.pubsub_target().ok_or(BroadcastError::NotConfigured)?;
        adapter.broadcast(&name, topic, event, message)
    }

    /// Like [`Endpoint::try_broadcast`] but tags the sender identity so the
    /// subsystem can exclude the sender from delivery.
    pub fn try_broadcast_from(
        &self,
        sender: &str,
        topic: &str,
        event: &str,
        message: Value,
    ) -> Result<(), BroadcastError> {
        let adapter = self.pubsub.as_ref().ok_or(BroadcastError::NotConfigured)?;
        let name = self.pubsub_target().ok_or(BroadcastError::NotConfigured)?;
        adapter.broadcast_from(&name, sender, topic, event, message)
    }

    /// Broadcast, escalating failure to a fatal fault.
    ///
    /// # Panics
    ///
    /// Panics when the pub/sub call fails or no adapter is configured; use
    /// [`Endpoint::try_broadcast`] to handle failure.
    pub fn broadcast(&self, topic: &str, event: &str, message: Value) {
        if let Err(e) = self.try_broadcast(topic, event, message) {
            panic!("{e}");
        }
    }

    /// Broadcast with sender exclusion, escalating failure to a fatal fault.
    ///
    /// # Panics
    ///
    /// Panics when the pub/sub call fails or no adapter is configured; use
    /// [`Endpoint::try_broadcast_from`] to handle failure.
    pub fn broadcast_from(&self, sender: &str, topic: &str, event: &str, message: Value) {
        if let Err(e) = self.try_broadcast_from(sender, topic, event, message) {
            panic!("{e}");
        }
    }

    /// Subscribe a subscriber id to a topic on the configured pub/sub.
    pub fn subscribe(
        &self,
        subscriber: &str,
        topic: &str,
        opts: &Value,
    ) -> Result<(), BroadcastError> {
        let adapter = self.pubsub.as_ref().ok_or(BroadcastError::NotConfigured)?;
        let name = self.pubsub_target().ok_or(BroadcastError::NotConfigured)?;
        adapter.subscribe(&name, subscriber, topic, opts)
    }

    pub fn unsubscribe(&self, subscriber: &str, topic: &str) -> Result<(), BroadcastError> {
        let adapter = self.pubsub.as_ref().ok_or(BroadcastError::NotConfigured)?;
        let name = self.pubsub_target().ok_or(BroadcastError::NotConfigured)?;
        adapter.unsubscribe(&name, subscriber, topic)
    }
}

/// Render a `url`/`static_url` config value into a base URL string,
/// resolving any deferred port from the environment now.
fn render_base_url(value: &Value) -> String {
    let cfg = UrlConfig::from_value(value);
    let mut base = format!("{}://{}", cfg.scheme(), cfg.host());
    if let Some(port) = cfg.port() {
        let default_port = if cfg.scheme() == "https" { 443 } else { 80 };
        if port != default_port {
            base.push_str(&format!(":{port}"));
        }
    }
    // normalize through the url crate; it appends the root path
    match url::Url::parse(&base) {
        Ok(parsed) => parsed.to_string().trim_end_matches('/').to_string(),
        Err(_) => base,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
