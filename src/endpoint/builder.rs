use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::core::{DefaultErrorRenderer, Endpoint, ErrorRenderer};
use crate::broadcast::PubSub;
use crate::config::{self, ConfigCache};
use crate::error::ConfigError;
use crate::instrument::{Instrumenter, InstrumenterRegistry};
use crate::pipeline::{CompiledPipeline, DebugErrorsPlug, ForceSslPlug, PipelineStep, Plug};
use crate::sockets::SocketMountRegistry;

/// Declarative accumulator for one endpoint definition.
///
/// Collects plugs, socket mounts, and instrumenters in declaration order,
/// then [`EndpointBuilder::compile`] freezes them: the config loader runs,
/// conditional steps are injected per the compile-time flags, the pipeline
/// folds into a single composed handler, the instrumenter dispatch table is
/// built, and the config cache is populated. The result is an immutable
/// [`Endpoint`] value.
pub struct EndpointBuilder {
    otp_app: String,
    name: String,
    steps: Vec<PipelineStep>,
    mounts: SocketMountRegistry,
    observers: Vec<Arc<dyn Instrumenter>>,
    pubsub: Option<Arc<dyn PubSub>>,
    renderer: Option<Arc<dyn ErrorRenderer>>,
}

impl EndpointBuilder {
    pub fn new(otp_app: &str, name: &str) -> Self {
        Self {
            otp_app: otp_app.to_string(),
            name: name.to_string(),
            steps: Vec::new(),
            mounts: SocketMountRegistry::new(),
            observers: Vec::new(),
            pubsub: None,
            renderer: None,
        }
    }

    /// Register a pipeline step. Steps execute front-to-back in declaration
    /// order; a later step only runs if no earlier one halted.
    pub fn plug(mut self, name: &str, plug: Arc<dyn Plug>) -> Self {
        self.steps.push(PipelineStep::new(name, plug));
        self
    }

    /// Register a step that compile-time configuration may disable.
    pub fn plug_if(mut self, name: &str, plug: Arc<dyn Plug>, enabled: bool) -> Self {
        let mut step = PipelineStep::new(name, plug);
        step.enabled = enabled;
        self.steps.push(step);
        self
    }

    /// Record a socket mount. Duplicate paths are kept as declared.
    pub fn socket(mut self, path: &str, handler: &str) -> Self {
        self.mounts.register(path, handler);
        self
    }

    /// Register an instrumentation observer. Observers run in registration
    /// order per event.
    pub fn instrumenter(mut self, observer: Arc<dyn Instrumenter>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Attach the pub/sub collaborator the broadcast façade forwards to.
    pub fn pubsub(mut self, adapter: Arc<dyn PubSub>) -> Self {
        self.pubsub = Some(adapter);
        self
    }

    /// Replace the default error renderer.
    pub fn error_renderer(mut self, renderer: Arc<dyn ErrorRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Freeze the declaration into a compiled [`Endpoint`].
    ///
    /// Loads and validates configuration (fatal on malformed mandatory key
    /// families), injects the TLS-redirect and debug-introspection steps
    /// when their compile-time flags ask for them, compiles the pipeline
    /// once, and populates `cache` with the runtime config partition.
    pub fn compile(
        self,
        overrides: HashMap<String, Value>,
        cache: Arc<ConfigCache>,
    ) -> Result<Endpoint, ConfigError> {
        let config = config::load(&self.otp_app, &self.name, overrides)?;

        // Conditional steps run ahead of user plugs: a TLS redirect must win
        // before any step touches the request.
        let mut steps = Vec::with_capacity(self.steps.len() + 2);
        if let Some(force_ssl) = config.get("force_ssl") {
            if !force_ssl.is_null() {
                steps.push(PipelineStep::new(
                    "force_ssl",
                    Arc::new(ForceSslPlug::from_options(force_ssl)),
                ));
            }
        }
        if config.flag("debug_errors") {
            steps.push(PipelineStep::new("debug_errors", Arc::new(DebugErrorsPlug)));
        }
        steps.extend(self.steps);

        let pipeline = CompiledPipeline::compile(&steps);
        let instrumenters = InstrumenterRegistry::compile(&self.observers);

        let url_path = normalize_prefix(config.url().path());
        let prefix_segments: Vec<String> = url_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let debug_errors = config.flag("debug_errors");

        cache.insert(&config);

        info!(
            endpoint = %self.name,
            otp_app = %self.otp_app,
            steps = pipeline.len(),
            mounts = self.mounts.len(),
            observers = self.observers.len(),
            prefix = %url_path,
            "Endpoint compiled"
        );

        Ok(Endpoint {
            otp_app: self.otp_app,
            name: Arc::from(self.name),
            pipeline,
            mounts: self.mounts,
            instrumenters,
            cache,
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(DefaultErrorRenderer)),
            pubsub: self.pubsub,
            pubsub_name: OnceCell::new(),
            url_path,
            prefix_segments,
            debug_errors,
        })
    }
}

/// Normalize the configured mount path: no trailing slash except for the
/// bare root, leading slash guaranteed.
fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
