//! # Waypoint
//!
//! **Waypoint** is the endpoint core of a web-application framework: it binds
//! incoming requests to a configured endpoint value, compiles a chain of
//! middleware ("plugs") once at build time, keeps a read-optimized
//! per-endpoint configuration cache, records socket mounts for protocol
//! upgrades, fans instrumented units of work out to observer modules, and
//! forwards broadcasts to an external pub/sub subsystem.
//!
//! ## Architecture
//!
//! - **[`config`]** - configuration loader, recognized key families, and the
//!   process-wide read-optimized config cache
//! - **[`pipeline`]** - the `Plug` trait and the compiler that folds an
//!   ordered step list into one composed handler with halt short-circuiting
//! - **[`endpoint`]** - the builder that accumulates plugs/mounts/observers
//!   and the compiled `Endpoint` value with its request dispatcher
//! - **[`sockets`]** - the static socket mount registry
//! - **[`instrument`]** - before/after observer fan-out with compile-time
//!   event dispatch
//! - **[`broadcast`]** - the pub/sub collaborator interface behind the
//!   endpoint's broadcast façade
//! - **[`transport`]** - the external server adapter seam
//!
//! The declarative pieces (`plug`, `socket`, `instrumenter`) are collected by
//! an [`endpoint::EndpointBuilder`] and frozen by `compile()`: configuration
//! is loaded and validated, conditional steps (TLS redirect, debug
//! introspection) are injected from compile-time flags, the pipeline becomes
//! a single pre-built call chain, and the cache is populated. Per-request
//! work never re-walks the step list.
//!
//! ## Quick start
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use serde_json::json;
//! use waypoint::config::ConfigCache;
//! use waypoint::endpoint::{EndpointBuilder, RequestContext};
//! use waypoint::pipeline::Plug;
//!
//! let cache = Arc::new(ConfigCache::new());
//! let hello: Arc<dyn Plug> = Arc::new(|ctx: RequestContext| {
//!     ctx.respond(200, json!({ "hello": "world" }))
//! });
//!
//! let endpoint = EndpointBuilder::new("my_app", "MyAppEndpoint")
//!     .plug("hello", hello)
//!     .socket("/ws", "UserSocket")
//!     .compile(HashMap::new(), cache)
//!     .unwrap();
//!
//! let ctx = endpoint.handle(RequestContext::new(http::Method::GET, "/"));
//! assert_eq!(ctx.status, 200);
//! ```
//!
//! ## Concurrency model
//!
//! One request context per handling task, owned exclusively for the request's
//! duration, so there is no locking on the hot path. The config cache is the only
//! shared mutable state: reads are lock-free snapshot loads, config-change
//! events replace snapshots wholesale, and derived values are memoized at
//! most once between invalidations. Instrumentation hooks run synchronously,
//! inline with the work they observe.

pub mod broadcast;
pub mod config;
pub mod endpoint;
pub mod instrument;
pub mod pipeline;
pub mod sockets;
pub mod transport;

mod error;

pub use config::{ConfigCache, EndpointConfig};
pub use endpoint::{Endpoint, EndpointBuilder, RequestContext};
pub use error::{BroadcastError, ConfigError};
pub use instrument::{Instrumenter, InstrumenterRegistry};
pub use pipeline::{CompiledPipeline, PipelineStep, Plug};
pub use sockets::{SocketMount, SocketMountRegistry};
pub use transport::Transport;
