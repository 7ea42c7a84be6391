//! Transport adapter seam.
//!
//! The HTTP/WebSocket listener is an external collaborator: it accepts
//! connections, hands each request to [`crate::endpoint::Endpoint::handle`],
//! and writes responses back. The endpoint only decides whether to start it,
//! per the `server` boolean config.

/// External server/transport adapter started by
/// [`crate::endpoint::Endpoint::start`].
pub trait Transport: Send + Sync {
    /// Start listening on behalf of the named endpoint.
    fn start(&self, endpoint: &str) -> anyhow::Result<()>;

    /// Stop the listener. Optional; adapters without graceful shutdown keep
    /// the default.
    fn stop(&self, _endpoint: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
