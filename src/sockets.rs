//! Socket mount registry: path → handler bindings for realtime/streaming
//! protocol upgrades. Static metadata, built once at endpoint compile time
//! and never mutated afterward.

use tracing::debug;

/// One registered upgrade binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketMount {
    /// Mount path, e.g. `/ws`
    pub path: String,
    /// Handler module identifier the upgrade router dispatches to
    pub handler: String,
}

/// Ordered collection of socket mounts.
///
/// Registrations at the same path are intentionally NOT deduplicated: mounts
/// are recorded exactly as declared, and the upgrade-routing layer (an
/// external collaborator) owns disambiguation.
#[derive(Debug, Clone, Default)]
pub struct SocketMountRegistry {
    mounts: Vec<SocketMount>,
}

impl SocketMountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mount in declaration order.
    pub fn register(&mut self, path: &str, handler: &str) {
        debug!(path = path, handler = handler, "Socket mount registered");
        self.mounts.push(SocketMount {
            path: path.to_string(),
            handler: handler.to_string(),
        });
    }

    /// All mounts, in registration order.
    pub fn mounts(&self) -> &[SocketMount] {
        &self.mounts
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
