use std::fmt;

/// Fatal configuration error raised while loading or booting an endpoint.
///
/// Loader and boot failures abort startup: an endpoint must never begin
/// serving requests with invalid mandatory configuration. Runtime lookups
/// never produce this error; absent keys degrade to caller defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `secret_key_base` is absent or null while the endpoint is serving
    ///
    /// Every endpoint that serves requests needs secret material for signed
    /// data. Set `secret_key_base` in the endpoint configuration.
    MissingSecretKeyBase {
        /// Name of the endpoint being booted
        endpoint: String,
    },
    /// A pub/sub adapter was configured without a name
    ///
    /// The broadcast façade resolves its target by name, so an adapter entry
    /// under `pubsub` must carry a `name` key.
    PubSubMissingName {
        /// The adapter that was configured
        adapter: String,
    },
    /// A recognized key carries a value of the wrong shape
    MalformedKey {
        /// The offending configuration key
        key: String,
        /// What the loader expected to find
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingSecretKeyBase { endpoint } => {
                write!(
                    f,
                    "endpoint configuration error: `secret_key_base` is not set for \
                    endpoint '{}'. A non-null secret_key_base is required before \
                    serving requests.",
                    endpoint
                )
            }
            ConfigError::PubSubMissingName { adapter } => {
                write!(
                    f,
                    "endpoint configuration error: pubsub adapter '{}' was configured \
                    without a name. Add a `name` entry to the `pubsub` config.",
                    adapter
                )
            }
            ConfigError::MalformedKey { key, reason } => {
                write!(
                    f,
                    "endpoint configuration error: key `{}` is malformed: {}",
                    key, reason
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure reported by the pub/sub collaborator on a broadcast call.
///
/// The `try_broadcast*` façade methods return this; the `broadcast*`
/// variants escalate it to a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// No pub/sub adapter is configured for the endpoint
    NotConfigured,
    /// The pub/sub subsystem rejected or failed the broadcast
    Failed {
        /// Reason reported by the adapter
        reason: String,
    },
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::NotConfigured => {
                write!(f, "broadcast failed: no pubsub adapter configured")
            }
            BroadcastError::Failed { reason } => {
                write!(f, "broadcast failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for BroadcastError {}
