//! Pub/sub collaborator interface.
//!
//! The broadcast transport itself is external; the endpoint only forwards
//! `(topic, event, message)` triples to it, addressed by the target name
//! resolved once from the `pubsub` config family. The façade methods live on
//! [`crate::endpoint::Endpoint`].

use crate::error::BroadcastError;
use serde_json::Value;

/// External pub/sub subsystem the endpoint forwards to.
///
/// `name` is the configured target (`pubsub.name`); adapters hosting several
/// logical pub/sub instances dispatch on it.
pub trait PubSub: Send + Sync {
    fn subscribe(&self, name: &str, subscriber: &str, topic: &str, opts: &Value)
        -> Result<(), BroadcastError>;

    fn unsubscribe(&self, name: &str, subscriber: &str, topic: &str)
        -> Result<(), BroadcastError>;

    fn broadcast(
        &self,
        name: &str,
        topic: &str,
        event: &str,
        message: Value,
    ) -> Result<(), BroadcastError>;

    /// Broadcast tagged with the sender identity so the subsystem can
    /// exclude the sender from delivery.
    fn broadcast_from(
        &self,
        name: &str,
        sender: &str,
        topic: &str,
        event: &str,
        message: Value,
    ) -> Result<(), BroadcastError>;
}
