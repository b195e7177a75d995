use crate::prelude::*;

/// Client for a push messaging service that can subscribe this device to named topics.
///
/// Both operations are expected to be idempotent on the service side, subscribing to a topic
/// twice or unsubscribing from a topic we aren't subscribed to should succeed and do nothing.
pub trait TopicMessaging: Send + Sync + 'static {
    /// Subscribe this device to `topic`
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result> + Send;
    /// Unsubscribe this device from `topic`
    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result> + Send;
}
