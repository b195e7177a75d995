use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    bucket::BucketKey,
    location::LocationSample,
    messaging::TopicMessaging,
    settings::{SettingsStore, SubscriptionState},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionResult {
    /// The sample is in the bucket we're already subscribed to
    Unchanged,
    /// The sample moved us to a new bucket, `from` is [None] on the very first subscription
    Transitioned {
        from: Option<BucketKey>,
        to: BucketKey,
    },
    /// The sample's coordinates couldn't be bucketed, nothing was changed
    Ignored,
}

/// Watches location samples and keeps this device subscribed to the topic for the bucket it's
/// currently in.
///
/// The new bucket is persisted before the messaging calls finish, those calls are spawned and
/// their outcome is only logged. A failed call is not retried, the next bucket change will
/// subscribe/unsubscribe again.
pub struct BucketTracker<M: TopicMessaging, S: SettingsStore> {
    messaging: Arc<M>,
    settings: Arc<S>,
    // Serializes compare-and-write so two samples can't both see the same previous bucket
    lock: Mutex<()>,
}

impl<M: TopicMessaging, S: SettingsStore> BucketTracker<M, S> {
    pub fn new(messaging: Arc<M>, settings: Arc<S>) -> Self {
        Self {
            messaging,
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        SubscriptionState::load(self.settings.as_ref())
    }

    pub async fn on_location_sample(&self, sample: &LocationSample) -> TransitionResult {
        let new_key = match BucketKey::derive(sample.lat, sample.long) {
            Ok(key) => key,
            Err(why) => {
                warn!("Ignoring location sample: {why:?}");
                return TransitionResult::Ignored;
            }
        };

        let _guard = self.lock.lock().await;

        let mut state = SubscriptionState::load(self.settings.as_ref());

        if state.current_bucket.as_ref() == Some(&new_key) {
            return TransitionResult::Unchanged;
        }

        let prev_key = state.current_bucket.replace(new_key.clone());
        state.save(self.settings.as_ref());

        info!(
            "Moved from bucket {} to {new_key}",
            prev_key.as_ref().map_or("(none)", BucketKey::as_str)
        );

        if let Some(prev_key) = prev_key.clone() {
            self.spawn_unsubscribe(prev_key);
        }
        self.spawn_subscribe(new_key.clone());

        TransitionResult::Transitioned {
            from: prev_key,
            to: new_key,
        }
    }

    fn spawn_unsubscribe(&self, key: BucketKey) {
        let messaging = self.messaging.clone();
        tokio::spawn(async move {
            match messaging.unsubscribe(key.as_str()).await {
                Ok(()) => debug!("--- {key} topic is unsubscribed"),
                Err(why) => warn!("--- {key} topic unsubscribing failed: {why:?}"),
            }
        });
    }

    fn spawn_subscribe(&self, key: BucketKey) {
        let messaging = self.messaging.clone();
        tokio::spawn(async move {
            match messaging.subscribe(key.as_str()).await {
                Ok(()) => debug!("+++ {key} topic is subscribed"),
                Err(why) => warn!("+++ {key} topic subscribing failed: {why:?}"),
            }
        });
    }
}
