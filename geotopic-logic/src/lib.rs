mod bucket;
mod location;
mod messaging;
mod settings;
#[cfg(test)]
mod tests;
mod tracker;
mod updates;

pub use bucket::{BUCKET_PRECISION, BucketKey, encode_geohash};
pub use location::{LocationRequest, LocationSample, LocationService, UtcDT};
pub use messaging::TopicMessaging;
pub use settings::{
    KEY_PREV_GEO_HASH, KEY_REQUESTING_LOCATION_UPDATES, MemoryStore, SettingValue, SettingsStore,
    SubscriptionState,
};
pub use tracker::{BucketTracker, TransitionResult};
pub use updates::LocationUpdates;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
