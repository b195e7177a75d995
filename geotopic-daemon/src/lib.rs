mod store;

use geotopic_logic::{BucketKey, LocationSample, UtcDT};
use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use serde::{Deserialize, Serialize};

pub use store::JsonFileStore;

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonRequest {
    /// Start location updates and persist that they're on
    Start,
    /// Stop location updates and persist that they're off
    Stop,
    /// Deliver a location, `timestamp` defaults to when the daemon receives it
    PushLocation {
        lat: f64,
        long: f64,
        timestamp: Option<UtcDT>,
    },
    /// Report the current subscription state
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    pub requesting: bool,
    pub running: bool,
    pub current_bucket: Option<BucketKey>,
    pub last_location: Option<LocationSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DaemonResponse {
    Complete,
    Status(DaemonStatus),
    Error(String),
}

impl From<DaemonStatus> for DaemonResponse {
    fn from(val: DaemonStatus) -> Self {
        DaemonResponse::Status(val)
    }
}

impl From<anyhow::Error> for DaemonResponse {
    fn from(value: anyhow::Error) -> Self {
        DaemonResponse::Error(format!("{value:#}"))
    }
}

/// Encode a message as a single line of JSON
pub fn encode_line(msg: &impl Serialize) -> Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(msg).context("Failed to encode message")?;
    encoded.push(b'\n');
    Ok(encoded)
}
