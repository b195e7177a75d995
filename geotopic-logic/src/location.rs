use std::{sync::Arc, time::Duration};

use anyhow::ensure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{bucket::encode_geohash, prelude::*};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A single reading from a location provider
pub struct LocationSample {
    pub lat: f64,
    pub long: f64,
    /// When the reading was taken, newer readings always win over older ones
    pub timestamp: UtcDT,
}

impl LocationSample {
    pub fn new(lat: f64, long: f64, timestamp: UtcDT) -> Self {
        Self {
            lat,
            long,
            timestamp,
        }
    }

    /// Sample taken right now
    pub fn now(lat: f64, long: f64) -> Self {
        Self::new(lat, long, Utc::now())
    }

    /// Full precision geohash, only used for display and logging
    pub fn geohash(&self) -> Option<String> {
        encode_geohash(self.lat, self.long, 12).ok()
    }
}

pub trait LocationService: Send + Sync + 'static {
    /// Read the current location, returns [None] if the location is unavailable right now
    fn get_loc(&self) -> Option<LocationSample>;
}

impl<L: LocationService> LocationService for Arc<L> {
    fn get_loc(&self) -> Option<LocationSample> {
        self.as_ref().get_loc()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// How often location updates should be delivered
pub struct LocationRequest {
    /// Nominal time between polls of the [LocationService]
    pub interval: Duration,
    /// Samples arriving faster than this are coalesced, only the newest is processed
    pub fastest_interval: Duration,
}

impl LocationRequest {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);

    pub fn new(interval: Duration, fastest_interval: Duration) -> Result<Self> {
        let req = Self {
            interval,
            fastest_interval,
        };
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result {
        ensure!(
            !self.fastest_interval.is_zero(),
            "Fastest interval must be greater than zero"
        );
        ensure!(
            self.fastest_interval <= self.interval,
            "Fastest interval ({:?}) can't be longer than the interval ({:?})",
            self.fastest_interval,
            self.interval
        );
        Ok(())
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            fastest_interval: Self::DEFAULT_INTERVAL / 2,
        }
    }
}
