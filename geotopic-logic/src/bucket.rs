use std::fmt;

use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Precision used for topic buckets, a cell is roughly 39km x 20km
pub const BUCKET_PRECISION: usize = 4;

const MAX_PRECISION: usize = 12;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Encode a coordinate as a geohash string of `precision` characters.
///
/// Longitude is bisected first, then latitude, alternating. A coordinate on a midpoint falls into
/// the upper half.
pub fn encode_geohash(lat: f64, long: f64, precision: usize) -> Result<String> {
    ensure!(
        (1..=MAX_PRECISION).contains(&precision),
        "Geohash precision must be between 1 and {MAX_PRECISION}, got {precision}"
    );
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        bail!("Latitude {lat} is out of range");
    }
    if !long.is_finite() || !(-180.0..=180.0).contains(&long) {
        bail!("Longitude {long} is out of range");
    }

    let mut lat_range = (-90.0, 90.0);
    let mut long_range = (-180.0, 180.0);
    let mut hash = String::with_capacity(precision);
    let mut even = true;

    while hash.len() < precision {
        let mut idx = 0usize;
        for _ in 0..5 {
            let (value, range) = if even {
                (long, &mut long_range)
            } else {
                (lat, &mut lat_range)
            };
            let mid = (range.0 + range.1) / 2.0;
            idx <<= 1;
            if value >= mid {
                idx |= 1;
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
        hash.push(BASE32[idx] as char);
    }

    Ok(hash)
}

/// Coarse grid cell a device is in, doubles as the name of the messaging topic for that cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketKey(String);

impl BucketKey {
    /// Derive the bucket for a coordinate at [BUCKET_PRECISION]
    pub fn derive(lat: f64, long: f64) -> Result<Self> {
        encode_geohash(lat, long, BUCKET_PRECISION).map(Self)
    }

    /// Wrap a previously persisted key, empty strings mean there is no key
    pub fn from_persisted(raw: String) -> Option<Self> {
        if raw.is_empty() { None } else { Some(Self(raw)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
