//! Retrieval tiers and the flat per-GB cost table.

use crate::error::RestoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bytes in one GB for pricing purposes
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Glacier retrieval tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RestoreTier {
    /// Minutes; most expensive
    Expedited,
    /// Hours
    Standard,
    /// Up to half a day; cheapest
    Bulk,
}

impl RestoreTier {
    /// Every tier, fastest first
    pub const ALL: [RestoreTier; 3] = [
        RestoreTier::Expedited,
        RestoreTier::Standard,
        RestoreTier::Bulk,
    ];

    /// Retrieval price in USD per GB
    pub fn rate_per_gb(&self) -> f64 {
        match self {
            RestoreTier::Expedited => 0.10,
            RestoreTier::Standard => 0.02,
            RestoreTier::Bulk => 0.0025,
        }
    }

    /// Name used in `GlacierJobParameters.Tier`
    pub fn api_name(&self) -> &'static str {
        match self {
            RestoreTier::Expedited => "Expedited",
            RestoreTier::Standard => "Standard",
            RestoreTier::Bulk => "Bulk",
        }
    }

    /// Rough retrieval latency for GLACIER objects
    pub fn typical_latency(&self) -> &'static str {
        match self {
            RestoreTier::Expedited => "1-5 minutes",
            RestoreTier::Standard => "3-5 hours",
            RestoreTier::Bulk => "5-12 hours",
        }
    }

    /// DEEP_ARCHIVE has no expedited retrieval
    pub fn supports(&self, storage_class: &str) -> bool {
        !(storage_class == "DEEP_ARCHIVE" && *self == RestoreTier::Expedited)
    }
}

impl fmt::Display for RestoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreTier::Expedited => write!(f, "expedited"),
            RestoreTier::Standard => write!(f, "standard"),
            RestoreTier::Bulk => write!(f, "bulk"),
        }
    }
}

impl FromStr for RestoreTier {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expedited" => Ok(RestoreTier::Expedited),
            "standard" => Ok(RestoreTier::Standard),
            "bulk" => Ok(RestoreTier::Bulk),
            _ => Err(RestoreError::UnknownTier {
                value: s.to_string(),
            }),
        }
    }
}

/// Cost of restoring a given volume at one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Tier priced
    pub tier: RestoreTier,
    /// Volume in GB
    pub size_gb: f64,
    /// USD per GB
    pub rate_per_gb: f64,
    /// size_gb * rate_per_gb
    pub cost_usd: f64,
}

impl CostEstimate {
    /// Price `size_gb` gigabytes at `tier`
    pub fn for_gb(size_gb: f64, tier: RestoreTier) -> Self {
        let rate_per_gb = tier.rate_per_gb();
        Self {
            tier,
            size_gb,
            rate_per_gb,
            cost_usd: size_gb * rate_per_gb,
        }
    }

    /// Price a byte count at `tier`
    pub fn for_bytes(total_bytes: u64, tier: RestoreTier) -> Self {
        Self::for_gb(total_bytes as f64 / BYTES_PER_GB, tier)
    }

    /// One estimate per tier, fastest first
    pub fn all_tiers(total_bytes: u64) -> Vec<Self> {
        RestoreTier::ALL
            .iter()
            .map(|tier| Self::for_bytes(total_bytes, *tier))
            .collect()
    }
}
