use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// The `features` section of the flag document: flag name to arbitrary
/// value. Only boolean values mean anything to the evaluator; entries of
/// other types are carried so unrelated tooling can keep data alongside the
/// flags.
pub type Features = HashMap<String, serde_json::Value>;

/// A single throttle's stored configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Hash buckets that are always allowed through, bypassing probability.
    #[serde(default)]
    pub whitelist: HashSet<u32>,
    /// Likelihood that a bucket is allowed through, as a percentage.
    /// Truncated to two decimal places.
    #[serde(default)]
    pub probability: f64,
    /// When set, rejects every request regardless of whitelist or
    /// probability.
    #[serde(default)]
    pub disabled: bool,
}

/// The decoded flag document, the single stored record both evaluators read.
///
/// A document without a `throttles` section decodes to an empty map.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub throttles: HashMap<String, ThrottleConfig>,
}

/// A throttle config with its probability resolved to an integer threshold
/// on the bucket scale.
#[derive(Debug, Clone)]
pub(crate) struct ThrottleRule {
    pub config: ThrottleConfig,
    /// `floor(probability * 100)`: hundredths of a percent, compared
    /// directly against hash buckets. Not clamped here; values above the
    /// bucket range admit everything at decision time.
    pub threshold: u32,
}

impl From<ThrottleConfig> for ThrottleRule {
    fn from(config: ThrottleConfig) -> Self {
        let threshold = (config.probability * 100.0).floor() as u32;
        ThrottleRule { config, threshold }
    }
}
