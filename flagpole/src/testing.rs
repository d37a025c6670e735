//! Test support for downstream crates: a canned feature store and a manual
//! clock.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::client::FeatureStore;
use crate::time::TimeSource;

/// Feature store answering every operation from a fixed `name -> bool` map.
///
/// Flag and throttle lookups read the same map, so a test can force a
/// throttle decision without building throttle configs:
///
/// ```
/// use flagpole::{testing::StaticFeatureStore, FeatureStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let flags = StaticFeatureStore::from([("featureA", true)]);
/// assert!(flags.enabled("featureA").await);
/// assert!(!flags.enabled("featureB").await);
/// assert!(flags.throttle_allow("featureA", &mut "".as_bytes()).await);
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticFeatureStore {
    flags: HashMap<String, bool>,
}

impl StaticFeatureStore {
    pub fn new(flags: HashMap<String, bool>) -> StaticFeatureStore {
        StaticFeatureStore { flags }
    }
}

impl<const N: usize> From<[(&str, bool); N]> for StaticFeatureStore {
    fn from(entries: [(&str, bool); N]) -> StaticFeatureStore {
        StaticFeatureStore {
            flags: entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

#[async_trait]
impl FeatureStore for StaticFeatureStore {
    async fn enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    async fn bool_flags(&self) -> HashMap<String, bool> {
        self.flags.clone()
    }

    async fn throttle_allow(&self, key: &str, _data: &mut (dyn Read + Send)) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    fn throttle_hash(&self, _key: &str, _data: &mut (dyn Read + Send)) -> u32 {
        0
    }
}

/// Time source a test sets and advances by hand.
pub struct ManualTime {
    now: Mutex<OffsetDateTime>,
}

impl ManualTime {
    /// Starts at the unix epoch.
    pub fn new() -> ManualTime {
        ManualTime::starting_at(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn starting_at(now: OffsetDateTime) -> ManualTime {
        ManualTime {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Default for ManualTime {
    fn default() -> ManualTime {
        ManualTime::new()
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock poisoned")
    }
}
