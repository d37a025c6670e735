use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{Freshness, SnapshotCache};
use crate::config::Config;
use crate::error::FlagError;
use crate::hash;
use crate::store::{DocumentStore, DynamoStore};
use crate::time::{SystemTime, TimeSource};

/// The evaluation surface for boolean flags and percentage throttles.
///
/// [`FeatureClient`] is the production implementation;
/// [`StaticFeatureStore`](crate::testing::StaticFeatureStore) answers from a
/// fixed map for downstream tests.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Returns the state of the named boolean flag.
    ///
    /// Missing flags and non-boolean values read as `false`; absence is not
    /// distinguishable from "off".
    async fn enabled(&self, key: &str) -> bool;

    /// Returns every boolean-typed flag in the document. Entries of other
    /// types are dropped.
    async fn bool_flags(&self) -> HashMap<String, bool>;

    /// Returns whether `data` falls inside the named throttle's rollout.
    ///
    /// `data` is consumed to exhaustion. A missing throttle always denies.
    async fn throttle_allow(&self, key: &str, data: &mut (dyn Read + Send)) -> bool;

    /// Returns the bucket `throttle_allow` would compare against the named
    /// throttle's threshold. Useful for constructing whitelists.
    fn throttle_hash(&self, key: &str, data: &mut (dyn Read + Send)) -> u32;
}

/// Cached feature-flag client over a backing document store.
///
/// Each client owns an independent snapshot cache, seeded by one load at
/// construction; the construction fails if the store is unreachable or the
/// record is missing. There is no shared global state between clients.
///
/// ```no_run
/// use flagpole::{Config, FeatureClient, FeatureStore};
///
/// # async fn run() -> Result<(), flagpole::FlagError> {
/// let client = FeatureClient::connect(Config::default()).await?;
/// if client.enabled("newfeature").await {
///     // new code
/// } else {
///     // old code
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeatureClient {
    cache: SnapshotCache,
}

impl FeatureClient {
    /// Connects with ambient AWS credentials and the wall clock.
    pub async fn connect(config: Config) -> Result<FeatureClient, FlagError> {
        FeatureClient::builder(config).build().await
    }

    /// Starts a builder, for injecting a custom store or time source.
    pub fn builder(config: Config) -> FeatureClientBuilder {
        FeatureClientBuilder {
            config,
            store: None,
            clock: None,
        }
    }

    /// Reports whether the current snapshot is fresh or a stale fallback
    /// after a failed refresh, refreshing first if the TTL has lapsed.
    ///
    /// The evaluation methods hide degraded state by design; this is the
    /// hook for callers that want to observe it.
    pub async fn freshness(&self) -> Freshness {
        self.cache.fetch().await.freshness
    }
}

/// Builds a [`FeatureClient`].
///
/// ```no_run
/// use std::sync::Arc;
/// use flagpole::{Config, FeatureClient, MemoryStore, StoreDocument};
///
/// # async fn run() -> Result<(), flagpole::FlagError> {
/// let store = Arc::new(MemoryStore::new(StoreDocument::default()));
/// let client = FeatureClient::builder(Config::default())
///     .store(store)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct FeatureClientBuilder {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
    clock: Option<Arc<dyn TimeSource>>,
}

impl FeatureClientBuilder {
    /// Overrides the backing store. The default is a [`DynamoStore`] built
    /// from ambient credentials.
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> FeatureClientBuilder {
        self.store = Some(store);
        self
    }

    /// Overrides the time source. The default is the wall clock.
    pub fn clock(mut self, clock: Arc<dyn TimeSource>) -> FeatureClientBuilder {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration, performs the seeding load, and returns
    /// a usable client. Any failure here is fatal: no client is produced.
    pub async fn build(self) -> Result<FeatureClient, FlagError> {
        self.config.validate()?;
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(DynamoStore::connect(&self.config).await),
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemTime {}));
        let cache = SnapshotCache::initialize(store, clock, self.config.cache_ttl).await?;
        Ok(FeatureClient { cache })
    }
}

#[async_trait]
impl FeatureStore for FeatureClient {
    async fn enabled(&self, key: &str) -> bool {
        let fetched = self.cache.fetch().await;
        matches!(fetched.snapshot.features.get(key), Some(Value::Bool(true)))
    }

    async fn bool_flags(&self) -> HashMap<String, bool> {
        let fetched = self.cache.fetch().await;
        fetched
            .snapshot
            .features
            .iter()
            .filter_map(|(key, value)| match value {
                Value::Bool(b) => Some((key.clone(), *b)),
                _ => None,
            })
            .collect()
    }

    async fn throttle_allow(&self, key: &str, data: &mut (dyn Read + Send)) -> bool {
        let fetched = self.cache.fetch().await;
        let rule = match fetched.snapshot.throttles.get(key) {
            Some(rule) => rule,
            None => return false,
        };
        // Decision order is observable behavior: disabled overrides the
        // whitelist, and the whitelist overrides probability.
        if rule.config.disabled {
            return false;
        }
        let bucket = hash::bucket(key, data);
        if rule.config.whitelist.contains(&bucket) {
            return true;
        }
        if rule.threshold == 0 {
            return false;
        }
        if rule.threshold > hash::BUCKET_COUNT {
            return true;
        }
        bucket <= rule.threshold
    }

    fn throttle_hash(&self, key: &str, data: &mut (dyn Read + Send)) -> u32 {
        hash::bucket(key, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::ManualTime;
    use serde_json::json;

    async fn client_with(document: serde_json::Value) -> FeatureClient {
        let store = Arc::new(MemoryStore::new(
            serde_json::from_value(document).unwrap(),
        ));
        FeatureClient::builder(Config::default())
            .store(store)
            .clock(Arc::new(ManualTime::new()))
            .build()
            .await
            .expect("client construction failed")
    }

    #[tokio::test]
    async fn construction_fails_when_the_seed_load_does() {
        let store = Arc::new(MemoryStore::default());
        store.fail(true);
        let result = FeatureClient::builder(Config::default())
            .store(store)
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn construction_rejects_invalid_config() {
        let config = Config {
            table_name: String::new(),
            ..Config::default()
        };
        let store = Arc::new(MemoryStore::default());
        match FeatureClient::builder(config).store(store).build().await {
            Err(FlagError::InvalidConfig(_)) => (),
            other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn enabled_is_false_for_an_absent_flag() {
        let client = client_with(json!({ "features": {} })).await;
        assert!(!client.enabled("someflag").await);
    }

    #[tokio::test]
    async fn enabled_is_false_for_a_false_flag() {
        let client = client_with(json!({ "features": { "someflag": false } })).await;
        assert!(!client.enabled("someflag").await);
    }

    #[tokio::test]
    async fn enabled_is_true_for_a_true_flag() {
        let client = client_with(json!({ "features": { "someflag": true } })).await;
        assert!(client.enabled("someflag").await);
    }

    #[tokio::test]
    async fn enabled_is_false_for_a_non_boolean_flag() {
        let client = client_with(json!({
            "features": { "someflag": "2022-09-15T10:41:17.159857636Z" }
        }))
        .await;
        assert!(!client.enabled("someflag").await);
    }

    #[tokio::test]
    async fn bool_flags_of_an_empty_document_is_empty() {
        let client = client_with(json!({ "features": {} })).await;
        assert!(client.bool_flags().await.is_empty());
    }

    #[tokio::test]
    async fn bool_flags_keeps_only_boolean_entries() {
        let client = client_with(json!({
            "features": {
                "someflagFalse": false,
                "someflagTrue": true,
                "someflagString": "2022-09-15T10:41:17.159857636Z"
            }
        }))
        .await;
        let flags = client.bool_flags().await;
        assert_eq!(
            flags,
            HashMap::from([
                ("someflagFalse".to_string(), false),
                ("someflagTrue".to_string(), true),
            ])
        );
    }

    #[tokio::test]
    async fn bool_flags_of_only_non_boolean_entries_is_empty() {
        let client = client_with(json!({
            "features": { "someflagString": "2022-09-15T10:41:17.159857636Z" }
        }))
        .await;
        assert!(client.bool_flags().await.is_empty());
    }

    // bucket("someFeature", "an input") is 1898; the throttle tests below
    // lean on that.

    async fn allow(client: &FeatureClient, key: &str) -> bool {
        client.throttle_allow(key, &mut "an input".as_bytes()).await
    }

    #[tokio::test]
    async fn missing_throttle_denies() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 100 } }
        }))
        .await;
        assert!(!allow(&client, "otherFeature").await);
    }

    #[tokio::test]
    async fn zero_probability_denies() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 0 } }
        }))
        .await;
        assert!(!allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn full_probability_allows() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 100 } }
        }))
        .await;
        assert!(allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn disabled_overrides_probability() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 100, "disabled": true } }
        }))
        .await;
        assert!(!allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn disabled_overrides_the_whitelist() {
        let client = client_with(json!({
            "throttles": {
                "someFeature": { "probability": 100, "whitelist": [1898], "disabled": true }
            }
        }))
        .await;
        assert!(!allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn explicit_disabled_false_changes_nothing() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 100, "disabled": false } }
        }))
        .await;
        assert!(allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn whitelist_overrides_zero_probability() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 0, "whitelist": [1898] } }
        }))
        .await;
        assert!(allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn bucket_inside_the_threshold_allows() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 50 } }
        }))
        .await;
        assert!(allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        // threshold 1898 equals the bucket: allow. Below the bucket: deny.
        let on_boundary = client_with(json!({
            "throttles": { "someFeature": { "probability": 18.98 } }
        }))
        .await;
        assert!(allow(&on_boundary, "someFeature").await);

        let below_boundary = client_with(json!({
            "throttles": { "someFeature": { "probability": 18.97 } }
        }))
        .await;
        assert!(!allow(&below_boundary, "someFeature").await);
    }

    #[tokio::test]
    async fn threshold_above_the_bucket_range_allows_everything() {
        let client = client_with(json!({
            "throttles": { "someFeature": { "probability": 250 } }
        }))
        .await;
        assert!(allow(&client, "someFeature").await);
    }

    #[tokio::test]
    async fn throttle_hash_matches_the_free_function() {
        let client = client_with(json!({})).await;
        assert_eq!(
            client.throttle_hash("someFeature", &mut "an input".as_bytes()),
            hash::bucket("someFeature", "an input".as_bytes())
        );
        assert_eq!(
            client.throttle_hash("someFeature", &mut "an input".as_bytes()),
            1898
        );
    }
}
