//! Feature flags and percentage throttles read from a single DynamoDB
//! document, cached with a TTL.
//!
//! Reading a boolean flag:
//!
//! ```no_run
//! use flagpole::{Config, FeatureClient, FeatureStore};
//!
//! # async fn run() -> Result<(), flagpole::FlagError> {
//! let client = FeatureClient::connect(Config::default()).await?;
//! if client.enabled("newfeature").await {
//!     // new code
//! } else {
//!     // old code
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Throttling a percentage of traffic, bucketed by an arbitrary input:
//!
//! ```no_run
//! # use flagpole::{FeatureClient, FeatureStore};
//! # async fn run(client: FeatureClient) {
//! if client
//!     .throttle_allow("newThrottleFeature", &mut "user-1234".as_bytes())
//!     .await
//! {
//!     // rolled out
//! }
//! # }
//! ```
//!
//! The stored document has two sections, both optional:
//!
//! ```json
//! {
//!     "features": {
//!         "newFeature": true
//!     },
//!     "throttles": {
//!         "newThrottleFeature": {
//!             "whitelist": [10, 3321],
//!             "probability": 2.5
//!         }
//!     }
//! }
//! ```
//!
//! Snapshots are cached for [`Config::cache_ttl`] and refreshed lazily on
//! the first read past expiry. When a refresh fails the last good snapshot
//! keeps serving; [`FeatureClient::freshness`] exposes that state.

mod cache;
mod client;
mod config;
mod document;
mod error;
pub mod hash;
mod store;
pub mod testing;
mod time;

pub use cache::Freshness;
pub use client::{FeatureClient, FeatureClientBuilder, FeatureStore};
pub use config::Config;
pub use document::{Features, StoreDocument, ThrottleConfig};
pub use error::FlagError;
pub use hash::{bucket, BUCKET_COUNT};
pub use store::{DocumentStore, DynamoStore, MemoryStore};
pub use self::time::{SystemTime, TimeSource};
