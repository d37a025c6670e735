use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::document::{Features, StoreDocument, ThrottleRule};
use crate::error::FlagError;
use crate::store::DocumentStore;
use crate::time::TimeSource;

/// One decoded snapshot of the flag document, shared immutably between the
/// cache and in-flight evaluations.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub features: Features,
    pub throttles: HashMap<String, ThrottleRule>,
}

impl Snapshot {
    fn from_document(document: StoreDocument) -> Snapshot {
        let throttles = document
            .throttles
            .into_iter()
            .map(|(key, config)| (key, ThrottleRule::from(config)))
            .collect();
        Snapshot {
            features: document.features,
            throttles,
        }
    }
}

/// Whether a fetch produced current data or fell back to the last good
/// snapshot after a failed refresh.
#[derive(Debug)]
pub enum Freshness {
    /// The snapshot is within its TTL, possibly just refreshed.
    Fresh,
    /// The TTL has lapsed and the refresh failed; the last good snapshot is
    /// served instead, and will be until a refresh succeeds.
    Stale(FlagError),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

pub(crate) struct Fetched {
    pub snapshot: Arc<Snapshot>,
    pub freshness: Freshness,
}

/// TTL-guarded cache of the last good snapshot.
///
/// One mutex covers the whole fetch: the expiry check, the store call, and
/// the snapshot swap. Expired concurrent callers therefore collapse into a
/// single store round trip, and a slow load stalls every caller on this
/// client until it resolves. Fresh-path reads take only the lock, never I/O.
pub(crate) struct SnapshotCache {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn TimeSource>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

struct CacheState {
    snapshot: Arc<Snapshot>,
    expiry: OffsetDateTime,
}

impl SnapshotCache {
    /// Seeds the cache with a mandatory first load.
    ///
    /// There is no empty state: a cache either holds a snapshot or was never
    /// constructed.
    pub(crate) async fn initialize(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn TimeSource>,
        ttl: Duration,
    ) -> Result<SnapshotCache, FlagError> {
        let document = store.load().await?;
        let state = CacheState {
            snapshot: Arc::new(Snapshot::from_document(document)),
            expiry: clock.now() + ttl,
        };
        Ok(SnapshotCache {
            store,
            clock,
            ttl,
            state: Mutex::new(state),
        })
    }

    /// Returns the current snapshot, refreshing it first when expired.
    ///
    /// A failed refresh leaves the held snapshot untouched and reports the
    /// error through [`Freshness::Stale`].
    pub(crate) async fn fetch(&self) -> Fetched {
        let mut state = self.state.lock().await;
        if self.clock.now() < state.expiry {
            return Fetched {
                snapshot: Arc::clone(&state.snapshot),
                freshness: Freshness::Fresh,
            };
        }
        match self.store.load().await {
            Ok(document) => {
                debug!("refreshed flag snapshot");
                state.expiry = self.clock.now() + self.ttl;
                state.snapshot = Arc::new(Snapshot::from_document(document));
                Fetched {
                    snapshot: Arc::clone(&state.snapshot),
                    freshness: Freshness::Fresh,
                }
            }
            Err(err) => {
                error!("failed to refresh flag snapshot, serving stale: {err}");
                Fetched {
                    snapshot: Arc::clone(&state.snapshot),
                    freshness: Freshness::Stale(err),
                }
            }
        }
    }
}
