//! Run State: the write-once key/bucket map shared across a run.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::bucket::ResultBucket;
use crate::error::CoordinatorError;

/// Key reserved for the synthesizer's output bucket.
pub const FINAL_REPORT_KEY: &str = "final_report";
/// Stage output keys, written by the finalize chain in order.
pub const CLEANUP_KEY: &str = "cleanup_result";
pub const ARCHIVE_KEY: &str = "archive_result";
pub const INDEX_KEY: &str = "index_result";
pub const RETRIEVAL_KEY: &str = "retrieval_result";

/// The shared map of branch/stage keys to result buckets.
///
/// Keys are write-once: a duplicate insert is a wiring bug and surfaces as
/// a fatal [`CoordinatorError::DuplicateStateKey`] rather than silently
/// clobbering another branch's output.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RunState {
    buckets: FxHashMap<String, ResultBucket>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bucket under `key`, erroring if the key is already taken.
    pub fn put(
        &mut self,
        key: impl Into<String>,
        bucket: ResultBucket,
    ) -> Result<(), CoordinatorError> {
        let key = key.into();
        if self.buckets.contains_key(&key) {
            return Err(CoordinatorError::DuplicateStateKey { key });
        }
        self.buckets.insert(key, bucket);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ResultBucket> {
        self.buckets.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate over all (key, bucket) pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultBucket)> {
        self.buckets.iter().map(|(k, v)| (k.as_str(), v))
    }
}
