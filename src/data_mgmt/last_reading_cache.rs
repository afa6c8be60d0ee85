//! Last decoded value per key
//!
//! Keeps the latest and the previous successful decode of each register. A
//! failed read leaves the latest value in place until `stale_after`
//! consecutive failures, after which the key reports unavailable.

use ahash::AHashMap;
use chrono::{DateTime, offset::Utc};

use crate::data_mgmt::models::{DecodedValue, RtValue};

#[derive(Debug, Default)]
struct CacheEntry {
    current: Option<DecodedValue>,
    previous: Option<DecodedValue>,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct LastReadingCache {
    entries: AHashMap<&'static str, CacheEntry>,
    stale_after: u32,
}

impl LastReadingCache {
    pub fn new(stale_after: u32) -> Self {
        LastReadingCache {
            entries: AHashMap::new(),
            stale_after,
        }
    }

    pub fn record_success(&mut self, decoded: DecodedValue) {
        let entry = self.entries.entry(decoded.key).or_default();
        entry.previous = entry.current.take();
        entry.current = Some(decoded);
        entry.consecutive_failures = 0;
    }

    /// Returns true when this failure turns the key unavailable
    pub fn record_failure(&mut self, key: &'static str) -> bool {
        let entry = self.entries.entry(key).or_default();
        entry.consecutive_failures += 1;
        entry.consecutive_failures == self.stale_after
    }

    pub fn is_available(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.current.is_some() && e.consecutive_failures < self.stale_after)
    }

    /// Latest value, or `None` when never read or stale
    pub fn value(&self, key: &str) -> Option<&RtValue> {
        if !self.is_available(key) {
            return None;
        }
        self.entries
            .get(key)
            .and_then(|e| e.current.as_ref())
            .map(|d| &d.value)
    }

    pub fn numeric(&self, key: &str) -> Option<f64> {
        self.value(key).and_then(RtValue::as_f64)
    }

    /// Value from the decode before the latest one
    pub fn previous_numeric(&self, key: &str) -> Option<f64> {
        self.entries
            .get(key)
            .and_then(|e| e.previous.as_ref())
            .and_then(|d| d.value.as_f64())
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .get(key)
            .and_then(|e| e.current.as_ref())
            .map(|d| d.timestamp)
    }

    /// Forget everything; used when the device instance is unloaded
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
