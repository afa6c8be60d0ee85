//! Poll scheduling
//!
//! Each polled register gets an effective interval: its own tier when its
//! entity is enabled, tightened by the tier of every enabled derived sensor
//! that consumes it. A register nobody needs is never read, and a disabled
//! register still feeds the derived sensors that depend on it.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::drivers::{Catalog, RegisterTable};
use crate::node_mgmt::config::ScanTierConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PollState {
    Idle,
    Due,
    Polling,
    Decoded,
    Failed,
}

#[derive(Clone, Debug)]
struct ScheduleEntry {
    key: &'static str,
    table: RegisterTable,
    address: u16,
    word_count: u16,
    interval: Option<Duration>,
    state: PollState,
    last_success: Option<Instant>,
    last_attempt: Option<Instant>,
    consecutive_failures: u32,
}

impl ScheduleEntry {
    fn is_due(&self, now: Instant, failure_threshold: u32) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        let elapsed = |at: Option<Instant>| at.map_or(true, |t| now.duration_since(t) >= interval);

        // A key that keeps failing is retried once per interval, not every tick
        let retry_allowed =
            self.consecutive_failures < failure_threshold || elapsed(self.last_attempt);
        elapsed(self.last_success) && retry_allowed
    }
}

/// One read to issue; several keys share it when they map to the same range
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub table: RegisterTable,
    pub address: u16,
    pub word_count: u16,
    pub keys: Vec<&'static str>,
}

#[derive(Debug)]
pub struct PollScheduler {
    entries: Vec<ScheduleEntry>,
    config_version: u64,
    failure_threshold: u32,
}

impl PollScheduler {
    pub fn new(
        catalog: &Catalog,
        config: &ScanTierConfig,
        enabled: impl Fn(&str, bool) -> bool,
        failure_threshold: u32,
    ) -> Self {
        let entries = catalog
            .all()
            .iter()
            .filter(|def| def.is_polled())
            .map(|def| ScheduleEntry {
                key: def.key,
                table: def.table,
                address: def.address,
                word_count: def.word_count,
                interval: None,
                state: PollState::Idle,
                last_success: None,
                last_attempt: None,
                consecutive_failures: 0,
            })
            .collect();

        let mut scheduler = PollScheduler {
            entries,
            config_version: 0,
            failure_threshold,
        };
        scheduler.apply_config(catalog, config, enabled);
        scheduler
    }

    /// Recompute effective intervals; poll history is kept
    pub fn apply_config(
        &mut self,
        catalog: &Catalog,
        config: &ScanTierConfig,
        enabled: impl Fn(&str, bool) -> bool,
    ) {
        for entry in &mut self.entries {
            let own = catalog
                .lookup(entry.key)
                .ok()
                .filter(|def| enabled(def.key, def.enabled_by_default))
                .and_then(|def| def.scan_tier)
                .map(|tier| config.interval(tier));

            let from_dependents = catalog
                .depends_on(entry.key)
                .iter()
                .filter_map(|derived_key| catalog.lookup_derived(derived_key))
                .filter(|spec| enabled(spec.key, spec.enabled_by_default))
                .map(|spec| config.interval(spec.scan_tier));

            entry.interval = own.into_iter().chain(from_dependents).min();
        }
        self.config_version = config.version;
        log::debug!(
            "Schedule updated to config v{}: {} of {} registers polled, tick every {:?}",
            config.version,
            self.entries.iter().filter(|e| e.interval.is_some()).count(),
            self.entries.len(),
            self.effective_period()
        );
    }

    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    /// Shortest interval among registers that are polled at all
    pub fn effective_period(&self) -> Option<Duration> {
        self.entries.iter().filter_map(|e| e.interval).min()
    }

    pub fn interval(&self, key: &str) -> Option<Duration> {
        self.entry(key).and_then(|e| e.interval)
    }

    #[cfg(test)]
    pub fn state(&self, key: &str) -> Option<PollState> {
        self.entry(key).map(|e| e.state)
    }

    /// Number of registers whose last poll step left them in `state`
    pub fn count_in(&self, state: PollState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    pub fn is_polled(&self, key: &str) -> bool {
        self.interval(key).is_some()
    }

    /// Keys due at `now`, in catalog order; marks them `Due`
    pub fn due(&mut self, now: Instant) -> Vec<&'static str> {
        let threshold = self.failure_threshold;
        self.entries
            .iter_mut()
            .filter(|e| e.is_due(now, threshold))
            .map(|e| {
                e.state = PollState::Due;
                e.key
            })
            .collect()
    }

    /// Due keys grouped by identical register range, in catalog order
    pub fn plan(&mut self, now: Instant) -> Vec<ReadRequest> {
        let due = self.due(now);
        let mut requests: Vec<ReadRequest> = Vec::with_capacity(due.len());
        for key in due {
            let Some(entry) = self.entry(key) else {
                continue;
            };
            let (table, address, word_count) = (entry.table, entry.address, entry.word_count);
            match requests.iter_mut().find(|r| {
                r.table == table && r.address == address && r.word_count == word_count
            }) {
                Some(request) => request.keys.push(key),
                None => requests.push(ReadRequest {
                    table,
                    address,
                    word_count,
                    keys: vec![key],
                }),
            }
        }
        requests
    }

    pub fn mark_polling(&mut self, key: &str, now: Instant) {
        if let Some(entry) = self.entry_mut(key) {
            entry.state = PollState::Polling;
            entry.last_attempt = Some(now);
        }
    }

    pub fn record_success(&mut self, key: &str, now: Instant) {
        if let Some(entry) = self.entry_mut(key) {
            entry.state = PollState::Decoded;
            entry.last_success = Some(now);
            entry.last_attempt = Some(now);
            entry.consecutive_failures = 0;
        }
    }

    pub fn record_failure(&mut self, key: &str, now: Instant) {
        if let Some(entry) = self.entry_mut(key) {
            entry.state = PollState::Failed;
            entry.last_attempt = Some(now);
            entry.consecutive_failures += 1;
        }
    }

    fn entry(&self, key: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut ScheduleEntry> {
        self.entries.iter_mut().find(|e| e.key == key)
    }
}
