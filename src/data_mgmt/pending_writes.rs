//! Optimistic write tracking
//!
//! An accepted write is echoed as the entity's state until a poll of the same
//! register either confirms or contradicts it. The device always wins.

use ahash::AHashMap;
use chrono::{DateTime, offset::Utc};

use crate::data_mgmt::models::RtValue;

#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    pub entity_key: &'static str,
    pub assumed_value: RtValue,
    pub issued_at: DateTime<Utc>,
    pub confirmed: bool,
    contradicting_polls: u32,
}

#[derive(Debug, PartialEq)]
pub enum Reconciliation {
    NothingPending,
    Confirmed(PendingWrite),
    /// Device reported a different value; the write is dropped
    Contradicted {
        discarded: PendingWrite,
        reported: RtValue,
    },
    /// Different value, but still within the grace window
    Waiting,
}

#[derive(Debug)]
pub struct WriteTracker {
    pending: AHashMap<&'static str, PendingWrite>,
    grace_polls: u32,
}

impl WriteTracker {
    pub fn new(grace_polls: u32) -> Self {
        WriteTracker {
            pending: AHashMap::new(),
            grace_polls,
        }
    }

    /// Track a write the transport accepted; returns the write it superseded
    pub fn record(
        &mut self,
        key: &'static str,
        assumed_value: RtValue,
        issued_at: DateTime<Utc>,
    ) -> Option<PendingWrite> {
        self.pending.insert(
            key,
            PendingWrite {
                entity_key: key,
                assumed_value,
                issued_at,
                confirmed: false,
                contradicting_polls: 0,
            },
        )
    }

    pub fn assumed(&self, key: &str) -> Option<&RtValue> {
        self.pending.get(key).map(|p| &p.assumed_value)
    }

    /// Forget the pending write for `key` without a verdict from the device
    pub fn discard(&mut self, key: &str) -> Option<PendingWrite> {
        self.pending.remove(key)
    }

    /// Compare a freshly decoded value against the pending write for `key`
    pub fn reconcile(&mut self, key: &str, decoded: &RtValue) -> Reconciliation {
        let Some(pending) = self.pending.get_mut(key) else {
            return Reconciliation::NothingPending;
        };

        if pending.assumed_value == *decoded {
            let mut confirmed = pending.clone();
            confirmed.confirmed = true;
            self.pending.remove(key);
            return Reconciliation::Confirmed(confirmed);
        }

        if pending.contradicting_polls < self.grace_polls {
            pending.contradicting_polls += 1;
            return Reconciliation::Waiting;
        }

        match self.pending.remove(key) {
            Some(discarded) => Reconciliation::Contradicted {
                discarded,
                reported: decoded.clone(),
            },
            None => Reconciliation::NothingPending,
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
