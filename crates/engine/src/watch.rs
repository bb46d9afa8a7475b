//! Per-group snapshot channels.
//!
//! Every successful mutation republishes a [`LedgerSnapshot`] on the
//! group's `tokio::sync::watch` channel. Subscribers always observe the
//! latest state; intermediate snapshots may be skipped, never reordered.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use serde::Serialize;
use tokio::sync::watch;

use crate::BalanceSheet;

/// A point-in-time summary of a group's books.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    /// Monotonically increasing per group; strictly greater after every
    /// published mutation.
    pub revision: u64,
    pub balances: BalanceSheet,
    pub members: u64,
    pub transactions: u64,
    pub loans: u64,
    pub meetings: u64,
}

/// Owns one watch channel per group key.
///
/// Senders are created lazily and kept for the engine's lifetime, so
/// revisions keep counting across subscriber churn.
#[derive(Debug, Default)]
pub(crate) struct SnapshotHub {
    channels: RwLock<HashMap<String, watch::Sender<LedgerSnapshot>>>,
}

impl SnapshotHub {
    pub(crate) fn subscribe(&self, key: &str) -> watch::Receiver<LedgerSnapshot> {
        self.sender(key).subscribe()
    }

    /// Replaces the current snapshot, bumping the revision.
    pub(crate) fn publish(&self, key: &str, next: LedgerSnapshot) {
        self.sender(key).send_modify(|current| {
            let revision = current.revision + 1;
            *current = next;
            current.revision = revision;
        });
    }

    fn sender(&self, key: &str) -> watch::Sender<LedgerSnapshot> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(LedgerSnapshot::default()).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_bumps_revision() {
        let hub = SnapshotHub::default();
        let rx = hub.subscribe("u/g");
        assert_eq!(rx.borrow().revision, 0);

        hub.publish("u/g", LedgerSnapshot::default());
        assert_eq!(rx.borrow().revision, 1);

        hub.publish("u/g", LedgerSnapshot::default());
        assert_eq!(rx.borrow().revision, 2);
    }

    #[test]
    fn channels_are_isolated_per_group() {
        let hub = SnapshotHub::default();
        let a = hub.subscribe("u/a");
        let b = hub.subscribe("u/b");

        hub.publish("u/a", LedgerSnapshot::default());
        assert_eq!(a.borrow().revision, 1);
        assert_eq!(b.borrow().revision, 0);
    }

    #[test]
    fn revision_survives_subscriber_churn() {
        let hub = SnapshotHub::default();
        hub.publish("u/g", LedgerSnapshot::default());
        drop(hub.subscribe("u/g"));
        hub.publish("u/g", LedgerSnapshot::default());

        let rx = hub.subscribe("u/g");
        assert_eq!(rx.borrow().revision, 2);
    }
}
