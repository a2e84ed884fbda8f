//! Dependency-ordered teardown.
//!
//! Removing an intent that another realized object still references is
//! rejected by the external system: the realized record persists until the
//! reference is cleared. The executor detects that state after a settle wait,
//! removes the blocker, retries, and verifies both the rejected and the final
//! state as separate convergence checks.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::{IntentRef, KeySet, PollingProfiles, RealizedKey, RealizedTable};
use crate::services::intent_client::IntentClient;
use crate::services::poller::settle;
use crate::services::realized_client::RealizedClient;

/// A realized record expected to disappear when its intent is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedKey {
    /// Table holding the record.
    pub table: RealizedTable,
    /// Realized key expected to leave.
    pub key: RealizedKey,
}

impl WatchedKey {
    /// Watch `key` in `table`.
    pub const fn new(table: RealizedTable, key: RealizedKey) -> Self {
        Self { table, key }
    }
}

/// Removal of one or more intents, in order, and the realized keys they own.
#[derive(Debug, Clone, Default)]
pub struct Removal {
    /// Intents to remove, in order.
    pub intents: Vec<IntentRef>,
    /// Realized keys owned by those intents.
    pub watched: Vec<WatchedKey>,
}

impl Removal {
    /// An empty removal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an intent to remove.
    #[must_use]
    pub fn intent(mut self, intent: IntentRef) -> Self {
        self.intents.push(intent);
        self
    }

    /// Append a realized key expected to leave.
    #[must_use]
    pub fn watch(mut self, table: RealizedTable, key: RealizedKey) -> Self {
        self.watched.push(WatchedKey::new(table, key));
        self
    }
}

/// What a teardown observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Whether the first attempt was held back by a blocking reference.
    pub blocked: bool,
    /// Key sets of the watched tables once the removal converged.
    pub remaining: BTreeMap<RealizedTable, KeySet>,
}

/// Executes removals, honoring blocking references.
#[derive(Clone)]
pub struct TeardownExecutor {
    intents: IntentClient,
    realized: RealizedClient,
    profiles: PollingProfiles,
}

impl TeardownExecutor {
    /// Build an executor over the given clients.
    pub fn new(
        intents: IntentClient,
        realized: RealizedClient,
        profiles: PollingProfiles,
    ) -> Self {
        Self {
            intents,
            realized,
            profiles,
        }
    }

    /// One key set per watched table, each from a single read.
    async fn snapshot(
        &self,
        watched: &[WatchedKey],
    ) -> HarnessResult<BTreeMap<RealizedTable, KeySet>> {
        let mut keys = BTreeMap::new();
        for w in watched {
            if !keys.contains_key(&w.table) {
                keys.insert(w.table, self.realized.list_keys(w.table).await?);
            }
        }
        Ok(keys)
    }

    async fn counts(
        &self,
        watched: &[WatchedKey],
    ) -> HarnessResult<BTreeMap<RealizedTable, usize>> {
        Ok(self
            .snapshot(watched)
            .await?
            .into_iter()
            .map(|(table, keys)| (table, keys.len()))
            .collect())
    }

    async fn issue(&self, removal: &Removal) -> HarnessResult<()> {
        for intent in &removal.intents {
            self.intents.remove_ref(intent).await?;
        }
        Ok(())
    }

    /// Wait until every watched key is gone and each watched table shrank by
    /// exactly the number of watched keys it holds.
    async fn converge_removed(
        &self,
        removal: &Removal,
        before: &BTreeMap<RealizedTable, usize>,
    ) -> HarnessResult<BTreeMap<RealizedTable, KeySet>> {
        let mut remaining = BTreeMap::new();
        for (table, count) in before {
            let removed = removal.watched.iter().filter(|w| w.table == *table).count();
            let expected = table.exactly(count.saturating_sub(removed));
            let keys = self
                .realized
                .wait_for_keys(expected, &self.profiles.removal)
                .await?;
            remaining.insert(*table, keys);
        }

        for w in &removal.watched {
            if remaining.get(&w.table).is_some_and(|keys| keys.contains(&w.key)) {
                // Count settled but the wrong record went away.
                self.realized
                    .wait_for_absent(w.table, &w.key, &self.profiles.removal)
                    .await?;
            }
        }
        Ok(remaining)
    }

    /// Remove intents that nothing references and wait for the realized side.
    pub async fn remove(&self, removal: &Removal) -> HarnessResult<TeardownReport> {
        let before = self.counts(&removal.watched).await?;
        self.issue(removal).await?;
        let remaining = self.converge_removed(removal, &before).await?;
        Ok(TeardownReport {
            blocked: false,
            remaining,
        })
    }

    /// Remove intents that may be held back by `blocker`.
    ///
    /// After the settle wait, any watched key still present means its removal
    /// was rejected. The rejected state is confirmed (each watched table shrank
    /// only by the watched keys that did leave), the blocker is removed and
    /// awaited, and the removal retried. A blocker that never leaves, or a
    /// retry that does not converge, surfaces as
    /// [`HarnessError::BlockingReference`].
    pub async fn remove_with_blocker(
        &self,
        removal: &Removal,
        blocker: &IntentRef,
    ) -> HarnessResult<TeardownReport> {
        let before = self.counts(&removal.watched).await?;
        self.issue(removal).await?;
        settle(self.profiles.settle()).await;

        let after = self.snapshot(&removal.watched).await?;
        let held: Vec<&WatchedKey> = removal
            .watched
            .iter()
            .filter(|w| after.get(&w.table).is_some_and(|keys| keys.contains(&w.key)))
            .collect();

        if held.is_empty() {
            info!(blocker = %blocker, "removal was not blocked");
            let remaining = self.converge_removed(removal, &before).await?;
            return Ok(TeardownReport {
                blocked: false,
                remaining,
            });
        }

        for w in &held {
            warn!(
                table = %w.table,
                key = %w.key,
                blocker = %blocker,
                "removal rejected by blocking reference; clearing blocker"
            );
        }
        self.converge_rejected(removal, &before, &after).await?;

        let blocked = |err: HarnessError| {
            if err.is_timeout() {
                let w = held[0];
                HarnessError::BlockingReference {
                    table: w.table.name().to_string(),
                    key: w.key.clone(),
                    blocker: blocker.to_string(),
                }
            } else {
                err
            }
        };

        self.clear_blocker(blocker).await.map_err(blocked)?;
        self.issue(removal).await?;
        let remaining = self
            .converge_removed(removal, &before)
            .await
            .map_err(blocked)?;

        info!(blocker = %blocker, "blocked removal completed after clearing blocker");
        Ok(TeardownReport {
            blocked: true,
            remaining,
        })
    }

    /// Each watched table holds its original count minus the watched keys
    /// that were allowed to leave.
    async fn converge_rejected(
        &self,
        removal: &Removal,
        before: &BTreeMap<RealizedTable, usize>,
        after: &BTreeMap<RealizedTable, KeySet>,
    ) -> HarnessResult<()> {
        for (table, keys) in after {
            let left = removal
                .watched
                .iter()
                .filter(|w| w.table == *table && !keys.contains(&w.key))
                .count();
            let count = before.get(table).copied().unwrap_or_default();
            self.realized
                .wait_for_keys(table.exactly(count.saturating_sub(left)), &self.profiles.removal)
                .await?;
        }
        Ok(())
    }

    /// Remove the blocker and wait for its realized records to leave.
    async fn clear_blocker(&self, blocker: &IntentRef) -> HarnessResult<()> {
        let tables = blocker.table.realized_tables();
        let mut before = Vec::with_capacity(tables.len());
        for table in tables {
            before.push((*table, self.realized.list_keys(*table).await?.len()));
        }

        self.intents.remove_ref(blocker).await?;
        for (table, count) in before.into_iter().filter(|(_, count)| *count > 0) {
            self.realized
                .wait_for_keys(table.exactly(count - 1), &self.profiles.removal)
                .await?;
        }
        Ok(())
    }
}
