//! Per-scenario identity bookkeeping.
//!
//! Realized keys resolved by earlier steps are threaded through later steps
//! explicitly instead of living in process-wide state.

use std::collections::BTreeMap;

use super::record::{BaselineSnapshot, RealizedKey};
use super::table::RealizedTable;
use crate::domain::errors::{HarnessError, HarnessResult};

/// Realized keys resolved so far in one scenario, per realized table.
#[derive(Debug, Clone, Default)]
pub struct ScenarioContext {
    /// table -> intent id -> resolved key
    resolved: BTreeMap<RealizedTable, BTreeMap<String, RealizedKey>>,
}

impl ScenarioContext {
    /// Context with nothing resolved yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `intent_id` materialized as `key` in `table`.
    ///
    /// A key is never shared by two intents; re-claiming the same key for the
    /// same intent is a no-op.
    pub fn claim(
        &mut self,
        table: RealizedTable,
        intent_id: impl Into<String>,
        key: RealizedKey,
    ) -> HarnessResult<()> {
        let intent_id = intent_id.into();
        let entries = self.resolved.entry(table).or_default();

        if let Some((owner, _)) = entries
            .iter()
            .find(|(owner, claimed)| **claimed == key && **owner != intent_id)
        {
            return Err(HarnessError::IdentityConflict {
                table: table.name().to_string(),
                key,
                claimed_by: owner.clone(),
            });
        }

        entries.insert(intent_id, key);
        Ok(())
    }

    /// Key previously resolved for `intent_id`.
    pub fn resolved(&self, table: RealizedTable, intent_id: &str) -> Option<&RealizedKey> {
        self.resolved.get(&table).and_then(|m| m.get(intent_id))
    }

    /// Every key claimed in `table`, in key order.
    pub fn claimed(&self, table: RealizedTable) -> Vec<&RealizedKey> {
        let mut keys: Vec<_> = self
            .resolved
            .get(&table)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Baseline consisting of the keys already claimed in `table`.
    pub fn claimed_baseline(&self, table: RealizedTable) -> BaselineSnapshot {
        BaselineSnapshot::from_claimed(table, self.claimed(table))
    }

    /// Forget an intent once its realized record has been removed.
    pub fn release(&mut self, table: RealizedTable, intent_id: &str) -> Option<RealizedKey> {
        self.resolved.get_mut(&table).and_then(|m| m.remove(intent_id))
    }
}
