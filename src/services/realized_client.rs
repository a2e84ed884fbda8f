//! Realized store client: reads plus the count-based convergence waits.

use std::sync::Arc;

use crate::domain::errors::HarnessResult;
use crate::domain::models::{
    BaselineSnapshot, KeyCountCondition, KeySet, PollingConfig, RealizedKey, RealizedRecord,
    RealizedTable,
};
use crate::domain::ports::RealizedStore;
use crate::services::poller::{await_condition, Expectation, Probe};

/// Read-only façade over a [`RealizedStore`].
#[derive(Clone)]
pub struct RealizedClient {
    store: Arc<dyn RealizedStore>,
}

impl RealizedClient {
    /// Wrap a realized store.
    pub fn new(store: Arc<dyn RealizedStore>) -> Self {
        Self { store }
    }

    /// Keys currently realized in `table`.
    pub async fn list_keys(&self, table: RealizedTable) -> HarnessResult<KeySet> {
        Ok(self.store.list_keys(table).await?)
    }

    /// Current record for `key`, `None` if it is not (or no longer) realized.
    pub async fn get_record(
        &self,
        table: RealizedTable,
        key: &RealizedKey,
    ) -> HarnessResult<Option<RealizedRecord>> {
        let entry = self.store.get_entry(table, key).await?;
        Ok(entry.map(|attributes| RealizedRecord {
            table,
            key: key.clone(),
            attributes,
        }))
    }

    /// Capture the current key set of `table` as a baseline.
    pub async fn snapshot(&self, table: RealizedTable) -> HarnessResult<BaselineSnapshot> {
        Ok(BaselineSnapshot::new(table, self.list_keys(table).await?))
    }

    /// Wait until the key set of the condition's table satisfies its count.
    pub async fn wait_for_keys(
        &self,
        condition: KeyCountCondition,
        polling: &PollingConfig,
    ) -> HarnessResult<KeySet> {
        let store = self.store.as_ref();
        let expectation = Expectation::new(condition.table.name(), condition.count);

        await_condition(&expectation, polling, || async move {
            let keys = store.list_keys(condition.table).await?;
            if condition.is_satisfied_by(keys.len()) {
                Ok(Probe::Ready(keys))
            } else {
                Ok(Probe::pending(format!("{} keys", keys.len())))
            }
        })
        .await
    }

    /// Wait until `key` is realized and return its record.
    pub async fn wait_for_record(
        &self,
        table: RealizedTable,
        key: &RealizedKey,
        polling: &PollingConfig,
    ) -> HarnessResult<RealizedRecord> {
        let expectation = Expectation::new(table.name(), format!("record {key}"));

        await_condition(&expectation, polling, || async move {
            match self.get_record(table, key).await? {
                Some(record) => Ok(Probe::Ready(record)),
                None => Ok(Probe::pending("no record")),
            }
        })
        .await
    }

    /// Wait until `key` is no longer present in `table`.
    pub async fn wait_for_absent(
        &self,
        table: RealizedTable,
        key: &RealizedKey,
        polling: &PollingConfig,
    ) -> HarnessResult<()> {
        let store = self.store.as_ref();
        let expectation = Expectation::new(table.name(), format!("{key} removed"));

        await_condition(&expectation, polling, || async move {
            let keys = store.list_keys(table).await?;
            if keys.contains(key) {
                Ok(Probe::pending(format!("{key} still present among {} keys", keys.len())))
            } else {
                Ok(Probe::Ready(()))
            }
        })
        .await
    }
}
