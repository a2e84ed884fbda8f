//! In-process simulated dataplane.
//!
//! Implements the intent, realized and counter ports over shared state. Intent
//! writes are accepted immediately and materialized by a background worker
//! after a configurable delay, so every read-side observation is eventually
//! consistent the same way the real external system is.

mod state;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::domain::models::{
    AttributeMap, CounterGroup, CounterStatus, FieldMap, IntentTable, KeySet, RealizedKey,
    RealizedTable, SimulatorConfig,
};
use crate::domain::ports::{
    child_key, CounterStore, IntentStore, RealizedStore, StoreError, StoreResult,
};

use state::{Op, SimState};

/// Simulated external system backing all three store ports.
pub struct SimulatedDataplane {
    state: Arc<Mutex<SimState>>,
    config: SimulatorConfig,
    worker: JoinHandle<()>,
}

impl SimulatedDataplane {
    /// Start the dataplane and its materialization worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: SimulatorConfig) -> Arc<Self> {
        let state = Arc::new(Mutex::new(SimState::default()));
        let worker = tokio::spawn(Self::run_worker(Arc::clone(&state), config.tick()));
        info!(
            delay_ms = config.materialize_delay_ms,
            tick_ms = config.tick_ms,
            "simulated dataplane started"
        );
        Arc::new(Self {
            state,
            config,
            worker,
        })
    }

    async fn run_worker(state: Arc<Mutex<SimState>>, tick: std::time::Duration) {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let mut state = state.lock().await;
            if !state.paused {
                state.process(Instant::now());
            }
        }
    }

    /// Reject every store call with a connection error until brought back.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
        debug!(offline, "simulated dataplane connectivity changed");
    }

    /// Stop materializing; writes keep queueing.
    pub async fn pause(&self) {
        self.state.lock().await.paused = true;
    }

    /// Apply queued writes again.
    pub async fn resume(&self) {
        self.state.lock().await.paused = false;
    }

    /// Operations accepted but not yet materialized.
    pub async fn pending_operations(&self) -> usize {
        self.state.lock().await.pending_len()
    }

    /// Intent keys currently present in `table`.
    pub async fn intent_keys(&self, table: IntentTable) -> Vec<String> {
        self.state.lock().await.intent_keys(table)
    }

    async fn submit(&self, op: Op) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(StoreError::Connection("simulated dataplane offline".to_string()));
        }
        let ready_at = Instant::now() + self.config.materialize_delay();
        state.enqueue(op, ready_at);
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&SimState) -> T) -> StoreResult<T> {
        let state = self.state.lock().await;
        if state.offline {
            return Err(StoreError::Connection("simulated dataplane offline".to_string()));
        }
        Ok(f(&state))
    }
}

impl Drop for SimulatedDataplane {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[async_trait]
impl IntentStore for SimulatedDataplane {
    async fn create(&self, table: IntentTable, key: &str, fields: FieldMap) -> StoreResult<()> {
        if fields.is_empty() {
            return Err(StoreError::Rejected {
                table: table.name().to_string(),
                reason: format!("record {key} has no fields"),
            });
        }
        self.submit(Op::Upsert {
            table,
            key: key.to_string(),
            fields,
        })
        .await
    }

    async fn remove(&self, table: IntentTable, key: &str) -> StoreResult<()> {
        self.submit(Op::Remove {
            table,
            key: key.to_string(),
        })
        .await
    }

    async fn set_field(
        &self,
        table: IntentTable,
        parent_key: &str,
        field_key: &str,
        fields: FieldMap,
    ) -> StoreResult<()> {
        self.create(table, &child_key(parent_key, field_key), fields)
            .await
    }
}

#[async_trait]
impl RealizedStore for SimulatedDataplane {
    async fn list_keys(&self, table: RealizedTable) -> StoreResult<KeySet> {
        self.read(|s| s.list_keys(table)).await
    }

    async fn get_entry(
        &self,
        table: RealizedTable,
        key: &RealizedKey,
    ) -> StoreResult<Option<AttributeMap>> {
        self.read(|s| s.get_entry(table, key)).await
    }
}

#[async_trait]
impl CounterStore for SimulatedDataplane {
    async fn set_status(&self, group: CounterGroup, status: CounterStatus) -> StoreResult<()> {
        self.submit(Op::CounterStatus { group, status }).await
    }

    async fn name_map(&self, table: &str) -> StoreResult<BTreeMap<String, String>> {
        self.read(|s| s.name_map(table)).await
    }

    async fn list_id_list(
        &self,
        group: CounterGroup,
        object_key: &str,
    ) -> StoreResult<Vec<String>> {
        self.read(|s| s.id_list(group, object_key).unwrap_or_default())
            .await
    }

    async fn has_id_list(&self, group: CounterGroup, object_key: &str) -> StoreResult<bool> {
        self.read(|s| s.id_list(group, object_key).is_some()).await
    }

    async fn is_empty(&self, table: &str) -> StoreResult<bool> {
        self.read(|s| s.side_table_is_empty(table)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{IntentPayload, IpVersion, MeterPolicyConfig};
    use std::time::Duration;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            materialize_delay_ms: 100,
            tick_ms: 10,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_materializes_after_delay() {
        let dp = SimulatedDataplane::start(config());
        let fields = MeterPolicyConfig {
            ip_version: IpVersion::Ipv4,
        }
        .to_fields()
        .unwrap();
        dp.create(IntentTable::MeterPolicy, "p", fields).await.unwrap();

        assert!(dp.list_keys(RealizedTable::MeterPolicy).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dp.list_keys(RealizedTable::MeterPolicy).await.unwrap().len(), 1);
        assert_eq!(dp.pending_operations().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_rejects_calls() {
        let dp = SimulatedDataplane::start(config());
        dp.set_offline(true).await;
        let err = dp.list_keys(RealizedTable::Eni).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        let err = dp.remove(IntentTable::Eni, "eni").await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));

        dp.set_offline(false).await;
        assert!(dp.list_keys(RealizedTable::Eni).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_record_rejected() {
        let dp = SimulatedDataplane::start(config());
        let err = dp
            .create(IntentTable::Vnet, "Vnet1", FieldMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_dataplane_keeps_ops_pending() {
        let dp = SimulatedDataplane::start(config());
        dp.pause().await;
        let fields = MeterPolicyConfig {
            ip_version: IpVersion::Ipv6,
        }
        .to_fields()
        .unwrap();
        dp.create(IntentTable::MeterPolicy, "p", fields).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(dp.pending_operations().await, 1);
        assert_eq!(dp.intent_keys(IntentTable::MeterPolicy).await, vec!["p".to_string()]);

        dp.resume().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(dp.pending_operations().await, 0);
    }
}
