use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::models::{CounterGroup, CounterStatus};
use crate::domain::ports::errors::StoreResult;

/// Port over counter group control and the name-map / id-list side tables
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Flip a counter group's status in its control table
    async fn set_status(&self, group: CounterGroup, status: CounterStatus) -> StoreResult<()>;

    /// Entries of a name-map table: object name -> realized key
    async fn name_map(&self, table: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Id list attached to `object_key` in `group`; empty when not attached
    async fn list_id_list(&self, group: CounterGroup, object_key: &str)
        -> StoreResult<Vec<String>>;

    /// Whether the id-list entry for `object_key` still exists at all
    async fn has_id_list(&self, group: CounterGroup, object_key: &str) -> StoreResult<bool>;

    /// Whether a side table has no entries
    async fn is_empty(&self, table: &str) -> StoreResult<bool>;
}
