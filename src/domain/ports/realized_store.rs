use async_trait::async_trait;

use crate::domain::models::{AttributeMap, KeySet, RealizedKey, RealizedTable};
use crate::domain::ports::errors::StoreResult;

/// Read-only port over the realized (back-end) store
#[async_trait]
pub trait RealizedStore: Send + Sync {
    /// Current key set of a realized table
    async fn list_keys(&self, table: RealizedTable) -> StoreResult<KeySet>;

    /// Attribute map of one realized record, `None` if the key is absent
    async fn get_entry(
        &self,
        table: RealizedTable,
        key: &RealizedKey,
    ) -> StoreResult<Option<AttributeMap>>;
}
