use async_trait::async_trait;

use crate::domain::models::{FieldMap, IntentTable};
use crate::domain::ports::errors::StoreResult;

/// Write-side port over the intent (front-end) store
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Create or overwrite an intent record
    async fn create(&self, table: IntentTable, key: &str, fields: FieldMap) -> StoreResult<()>;

    /// Remove an intent record; removing an absent key succeeds
    async fn remove(&self, table: IntentTable, key: &str) -> StoreResult<()>;

    /// Write a child entry `parent_key:field_key` (e.g. a rule under a policy)
    async fn set_field(
        &self,
        table: IntentTable,
        parent_key: &str,
        field_key: &str,
        fields: FieldMap,
    ) -> StoreResult<()>;
}

/// Key of a child entry written with [`IntentStore::set_field`]
pub fn child_key(parent_key: &str, field_key: &str) -> String {
    format!("{parent_key}:{field_key}")
}
