//! Intent store client: keyed writes, typed payload helpers.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::HarnessResult;
use crate::domain::models::{FieldMap, IntentPayload, IntentRecord, IntentRef, IntentTable};
use crate::domain::ports::{child_key, IntentStore};

/// Thin façade over an [`IntentStore`].
#[derive(Clone)]
pub struct IntentClient {
    store: Arc<dyn IntentStore>,
}

impl IntentClient {
    /// Wrap an intent store.
    pub fn new(store: Arc<dyn IntentStore>) -> Self {
        Self { store }
    }

    /// Write the intent `key` into `table`.
    #[instrument(skip(self, fields), fields(table = %table))]
    pub async fn create(
        &self,
        table: IntentTable,
        key: &str,
        fields: FieldMap,
    ) -> HarnessResult<IntentRecord> {
        self.store.create(table, key, fields.clone()).await?;
        debug!(key, "intent written");
        Ok(IntentRecord::new(table, key, fields))
    }

    /// Delete the intent `key` from `table`.
    #[instrument(skip(self), fields(table = %table))]
    pub async fn remove(&self, table: IntentTable, key: &str) -> HarnessResult<()> {
        self.store.remove(table, key).await?;
        debug!(key, "intent removed");
        Ok(())
    }

    /// Delete the intent `intent` points at.
    pub async fn remove_ref(&self, intent: &IntentRef) -> HarnessResult<()> {
        self.remove(intent.table, &intent.key).await
    }

    /// Write a child intent under `parent_key`, e.g. a rule of a policy.
    #[instrument(skip(self, fields), fields(table = %table))]
    pub async fn set_field(
        &self,
        table: IntentTable,
        parent_key: &str,
        field_key: &str,
        fields: FieldMap,
    ) -> HarnessResult<IntentRecord> {
        self.store
            .set_field(table, parent_key, field_key, fields.clone())
            .await?;
        debug!(parent_key, field_key, "child intent written");
        Ok(IntentRecord::new(
            table,
            child_key(parent_key, field_key),
            fields,
        ))
    }

    /// Serialize `payload` and write it under `key` in its own table.
    pub async fn create_payload<P: IntentPayload + Sync>(
        &self,
        key: &str,
        payload: &P,
    ) -> HarnessResult<IntentRecord> {
        let fields = payload.to_fields()?;
        self.create(P::TABLE, key, fields).await
    }

    /// Serialize `payload` and write it as child `field_key` of `parent_key`.
    pub async fn set_payload<P: IntentPayload + Sync>(
        &self,
        parent_key: &str,
        field_key: &str,
        payload: &P,
    ) -> HarnessResult<IntentRecord> {
        let fields = payload.to_fields()?;
        self.set_field(P::TABLE, parent_key, field_key, fields).await
    }
}
