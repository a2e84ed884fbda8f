//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the store adapters implement:
//! - IntentStore: keyed writes into the intent store
//! - RealizedStore: read-only polling over materialized state
//! - CounterStore: counter group control and its side tables
//!
//! The engine depends only on these traits; the concrete transport is an
//! adapter concern.

pub mod counter_store;
pub mod errors;
pub mod intent_store;
pub mod realized_store;

pub use counter_store::CounterStore;
pub use errors::{StoreError, StoreResult};
pub use intent_store::{child_key, IntentStore};
pub use realized_store::RealizedStore;
