//! Service layer: the convergence engine.
//!
//! Every waiting step goes through [`poller::await_condition`]; the other
//! services compose it with the store ports.

pub mod attributes;
pub mod counter_lifecycle;
pub mod identity_resolver;
pub mod intent_client;
pub mod normalize;
pub mod poller;
pub mod realized_client;
pub mod teardown;

pub use attributes::{assert_attribute, assert_attributes};
pub use counter_lifecycle::CounterLifecycle;
pub use identity_resolver::{eliminate, IdentityResolver};
pub use intent_client::IntentClient;
pub use poller::{await_condition, settle, Expectation, Probe};
pub use realized_client::RealizedClient;
pub use teardown::{Removal, TeardownExecutor, TeardownReport, WatchedKey};
