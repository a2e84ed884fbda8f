//! Domain models for the convergence harness.

pub mod config;
pub mod context;
pub mod counter;
pub mod dash;
pub mod record;
pub mod sai;
pub mod table;

pub use config::{Config, LoggingConfig, PollingConfig, PollingProfiles, SimulatorConfig};
pub use context::ScenarioContext;
pub use counter::{CounterBinding, CounterGroup, CounterState, CounterStatus};
pub use dash::{
    AdminState, ApplianceConfig, EniConfig, IntentPayload, IpVersion, MeterPolicyConfig,
    MeterRuleConfig, VnetConfig, PAYLOAD_FIELD,
};
pub use record::{
    AttributeMap, BaselineSnapshot, FieldMap, IntentRecord, IntentRef, KeySet, RealizedKey,
    RealizedRecord,
};
pub use table::{IntentTable, KeyCount, KeyCountCondition, RealizedTable};
