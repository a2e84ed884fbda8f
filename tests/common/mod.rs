//! Common test utilities for integration tests
//!
//! Every test drives a [`SimulatedDataplane`] on paused tokio time, so waits
//! measured in seconds complete instantly and deterministically.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dash_converge::adapters::SimulatedDataplane;
use dash_converge::application::Harness;
use dash_converge::domain::models::{
    AdminState, EniConfig, IntentPayload, IpVersion, MeterPolicyConfig, MeterRuleConfig,
    PollingConfig, PollingProfiles, SimulatorConfig, VnetConfig,
};
use dash_converge::services::IntentClient;

pub const VNET: &str = "Vnet1";
pub const ENI: &str = "F4939FEFC47E";

pub fn simulator() -> SimulatorConfig {
    SimulatorConfig {
        materialize_delay_ms: 100,
        tick_ms: 10,
    }
}

pub fn polling(timeout: Duration) -> PollingConfig {
    PollingConfig::new(Duration::from_millis(50), timeout)
}

pub fn profiles() -> PollingProfiles {
    PollingProfiles {
        creation: polling(Duration::from_secs(5)),
        removal: polling(Duration::from_secs(10)),
        counter: polling(Duration::from_secs(5)),
        settle_ms: 2_000,
    }
}

/// A running dataplane and a harness wired to it.
pub fn setup() -> (Arc<SimulatedDataplane>, Harness) {
    let dataplane = SimulatedDataplane::start(simulator());
    let harness = Harness::simulated(&dataplane, profiles());
    (dataplane, harness)
}

pub fn policy(version: IpVersion) -> MeterPolicyConfig {
    MeterPolicyConfig {
        ip_version: version,
    }
}

pub fn rule(priority: u32, prefix: &str) -> MeterRuleConfig {
    MeterRuleConfig {
        priority,
        metering_class: priority + 1000,
        ip_prefix: prefix.to_string(),
    }
}

pub fn vnet() -> VnetConfig {
    VnetConfig {
        vni: 45654,
        guid: "559c6ce826ab4193b946ccc6e8f930b2".to_string(),
    }
}

pub fn eni(v4_policy: Option<&str>, v6_policy: Option<&str>) -> EniConfig {
    EniConfig {
        eni_id: "497f23d7-f0ac-4c99-a98f-59b470e8c7bd".to_string(),
        mac_address: ENI.to_string(),
        underlay_ip: "25.1.1.1".to_string(),
        admin_state: AdminState::Enabled,
        vnet: VNET.to_string(),
        v4_meter_policy_id: v4_policy.map(str::to_string),
        v6_meter_policy_id: v6_policy.map(str::to_string),
    }
}

/// Write a VNET, the v4 policy `policy_key` and an ENI bound to it.
pub async fn provision_eni(intents: &IntentClient, policy_key: &str) {
    intents.create_payload(VNET, &vnet()).await.unwrap();
    intents
        .create_payload(policy_key, &policy(IpVersion::Ipv4))
        .await
        .unwrap();
    intents
        .create_payload(ENI, &eni(Some(policy_key), None))
        .await
        .unwrap();
}

pub fn fields<P: IntentPayload>(payload: &P) -> dash_converge::domain::models::FieldMap {
    payload.to_fields().unwrap()
}
