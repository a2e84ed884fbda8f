//! Wiring of the engine services over a set of store ports.

use std::sync::Arc;

use crate::adapters::SimulatedDataplane;
use crate::domain::models::PollingProfiles;
use crate::domain::ports::{CounterStore, IntentStore, RealizedStore};
use crate::services::{
    CounterLifecycle, IdentityResolver, IntentClient, RealizedClient, TeardownExecutor,
};

/// The engine services a scenario drives, sharing one set of store ports.
pub struct Harness {
    /// Writes intents.
    pub intents: IntentClient,
    /// Reads and awaits realized state.
    pub realized: RealizedClient,
    /// Maps intents to realized keys.
    pub resolver: IdentityResolver,
    /// Counter group lifecycle.
    pub counters: CounterLifecycle,
    /// Ordered removal.
    pub teardown: TeardownExecutor,
    /// Polling profiles shared by every wait.
    pub profiles: PollingProfiles,
}

impl Harness {
    /// Wire the services over the given store ports.
    pub fn new(
        intent_store: Arc<dyn IntentStore>,
        realized_store: Arc<dyn RealizedStore>,
        counter_store: Arc<dyn CounterStore>,
        profiles: PollingProfiles,
    ) -> Self {
        let intents = IntentClient::new(intent_store);
        let realized = RealizedClient::new(realized_store);
        Self {
            resolver: IdentityResolver::new(realized.clone()),
            counters: CounterLifecycle::new(counter_store, profiles.counter),
            teardown: TeardownExecutor::new(intents.clone(), realized.clone(), profiles),
            intents,
            realized,
            profiles,
        }
    }

    /// Harness whose three ports are all served by one simulated dataplane.
    pub fn simulated(dataplane: &Arc<SimulatedDataplane>, profiles: PollingProfiles) -> Self {
        Self::new(
            Arc::clone(dataplane) as Arc<dyn IntentStore>,
            Arc::clone(dataplane) as Arc<dyn RealizedStore>,
            Arc::clone(dataplane) as Arc<dyn CounterStore>,
            profiles,
        )
    }
}
