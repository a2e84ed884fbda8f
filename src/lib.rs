//! dash-converge - convergence harness for DASH dataplane configuration
//!
//! Intent records written to a front-end store are materialized
//! asynchronously into a back-end (realized) store by an opaque control loop.
//! This crate verifies that materialization: it polls for convergence under
//! explicit deadlines, maps realized keys back to the intents that produced
//! them, asserts realized attributes, drives counter attachment through its
//! lifecycle, and tears configuration down in dependency order.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, error taxonomy and store ports
//! - **Service Layer** (`services`): the convergence engine
//! - **Adapters** (`adapters`): store implementations (simulated dataplane)
//! - **Application Layer** (`application`): the DASH meter scenario
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use dash_converge::adapters::SimulatedDataplane;
//! use dash_converge::application::{Harness, MeterFixture, MeterScenario};
//! use dash_converge::Config;
//!
//! # async fn demo() {
//! let config = Config::default();
//! let dataplane = SimulatedDataplane::start(config.simulator);
//! let harness = Harness::simulated(&dataplane, config.polling);
//! let report = MeterScenario::new(harness, MeterFixture::default()).run().await;
//! assert!(report.passed);
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Harness, MeterFixture, MeterScenario, ScenarioReport};
pub use domain::errors::{HarnessError, HarnessResult};
pub use domain::models::{
    Config, CounterGroup, IntentTable, KeySet, PollingConfig, PollingProfiles, RealizedKey,
    RealizedTable, ScenarioContext,
};
pub use domain::ports::{CounterStore, IntentStore, RealizedStore, StoreError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{await_condition, Expectation, Probe};
