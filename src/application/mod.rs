pub mod harness;
pub mod meter_scenario;
pub mod report;

pub use harness::Harness;
pub use meter_scenario::{MeterFixture, MeterScenario, Step, SCENARIO_NAME};
pub use report::{Resolved, ScenarioReport, StepOutcome, StepReport};
