//! Store adapters.

pub mod simulated;

pub use simulated::SimulatedDataplane;
