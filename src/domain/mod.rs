//! Domain layer for the convergence harness
//!
//! Models, the error taxonomy and the store ports. Nothing here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{HarnessError, HarnessResult};
