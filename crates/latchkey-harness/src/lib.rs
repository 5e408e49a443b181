//! Deterministic test harness for the Latchkey handshake engine.
//!
//! Scenario tests with mandatory oracles, a reference model for model-based
//! property tests, seeded operation sequences and a recording performer with
//! fault injection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod recording;
pub mod scenario;

pub use model::{ModelConnection, ModelResult, Operation, model_world, random_operations};
pub use recording::{InjectedFailure, RecordingPerformer};
pub use scenario::{Scenario, Step, World, oracle};
