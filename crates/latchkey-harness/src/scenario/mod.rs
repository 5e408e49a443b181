//! Scenario tests with a mandatory oracle.
//!
//! A scenario is a named list of steps (client events, malformed records,
//! clock advances) applied to one server connection. Every step's result is
//! kept in the [`World`], including errors, so that the oracle can verify
//! failure paths as well as happy ones. A scenario cannot run without an
//! oracle.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::{StepRecord, World};

/// Verification run against the final world.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
