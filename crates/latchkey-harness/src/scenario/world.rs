//! World state for scenario execution.
//!
//! The World owns the server connection, the simulated clock and the record
//! of every applied step.

use std::{error::Error, time::Instant};

use latchkey_core::{
    Action, Connection, ConnectionConfig, ConnectionError, HandshakeState, MemorySessionCache,
};

use crate::{recording::RecordingPerformer, scenario::Step};

/// Connection type driven by scenarios.
pub type ScenarioConnection = Connection<RecordingPerformer, MemorySessionCache>;

/// What happened when one step was applied.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// The step
    pub step: Step,
    /// Handshake state before the step
    pub state_before: HandshakeState,
    /// Handshake state after the step
    pub state_after: HandshakeState,
    /// Actions returned, or the error with its causes joined by `: `
    pub result: Result<Vec<Action>, String>,
}

/// World state: one connection, a clock and the step log.
pub struct World {
    connection: ScenarioConnection,
    now: Instant,
    steps: Vec<StepRecord>,
}

impl World {
    /// Wrap a connection whose clock reads `now`.
    pub fn new(connection: ScenarioConnection, now: Instant) -> Self {
        Self { connection, now, steps: Vec::new() }
    }

    /// Create a connection starting at the current instant.
    pub fn start(
        config: ConnectionConfig,
        performer: RecordingPerformer,
        cache: MemorySessionCache,
    ) -> Result<Self, ConnectionError> {
        let now = Instant::now();
        Ok(Self::new(Connection::new(now, config, performer, cache)?, now))
    }

    /// Apply one step and record the outcome.
    pub fn apply(&mut self, step: Step) -> &StepRecord {
        let state_before = self.connection.state();
        let result = match &step {
            Step::Event(event) => self.connection.handle(event.clone()),
            Step::MalformedRecord(error) => self.connection.record_error(error),
            Step::Advance(by) => {
                self.now += *by;
                self.connection.tick(self.now)
            },
        };

        let record = StepRecord {
            step,
            state_before,
            state_after: self.connection.state(),
            result: result.map_err(|e| describe(&e)),
        };
        self.steps.push(record);
        &self.steps[self.steps.len() - 1]
    }

    /// The connection under test.
    pub fn connection(&self) -> &ScenarioConnection {
        &self.connection
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.connection.state()
    }

    /// The recording performer.
    pub fn performer(&self) -> &RecordingPerformer {
        self.connection.session().performer()
    }

    /// Every action performed so far, as descriptors.
    pub fn descriptors(&self) -> Vec<String> {
        self.performer().descriptors()
    }

    /// Applied steps, in order.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Steps whose result was an error.
    pub fn errors(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| record.result.is_err())
    }
}

/// Render an error and its whole source chain.
fn describe(error: &dyn Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
