//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::{fmt, time::Duration};

use latchkey_core::{
    CipherSpec, ClientEvent, ConnectionConfig, MemorySessionCache, SessionId, SessionState,
};
use latchkey_proto::RecordError;

use crate::{
    recording::RecordingPerformer,
    scenario::{OracleFn, World},
};

/// One thing that happens to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A decoded client event arrives
    Event(ClientEvent),
    /// A record failed to decode
    MalformedRecord(RecordError),
    /// The clock moves forward, then the connection is ticked
    Advance(Duration),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(ClientEvent::Hello { selected, .. }) => write!(f, "hello({selected})"),
            Self::Event(ClientEvent::Finished) => f.write_str("finished"),
            Self::Event(ClientEvent::CipherSpecAcknowledged) => f.write_str("acknowledge"),
            Self::Event(ClientEvent::Alert) => f.write_str("alert"),
            Self::MalformedRecord(err) => write!(f, "malformed record ({err})"),
            Self::Advance(by) => write!(f, "advance {by:?}"),
        }
    }
}

/// Scenario builder.
///
/// Configure the server, queue steps, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    config: ConnectionConfig,
    cache: MemorySessionCache,
    performer: RecordingPerformer,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ConnectionConfig::default(),
            cache: MemorySessionCache::new(),
            performer: RecordingPerformer::new(),
            steps: Vec::new(),
        }
    }

    /// Use a custom connection configuration.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the session cache so that `id` resumes with `spec`.
    pub fn cached_session(mut self, id: &'static [u8], spec: &str) -> Self {
        self.cache.insert(SessionId::new(id), SessionState { cipher_spec: CipherSpec::new(spec) });
        self
    }

    /// Make the `attempt`-th performed action (from zero) fail.
    pub fn fail_at(mut self, attempt: usize) -> Self {
        self.performer = RecordingPerformer::failing_at(attempt);
        self
    }

    /// Queue a ClientHello for session `id`, proposing `selected`.
    pub fn hello(self, id: &'static [u8], selected: &str) -> Self {
        self.step(Step::Event(ClientEvent::Hello {
            session_id: SessionId::new(id),
            selected: CipherSpec::new(selected),
        }))
    }

    /// Queue the client's Finished.
    pub fn finished(self) -> Self {
        self.step(Step::Event(ClientEvent::Finished))
    }

    /// Queue the client's cipher spec acknowledgement.
    pub fn acknowledge(self) -> Self {
        self.step(Step::Event(ClientEvent::CipherSpecAcknowledged))
    }

    /// Queue a client alert.
    pub fn alert(self) -> Self {
        self.step(Step::Event(ClientEvent::Alert))
    }

    /// Queue a record decode failure.
    pub fn malformed_record(self, error: RecordError) -> Self {
        self.step(Step::MalformedRecord(error))
    }

    /// Queue a clock advance followed by a tick.
    pub fn advance(self, by: Duration) -> Self {
        self.step(Step::Advance(by))
    }

    /// Queue an arbitrary step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Applies every step in order, keeping going after failed steps, then
    /// runs the oracle against the final world.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, config, cache, performer, steps } = self.scenario;

        let mut world = World::start(config, performer, cache)
            .map_err(|e| format!("Scenario '{name}': connection setup failed: {e}"))?;

        for step in steps {
            let record = world.apply(step);
            tracing::debug!(
                scenario = %name,
                step = %record.step,
                ok = record.result.is_ok(),
                "step applied"
            );
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use latchkey_core::HandshakeState;

    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").hello(b"", "a").oracle(Box::new(|_world| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test").hello(b"", "a");
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn steps_run_in_order() {
        let scenario = Scenario::new("test").hello(b"", "a").finished().oracle(Box::new(|world| {
            assert_eq!(world.steps().len(), 2);
            assert_eq!(world.steps()[0].state_after, HandshakeState::AwaitingFinished);
            assert_eq!(world.state(), HandshakeState::ApplicationData);
            Ok(())
        }));

        scenario.run().unwrap();
    }

    #[test]
    fn oracle_failure_names_scenario() {
        let err = Scenario::new("named")
            .oracle(Box::new(|_| Err("nope".to_string())))
            .run()
            .unwrap_err();
        assert_eq!(err, "Scenario 'named': nope");
    }

    #[test]
    fn step_display() {
        assert_eq!(Step::Advance(Duration::from_secs(2)).to_string(), "advance 2s");
        assert_eq!(
            Step::MalformedRecord(RecordError::UnknownContentType(0)).to_string(),
            "malformed record (unknown content type 0)"
        );
    }
}
