//! Error types for state machine definition, dispatch and connections.

use thiserror::Error;

/// Type-erased error carried as the cause of a failed output.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A transition table that cannot be turned into a machine.
///
/// Raised once at startup when a definition is built. This is a programming
/// error, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// The initial state is not among the declared states.
    #[error("{machine}: initial state {state} is not declared")]
    UnknownInitialState {
        /// Machine being defined
        machine: &'static str,
        /// Offending state
        state: &'static str,
    },

    /// A transition names a state that was never declared.
    #[error("{machine}: transition references undeclared state {state}")]
    UndeclaredState {
        /// Machine being defined
        machine: &'static str,
        /// Offending state
        state: &'static str,
    },

    /// The same (state, input) pair was registered twice.
    #[error("{machine}: ambiguous transition for input {input} in state {state}")]
    AmbiguousTransition {
        /// Machine being defined
        machine: &'static str,
        /// Source state
        state: &'static str,
        /// Duplicated input
        input: &'static str,
    },

    /// A declared state cannot be reached from the initial state.
    #[error("{machine}: state {state} is unreachable")]
    UnreachableState {
        /// Machine being defined
        machine: &'static str,
        /// Offending state
        state: &'static str,
    },
}

/// Failure of a single dispatch call.
///
/// In both cases the machine is left in the state it had before the call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The input is not legal in the current state.
    #[error("{machine}: input {input} is not accepted in state {state}")]
    InvalidTransition {
        /// Machine that rejected the input
        machine: &'static str,
        /// State the machine is (still) in
        state: &'static str,
        /// Rejected input
        input: &'static str,
    },

    /// An output failed part-way through a transition.
    #[error("{machine}: output {output} failed while handling {input} in state {state}")]
    OutputFailed {
        /// Machine whose transition failed
        machine: &'static str,
        /// State the machine is (still) in
        state: &'static str,
        /// Input being handled
        input: &'static str,
        /// Output that failed
        output: &'static str,
        /// Underlying cause
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// True for [`DispatchError::InvalidTransition`].
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    /// True for [`DispatchError::OutputFailed`].
    pub fn is_output_failed(&self) -> bool {
        matches!(self, Self::OutputFailed { .. })
    }
}

/// An output needed an argument the input did not carry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// No cipher spec was available for a cipher spec output.
    #[error("output {output} requires a cipher spec")]
    MissingCipherSpec {
        /// Output that needed the argument
        output: &'static str,
    },
}

/// Errors surfaced by [`crate::connection::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Machine definitions failed to build.
    #[error("state machine definition invalid")]
    Definition(#[from] DefinitionError),

    /// The handshake rejected an input or an output failed.
    #[error("handshake dispatch failed")]
    Dispatch(#[from] DispatchError),
}
