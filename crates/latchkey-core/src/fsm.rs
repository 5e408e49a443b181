//! Generic transition-table state machine engine.
//!
//! A [`Definition`] is an immutable table `(state, input) -> (outputs, next)`
//! built and validated once, then shared by every session. A [`Cursor`] is
//! the only per-session piece: the current state plus a reference to the
//! shared table.
//!
//! # Dispatch
//!
//! ```text
//! lookup (current, input) ──absent──> InvalidTransition (state unchanged)
//!          │
//!          └─present─> run outputs in order ──any fails──> OutputFailed (state unchanged)
//!                              │
//!                              └─all succeed─> current = next, return results
//! ```
//!
//! The engine knows nothing about what an output does. The caller supplies a
//! closure that turns each output identifier into zero or more results; a
//! sub-machine delegation simply pushes the sub-machine's results, which
//! splices them into the parent's result list at that position.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    hash::Hash,
};

use crate::error::{BoxError, DefinitionError, DispatchError};

/// Identifier usable as a state, input kind or output in a [`Definition`].
pub trait Symbol: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Stable snake_case name used in errors and logs.
    fn name(self) -> &'static str;
}

/// Target of one table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S, O> {
    outputs: Vec<O>,
    next: S,
}

impl<S: Symbol, O: Symbol> Transition<S, O> {
    /// Outputs run by this transition, in order.
    pub fn outputs(&self) -> &[O] {
        &self.outputs
    }

    /// State entered once every output succeeded.
    pub fn next(&self) -> S {
        self.next
    }
}

/// Immutable, validated transition table.
#[derive(Debug, Clone)]
pub struct Definition<S, I, O> {
    name: &'static str,
    initial: S,
    states: Vec<S>,
    table: HashMap<(S, I), Transition<S, O>>,
}

impl<S: Symbol, I: Symbol, O: Symbol> Definition<S, I, O> {
    /// Start building a definition named `name` with the given initial state.
    pub fn builder(name: &'static str, initial: S) -> DefinitionBuilder<S, I, O> {
        DefinitionBuilder { name, initial, states: Vec::new(), transitions: Vec::new() }
    }

    /// Machine name used in errors and logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Initial state.
    pub fn initial(&self) -> S {
        self.initial
    }

    /// Declared states, in declaration order.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    /// Table entry for `(state, input)`, if the pair is legal.
    pub fn transition(&self, state: S, input: I) -> Option<&Transition<S, O>> {
        self.table.get(&(state, input))
    }

    /// Inputs accepted in `state`.
    pub fn inputs(&self, state: S) -> impl Iterator<Item = I> + '_ {
        self.table.keys().filter(move |(from, _)| *from == state).map(|(_, input)| *input)
    }

    /// True when `state` accepts no input at all.
    pub fn is_terminal(&self, state: S) -> bool {
        self.inputs(state).next().is_none()
    }
}

/// Builder for [`Definition`]; validation happens in [`Self::build`].
#[derive(Debug, Clone)]
pub struct DefinitionBuilder<S, I, O> {
    name: &'static str,
    initial: S,
    states: Vec<S>,
    transitions: Vec<(S, I, Vec<O>, S)>,
}

impl<S: Symbol, I: Symbol, O: Symbol> DefinitionBuilder<S, I, O> {
    /// Declare a state.
    #[must_use]
    pub fn state(mut self, state: S) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    /// Declare several states.
    #[must_use]
    pub fn states(self, states: impl IntoIterator<Item = S>) -> Self {
        states.into_iter().fold(self, Self::state)
    }

    /// Register `from --input--> to`, running `outputs` in order.
    #[must_use]
    pub fn transition(
        mut self,
        from: S,
        input: I,
        outputs: impl IntoIterator<Item = O>,
        to: S,
    ) -> Self {
        self.transitions.push((from, input, outputs.into_iter().collect(), to));
        self
    }

    /// Register the same transition from each state in `from`.
    #[must_use]
    pub fn transition_from_each(
        self,
        from: impl IntoIterator<Item = S>,
        input: I,
        outputs: impl IntoIterator<Item = O>,
        to: S,
    ) -> Self {
        let outputs: Vec<O> = outputs.into_iter().collect();
        from.into_iter()
            .fold(self, |builder, state| builder.transition(state, input, outputs.iter().copied(), to))
    }

    /// Validate and freeze the table.
    ///
    /// # Errors
    ///
    /// - `UnknownInitialState` if the initial state was not declared
    /// - `UndeclaredState` if a transition names an undeclared state
    /// - `AmbiguousTransition` if a `(state, input)` pair appears twice
    /// - `UnreachableState` if a declared state cannot be reached
    pub fn build(self) -> Result<Definition<S, I, O>, DefinitionError> {
        let machine = self.name;
        if !self.states.contains(&self.initial) {
            return Err(DefinitionError::UnknownInitialState { machine, state: self.initial.name() });
        }

        let mut table = HashMap::with_capacity(self.transitions.len());
        for (from, input, outputs, to) in self.transitions {
            if let Some(state) = [from, to].into_iter().find(|s| !self.states.contains(s)) {
                return Err(DefinitionError::UndeclaredState { machine, state: state.name() });
            }
            if table.insert((from, input), Transition { outputs, next: to }).is_some() {
                return Err(DefinitionError::AmbiguousTransition {
                    machine,
                    state: from.name(),
                    input: input.name(),
                });
            }
        }

        let mut reached = HashSet::from([self.initial]);
        let mut queue = VecDeque::from([self.initial]);
        while let Some(state) = queue.pop_front() {
            for ((from, _), transition) in &table {
                if *from == state && reached.insert(transition.next) {
                    queue.push_back(transition.next);
                }
            }
        }
        if let Some(state) = self.states.iter().find(|s| !reached.contains(*s)) {
            return Err(DefinitionError::UnreachableState { machine, state: state.name() });
        }

        Ok(Definition { name: machine, initial: self.initial, states: self.states, table })
    }
}

/// Per-session position in a shared [`Definition`].
#[derive(Debug)]
pub struct Cursor<'d, S, I, O> {
    definition: &'d Definition<S, I, O>,
    current: S,
}

impl<S: Copy, I, O> Clone for Cursor<'_, S, I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Copy, I, O> Copy for Cursor<'_, S, I, O> {}

impl<'d, S: Symbol, I: Symbol, O: Symbol> Cursor<'d, S, I, O> {
    /// Cursor at the definition's initial state.
    pub fn new(definition: &'d Definition<S, I, O>) -> Self {
        Self { definition, current: definition.initial() }
    }

    /// Current state.
    pub fn state(&self) -> S {
        self.current
    }

    /// Shared definition.
    pub fn definition(&self) -> &'d Definition<S, I, O> {
        self.definition
    }

    /// True when the current state accepts no input.
    pub fn is_terminal(&self) -> bool {
        self.definition.is_terminal(self.current)
    }

    /// Feed one input.
    ///
    /// `run` is called once per declared output, in order, and appends that
    /// output's results to the shared list. The cursor only advances after
    /// the last output returned `Ok`.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if `(state, input)` has no table entry
    /// - `OutputFailed` wrapping the first error returned by `run`
    pub fn dispatch<R, E, F>(&mut self, input: I, mut run: F) -> Result<Vec<R>, DispatchError>
    where
        F: FnMut(O, &mut Vec<R>) -> Result<(), E>,
        E: Into<BoxError>,
    {
        let machine = self.definition.name();
        let from = self.current;

        let Some(transition) = self.definition.transition(from, input) else {
            tracing::debug!(machine, state = from.name(), input = input.name(), "input rejected");
            return Err(DispatchError::InvalidTransition {
                machine,
                state: from.name(),
                input: input.name(),
            });
        };

        let mut results = Vec::with_capacity(transition.outputs().len());
        for &output in transition.outputs() {
            tracing::trace!(machine, state = from.name(), output = output.name(), "running output");
            if let Err(err) = run(output, &mut results) {
                let source = err.into();
                tracing::warn!(
                    machine,
                    state = from.name(),
                    input = input.name(),
                    output = output.name(),
                    error = %source,
                    "output failed, transition abandoned"
                );
                return Err(DispatchError::OutputFailed {
                    machine,
                    state: from.name(),
                    input: input.name(),
                    output: output.name(),
                    source,
                });
            }
        }

        self.current = transition.next();
        tracing::debug!(
            machine,
            from = from.name(),
            input = input.name(),
            to = self.current.name(),
            results = results.len(),
            "transition"
        );
        Ok(results)
    }
}
