//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! connection behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest / seed generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!   ModelConnection      World         Compare
//!     (reference)    (tables + RecordingPerformer)
//! ```

use std::time::Duration;

use latchkey_harness::{
    ModelConnection, ModelResult, Operation, World, model_world, random_operations,
};
use proptest::prelude::*;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Apply `ops` to both sides, returning the first divergence.
fn compare(ops: &[Operation]) -> Result<(), String> {
    let mut model = ModelConnection::new(TIMEOUT);
    let mut world: World = model_world(TIMEOUT).map_err(|e| e.to_string())?;

    for (index, op) in ops.iter().enumerate() {
        let expected = model.apply(*op);
        let record = world.apply(op.to_step());

        let actual = match &record.result {
            Ok(actions) => ModelResult::Ok(actions.iter().map(ToString::to_string).collect()),
            Err(_) => ModelResult::Rejected,
        };
        if actual != expected {
            return Err(format!("op #{index} {op:?}: model {expected:?}, real {actual:?}"));
        }
        if world.state() != model.state() {
            return Err(format!(
                "op #{index} {op:?}: model state {:?}, real {:?}",
                model.state(),
                world.state()
            ));
        }
        let session = world.connection().session();
        if session.cipher_spec_state() != model.cipher_spec() || session.is_resumed() != model.resumed() {
            return Err(format!("op #{index} {op:?}: cipher spec or resumption diverged"));
        }
    }
    Ok(())
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => any::<bool>().prop_map(|resume| Operation::Hello { resume }),
        3 => Just(Operation::Finished),
        2 => Just(Operation::Acknowledge),
        1 => Just(Operation::Alert),
        1 => Just(Operation::CorruptRecord),
        2 => (0u8..20).prop_map(|secs| Operation::AdvanceTime { secs }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn real_connection_matches_model(ops in prop::collection::vec(operation(), 0..40)) {
        prop_assert_eq!(compare(&ops), Ok(()));
    }
}

#[test]
fn seeded_sequences_match_model() {
    for seed in 0..64 {
        let ops = random_operations(seed, 48);
        assert_eq!(compare(&ops), Ok(()), "seed {seed}");
    }
}

#[test]
fn happy_path_matches_model() {
    let ops = [
        Operation::Hello { resume: false },
        Operation::Finished,
        Operation::Acknowledge,
        Operation::AdvanceTime { secs: 200 },
    ];
    assert_eq!(compare(&ops), Ok(()));
}
