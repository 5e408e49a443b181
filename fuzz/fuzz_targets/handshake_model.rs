//! Fuzz the handshake against the reference model.
//!
//! Any operation sequence must produce the same actions, rejections and
//! states in the real connection as in [`ModelConnection`].

#![no_main]

use std::time::Duration;

use latchkey_harness::{ModelConnection, ModelResult, Operation, model_world};
use libfuzzer_sys::fuzz_target;

const TIMEOUT: Duration = Duration::from_secs(30);

fuzz_target!(|ops: Vec<Operation>| {
    let mut model = ModelConnection::new(TIMEOUT);
    let mut world = model_world(TIMEOUT).unwrap();

    for op in ops {
        let expected = model.apply(op);
        let record = world.apply(op.to_step());
        let actual = match &record.result {
            Ok(actions) => ModelResult::Ok(actions.iter().map(ToString::to_string).collect()),
            Err(_) => ModelResult::Rejected,
        };

        assert_eq!(actual, expected, "{op:?}");
        assert_eq!(world.state(), model.state());
        assert_eq!(world.connection().session().cipher_spec_state(), model.cipher_spec());
    }
});
