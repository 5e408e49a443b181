//! Fuzz one-shot record decoding in every phase.
//!
//! Arbitrary input must never panic, and whatever decodes must encode back
//! to the same prefix of the input.

#![no_main]

use latchkey_proto::{RecordPhase, TlsRecord};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for phase in [RecordPhase::Plaintext, RecordPhase::Compressed, RecordPhase::Ciphertext] {
        let Ok(record) = TlsRecord::decode(data, phase) else {
            continue;
        };
        assert!(record.fragment.len() <= phase.max_fragment_len());

        let encoded = record.to_vec(phase).unwrap();
        assert_eq!(&data[..encoded.len()], &encoded[..]);
    }
});
