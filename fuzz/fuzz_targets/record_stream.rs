//! Fuzz the streaming codec with attacker-chosen chunk boundaries.
//!
//! The first byte picks the chunk size. Chunked decoding must yield the same
//! records and the same first error as decoding the whole buffer at once.

#![no_main]

use bytes::BytesMut;
use latchkey_proto::{RecordCodec, RecordError, TlsRecord};
use libfuzzer_sys::fuzz_target;

fn drain(codec: RecordCodec, buffer: &mut BytesMut, out: &mut Vec<TlsRecord>) -> Option<RecordError> {
    loop {
        match codec.decode(buffer) {
            Ok(Some(record)) => out.push(record),
            Ok(None) => return None,
            Err(error) => return Some(error),
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&chunk, data)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk).max(1);
    let codec = RecordCodec::default();

    let mut whole = BytesMut::from(data);
    let mut expected = Vec::new();
    let expected_error = drain(codec, &mut whole, &mut expected);

    let mut buffer = BytesMut::new();
    let mut actual = Vec::new();
    let mut actual_error = None;
    for piece in data.chunks(chunk) {
        buffer.extend_from_slice(piece);
        actual_error = drain(codec, &mut buffer, &mut actual);
        if actual_error.is_some() {
            break;
        }
    }

    assert_eq!(actual, expected);
    assert_eq!(actual_error, expected_error);
});
