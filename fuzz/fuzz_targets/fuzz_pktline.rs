//! Fuzz target for pkt-line advertisement parsing.
//!
//! Frames returned by the parser must tile the input exactly.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frames) = vanity_git::parse_advertisement(data) else {
        return;
    };

    let mut offset = 0;
    for frame in &frames {
        assert_eq!(frame.range.start, offset);
        offset = frame.range.end;
    }
    assert_eq!(offset, data.len());
});
