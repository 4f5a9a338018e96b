//! Fuzz target for ref advertisement rewriting.
//!
//! Pins an arbitrary ref against arbitrary input. A failed rewrite must not
//! write anything, and a successful one must parse again.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vanity_types::PinnedRef;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    tag: bool,
    name: &'a str,
    data: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let pin = if input.tag {
        PinnedRef::tag(input.name)
    } else {
        PinnedRef::branch(input.name)
    };
    let Ok(pin) = pin else {
        return;
    };

    let mut out = Vec::new();
    match vanity_git::rewrite_advertisement(input.data, &pin, &mut out) {
        Ok(()) => {
            vanity_git::parse_advertisement(&out).expect("rewritten advertisement parses");
        }
        Err(_) => assert!(out.is_empty()),
    }
});
