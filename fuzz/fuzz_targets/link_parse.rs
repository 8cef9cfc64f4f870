//! Fuzz target for Link parsing
//!
//! Any string that parses as a link must display back to a link that parses
//! to the same value.

#![no_main]

use libfuzzer_sys::fuzz_target;
use taulight_proto::Link;

fuzz_target!(|text: &str| {
    let Ok(link) = text.parse::<Link>() else {
        return;
    };

    let again: Link = link.to_string().parse().expect("displayed link must parse");
    assert_eq!(again, link);
});
