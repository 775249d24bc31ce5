// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use imgsearch::parser::{resolve_classification, ResponseParser};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    response: &'a str,
    threshold: u8,
}

fuzz_target!(|input: Input<'_>| {
    let parser = ResponseParser::new(f64::from(input.threshold % 101));
    let fields = parser.extract(input.response);

    // Values never carry surrounding whitespace
    for value in [&fields.title, &fields.summary, &fields.keywords, &fields.classification] {
        assert_eq!(value.as_str(), value.trim());
    }

    let _ = resolve_classification(&fields.classification);
    let _ = resolve_classification(input.response);
});
