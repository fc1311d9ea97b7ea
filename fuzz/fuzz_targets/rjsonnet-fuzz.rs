#![no_main]

use libfuzzer_sys::fuzz_target;
use rjsonnet_parser::{parse, ParserSettings, Source};

fuzz_target!(|data: &str| {
	let source = Source::new_virtual("fuzz.jsonnet".into(), data.into());
	// Parsing must never panic, loop, or abort regardless of input: a
	// malformed program is a `ParseError`, not a crash.
	let _ = parse(data, &ParserSettings { source });
});
