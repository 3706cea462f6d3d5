#![no_main]

use glimpse_core::{FormatClassifier, MatcherSet};
use libfuzzer_sys::fuzz_target;
use std::io::{Cursor, Seek, SeekFrom};
use std::sync::LazyLock;

static MATCHERS: LazyLock<MatcherSet> = LazyLock::new(MatcherSet::builtin);

fuzz_target!(|data: &[u8]| {
    let mut input = Cursor::new(data);
    let classifier = FormatClassifier::new(&MATCHERS);
    let _ = classifier.classify(&mut input, None);
    assert_eq!(input.stream_position().ok(), Some(0));
    let _ = input.seek(SeekFrom::End(0));
});
