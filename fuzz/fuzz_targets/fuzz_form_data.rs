#![no_main]
use libfuzzer_sys::fuzz_target;

use bytes::Bytes;
use cgi_form::{negotiate, ContentKind, State};

fuzz_target!(|data: &[u8]| {
    let buffer = Bytes::from(data.to_vec());

    let mut state = State::new(buffer.clone(), b"--BOUNDARY");
    for part in state.by_ref().flatten() {
        assert!(part.len() <= buffer.len());
    }
    assert!(state.eof());

    // the first line doubles as a content type
    let line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    if let Ok(content_type) = std::str::from_utf8(line) {
        if let ContentKind::Multipart { boundary } = negotiate(Some(content_type)) {
            assert!(boundary.starts_with(b"--"));
            State::new(buffer, &boundary).for_each(drop);
        }
    }
});
