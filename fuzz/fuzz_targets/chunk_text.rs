#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_core::chunk::{chunk, reconstruct};

fuzz_target!(|input: (u8, u8, &str)| {
    let (size, overlap, text) = input;
    let chunk_size = usize::from(size);
    let overlap = usize::from(overlap);

    let Ok(fragments) = chunk("qn-fuzz0000", text, chunk_size, overlap) else {
        assert!(chunk_size == 0 || overlap >= chunk_size);
        return;
    };

    for (seq, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.seq(), seq);
        assert!(fragment.char_len <= chunk_size);
        assert_eq!(fragment.text.chars().count(), fragment.char_len);
    }
    assert_eq!(reconstruct(&fragments, overlap), text);

    let again = chunk("qn-fuzz0000", text, chunk_size, overlap).expect("same params");
    assert_eq!(again, fragments);
});
