#![no_main]

use libfuzzer_sys::fuzz_target;
use zip_chunked::{StreamFsm, StreamItem};

fuzz_target!(|data: &[u8]| {
    // first byte picks the chunk size, the rest is the archive
    let Some((&chunk_size, data)) = data.split_first() else {
        return;
    };
    let chunk_size = chunk_size as usize + 1;

    let mut fsm = StreamFsm::new();
    let mut out = Vec::new();
    for chunk in data.chunks(chunk_size) {
        if fsm.process(chunk, &mut out).is_err() {
            return;
        }
        for item in out.drain(..) {
            if let StreamItem::Header(header) = item {
                let _ = header.decode_name();
                let _ = header.modified_datetime();
            }
        }
    }
    let _ = fsm.finish();
});
