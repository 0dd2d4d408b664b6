//! Parsers are just part of the puzzle when it comes to zip files: the bytes
//! they need arrive in chunks that don't line up with record boundaries, and
//! entry data must be decompressed and checksummed as it goes by.
//! [StreamFsm] provides a state machine to handle this.
//!
//! Reading an entry involves reading the local header, then its name and
//! extra field, then the data (while calculating the CRC32), and then
//! checking whether the CRC32 and uncompressed size match the values in the
//! local header, before looking for the next entry.

macro_rules! transition {
    ($state: expr => ($pattern: pat) $body: expr) => {
        $state = if let $pattern = std::mem::take(&mut $state) {
            $body
        } else {
            unreachable!()
        };
    };
}

mod entry;
pub use entry::{AnyDecompressor, Decompressor};

mod stream;
pub use stream::{FsmOptions, Stage, StreamFsm, StreamItem};
