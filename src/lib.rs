#![warn(missing_docs)]

//! zip-chunked is a [sans-io](https://sans-io.readthedocs.io/how-to-sans-io.html)
//! library for reading zip files front-to-back, from chunks of any size.
//!
//! It never seeks and never looks at the central directory: entries are
//! discovered through their local file headers, decompressed as their bytes
//! arrive, and checked against the CRC-32 the local header declares.
//!
//! The core is [fsm::StreamFsm]: feed it chunks with
//! [process](fsm::StreamFsm::process), collect [fsm::StreamItem]s, and call
//! [finish](fsm::StreamFsm::finish) once the input is exhausted. If you have
//! an [std::io::Read], the `sync` feature provides [sync::StreamingReader],
//! which does that loop for you.
//!
//! Entries that rely on a data descriptor (general purpose flag bit 3) are
//! rejected, since their sizes aren't known until after their data.

pub mod encoding;
pub mod error;
pub mod fsm;
pub mod parse;

#[cfg(feature = "sync")]
pub mod sync;

pub use error::Error;
pub use fsm::{FsmOptions, Stage, StreamFsm, StreamItem};
pub use parse::LocalFileHeaderRecord;
