//! Reading entries from anything that implements [std::io::Read].
//!
//! This is a thin loop around [StreamFsm]: read a chunk, process it, hand
//! out the items it produced.

use std::{
    collections::VecDeque,
    io::{self, Read},
};

use tracing::trace;

use crate::{
    error::Error,
    fsm::{FsmOptions, StreamFsm, StreamItem},
};

/// Pulls chunks from a reader and yields the [StreamItem]s they decode to.
///
/// Stops reading as soon as the state machine is done, so whatever follows
/// the entries (the central directory, usually) is left in the reader.
pub struct StreamingReader<R> {
    rd: R,
    fsm: StreamFsm,
    buf: Vec<u8>,
    items: VecDeque<StreamItem>,
    scratch: Vec<StreamItem>,
    error: Option<Error>,
    finished: bool,
}

impl<R> StreamingReader<R>
where
    R: Read,
{
    /// Default size of the chunks read from the underlying reader
    pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

    /// Read `rd` in chunks of [Self::DEFAULT_CHUNK_SIZE] bytes.
    pub fn new(rd: R) -> Self {
        Self::with_chunk_size(rd, Self::DEFAULT_CHUNK_SIZE)
    }

    /// Read `rd` in chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(rd: R, chunk_size: usize) -> Self {
        Self::with_options(rd, chunk_size, Default::default())
    }

    /// Read `rd` in chunks of at most `chunk_size` bytes, with custom limits
    /// for the state machine.
    pub fn with_options(rd: R, chunk_size: usize, options: FsmOptions) -> Self {
        Self {
            rd,
            fsm: StreamFsm::with_options(options),
            buf: vec![0u8; chunk_size.max(1)],
            items: VecDeque::new(),
            scratch: Vec::new(),
            error: None,
            finished: false,
        }
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.rd
    }

    fn fill_items(&mut self) -> Result<(), Error> {
        while self.items.is_empty() && !self.finished {
            if self.fsm.is_done() {
                trace!("state machine is done, not reading any further");
                self.finished = true;
                break;
            }

            let n = match self.rd.read(&mut self.buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(e.into());
                }
            };
            trace!("read {} bytes", n);

            if n == 0 {
                self.finished = true;
                self.fsm.finish()?;
                break;
            }

            let res = self.fsm.process(&self.buf[..n], &mut self.scratch);
            self.items.extend(self.scratch.drain(..));
            if let Err(e) = res {
                self.finished = true;
                return Err(e);
            }
        }
        Ok(())
    }
}

impl<R> Iterator for StreamingReader<R>
where
    R: Read,
{
    type Item = Result<StreamItem, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.items.is_empty() && self.error.is_none() {
            if let Err(e) = self.fill_items() {
                self.error = Some(e);
            }
        }

        // items produced before an error still go out first
        match self.items.pop_front() {
            Some(item) => Some(Ok(item)),
            None => self.error.take().map(Err),
        }
    }
}

/// Stream zip entries out of a reader, front to back.
pub trait ReadStreamItems: Read + Sized {
    /// Iterate over the items of the zip archive `self` contains.
    fn stream_items(self) -> StreamingReader<Self> {
        StreamingReader::new(self)
    }
}

impl<R> ReadStreamItems for R where R: Read {}
