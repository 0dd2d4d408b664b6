use std::cmp;

use tracing::{debug, trace};
use winnow::{
    stream::{AsBytes, Offset},
    Parser, Partial,
};

use crate::{
    error::{Error, FormatError, UnsupportedError},
    parse::{LocalFileHeaderRecord, Located, Signature},
};

use super::entry::{AnyDecompressor, Decompressor};

/// Something [StreamFsm] produced from its input.
///
/// For every entry, a [StreamItem::Header] comes first, then any number of
/// [StreamItem::Data] items, then exactly one [StreamItem::EntryEnd].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// The local header of the entry whose data follows, name and extra
    /// field included.
    Header(LocalFileHeaderRecord),

    /// A chunk of decompressed data for the current entry. Never empty.
    ///
    /// How an entry's data is split into items depends on how the input
    /// was chunked, their concatenation doesn't.
    Data(Vec<u8>),

    /// The current entry is over, and its CRC-32 has been computed.
    EntryEnd,
}

/// What [StreamFsm] is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The fixed-size part of a local file header
    AwaitingLocalHeader,

    /// Whatever comes after an entry's data
    AwaitingNextHeader,

    /// The file name and extra field of the current local file header
    AwaitingNameAndExtra,

    /// Compressed data of the current entry
    AwaitingFileData,

    /// No more entries: further input is ignored
    Done,

    /// An error was returned, further calls return [Error::Poisoned]
    Failed,
}

/// Limits for [StreamFsm].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsmOptions {
    /// Largest file name + extra field length accepted in a local header.
    ///
    /// Those bytes are buffered before anything about the entry is emitted,
    /// so this bounds how much memory a hostile header can make us hold.
    /// Defaults to the largest value the format can express.
    pub max_variable_header_len: usize,
}

impl Default for FsmOptions {
    fn default() -> Self {
        Self {
            max_variable_header_len: 2 * u16::MAX as usize,
        }
    }
}

#[derive(Default)]
enum State {
    ReadLocalHeader,

    ReadNextHeader,

    ReadNameAndExtra {
        /// The local file header, without its name and extra field yet
        header: LocalFileHeaderRecord,

        /// The decompression method we're going to use
        decompressor: AnyDecompressor,
    },

    ReadData {
        /// The local file header for this entry
        header: LocalFileHeaderRecord,

        /// Amount of bytes we've fed to the decompressor
        compressed_bytes: u64,

        /// Amount of bytes the decompressor has produced
        uncompressed_bytes: u64,

        /// CRC32 hash of the decompressed data
        hasher: crc32fast::Hasher,

        /// The decompression method we're using
        decompressor: AnyDecompressor,
    },

    Done,

    Failed,

    #[default]
    Transition,
}

/// A state machine that reads a zip archive front to back, from chunks of
/// any size.
///
/// The loop is as follows:
///
///   * Call [Self::process] with the next chunk of input, and consume the
///     [StreamItem]s it appended to `out`.
///   * Once the input is exhausted, call [Self::finish].
///
/// Bytes that aren't enough to make progress (a local header cut in two,
/// say) are kept until the next call, so chunks don't have to line up with
/// anything. Entry data is never buffered: it's decompressed as it arrives.
///
/// Any error is fatal: after one, the state machine is poisoned.
pub struct StreamFsm {
    state: State,

    /// Input carried over from earlier calls, that wasn't enough for the
    /// current stage
    pending: Vec<u8>,

    options: FsmOptions,
}

impl Default for StreamFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFsm {
    /// Create a state machine that expects the start of a zip archive.
    pub fn new() -> Self {
        Self::with_options(Default::default())
    }

    /// Create a state machine with custom limits.
    pub fn with_options(options: FsmOptions) -> Self {
        Self {
            state: State::ReadLocalHeader,
            pending: Vec::new(),
            options,
        }
    }

    /// What the state machine is currently waiting for
    pub fn stage(&self) -> Stage {
        match self.state {
            State::ReadLocalHeader => Stage::AwaitingLocalHeader,
            State::ReadNextHeader => Stage::AwaitingNextHeader,
            State::ReadNameAndExtra { .. } => Stage::AwaitingNameAndExtra,
            State::ReadData { .. } => Stage::AwaitingFileData,
            State::Done => Stage::Done,
            State::Failed => Stage::Failed,
            State::Transition => unreachable!("the state machine should never be in the transition state"),
        }
    }

    /// Returns true once there are no more entries to read
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Number of bytes carried over, waiting for more input
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Minimum number of bytes the current stage needs to make progress
    fn wanted_len(&self) -> usize {
        match &self.state {
            State::ReadLocalHeader | State::ReadNextHeader => LocalFileHeaderRecord::FIXED_LEN,
            State::ReadNameAndExtra { header, .. } => header.variable_len(),
            _ => 0,
        }
    }

    /// Feed the next chunk of the archive, appending whatever that produced
    /// to `out`.
    ///
    /// Zero-length chunks are fine, and do nothing.
    pub fn process(&mut self, chunk: &[u8], out: &mut Vec<StreamItem>) -> Result<(), Error> {
        if matches!(self.state, State::Failed) {
            return Err(Error::Poisoned);
        }

        let res = self.process_chunk(chunk, out);
        if res.is_err() {
            self.poison();
        }
        res
    }

    /// Signal that there is no more input.
    ///
    /// This succeeds if the input stopped somewhere an archive may end: no
    /// entry at all, right after an entry's data, or at a record that ends
    /// the entries. Anywhere else, the archive was truncated.
    pub fn finish(&mut self) -> Result<(), Error> {
        if matches!(self.state, State::Failed) {
            return Err(Error::Poisoned);
        }

        let res = self.finish_input();
        match &res {
            Ok(()) => {
                self.state = State::Done;
                self.pending = Vec::new();
            }
            Err(_) => self.poison(),
        }
        res
    }

    fn poison(&mut self) {
        self.state = State::Failed;
        self.pending = Vec::new();
    }

    fn process_chunk(&mut self, mut chunk: &[u8], out: &mut Vec<StreamItem>) -> Result<(), Error> {
        loop {
            let wanted = self.wanted_len();
            let stage = self.stage();
            trace!(
                ?stage,
                wanted,
                pending = self.pending.len(),
                chunk = chunk.len(),
                "process"
            );

            if self.pending.is_empty() {
                if chunk.len() < wanted {
                    trace!("not enough data for {:?}, keeping {} bytes", stage, chunk.len());
                    self.pending.extend_from_slice(chunk);
                    return Ok(());
                }

                let consumed = self.step(chunk, out)?;
                chunk = &chunk[consumed..];
                if consumed == 0 && self.stage() == stage {
                    return Ok(());
                }
            } else {
                // top up what we already have, just enough for this stage
                let missing = wanted.saturating_sub(self.pending.len());
                let (head, tail) = chunk.split_at(cmp::min(missing, chunk.len()));
                self.pending.extend_from_slice(head);
                chunk = tail;
                if self.pending.len() < wanted {
                    trace!("still not enough data for {:?}, keeping {} bytes", stage, self.pending.len());
                    return Ok(());
                }

                let mut pending = std::mem::take(&mut self.pending);
                let consumed = self.step(&pending, out)?;
                pending.drain(..consumed);
                self.pending = pending;
                if consumed == 0 && self.stage() == stage {
                    self.pending.extend_from_slice(chunk);
                    return Ok(());
                }
            }
        }
    }

    /// Run the current stage against `buf`, which holds at least
    /// [Self::wanted_len] bytes. Returns how many bytes of `buf` were
    /// consumed.
    fn step(&mut self, buf: &[u8], out: &mut Vec<StreamItem>) -> Result<usize, Error> {
        use State as S;
        match &mut self.state {
            S::ReadLocalHeader => {
                if Signature::peek(buf) != Some(Signature::LocalFileHeader) {
                    // not an error: that's where the entries end
                    debug!("no local file header signature, done reading entries");
                    self.state = S::Done;
                    return Ok(0);
                }

                let mut input = Partial::new(buf);
                let header = match LocalFileHeaderRecord::parser.parse_next(&mut input) {
                    Ok(header) => header,
                    Err(_e) => return Err(FormatError::InvalidLocalHeader.into()),
                };
                let consumed = input.as_bytes().offset_from(&buf);
                debug!(
                    method = ?header.method,
                    flags = header.flags,
                    compressed_size = header.compressed_size,
                    uncompressed_size = header.uncompressed_size,
                    "parsed local file header"
                );

                if header.has_data_descriptor() {
                    return Err(UnsupportedError::DataDescriptor.into());
                }
                if header.has_zip64_sizes() {
                    return Err(UnsupportedError::Zip64.into());
                }

                let len = header.variable_len();
                let max = self.options.max_variable_header_len;
                if len > max {
                    return Err(FormatError::VariableHeaderTooLarge { len, max }.into());
                }

                let decompressor = AnyDecompressor::new(header.method)?;
                self.state = S::ReadNameAndExtra {
                    header,
                    decompressor,
                };
                Ok(consumed)
            }
            S::ReadNextHeader => match Signature::find_in_window(buf) {
                None => Err(FormatError::SignatureNotFound.into()),
                Some(Located {
                    offset,
                    inner: Signature::LocalFileHeader,
                }) => {
                    trace!(offset, "found next local file header");
                    self.state = S::ReadLocalHeader;
                    Ok(offset)
                }
                Some(Located { offset, inner }) => {
                    debug!(signature = ?inner, offset, "done reading entries");
                    self.state = S::Done;
                    Ok(buf.len())
                }
            },
            S::ReadNameAndExtra { header, .. } => {
                let mut input = Partial::new(buf);
                if header.parse_name_and_extra(&mut input).is_err() {
                    return Err(FormatError::InvalidLocalHeader.into());
                }
                let consumed = input.as_bytes().offset_from(&buf);
                debug!(name = ?header.name, "starting entry");

                transition!(self.state => (S::ReadNameAndExtra { header, decompressor }) {
                    out.push(StreamItem::Header(header.clone()));
                    S::ReadData {
                        header,
                        compressed_bytes: 0,
                        uncompressed_bytes: 0,
                        hasher: crc32fast::Hasher::new(),
                        decompressor,
                    }
                });
                Ok(consumed)
            }
            S::ReadData {
                header,
                compressed_bytes,
                uncompressed_bytes,
                hasher,
                decompressor,
            } => {
                let remaining = header.compressed_size as u64 - *compressed_bytes;

                // don't feed the decompressor bytes beyond the entry's compressed size
                let in_buf = &buf[..cmp::min(buf.len() as u64, remaining) as usize];
                let is_last = in_buf.len() as u64 == remaining;

                let mut decoded = Vec::new();
                decompressor.decompress(in_buf, &mut decoded)?;
                *compressed_bytes += in_buf.len() as u64;
                if is_last {
                    decompressor.finish(&mut decoded)?;
                }

                hasher.update(&decoded);
                *uncompressed_bytes += decoded.len() as u64;
                trace!(
                    fed = in_buf.len(),
                    decoded = decoded.len(),
                    compressed_bytes = *compressed_bytes,
                    uncompressed_bytes = *uncompressed_bytes,
                    "decompressed"
                );

                if !decoded.is_empty() {
                    out.push(StreamItem::Data(decoded));
                }

                if is_last {
                    self.close_entry(out)?;
                }
                Ok(in_buf.len())
            }
            S::Done => Ok(buf.len()),
            S::Failed => Err(Error::Poisoned),
            S::Transition => {
                unreachable!("the state machine should never be in the transition state")
            }
        }
    }

    /// Called once all of an entry's compressed bytes went through its
    /// decompressor: check the CRC-32 and size, and look for the next entry.
    fn close_entry(&mut self, out: &mut Vec<StreamItem>) -> Result<(), Error> {
        let State::ReadData {
            header,
            uncompressed_bytes,
            hasher,
            ..
        } = std::mem::replace(&mut self.state, State::ReadNextHeader)
        else {
            unreachable!("close_entry is only called while reading data")
        };
        out.push(StreamItem::EntryEnd);

        let crc32 = hasher.finalize();
        if crc32 != header.crc32 {
            return Err(FormatError::WrongChecksum {
                expected: header.crc32,
                actual: crc32,
            }
            .into());
        }

        if uncompressed_bytes != header.uncompressed_size as u64 {
            return Err(FormatError::WrongSize {
                expected: header.uncompressed_size as u64,
                actual: uncompressed_bytes,
            }
            .into());
        }

        debug!(name = ?header.name, crc32, uncompressed_bytes, "entry done");
        Ok(())
    }

    fn finish_input(&mut self) -> Result<(), Error> {
        let stage = self.stage();
        trace!(?stage, pending = self.pending.len(), "finish");

        let truncated = match &self.state {
            State::Done => false,
            State::ReadLocalHeader => {
                // less than a full header: fine, unless it starts like one
                let signature = LocalFileHeaderRecord::SIGNATURE.as_bytes();
                let n = cmp::min(self.pending.len(), signature.len());
                !self.pending.is_empty() && self.pending[..n] == signature[..n]
            }
            State::ReadNextHeader => {
                !self.pending.is_empty()
                    && !matches!(
                        Signature::find_in_window(&self.pending),
                        Some(Located { inner, .. }) if inner.ends_entries()
                    )
            }
            _ => true,
        };

        if truncated {
            return Err(FormatError::UnexpectedEof { stage }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_entry(name: &str, data: &[u8], flags: u16) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"PK\x03\x04");
        v.extend_from_slice(&10u16.to_le_bytes());
        v.extend_from_slice(&flags.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        v.extend_from_slice(&(data.len() as u32).to_le_bytes());
        v.extend_from_slice(&(data.len() as u32).to_le_bytes());
        v.extend_from_slice(&(name.len() as u16).to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        v.extend_from_slice(name.as_bytes());
        v.extend_from_slice(data);
        v
    }

    #[test_log::test]
    fn short_header_is_kept_verbatim() {
        let entry = stored_entry("a.txt", b"hi", 0);
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();

        fsm.process(&entry[..29], &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(fsm.pending_len(), 29);
        assert_eq!(fsm.stage(), Stage::AwaitingLocalHeader);

        fsm.process(&entry[29..30], &mut out).unwrap();
        assert_eq!(fsm.pending_len(), 0);
        assert_eq!(fsm.stage(), Stage::AwaitingNameAndExtra);
    }

    #[test_log::test]
    fn pending_is_topped_up_not_merged() {
        let entry = stored_entry("a.txt", b"hello", 0);
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();

        fsm.process(&entry[..10], &mut out).unwrap();
        // the rest of the header, the name, and the data in one go
        fsm.process(&entry[10..], &mut out).unwrap();
        assert_eq!(fsm.pending_len(), 0);
        assert_eq!(fsm.stage(), Stage::AwaitingNextHeader);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], StreamItem::Data(b"hello".to_vec()));
        assert_eq!(out[2], StreamItem::EntryEnd);
    }

    #[test_log::test]
    fn not_a_zip_is_done() {
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        fsm.process(&[0u8; 64], &mut out).unwrap();
        assert!(fsm.is_done());
        assert!(out.is_empty());
        fsm.process(b"more garbage", &mut out).unwrap();
        assert!(out.is_empty());
        fsm.finish().unwrap();
    }

    #[test_log::test]
    fn poisoned_after_error() {
        let entry = stored_entry("a.txt", b"hi", 0b1000);
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        assert!(matches!(
            fsm.process(&entry, &mut out),
            Err(Error::Unsupported(UnsupportedError::DataDescriptor))
        ));
        assert!(out.is_empty());
        assert_eq!(fsm.stage(), Stage::Failed);
        assert!(matches!(fsm.process(&entry, &mut out), Err(Error::Poisoned)));
        assert!(matches!(fsm.finish(), Err(Error::Poisoned)));
    }

    #[test_log::test]
    fn zip64_placeholder_size() {
        let mut entry = stored_entry("a.txt", b"hi", 0);
        entry[18..22].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        assert!(matches!(
            fsm.process(&entry, &mut out),
            Err(Error::Unsupported(UnsupportedError::Zip64))
        ));
        assert!(out.is_empty());
    }

    #[test_log::test]
    fn variable_header_limit() {
        let entry = stored_entry("a-rather-long-name.txt", b"hi", 0);
        let mut fsm = StreamFsm::with_options(FsmOptions {
            max_variable_header_len: 8,
        });
        let mut out = Vec::new();
        assert!(matches!(
            fsm.process(&entry, &mut out),
            Err(Error::Format(FormatError::VariableHeaderTooLarge { len: 22, max: 8 }))
        ));
    }

    #[test_log::test]
    fn finish_mid_entry_is_truncated() {
        let entry = stored_entry("a.txt", b"hello", 0);
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        fsm.process(&entry[..entry.len() - 1], &mut out).unwrap();
        assert!(matches!(
            fsm.finish(),
            Err(Error::Format(FormatError::UnexpectedEof {
                stage: Stage::AwaitingFileData
            }))
        ));
    }

    #[test_log::test]
    fn finish_after_last_entry() {
        let entry = stored_entry("a.txt", b"hello", 0);
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        fsm.process(&entry, &mut out).unwrap();
        assert_eq!(fsm.stage(), Stage::AwaitingNextHeader);
        fsm.finish().unwrap();
        assert!(fsm.is_done());
    }

    #[test_log::test]
    fn finish_with_truncated_signature() {
        let mut fsm = StreamFsm::new();
        let mut out = Vec::new();
        fsm.process(b"PK\x03", &mut out).unwrap();
        assert!(fsm.finish().is_err());

        let mut fsm = StreamFsm::new();
        fsm.process(b"hello", &mut out).unwrap();
        fsm.finish().unwrap();
    }
}
