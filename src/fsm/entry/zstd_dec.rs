use tracing::trace;
use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};

use crate::{error::Error, parse::Method};

use super::Decompressor;

pub(crate) struct ZstdDec {
    inner: Decoder<'static>,

    /// Output is decompressed here, then copied out
    scratch: Vec<u8>,

    /// Set once zstd reports the end of the frame. Anything fed after that
    /// is ignored.
    frame_done: bool,
}

impl ZstdDec {
    const SCRATCH_LENGTH: usize = 64 * 1024;

    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            inner: Decoder::new().map_err(dec_err)?,
            scratch: vec![0u8; Self::SCRATCH_LENGTH],
            frame_done: false,
        })
    }
}

impl Decompressor for ZstdDec {
    fn decompress(&mut self, mut in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        trace!(
            in_buf_len = in_buf.len(),
            frame_done = self.frame_done,
            "ZstdDec::decompress"
        );

        while !self.frame_done {
            let mut input = InBuffer::around(in_buf);
            let (hint, bytes_read, bytes_written) = {
                let mut output = OutBuffer::around(&mut self.scratch[..]);
                let hint = self.inner.run(&mut input, &mut output).map_err(dec_err)?;
                (hint, input.pos(), output.pos())
            };
            in_buf = &in_buf[bytes_read..];
            out.extend_from_slice(&self.scratch[..bytes_written]);
            trace!(hint, bytes_read, bytes_written, "unzstd'd");

            if hint == 0 {
                // the frame is over, and fully flushed
                self.frame_done = true;
            } else if bytes_read == 0 && bytes_written == 0 {
                break;
            } else if in_buf.is_empty() && bytes_written < self.scratch.len() {
                // everything was fed, and the output wasn't cut short
                break;
            }
        }

        if self.frame_done && !in_buf.is_empty() {
            trace!("ignoring {} bytes after end of zstd frame", in_buf.len());
        }
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<(), Error> {
        trace!(frame_done = self.frame_done, "ZstdDec::finish");
        if !self.frame_done {
            return Err(dec_err("incomplete zstd frame"));
        }
        Ok(())
    }
}

fn dec_err(e: impl std::fmt::Display) -> Error {
    Error::Decompression {
        method: Method::Zstd,
        msg: e.to_string(),
    }
}
