use miniz_oxide::inflate::{
    core::{
        decompress,
        inflate_flags::{TINFL_FLAG_HAS_MORE_INPUT, TINFL_FLAG_IGNORE_ADLER32},
        DecompressorOxide,
    },
    TINFLStatus,
};
use tracing::trace;

use crate::{error::Error, parse::Method};

use super::Decompressor;

pub(crate) struct DeflateDec {
    /// 64 KiB circular internal buffer. From miniz_oxide docs:
    ///
    /// > The decompression function normally needs access to 32KiB of the
    /// > previously decompressed data (or to the beginning of the decompressed
    /// > data if less than 32KiB has been decompressed.)
    internal_buffer: Vec<u8>,

    /// The position in the internal buffer where we should start writing the
    /// next decompressed data. Note that the buffer is circular, so we need to
    /// wrap around when we reach the end.
    out_pos: usize,

    /// Set once miniz_oxide has seen the final deflate block. Anything fed
    /// after that is ignored.
    done: bool,

    /// The miniz_oxide decompressor state
    state: DecompressorOxide,
}

impl Default for DeflateDec {
    fn default() -> Self {
        Self {
            internal_buffer: vec![0u8; Self::INTERNAL_BUFFER_LENGTH],
            out_pos: 0,
            done: false,
            state: DecompressorOxide::new(),
        }
    }
}

impl Decompressor for DeflateDec {
    fn decompress(&mut self, in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        trace!(
            in_buf_len = in_buf.len(),
            out_pos = self.out_pos,
            done = self.done,
            "DeflateDec::decompress",
        );
        self.run(in_buf, out, true)
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), Error> {
        trace!(out_pos = self.out_pos, done = self.done, "DeflateDec::finish");
        self.run(&[], out, false)
    }
}

impl DeflateDec {
    const INTERNAL_BUFFER_LENGTH: usize = 64 * 1024;

    /// Call miniz_oxide until all of `in_buf` is consumed (or the stream
    /// ends), copying output out of the internal buffer as it's produced.
    fn run(&mut self, mut in_buf: &[u8], out: &mut Vec<u8>, has_more_input: bool) -> Result<(), Error> {
        let mut flags = TINFL_FLAG_IGNORE_ADLER32;
        if has_more_input {
            flags |= TINFL_FLAG_HAS_MORE_INPUT;
        }

        while !self.done {
            let (status, bytes_read, bytes_written) = decompress(
                &mut self.state,
                in_buf,
                &mut self.internal_buffer,
                self.out_pos,
                flags,
            );
            in_buf = &in_buf[bytes_read..];

            // miniz_oxide never writes past the end of the buffer, it asks
            // us to come back with HasMoreOutput instead.
            out.extend_from_slice(&self.internal_buffer[self.out_pos..][..bytes_written]);
            self.out_pos = (self.out_pos + bytes_written) % Self::INTERNAL_BUFFER_LENGTH;
            trace!(?status, bytes_read, bytes_written, "inflated");

            match status {
                TINFLStatus::Done => {
                    self.done = true;
                    if !in_buf.is_empty() {
                        trace!("ignoring {} bytes after end of deflate stream", in_buf.len());
                    }
                }
                TINFLStatus::NeedsMoreInput => {
                    // all input consumed, the rest of the output comes later
                    return Ok(());
                }
                TINFLStatus::HasMoreOutput => {
                    // the internal buffer wrapped around, keep going
                }
                TINFLStatus::FailedCannotMakeProgress => {
                    return Err(dec_err("Failed to make progress: more input data was expected, but the entry's compressed size was reached, so the input stream is likely truncated"));
                }
                TINFLStatus::BadParam => {
                    return Err(dec_err(
                        "The output buffer is an invalid size; consider the flags parameter",
                    ));
                }
                TINFLStatus::Adler32Mismatch => {
                    return Err(dec_err("The decompression went fine, but the adler32 checksum did not match the one provided in the header."));
                }
                TINFLStatus::Failed => {
                    return Err(dec_err("Failed to decompress due to invalid data."));
                }
            }
        }
        Ok(())
    }
}

fn dec_err(msg: &str) -> Error {
    Error::Decompression {
        method: Method::Deflate,
        msg: msg.to_string(),
    }
}
