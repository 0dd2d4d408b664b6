use tracing::trace;

use crate::{error::Error, parse::Method};

use super::Decompressor;

pub(crate) struct Bzip2Dec {
    inner: bzip2::Decompress,
    scratch: Vec<u8>,
    eof: bool,
}

impl Default for Bzip2Dec {
    fn default() -> Self {
        // don't use the 'small' alternative decompression algorithm
        let small = false;
        Self {
            inner: bzip2::Decompress::new(small),
            scratch: vec![0u8; 64 * 1024],
            eof: false,
        }
    }
}

impl Decompressor for Bzip2Dec {
    fn decompress(&mut self, mut in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        trace!(
            in_buf_len = in_buf.len(),
            total_in = self.inner.total_in(),
            total_out = self.inner.total_out(),
            "Bzip2Dec::decompress",
        );

        while !self.eof {
            let before_in = self.inner.total_in();
            let before_out = self.inner.total_out();

            match self.inner.decompress(in_buf, &mut self.scratch) {
                Ok(status) => {
                    trace!("status: {:?}", status);
                    if status == bzip2::Status::StreamEnd {
                        self.eof = true;
                    }
                }
                Err(e) => {
                    return Err(Error::Decompression {
                        method: Method::Bzip2,
                        msg: e.to_string(),
                    })
                }
            };

            let bytes_read = (self.inner.total_in() - before_in) as usize;
            let bytes_written = (self.inner.total_out() - before_out) as usize;
            in_buf = &in_buf[bytes_read..];
            out.extend_from_slice(&self.scratch[..bytes_written]);

            if bytes_read == 0 && bytes_written == 0 {
                break;
            }
            if in_buf.is_empty() && bytes_written < self.scratch.len() {
                // everything was fed, and the output wasn't cut short
                break;
            }
        }
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<(), Error> {
        if !self.eof {
            return Err(Error::Decompression {
                method: Method::Bzip2,
                msg: "end of bzip2 stream not found, the entry is likely truncated".to_string(),
            });
        }
        Ok(())
    }
}
