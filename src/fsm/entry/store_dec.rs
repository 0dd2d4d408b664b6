use crate::error::Error;

use super::Decompressor;

#[derive(Default)]
pub(crate) struct StoreDec;

impl Decompressor for StoreDec {
    fn decompress(&mut self, in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        out.extend_from_slice(in_buf);
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }
}
