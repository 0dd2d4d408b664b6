use crate::{error::Error, parse::Method};

mod store_dec;

#[cfg(feature = "deflate")]
mod deflate_dec;

#[cfg(feature = "bzip2")]
mod bzip2_dec;

#[cfg(feature = "zstd")]
mod zstd_dec;

/// An incremental decompressor for a single entry.
///
/// Compressed bytes are handed over in whatever slices they arrived in, and
/// the total compressed size is never communicated up front.
pub trait Decompressor {
    /// Decompress `in_buf`, appending whatever output is ready to `out`.
    ///
    /// `in_buf` may have any length, including zero. All of it is considered
    /// consumed.
    fn decompress(&mut self, in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error>;

    /// Called exactly once, after the entry's last compressed byte went
    /// through [Self::decompress]: flush any buffered output to `out`.
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), Error>;
}

/// One decompressor per supported [Method], picked when an entry's local
/// header is parsed.
pub struct AnyDecompressor {
    inner: Inner,
}

enum Inner {
    Store(store_dec::StoreDec),
    #[cfg(feature = "deflate")]
    Deflate(Box<deflate_dec::DeflateDec>),
    #[cfg(feature = "bzip2")]
    Bzip2(Box<bzip2_dec::Bzip2Dec>),
    #[cfg(feature = "zstd")]
    Zstd(zstd_dec::ZstdDec),
}

impl AnyDecompressor {
    /// Select a decompressor for the given method.
    ///
    /// Fails with [UnsupportedError::MethodNotSupported](crate::error::UnsupportedError::MethodNotSupported)
    /// for methods this crate has no decompressor for, and with
    /// [UnsupportedError::MethodNotEnabled](crate::error::UnsupportedError::MethodNotEnabled)
    /// for methods whose cargo feature is disabled.
    pub fn new(method: Method) -> Result<Self, Error> {
        let inner = match method {
            Method::Store => Inner::Store(Default::default()),

            #[cfg(feature = "deflate")]
            Method::Deflate => Inner::Deflate(Default::default()),
            #[cfg(not(feature = "deflate"))]
            Method::Deflate => return Err(Error::method_not_enabled(method)),

            #[cfg(feature = "bzip2")]
            Method::Bzip2 => Inner::Bzip2(Default::default()),
            #[cfg(not(feature = "bzip2"))]
            Method::Bzip2 => return Err(Error::method_not_enabled(method)),

            #[cfg(feature = "zstd")]
            Method::Zstd => Inner::Zstd(zstd_dec::ZstdDec::new()?),
            #[cfg(not(feature = "zstd"))]
            Method::Zstd => return Err(Error::method_not_enabled(method)),

            _ => return Err(Error::method_not_supported(method)),
        };
        Ok(Self { inner })
    }

    /// The method this decompressor handles
    pub fn method(&self) -> Method {
        match &self.inner {
            Inner::Store(_) => Method::Store,
            #[cfg(feature = "deflate")]
            Inner::Deflate(_) => Method::Deflate,
            #[cfg(feature = "bzip2")]
            Inner::Bzip2(_) => Method::Bzip2,
            #[cfg(feature = "zstd")]
            Inner::Zstd(_) => Method::Zstd,
        }
    }
}

impl Decompressor for AnyDecompressor {
    #[inline]
    fn decompress(&mut self, in_buf: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        // forward to the appropriate decompressor
        match &mut self.inner {
            Inner::Store(dec) => dec.decompress(in_buf, out),
            #[cfg(feature = "deflate")]
            Inner::Deflate(dec) => dec.decompress(in_buf, out),
            #[cfg(feature = "bzip2")]
            Inner::Bzip2(dec) => dec.decompress(in_buf, out),
            #[cfg(feature = "zstd")]
            Inner::Zstd(dec) => dec.decompress(in_buf, out),
        }
    }

    #[inline]
    fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), Error> {
        match &mut self.inner {
            Inner::Store(dec) => dec.finish(out),
            #[cfg(feature = "deflate")]
            Inner::Deflate(dec) => dec.finish(out),
            #[cfg(feature = "bzip2")]
            Inner::Bzip2(dec) => dec.finish(out),
            #[cfg(feature = "zstd")]
            Inner::Zstd(dec) => dec.finish(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnsupportedError;

    #[test]
    fn store_is_identity() {
        let mut dec = AnyDecompressor::new(Method::Store).unwrap();
        let mut out = Vec::new();
        dec.decompress(b"hello ", &mut out).unwrap();
        dec.decompress(b"", &mut out).unwrap();
        dec.decompress(b"world", &mut out).unwrap();
        dec.finish(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(dec.method(), Method::Store);
    }

    #[test]
    fn unknown_method() {
        let res = AnyDecompressor::new(Method::Unrecognized(1337));
        assert!(matches!(
            res,
            Err(Error::Unsupported(UnsupportedError::MethodNotSupported(
                Method::Unrecognized(1337)
            )))
        ));
    }

    #[test]
    fn lzma_not_supported() {
        assert!(matches!(
            AnyDecompressor::new(Method::Lzma),
            Err(Error::Unsupported(UnsupportedError::MethodNotSupported(
                Method::Lzma
            )))
        ));
    }
}
