use chrono::{offset::Utc, DateTime};
use tracing::trace;
use winnow::{
    binary::{le_u16, le_u32},
    token::tag,
    PResult, Parser, Partial,
};

use crate::{
    encoding::Encoding,
    error::Error,
    parse::{Method, MsdosTimestamp, Version, ZipBytes, ZipString},
};

#[derive(Debug, Clone, PartialEq, Eq)]
/// 4.3.7 Local file header
///
/// Parsed in two steps: [Self::parser] reads the fixed-size part, which
/// declares how long the file name and extra field are, and
/// [Self::parse_name_and_extra] fills in [Self::name] and [Self::extra]
/// once that many bytes are available.
pub struct LocalFileHeaderRecord {
    /// version needed to extract
    pub reader_version: Version,

    /// general purpose bit flag
    pub flags: u16,

    /// compression method
    pub method: Method,

    /// last mod file datetime
    pub modified: MsdosTimestamp,

    /// crc-32
    pub crc32: u32,

    /// compressed size
    pub compressed_size: u32,

    /// uncompressed size
    pub uncompressed_size: u32,

    /// file name length
    pub name_len: u16,

    /// extra field length
    pub extra_len: u16,

    /// file name, empty until the variable-size part is parsed
    pub name: ZipString,

    /// extra field, empty until the variable-size part is parsed
    pub extra: ZipBytes,
}

impl LocalFileHeaderRecord {
    /// The signature for a local file header
    pub const SIGNATURE: &'static str = "PK\x03\x04";

    /// Size of the fixed part of a local file header, signature included
    pub const FIXED_LEN: usize = 30;

    /// Parser for the fixed-size part of the local file header
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = tag(Self::SIGNATURE).parse_next(i)?;

        let reader_version = Version::parser.parse_next(i)?;
        let flags = le_u16.parse_next(i)?;
        let method = Method::parser.parse_next(i)?;
        let modified = MsdosTimestamp::parser.parse_next(i)?;
        let crc32 = le_u32.parse_next(i)?;
        let compressed_size = le_u32.parse_next(i)?;
        let uncompressed_size = le_u32.parse_next(i)?;

        let name_len = le_u16.parse_next(i)?;
        let extra_len = le_u16.parse_next(i)?;

        Ok(Self {
            reader_version,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len,
            extra_len,
            name: Default::default(),
            extra: Default::default(),
        })
    }

    /// Parse the variable-size part of the local file header: the file name,
    /// then the extra field, with the lengths declared in the fixed part.
    /// Their contents are not validated.
    pub fn parse_name_and_extra(&mut self, i: &mut Partial<&'_ [u8]>) -> PResult<()> {
        let name = ZipString::parser(self.name_len).parse_next(i)?;
        let extra = ZipBytes::parser(self.extra_len).parse_next(i)?;
        trace!(?name, ?extra, "parsed local header name and extra field");
        self.name = name;
        self.extra = extra;
        Ok(())
    }

    /// Number of bytes following the fixed-size part: name + extra field.
    pub fn variable_len(&self) -> usize {
        self.name_len as usize + self.extra_len as usize
    }

    /// Check for the presence of the bit flag that indicates a data descriptor
    /// is present after the file data.
    pub fn has_data_descriptor(&self) -> bool {
        // 4.3.9.1 This descriptor MUST exist if bit 3 of the general
        // purpose bit flag is set (see below).
        self.flags & 0b1000 != 0
    }

    /// Whether either size is the placeholder that defers to a zip64 extra
    /// field.
    pub fn has_zip64_sizes(&self) -> bool {
        self.compressed_size == u32::MAX || self.uncompressed_size == u32::MAX
    }

    /// Check for the language encoding flag (EFS, bit 11), which means the
    /// name is UTF-8.
    pub fn is_utf8(&self) -> bool {
        self.flags & 0x800 != 0
    }

    /// The encoding the file name is most likely in.
    pub fn encoding(&self) -> Encoding {
        Encoding::detect(&self.name.0, self.is_utf8())
    }

    /// Decode the file name into a string.
    ///
    /// This should be a relative path, separated by `/`, but there are zip
    /// files in the wild with all sorts of evil variants, so be conservative
    /// in what you do with it.
    pub fn decode_name(&self) -> Result<String, Error> {
        Ok(self.encoding().decode(&self.name.0)?)
    }

    /// The "last modified" timestamp, if it's a valid MS-DOS date.
    pub fn modified_datetime(&self) -> Option<DateTime<Utc>> {
        self.modified.to_datetime()
    }
}
