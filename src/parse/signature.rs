use winnow::{binary::le_u32, PResult, Parser, Partial};

/// The 4-byte signature that starts a zip record.
///
/// All of them share the `PK` prefix (Phil Katz's initials), followed by two
/// bytes that identify the record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// 4.3.7 Local file header: an entry follows
    LocalFileHeader,

    /// 4.3.11 Archive extra data record, before the central directory
    ArchiveExtraData,

    /// 4.3.12 Central directory header
    CentralDirectoryHeader,

    /// 4.3.14 Zip64 end of central directory record
    EndOfCentralDirectory64,

    /// 4.3.16 End of central directory record
    EndOfCentralDirectory,
}

impl Signature {
    const LOCAL_FILE_HEADER: u32 = 0x04034b50;
    const ARCHIVE_EXTRA_DATA: u32 = 0x08064b50;
    const CENTRAL_DIRECTORY_HEADER: u32 = 0x02014b50;
    const END_OF_CENTRAL_DIRECTORY_64: u32 = 0x06064b50;
    const END_OF_CENTRAL_DIRECTORY: u32 = 0x06054b50;

    /// The prefix shared by every signature
    pub const PREFIX: &'static [u8; 2] = b"PK";

    /// How far after an entry's data we look for the next signature.
    ///
    /// Some writers pad between records, but never by much.
    pub const LOOKAHEAD: usize = 28;

    /// Map a little-endian u32 to a known signature
    pub fn from_u32(u: u32) -> Option<Self> {
        match u {
            Self::LOCAL_FILE_HEADER => Some(Self::LocalFileHeader),
            Self::ARCHIVE_EXTRA_DATA => Some(Self::ArchiveExtraData),
            Self::CENTRAL_DIRECTORY_HEADER => Some(Self::CentralDirectoryHeader),
            Self::END_OF_CENTRAL_DIRECTORY_64 => Some(Self::EndOfCentralDirectory64),
            Self::END_OF_CENTRAL_DIRECTORY => Some(Self::EndOfCentralDirectory),
            _ => None,
        }
    }

    /// Whether this record marks the end of the file entries
    pub fn ends_entries(&self) -> bool {
        !matches!(self, Self::LocalFileHeader)
    }

    /// Parser for a known signature. Unknown values backtrack.
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        le_u32.verify_map(Self::from_u32).parse_next(i)
    }

    /// Read the signature at the very start of `b`, if there's a known one.
    pub fn peek(b: &[u8]) -> Option<Self> {
        let mut input = Partial::new(b);
        Self::parser(&mut input).ok()
    }

    /// Look for the next record in the first [Self::LOOKAHEAD] bytes of `b`.
    ///
    /// Every occurrence of [Self::PREFIX] is tried in order, the first one
    /// followed by a known signature wins. A signature that starts inside the
    /// window but is cut off by the end of `b` doesn't count.
    pub fn find_in_window(b: &[u8]) -> Option<Located<Self>> {
        let window = &b[..b.len().min(Self::LOOKAHEAD)];
        for offset in 0..window.len().saturating_sub(1) {
            if &window[offset..offset + 2] != Self::PREFIX {
                continue;
            }

            if let Some(inner) = Self::peek(&b[offset..]) {
                return Some(Located { offset, inner });
            }
        }
        None
    }
}

/// A value, along with the offset at which it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located<T> {
    /// Offset from the start of the buffer that was searched
    pub offset: usize,

    /// The structure itself
    pub inner: T,
}
