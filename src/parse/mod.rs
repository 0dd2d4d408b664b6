//! Parsers and types for the records a front-to-back zip reader encounters.
//!
//! Contains winnow parsers for local file headers, plus the record
//! signatures used to tell where one entry ends and what comes next.
//!
//! All parsers here are based off of the PKWARE appnote.txt.

mod method;
pub use method::*;

mod version;
pub use version::*;

mod date_time;
pub use date_time::*;

mod local_headers;
pub use local_headers::*;

mod signature;
pub use signature::*;

mod raw;
pub use raw::*;
