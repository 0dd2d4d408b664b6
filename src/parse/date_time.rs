use chrono::{
    offset::{LocalResult, TimeZone, Utc},
    DateTime, Timelike,
};
use std::fmt;
use winnow::{binary::le_u16, seq, PResult, Parser, Partial};

/// A timestamp in MS-DOS format
///
/// Represents dates from year 1980 to 2107, with 2 second precision.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct MsdosTimestamp {
    /// Time in 2-second intervals
    pub time: u16,

    /// Date in MS-DOS format, cf. <https://docs.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-dosdatetimetofiletime>
    pub date: u16,
}

impl fmt::Debug for MsdosTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "MsdosTimestamp({})", dt),
            None => write!(f, "MsdosTimestamp(?)"),
        }
    }
}

impl MsdosTimestamp {
    /// Parser for MS-DOS timestamps
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        seq! {Self {
            time: le_u16,
            date: le_u16,
        }}
        .parse_next(i)
    }

    /// Attempts to convert to a chrono UTC date time
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        // see https://docs.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-dosdatetimetofiletime
        let date = match {
            // bits 0-4: day of the month (1-31)
            let d = (self.date & 0b1_1111) as u32;
            // bits 5-8: month (1 = january, 2 = february and so on)
            let m = ((self.date >> 5) & 0b1111) as u32;
            // bits 9-15: year offset from 1980
            let y = ((self.date >> 9) + 1980) as i32;
            Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        } {
            LocalResult::Single(date) => date,
            _ => return None,
        };

        // bits 0-4: second divided by 2
        let s = (self.time & 0b1_1111) as u32 * 2;
        // bits 5-10: minute (0-59)
        let m = (self.time >> 5 & 0b11_1111) as u32;
        // bits 11-15: hour (0-23 on a 24-hour clock)
        let h = (self.time >> 11) as u32;
        date.with_hour(h)?.with_minute(m)?.with_second(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msdos_roundtrip_known_value() {
        // 2019-07-21 13:37:42
        let ts = MsdosTimestamp {
            time: (13 << 11) | (37 << 5) | (42 / 2),
            date: ((2019 - 1980) << 9) | (7 << 5) | 21,
        };
        let expected = Utc.with_ymd_and_hms(2019, 7, 21, 13, 37, 42).unwrap();
        assert_eq!(ts.to_datetime(), Some(expected));
    }

    #[test]
    fn zero_date_is_invalid() {
        let ts = MsdosTimestamp { time: 0, date: 0 };
        assert!(ts.to_datetime().is_none());
    }
}
