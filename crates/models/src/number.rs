use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const SCALE: u32 = 100;

/// Position of a chapter within its series.
///
/// Chapter numbers are rational ("4.5" sits between chapters 4 and 5) with at
/// most two decimal places. Internally the number is kept as a count of
/// hundredths, so `4.5` and `4.50` are the same value and comparisons are exact.
///
/// The [`Display`] implementation always renders two decimals; that rendering
/// is part of the on-disk layout (`chapter_4.50`) and must not change.
///
/// ```
/// use tankobon_models::ChapterNumber;
///
/// let number: ChapterNumber = "4.5".parse().unwrap();
/// assert_eq!(number.to_string(), "4.50");
/// assert_eq!(number, ChapterNumber::try_from(4.5).unwrap());
/// assert!("0".parse::<ChapterNumber>().is_err());
/// assert!("1.005".parse::<ChapterNumber>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChapterNumber(u32);

impl ChapterNumber {
    /// Construct from a whole chapter number (`5` is chapter `5.00`).
    pub fn whole(number: u32) -> Result<Self, Error> {
        let hundredths = number.checked_mul(SCALE).ok_or_else(|| {
            exn::Exn::from(ErrorKind::OutOfRange {
                field: "chapter number",
                value: number.to_string(),
            })
        })?;
        Self::from_hundredths(hundredths)
    }

    /// Construct from a count of hundredths (`450` is chapter `4.50`).
    pub fn from_hundredths(hundredths: u32) -> Result<Self, Error> {
        if hundredths == 0 {
            exn::bail!(ErrorKind::OutOfRange {
                field: "chapter number",
                value: "0".to_string()
            });
        }
        Ok(Self(hundredths))
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / f64::from(SCALE)
    }
}

impl FromStr for ChapterNumber {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || {
            exn::Exn::from(ErrorKind::ParseError {
                field: "chapter number",
                value: s.to_string(),
            })
        };
        let trimmed = s.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_error());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_error());
        }
        let whole: u32 = whole.parse().map_err(|_| parse_error())?;
        // "4.5" means fifty hundredths, not five.
        let fraction: u32 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u32>().map_err(|_| parse_error())? * 10,
            _ => fraction.parse::<u32>().map_err(|_| parse_error())?,
        };
        let hundredths = whole.checked_mul(SCALE).and_then(|w| w.checked_add(fraction)).ok_or_else(parse_error)?;
        Self::from_hundredths(hundredths)
    }
}

impl TryFrom<f64> for ChapterNumber {
    type Error = Error;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let out_of_range = || {
            exn::Exn::from(ErrorKind::OutOfRange {
                field: "chapter number",
                value: value.to_string(),
            })
        };
        if !value.is_finite() || value <= 0.0 || value > f64::from(u32::MAX / SCALE) {
            return Err(out_of_range());
        }
        let scaled = value * f64::from(SCALE);
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            exn::bail!(ErrorKind::ParseError {
                field: "chapter number",
                value: value.to_string()
            });
        }
        // Range was checked above, the cast cannot truncate.
        Self::from_hundredths(rounded as u32)
    }
}

impl From<ChapterNumber> for f64 {
    fn from(number: ChapterNumber) -> Self {
        number.as_f64()
    }
}

impl Display for ChapterNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{:02}", self.0 / SCALE, self.0 % SCALE)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ChapterNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ChapterNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        ChapterNumber::try_from(value).map_err(|e| serde::de::Error::custom(&*e))
    }
}
