//! Serialize [`UtcDateTime`] as a Unix timestamp (seconds), matching how the
//! catalog database stores it.

use serde::Serializer;
use time::UtcDateTime;

pub(crate) fn serialize<S: Serializer>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.unix_timestamp())
}
