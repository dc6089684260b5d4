use serde::{Deserialize, Deserializer};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Renders a countdown as `HH:MM:SS`; hours are not wrapped at 24.
pub(crate) fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Parses either an RFC 3339 timestamp or a zone-less `YYYY-MM-DDTHH:MM:SS[.f]`
/// one, which is read as UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }
    let with_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let without_fraction = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(value, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(value, without_fraction))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Serde adapter for optional server timestamps; unparseable values become `None`.
pub(crate) fn deserialize_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
