use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serializer};

/// Parses a time of day written as `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

pub fn format_time_of_day(time: &NaiveTime) -> String {
    if time.second() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

fn parse_for_serde<E: serde::de::Error>(raw: &str) -> Result<NaiveTime, E> {
    parse_time_of_day(raw)
        .map_err(|_| E::custom(format!("invalid time {raw:?}, expected HH:MM or HH:MM:SS")))
}

/// `Option<NaiveTime>` as `"HH:MM"` / `null`.
pub mod optional {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_some(&format_time_of_day(t)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => parse_for_serde(&raw).map(Some),
            None => Ok(None),
        }
    }
}

/// A required `NaiveTime` as `"HH:MM"`.
pub mod required {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_for_serde(&raw)
    }
}

/// Three-state patch field: missing (`None`), explicit `null` (`Some(None)`)
/// or a value. Pair with `#[serde(default)]`.
pub mod patch {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Option<NaiveTime>>, D::Error> {
        optional::deserialize(d).map(Some)
    }
}

/// Same three-state shape for any deserializable value.
pub fn double_option<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}
