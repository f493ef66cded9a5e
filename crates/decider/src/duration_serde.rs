//! Serde support for `Duration` as whole seconds
//!
//! The coordination service encodes timeouts as decimal strings (`"30"`).
//! Serialization follows that format; deserialization also accepts plain
//! integers.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            Seconds::Number(secs) => Ok(Duration::from_secs(secs)),
            Seconds::Text(text) => text
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("invalid duration in seconds: {text:?}"))),
        }
    }
}

/// Whole seconds, sub-second remainders rounded up
pub(crate) fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&whole_seconds(*duration).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Seconds::deserialize(deserializer)?.into_duration::<D::Error>()
}

pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::Seconds;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Seconds>::deserialize(deserializer)?
            .map(|secs| secs.into_duration::<D::Error>())
            .transpose()
    }
}
