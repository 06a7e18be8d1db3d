use serde::{Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use std::time::Duration;

/// `serde_with` adapter reading and writing durations as human strings (`"30s"`, `"1m 30s"`).
///
/// ```
/// use serde::Deserialize;
/// use serde_with::serde_as;
/// use stampede_core::HumanDuration;
/// use std::time::Duration;
///
/// #[serde_as]
/// #[derive(Deserialize)]
/// struct Wait {
///     #[serde_as(as = "HumanDuration")]
///     wait: Duration,
/// }
///
/// let wait: Wait = serde_json::from_str(r#"{"wait": "1m 30s"}"#).unwrap();
/// assert_eq!(wait.wait, Duration::from_secs(90));
/// ```
pub struct HumanDuration;

impl SerializeAs<Duration> for HumanDuration {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&humantime::format_duration(*source))
    }
}

impl<'de> DeserializeAs<'de, Duration> for HumanDuration {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
