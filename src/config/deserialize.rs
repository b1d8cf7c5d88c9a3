// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles callback delays given as milliseconds or humantime strings.

use humantime_serde::re::humantime;
use serde::Deserialize;
use std::time::Duration;

/// Accepts `delay: 500` (milliseconds) as well as `delay: "1s 500ms"`.
pub fn deserialize_delay<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entry: Option<DelayEntry> = Option::deserialize(deserializer)?;
    match entry {
        None => Ok(Duration::ZERO),
        Some(entry) => entry.into_duration().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DelayEntry {
    Millis(u64),
    Human(String),
}

impl DelayEntry {
    fn into_duration(self) -> Result<Duration, String> {
        match self {
            DelayEntry::Millis(ms) => Ok(Duration::from_millis(ms)),
            DelayEntry::Human(s) => humantime::parse_duration(s.trim())
                .map_err(|e| format!("invalid delay {s:?}: {e}")),
        }
    }
}
