use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settle delays applied after multi-phase commands.
///
/// Serialized as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Wait after `AT+CIPSTART` before returning.
    #[serde(with = "millis", rename = "session_settle_ms")]
    pub session_settle: Duration,
    /// Wait between `AT+CIPSEND=<len>` and the payload bytes.
    #[serde(with = "millis", rename = "payload_settle_ms")]
    pub payload_settle: Duration,
    /// Wait after `AT+RST` in [`reset_and_wait`](crate::AtDriver::reset_and_wait).
    #[serde(with = "millis", rename = "reset_settle_ms")]
    pub reset_settle: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            session_settle: Duration::from_secs(10),
            payload_settle: Duration::from_millis(100),
            reset_settle: Duration::from_secs(6),
        }
    }
}

impl DriverConfig {
    /// All settle delays zero. For simulated links.
    pub fn immediate() -> Self {
        Self {
            session_settle: Duration::ZERO,
            payload_settle: Duration::ZERO,
            reset_settle: Duration::ZERO,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_timings() {
        let config = DriverConfig::default();
        assert_eq!(config.session_settle, Duration::from_secs(10));
        assert_eq!(config.payload_settle, Duration::from_millis(100));
        assert_eq!(config.reset_settle, Duration::from_secs(6));
    }

    #[test]
    fn serializes_as_milliseconds() {
        let json = serde_json::to_value(DriverConfig::default()).unwrap();
        assert_eq!(json["session_settle_ms"], 10_000);
        assert_eq!(json["payload_settle_ms"], 100);
        assert_eq!(json["reset_settle_ms"], 6_000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: DriverConfig = serde_json::from_str(r#"{"payload_settle_ms": 5}"#).unwrap();
        assert_eq!(config.payload_settle, Duration::from_millis(5));
        assert_eq!(config.session_settle, Duration::from_secs(10));
    }
}
