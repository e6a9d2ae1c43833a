use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes an optional Duration as fractional seconds (or null)
pub fn serialize_opt_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.map(|d| d.as_secs_f64()).serialize(serializer)
}

/// Deserializes an optional Duration from fractional seconds
pub fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = Option::<f64>::deserialize(deserializer)?;
    match secs {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| {
                serde::de::Error::custom(format!("timeout {} seconds is out of range: {}", secs, e))
            }),
        Some(secs) => Err(serde::de::Error::custom(format!(
            "timeout must be a positive number of seconds, got {}",
            secs
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Holder {
        #[serde(serialize_with = "serialize_opt_duration")]
        #[serde(deserialize_with = "deserialize_opt_duration")]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_duration_serialization() {
        let holder = Holder { timeout: Some(Duration::from_millis(1500)) };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"timeout":1.5}"#);

        let decoded: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, holder);
    }

    #[test]
    fn test_null_duration() {
        let decoded: Holder = serde_json::from_str(r#"{"timeout":null}"#).unwrap();
        assert_eq!(decoded.timeout, None);
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(serde_json::from_str::<Holder>(r#"{"timeout":0}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"timeout":-2.0}"#).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_duration() {
        let err = serde_json::from_str::<Holder>(r#"{"timeout":1e300}"#).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
