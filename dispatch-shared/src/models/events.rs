use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::pii::Masked;

pub const JOB_ALERT: &str = "job_alert";
pub const JOB_ALERT_EXPIRED: &str = "job_alert_expired";
pub const MECHANIC_REGISTER: &str = "mechanic_register";
pub const JOB_RESPONSE: &str = "job_response";

/// Server push announcing a new job offer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAlertEvent {
    #[serde(deserialize_with = "opaque_id")]
    pub job_id: String,
    #[serde(default)]
    pub attempt_index: u32,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default, deserialize_with = "lenient_expiry")]
    pub expires_at: Option<ExpiresAt>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub sla_seconds: Option<u64>,
    #[serde(default)]
    pub customer_name: Option<Masked<String>>,
    #[serde(default)]
    pub customer_phone: Option<Masked<String>>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

/// Authoritative removal of an offer by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAlertExpiredEvent {
    #[serde(deserialize_with = "opaque_id")]
    pub job_id: String,
    #[serde(default)]
    pub attempt_index: u32,
}

/// `expiresAt` is sent either as epoch milliseconds or as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresAt {
    Millis(i64),
    Text(String),
}

impl ExpiresAt {
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            ExpiresAt::Millis(ms) => Some(*ms),
            ExpiresAt::Text(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.timestamp_millis())
                .or_else(|| raw.trim().parse::<i64>().ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanicRegister {
    pub mechanic_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterAck {
    #[serde(default)]
    pub ok: bool,
}

/// The mechanic's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => write!(f, "accept"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "accept" => Ok(Decision::Accept),
            "reject" => Ok(Decision::Reject),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: String,
    pub attempt_index: u32,
    pub response: Decision,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResponseAck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// Job ids arrive as strings from some producers and as integers from others.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    let id = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(D::Error::custom(format!("invalid job id: {}", other))),
    };

    if id.is_empty() {
        return Err(D::Error::custom("empty job id"));
    }
    Ok(id)
}

/// Unusable values become `None` so the offer falls back to the default SLA
/// instead of being dropped.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs.ceil() as u64)
        }),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

fn lenient_expiry<'de, D>(deserializer: D) -> Result<Option<ExpiresAt>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
            .map(ExpiresAt::Millis),
        serde_json::Value::String(s) => Some(ExpiresAt::Text(s)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_alert_minimal_payload() {
        let event: JobAlertEvent = serde_json::from_value(json!({ "jobId": "J1" })).unwrap();
        assert_eq!(event.job_id, "J1");
        assert_eq!(event.attempt_index, 0);
        assert!(event.expires_at.is_none());
        assert!(event.customer_phone.is_none());
    }

    #[test]
    fn test_job_alert_numeric_id_and_display_fields() {
        let event: JobAlertEvent = serde_json::from_value(json!({
            "jobId": 42,
            "attemptIndex": 2,
            "issue": "Flat tyre",
            "customerPhone": "555-0100",
            "slaSeconds": 90
        }))
        .unwrap();

        assert_eq!(event.job_id, "42");
        assert_eq!(event.attempt_index, 2);
        assert_eq!(event.issue.as_deref(), Some("Flat tyre"));
        assert_eq!(event.customer_phone.unwrap().expose(), "555-0100");
        assert_eq!(event.sla_seconds, Some(90));
    }

    #[test]
    fn test_job_alert_rejects_missing_or_empty_id() {
        assert!(serde_json::from_value::<JobAlertEvent>(json!({ "attemptIndex": 0 })).is_err());
        assert!(serde_json::from_value::<JobAlertEvent>(json!({ "jobId": "  " })).is_err());
        assert!(serde_json::from_value::<JobAlertEvent>(json!({ "jobId": null })).is_err());
    }

    #[test]
    fn test_unusable_timing_fields_are_ignored() {
        let event: JobAlertEvent = serde_json::from_value(json!({
            "jobId": "J1",
            "slaSeconds": -5,
            "expiresAt": true,
        }))
        .unwrap();
        assert!(event.sla_seconds.is_none());
        assert!(event.expires_at.is_none());

        let event: JobAlertEvent = serde_json::from_value(json!({
            "jobId": "J2",
            "slaSeconds": 29.2,
            "expiresAt": 90000.7,
        }))
        .unwrap();
        assert_eq!(event.sla_seconds, Some(30));
        assert_eq!(event.expires_at, Some(ExpiresAt::Millis(90_000)));

        let event: JobAlertEvent =
            serde_json::from_value(json!({ "jobId": "J3", "slaSeconds": null, "expiresAt": {} })).unwrap();
        assert!(event.sla_seconds.is_none());
        assert!(event.expires_at.is_none());
    }

    #[test]
    fn test_expires_at_formats() {
        assert_eq!(ExpiresAt::Millis(1_700_000_000_000).epoch_millis(), Some(1_700_000_000_000));
        assert_eq!(
            ExpiresAt::Text("2023-11-14T22:13:20Z".into()).epoch_millis(),
            Some(1_700_000_000_000)
        );
        assert_eq!(ExpiresAt::Text("1700000000000".into()).epoch_millis(), Some(1_700_000_000_000));
        assert_eq!(ExpiresAt::Text("soon".into()).epoch_millis(), None);
    }

    #[test]
    fn test_job_response_wire_shape() {
        let payload = JobResponse {
            job_id: "J1".into(),
            attempt_index: 0,
            response: Decision::Reject,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "jobId": "J1", "attemptIndex": 0, "response": "reject" })
        );
    }
}
