use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error information reported by the search cluster.
///
/// Elasticsearch error bodies look like
/// `{"error": {"type": "...", "reason": "..."}, "status": 400}`, but older
/// nodes and proxies sometimes answer with a bare string or plain text.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
}

impl ClusterError {
    /// Build the error from an HTTP status and the raw response body.
    pub fn from_body(status: Option<u16>, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let mut err = ClusterError {
            status,
            ..Default::default()
        };

        match parsed.as_ref().and_then(|v| v.get("error")) {
            Some(Value::Object(obj)) => {
                err.error_type = string_field(obj.get("type")).unwrap_or_else(unknown_type);
                err.reason = string_field(obj.get("reason")).unwrap_or_default();
                err.root_cause = obj
                    .get("root_cause")
                    .and_then(Value::as_array)
                    .and_then(|causes| causes.first())
                    .and_then(|cause| string_field(cause.get("reason")));
            }
            Some(Value::String(msg)) => {
                err.error_type = unknown_type();
                err.reason = msg.clone();
            }
            _ => {
                err.error_type = unknown_type();
                err.reason = body.trim().to_string();
            }
        }

        if err.status.is_none() {
            err.status = parsed
                .as_ref()
                .and_then(|v| v.get("status"))
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok());
        }

        err
    }

    /// Whether an HTTP status is worth another attempt (overload or gateway trouble).
    pub fn is_transient_status(status: u16) -> bool {
        matches!(status, 429 | 502 | 503 | 504)
    }

    /// Whether the cluster says the scroll context no longer exists.
    pub fn is_missing_context(&self) -> bool {
        self.error_type == "search_context_missing_exception"
            || self.status == Some(404)
    }

    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn string_field(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

fn unknown_type() -> String {
    "unknown".to_string()
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{status}] {}: {}", self.error_type, self.reason)?,
            None => write!(f, "{}: {}", self.error_type, self.reason)?,
        }
        if let Some(cause) = &self.root_cause {
            if cause != &self.reason {
                write!(f, " (caused by: {cause})")?;
            }
        }
        Ok(())
    }
}
