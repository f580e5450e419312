//! Append-only audit trail of relay lifecycle events.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::{Customer, UserId},
    errors::Error,
    formatting::truncate_text,
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    Customer,
    Operator,
    Idle,
    /// A send failed and the session was dropped.
    Undeliverable,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Operator => "operator",
            Self::Idle => "idle",
            Self::Undeliverable => "undeliverable",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ToOperator,
    ToCustomer,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::ToOperator => "to_operator",
            Self::ToCustomer => "to_customer",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, customer_id: UserId) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            customer_id: Some(customer_id.0),
            ..Self::default()
        }
    }

    pub fn session_requested(customer: &Customer) -> Self {
        Self {
            username: customer.username.clone(),
            ..Self::base("session_requested", customer.id)
        }
    }

    pub fn session_started(customer_id: UserId) -> Self {
        Self::base("session_started", customer_id)
    }

    pub fn session_closed(customer_id: UserId, reason: CloseReason) -> Self {
        Self {
            reason: Some(reason.as_str().to_string()),
            ..Self::base("session_closed", customer_id)
        }
    }

    pub fn relay(
        customer_id: UserId,
        direction: Direction,
        message_type: &str,
        content: Option<&str>,
    ) -> Self {
        Self {
            direction: Some(direction.as_str().to_string()),
            message_type: Some(message_type.to_string()),
            content: content.map(|s| s.to_string()),
            ..Self::base("relay", customer_id)
        }
    }

    pub fn callback_request(customer: &Customer, phone: &str) -> Self {
        Self {
            username: customer.username.clone(),
            content: Some(phone.to_string()),
            ..Self::base("callback_request", customer.id)
        }
    }

    pub fn error(customer_id: UserId, error: &str, context: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            context: Some(context.to_string()),
            ..Self::base("error", customer_id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Best-effort write; failures are logged and dropped.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn json_lines_skip_empty_fields() {
        let log = AuditLogger::new(tmp_file("hotline-audit-json"), true);
        log.write(AuditEvent::session_closed(UserId(555), CloseReason::Idle))
            .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "session_closed");
        assert_eq!(v["customer_id"], 555);
        assert_eq!(v["reason"], "idle");
        assert!(v.get("error").is_none());
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn truncates_relayed_content() {
        let log = AuditLogger::new(tmp_file("hotline-audit-text"), false);
        let content = "x".repeat(AUDIT_MAX_TEXT + 10);
        log.write(AuditEvent::relay(
            UserId(1),
            Direction::ToOperator,
            "text",
            Some(&content),
        ))
        .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("direction: to_operator"));
        assert!(written.contains("..."));
        assert!(!written.contains(&content));
        let _ = std::fs::remove_file(log.path());
    }
}
