use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata the backend reports about the engine that handled a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentInfo {
    pub model: String,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    pub timestamp: String,
}

/// One attempt to transform text through the backend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub id: String,                 // Unique record identifier
    pub command: String,            // Trimmed user command
    pub timestamp: DateTime<Utc>,   // Creation time
    pub original_text: String,      // Source text snapshot at submit time
    #[serde(default)]
    pub result: Option<String>,     // Transformed text (success only)
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,      // Raw error message (failure only)
    #[serde(default)]
    pub agent_info: Option<AgentInfo>,
}

impl CommandRecord {
    /// Start a pending record; the dispatcher fills in the outcome before it
    /// reaches the ledger.
    pub fn pending(command: &str, original_text: &str) -> Self {
        let timestamp = Utc::now();
        Self {
            id: new_record_id(&timestamp),
            command: command.trim().to_string(),
            timestamp,
            original_text: original_text.to_string(),
            result: None,
            success: false,
            error: None,
            agent_info: None,
        }
    }

    pub fn succeeded(mut self, result: String, agent_info: AgentInfo) -> Self {
        self.success = true;
        self.result = Some(result);
        self.error = None;
        self.agent_info = Some(agent_info);
        self
    }

    pub fn failed(mut self, error: String) -> Self {
        self.success = false;
        self.result = None;
        self.error = Some(error);
        self
    }

    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

// Millisecond timestamp plus a random suffix, so two records created in the
// same millisecond still get distinct ids.
fn new_record_id(timestamp: &DateTime<Utc>) -> String {
    let suffix: [u8; 4] = rand::random();
    format!("{}-{}", timestamp.timestamp_millis(), hex::encode(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn ids_do_not_collide_within_a_millisecond() {
        let ids: HashSet<String> = (0..200)
            .map(|_| CommandRecord::pending("make it formal", "hi").id)
            .collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn pending_record_trims_command_and_snapshots_text() {
        let record = CommandRecord::pending("  summarize this  ", " body ");
        assert_eq!(record.command, "summarize this");
        assert_eq!(record.original_text, " body ");
        assert!(!record.success);
        assert!(record.result.is_none() && record.error.is_none());
    }

    #[test]
    fn serializes_with_camel_case_and_rfc3339_timestamp() {
        let record = CommandRecord::pending("summarize this", "text");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("originalText").is_some());
        assert!(value.get("agentInfo").is_some());
        let ts = value["timestamp"].as_str().unwrap();
        let parsed: DateTime<Utc> = ts.parse().unwrap();
        assert_eq!(parsed, record.timestamp);
    }

    #[test]
    fn missing_optional_fields_default_on_load() {
        let json = r#"{"id":"1-aa","command":"x y z","timestamp":"2024-05-01T10:00:00Z","originalText":"t"}"#;
        let record: CommandRecord = serde_json::from_str(json).unwrap();
        assert!(!record.success);
        assert_eq!(record.agent_info, None);
    }
}
