//! Persisted record of the most recent sync attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome bookkeeping owned by the sync coordinator.
///
/// Created on the first attempt, updated after every attempt and only removed
/// by an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncMetadata {
    /// Completion time of the last attempt that reached an outcome
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Start time of the last attempt
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub last_sync_trigger: Option<String>,
    pub sync_success: bool,
    pub consecutive_failures: u32,
    pub words_count: usize,
    pub error_message: Option<String>,
}

impl SyncMetadata {
    pub fn record_attempt(&mut self, trigger: &str, now: DateTime<Utc>) {
        self.last_sync_attempt = Some(now);
        self.last_sync_trigger = Some(trigger.to_string());
    }

    pub fn record_success(&mut self, trigger: &str, words_count: usize, now: DateTime<Utc>) {
        self.last_sync_time = Some(now);
        self.last_sync_trigger = Some(trigger.to_string());
        self.sync_success = true;
        self.consecutive_failures = 0;
        self.words_count = words_count;
        self.error_message = None;
    }

    /// Returns the new consecutive failure count.
    pub fn record_failure(&mut self, trigger: &str, message: impl Into<String>, now: DateTime<Utc>) -> u32 {
        self.last_sync_time = Some(now);
        self.last_sync_trigger = Some(trigger.to_string());
        self.sync_success = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.error_message = Some(message.into());
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_failures_accumulate_until_success() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut metadata = SyncMetadata::default();

        metadata.record_attempt("manual", now);
        assert_eq!(metadata.record_failure("manual", "offline", now), 1);
        assert_eq!(metadata.record_failure("retry_1", "offline", now), 2);
        assert!(!metadata.sync_success);
        assert_eq!(metadata.error_message.as_deref(), Some("offline"));

        metadata.record_success("retry_2", 12, now);
        assert!(metadata.sync_success);
        assert_eq!(metadata.consecutive_failures, 0);
        assert_eq!(metadata.words_count, 12);
        assert_eq!(metadata.error_message, None);
        assert_eq!(metadata.last_sync_trigger.as_deref(), Some("retry_2"));
    }

    #[test]
    fn test_wire_layout() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut metadata = SyncMetadata::default();
        metadata.record_success("auto", 3, now);

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["lastSyncTrigger"], "auto");
        assert_eq!(value["syncSuccess"], true);
        assert_eq!(value["wordsCount"], 3);
        assert!(value["errorMessage"].is_null());

        let partial: SyncMetadata =
            serde_json::from_value(serde_json::json!({ "consecutiveFailures": 2 })).unwrap();
        assert_eq!(partial.consecutive_failures, 2);
        assert_eq!(partial.last_sync_time, None);
    }
}
