use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::MessageType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    /// A provider status this service does not interpret; kept verbatim.
    Other(String),
}

impl NotificationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Read => "read",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Other(raw) => raw,
        }
    }

    /// The provider accepted the message; no further send is needed.
    pub fn is_terminal_success(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent | NotificationStatus::Delivered | NotificationStatus::Read
        )
    }

    fn rank(&self) -> u8 {
        match self {
            NotificationStatus::Pending => 0,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Other(_) => 1,
            NotificationStatus::Delivered => 2,
            NotificationStatus::Read => 3,
        }
    }

    /// Whether a provider callback reporting `next` may replace `self`.
    /// Status never moves back along pending < sent < delivered < read.
    pub fn can_advance_to(&self, next: &NotificationStatus) -> bool {
        next.rank() >= self.rank()
    }

    /// Known statuses that a callback reporting `self` must not overwrite.
    pub fn superseding_statuses(&self) -> Vec<NotificationStatus> {
        [
            NotificationStatus::Pending,
            NotificationStatus::Sent,
            NotificationStatus::Failed,
            NotificationStatus::Delivered,
            NotificationStatus::Read,
        ]
        .into_iter()
        .filter(|current| !current.can_advance_to(self))
        .collect()
    }
}

impl From<String> for NotificationStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => NotificationStatus::Pending,
            "sent" => NotificationStatus::Sent,
            "delivered" => NotificationStatus::Delivered,
            "read" => NotificationStatus::Read,
            "failed" => NotificationStatus::Failed,
            _ => NotificationStatus::Other(raw),
        }
    }
}

impl From<NotificationStatus> for String {
    fn from(status: NotificationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reminder of one kind for one appointment. `(appointment_id,
/// message_type)` identifies the record; every dispatch attempt and every
/// provider callback updates it in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub appointment_id: Uuid,
    pub message_type: MessageType,
    pub patient_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub status: NotificationStatus,
    #[serde(rename = "whatsapp_msg_id")]
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    pub fn key(&self) -> (Uuid, MessageType) {
        (self.appointment_id, self.message_type)
    }

    /// Failed and still under the attempt budget.
    pub fn is_retryable(&self, max_attempts: u32) -> bool {
        self.status == NotificationStatus::Failed && self.attempts < max_attempts
    }

    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.status == NotificationStatus::Failed && self.attempts >= max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_statuses_are_preserved() {
        let status: NotificationStatus = serde_json::from_str("\"deleted\"").unwrap();
        assert_eq!(status, NotificationStatus::Other("deleted".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"deleted\"");
    }

    #[test]
    fn status_never_moves_backwards() {
        use NotificationStatus::*;

        assert!(Sent.can_advance_to(&Delivered));
        assert!(Delivered.can_advance_to(&Read));
        assert!(Sent.can_advance_to(&Read));
        assert!(Sent.can_advance_to(&Failed));
        assert!(!Read.can_advance_to(&Delivered));
        assert!(!Delivered.can_advance_to(&Sent));
        assert!(!Delivered.can_advance_to(&Failed));
    }

    #[test]
    fn only_read_supersedes_delivered() {
        assert_eq!(
            NotificationStatus::Delivered.superseding_statuses(),
            vec![NotificationStatus::Read]
        );
        assert!(NotificationStatus::Read.superseding_statuses().is_empty());
        assert_eq!(
            NotificationStatus::Failed.superseding_statuses(),
            vec![NotificationStatus::Delivered, NotificationStatus::Read]
        );
    }

    #[test]
    fn only_sent_delivered_read_are_terminal_success() {
        assert!(NotificationStatus::Sent.is_terminal_success());
        assert!(NotificationStatus::Delivered.is_terminal_success());
        assert!(NotificationStatus::Read.is_terminal_success());
        assert!(!NotificationStatus::Failed.is_terminal_success());
        assert!(!NotificationStatus::Pending.is_terminal_success());
    }
}
