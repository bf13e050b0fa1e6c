use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// The reminder kinds the clinic sends, named by how long before the
/// appointment they go out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MessageType {
    #[serde(rename = "3_days")]
    ThreeDays,
    #[serde(rename = "1_day")]
    OneDay,
    #[serde(rename = "2_hours")]
    TwoHours,
}

impl MessageType {
    pub const ALL: [MessageType; 3] = [MessageType::ThreeDays, MessageType::OneDay, MessageType::TwoHours];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ThreeDays => "3_days",
            MessageType::OneDay => "1_day",
            MessageType::TwoHours => "2_hours",
        }
    }

    pub fn lead_time(&self) -> Duration {
        match self {
            MessageType::ThreeDays => Duration::hours(72),
            MessageType::OneDay => Duration::hours(24),
            MessageType::TwoHours => Duration::hours(2),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3_days" => Ok(MessageType::ThreeDays),
            "1_day" => Ok(MessageType::OneDay),
            "2_hours" => Ok(MessageType::TwoHours),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

/// A trigger definition: send `message_type` when an appointment is
/// `lead_time` away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderOffset {
    pub lead_time: Duration,
    pub message_type: MessageType,
}

impl From<MessageType> for ReminderOffset {
    fn from(message_type: MessageType) -> Self {
        Self {
            lead_time: message_type.lead_time(),
            message_type,
        }
    }
}

/// WhatsApp Business settings, stored as a single row and reloaded on every
/// scheduler tick and webhook handshake.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MessagingConfig {
    pub phone_number_id: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(default)]
    pub business_account_id: String,
    #[serde(skip_serializing, default)]
    pub webhook_verify_token: String,
    pub is_active: bool,
    pub reminder_enabled: bool,
    pub reminder_3_days_before: bool,
    pub reminder_1_day_before: bool,
    pub reminder_2_hours_before: bool,
    pub template_name_reminder: String,
    pub template_lang_code: String,
}

impl MessagingConfig {
    pub fn is_sending_enabled(&self) -> bool {
        self.is_active && self.reminder_enabled
    }

    pub fn is_offset_enabled(&self, message_type: MessageType) -> bool {
        match message_type {
            MessageType::ThreeDays => self.reminder_3_days_before,
            MessageType::OneDay => self.reminder_1_day_before,
            MessageType::TwoHours => self.reminder_2_hours_before,
        }
    }

    /// Enabled offsets, longest lead time first.
    pub fn enabled_offsets(&self) -> Vec<ReminderOffset> {
        MessageType::ALL
            .into_iter()
            .filter(|message_type| self.is_offset_enabled(*message_type))
            .map(ReminderOffset::from)
            .collect()
    }
}

/// Partial update of [`MessagingConfig`]. Absent fields keep their stored
/// value. The tokens are never returned to clients, so an empty token in an
/// update means "unchanged" rather than "clear it".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessagingConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_verify_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_3_days_before: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_1_day_before: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_2_hours_before: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name_reminder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_lang_code: Option<String>,
}

impl MessagingConfigUpdate {
    /// The same update with empty tokens dropped.
    pub fn without_empty_tokens(&self) -> Self {
        Self {
            access_token: self.access_token.clone().filter(|token| !token.is_empty()),
            webhook_verify_token: self.webhook_verify_token.clone().filter(|token| !token.is_empty()),
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.without_empty_tokens() == Self::default()
    }

    pub fn apply_to(&self, config: &mut MessagingConfig) {
        let update = self.without_empty_tokens();

        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut config.phone_number_id, update.phone_number_id);
        set(&mut config.access_token, update.access_token);
        set(&mut config.business_account_id, update.business_account_id);
        set(&mut config.webhook_verify_token, update.webhook_verify_token);
        set(&mut config.is_active, update.is_active);
        set(&mut config.reminder_enabled, update.reminder_enabled);
        set(&mut config.reminder_3_days_before, update.reminder_3_days_before);
        set(&mut config.reminder_1_day_before, update.reminder_1_day_before);
        set(&mut config.reminder_2_hours_before, update.reminder_2_hours_before);
        set(&mut config.template_name_reminder, update.template_name_reminder);
        set(&mut config.template_lang_code, update.template_lang_code);
    }
}
