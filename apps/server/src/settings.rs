use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleConfig;
use crate::validation::{is_valid_phone, min_len, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSound {
    #[default]
    Default,
    Chime,
    Bell,
    Ding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub confirmation_enabled: bool,
    pub reminder_enabled: bool,
    pub reminder_hours_before: u32,
    pub sound_enabled: bool,
    pub notification_sound: NotificationSound,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            confirmation_enabled: true,
            reminder_enabled: true,
            reminder_hours_before: 24,
            sound_enabled: true,
            notification_sound: NotificationSound::Default,
        }
    }
}

/// Everything the provider can configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    pub profession: String,
    pub specialization: String,
    pub notifications: NotificationSettings,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            whatsapp_number: None,
            profession: "Médico".into(),
            specialization: "Clínica General".into(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl UserSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schedule.validate()?;

        if let Some(number) = self.whatsapp_number.as_deref() {
            if !number.is_empty() && !is_valid_phone(number) {
                return Err(ValidationError::InvalidWhatsapp);
            }
        }
        if !min_len(&self.profession, 2) {
            return Err(ValidationError::FieldTooShort("profesión"));
        }
        if !min_len(&self.specialization, 2) {
            return Err(ValidationError::FieldTooShort("especialización"));
        }
        if !(1..=72).contains(&self.notifications.reminder_hours_before) {
            return Err(ValidationError::ReminderHoursOutOfRange);
        }
        Ok(())
    }

    /// Merge a partial update, validating the result before it is returned.
    pub fn apply(&self, patch: SettingsPatch) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        if let Some(schedule) = patch.schedule {
            next.schedule = schedule;
        }
        if let Some(number) = patch.whatsapp_number {
            next.whatsapp_number = Some(number).filter(|n| !n.is_empty());
        }
        if let Some(profession) = patch.profession {
            next.profession = profession;
        }
        if let Some(specialization) = patch.specialization {
            next.specialization = specialization;
        }
        if let Some(notifications) = patch.notifications {
            next.notifications = notifications;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub schedule: Option<ScheduleConfig>,
    pub whatsapp_number: Option<String>,
    pub profession: Option<String>,
    pub specialization: Option<String>,
    pub notifications: Option<NotificationSettings>,
}

// ── Tests ──
