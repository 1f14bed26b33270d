use crate::db::Database;
use crate::errors::AppResult;
use crate::models::{NotificationRequest, NotificationStatus};
use chrono::NaiveDate;

/// Namespace of dedup keys raised by the closed-card sweep.
pub const CLOSED_CARD_KEY_PREFIX: &str = "auto:fechado";

/// Accepts alert requests. A request whose dedup key is already present is a
/// silent no-op reported as `NotificationStatus::Duplicate`.
pub trait NotificationSink: Send + Sync {
    fn request(&self, request: &NotificationRequest) -> AppResult<NotificationStatus>;
}

impl NotificationSink for Database {
    fn request(&self, request: &NotificationRequest) -> AppResult<NotificationStatus> {
        if self.insert_notification(request)? {
            Ok(NotificationStatus::Created)
        } else {
            Ok(NotificationStatus::Duplicate)
        }
    }
}

pub fn closed_card_dedup_key(card_id: &str, user_id: &str, date: NaiveDate) -> String {
    format!(
        "{}:{}:{}:{}",
        CLOSED_CARD_KEY_PREFIX,
        card_id,
        user_id,
        date.format("%Y-%m-%d")
    )
}

pub fn closed_card_body(user_name: &str, card_title: &str, board_name: &str, date: NaiveDate) -> String {
    format!(
        "{} não concluiu o card \"{}\" do quadro \"{}\" em {}.",
        user_name,
        card_title,
        board_name,
        date.format("%d/%m/%Y")
    )
}
