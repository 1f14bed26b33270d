use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Futuro,
    Pendente,
    Aberto,
    Fechado,
    Historico,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Futuro => "FUTURO",
            Self::Pendente => "PENDENTE",
            Self::Aberto => "ABERTO",
            Self::Fechado => "FECHADO",
            Self::Historico => "HISTORICO",
        }
    }

    /// Only an open card accepts new log entries.
    pub fn accepts_actions(self) -> bool {
        matches!(self, Self::Aberto)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub supervisor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub card_id: String,
    pub description: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub position: i32,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub team_id: String,
    pub name: String,
    /// `None` means the board applies to every member of the team.
    pub target_user_id: Option<String>,
    pub cards: Vec<Card>,
}

impl Board {
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        match self.target_user_id.as_deref() {
            Some(target) => target == user_id,
            None => true,
        }
    }
}

/// One immutable mark/unmark action. Rows are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub id: String,
    pub seq: i64,
    pub item_id: String,
    pub user_id: String,
    pub reference_date: NaiveDate,
    pub value: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub team_id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub title: String,
    pub body: String,
    pub dedup_key: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub team_id: String,
    pub recipient_id: String,
    pub sender_id: Option<String>,
    pub title: String,
    pub body: String,
    pub dedup_key: Option<String>,
    /// Stored as the notification's `created_at`.
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationStatus {
    Created,
    Duplicate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub description: String,
    pub position: i32,
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: String,
    pub title: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub status: CardStatus,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub id: String,
    pub name: String,
    pub target_user_id: Option<String>,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardPayload {
    pub board_id: String,
    pub title: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub card_id: String,
    pub user_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub cards_inspected: usize,
    pub pairs_evaluated: usize,
    pub incomplete_pairs: usize,
    pub alerts_created: usize,
    pub duplicates_suppressed: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChecklistSettings {
    pub sweep_interval_seconds: u64,
    pub sweep_lookback_seconds: u64,
    pub utc_offset_minutes: i32,
    pub alert_title: String,
}

impl Default for ChecklistSettings {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 300,
            sweep_lookback_seconds: 360,
            utc_offset_minutes: 0,
            alert_title: "Checklist incompleto".to_string(),
        }
    }
}
