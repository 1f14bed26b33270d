use crate::errors::{AppError, AppResult};
use crate::models::{
    ActionLogEntry, Board, Card, ChecklistSettings, CreateCardPayload, Item, Notification, NotificationRequest,
    Team, User,
};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Timelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const CARD_COLUMNS: &str = "id, board_id, title, open_time, close_time, position";
const ENTRY_COLUMNS: &str = "seq, id, item_id, user_id, reference_date, value, created_at";
const NOTIFICATION_COLUMNS: &str = "id, team_id, recipient_id, sender_id, title, body, dedup_key, read, created_at";

/// SQLite-backed structure, action log and notification store.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // ─── Settings ───────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<ChecklistSettings> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'checklist'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<ChecklistSettings>(&raw).unwrap_or_default()),
            None => Ok(ChecklistSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<ChecklistSettings> {
        self.update_settings_within(update, 0)
    }

    /// Like `update_settings`, but the lookback must also exceed
    /// `live_interval_seconds`, the cadence a running scheduler keeps until restart.
    pub fn update_settings_within(
        &self,
        update: serde_json::Value,
        live_interval_seconds: u64,
    ) -> AppResult<ChecklistSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: ChecklistSettings = serde_json::from_value(merged)?;
        if settings.sweep_interval_seconds == 0 {
            return Err(AppError::InvalidInput("sweepIntervalSeconds must be positive".to_string()));
        }
        let cadence = settings.sweep_interval_seconds.max(live_interval_seconds);
        if settings.sweep_lookback_seconds <= cadence {
            return Err(AppError::InvalidInput(format!(
                "sweepLookbackSeconds ({}) must exceed the sweep cadence ({}s)",
                settings.sweep_lookback_seconds, cadence
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('checklist', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = 'checklist'",
            [],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES ('checklist', ?1, ?2)",
                params![
                    serde_json::to_string(&ChecklistSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }

    // ─── Users & teams ──────────────────────────────────────────────────────

    pub fn create_user(&self, name: &str) -> AppResult<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.name, format_instant(user.created_at)],
        )?;
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, created_at FROM users WHERE id = ?1",
            [user_id],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn create_team(&self, name: &str, supervisor_id: Option<&str>) -> AppResult<Team> {
        let team = Team {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            supervisor_id: supervisor_id.map(ToString::to_string),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO teams (id, name, supervisor_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![team.id, team.name, team.supervisor_id, format_instant(team.created_at)],
        )?;
        Ok(team)
    }

    pub fn get_team(&self, team_id: &str) -> AppResult<Option<Team>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, supervisor_id, created_at FROM teams WHERE id = ?1",
            [team_id],
            |row| {
                Ok(Team {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    supervisor_id: row.get(2)?,
                    created_at: parse_instant(&row.get::<_, String>(3)?)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn set_team_supervisor(&self, team_id: &str, supervisor_id: Option<&str>) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE teams SET supervisor_id = ?1 WHERE id = ?2",
            params![supervisor_id, team_id],
        )?;
        Ok(changed > 0)
    }

    pub fn add_team_member(&self, team_id: &str, user_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO team_members (team_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![team_id, user_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_team_member_ids(&self, team_id: &str) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM team_members WHERE team_id = ?1 ORDER BY joined_at ASC, user_id ASC",
        )?;
        let rows = stmt.query_map([team_id], |row| row.get::<_, String>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn is_team_member(&self, team_id: &str, user_id: &str) -> AppResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM team_members WHERE team_id = ?1 AND user_id = ?2)",
            params![team_id, user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ─── Boards, cards, items ───────────────────────────────────────────────

    pub fn create_board(&self, team_id: &str, name: &str, target_user_id: Option<&str>) -> AppResult<Board> {
        let conn = self.conn()?;
        let team_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?1)",
            [team_id],
            |row| row.get(0),
        )?;
        if !team_exists {
            return Err(AppError::NotFound(format!("Team {} not found", team_id)));
        }

        let board = Board {
            id: Uuid::new_v4().to_string(),
            team_id: team_id.to_string(),
            name: name.to_string(),
            target_user_id: target_user_id.map(ToString::to_string),
            cards: Vec::new(),
        };
        conn.execute(
            "INSERT INTO boards (id, team_id, name, target_user_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                board.id,
                board.team_id,
                board.name,
                board.target_user_id,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(board)
    }

    pub fn create_card(&self, payload: CreateCardPayload) -> AppResult<Card> {
        if payload.open_time >= payload.close_time {
            return Err(AppError::InvalidInput(format!(
                "Card open time {} must be before close time {}",
                payload.open_time, payload.close_time
            )));
        }

        let conn = self.conn()?;
        let board_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM boards WHERE id = ?1)",
            [payload.board_id.as_str()],
            |row| row.get(0),
        )?;
        if !board_exists {
            return Err(AppError::NotFound(format!("Board {} not found", payload.board_id)));
        }

        let position = match payload.position {
            Some(position) => position,
            None => conn.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM cards WHERE board_id = ?1",
                [payload.board_id.as_str()],
                |row| row.get(0),
            )?,
        };
        let card = Card {
            id: Uuid::new_v4().to_string(),
            board_id: payload.board_id,
            title: payload.title,
            open_time: truncate_time(payload.open_time),
            close_time: truncate_time(payload.close_time),
            position,
            items: Vec::new(),
        };
        conn.execute(
            "INSERT INTO cards (id, board_id, title, open_time, close_time, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                card.id,
                card.board_id,
                card.title,
                format_clock_time(card.open_time),
                format_clock_time(card.close_time),
                card.position
            ],
        )?;
        Ok(card)
    }

    pub fn create_item(&self, card_id: &str, description: &str, position: i32) -> AppResult<Item> {
        let conn = self.conn()?;
        let card_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE id = ?1)",
            [card_id],
            |row| row.get(0),
        )?;
        if !card_exists {
            return Err(AppError::NotFound(format!("Card {} not found", card_id)));
        }
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE card_id = ?1 AND position = ?2)",
            params![card_id, position],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::InvalidInput(format!(
                "Card {} already has an item at position {}",
                card_id, position
            )));
        }

        let item = Item {
            id: Uuid::new_v4().to_string(),
            card_id: card_id.to_string(),
            description: description.to_string(),
            position,
        };
        conn.execute(
            "INSERT INTO items (id, card_id, description, position) VALUES (?1, ?2, ?3, ?4)",
            params![item.id, item.card_id, item.description, item.position],
        )?;
        Ok(item)
    }

    pub fn get_board(&self, board_id: &str) -> AppResult<Option<Board>> {
        let conn = self.conn()?;
        let board = conn
            .query_row(
                "SELECT id, team_id, name, target_user_id FROM boards WHERE id = ?1",
                [board_id],
                parse_board_row,
            )
            .optional()?;
        match board {
            Some(mut board) => {
                board.cards = load_cards(&conn, &board.id)?;
                Ok(Some(board))
            }
            None => Ok(None),
        }
    }

    /// Boards of a team with their cards and items, each level in display order.
    pub fn get_boards_for_team(&self, team_id: &str) -> AppResult<Vec<Board>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, team_id, name, target_user_id FROM boards
             WHERE team_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([team_id], parse_board_row)?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row?);
        }
        for board in &mut boards {
            board.cards = load_cards(&conn, &board.id)?;
        }
        Ok(boards)
    }

    /// Cards whose close time lies in `[start, end)`, on any day.
    ///
    /// `start > end` is read as a range that wraps past midnight.
    pub fn get_cards_closing_between(&self, start: NaiveTime, end: NaiveTime) -> AppResult<Vec<Card>> {
        let query = if start <= end {
            format!(
                "SELECT {} FROM cards WHERE close_time >= ?1 AND close_time < ?2 ORDER BY close_time ASC, id ASC",
                CARD_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM cards WHERE close_time >= ?1 OR close_time < ?2 ORDER BY close_time ASC, id ASC",
                CARD_COLUMNS
            )
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(
            params![format_clock_time(start), format_clock_time(end)],
            parse_card_row,
        )?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        for card in &mut cards {
            card.items = load_items(&conn, &card.id)?;
        }
        Ok(cards)
    }

    pub fn get_card_for_item(&self, item_id: &str) -> AppResult<Option<Card>> {
        let conn = self.conn()?;
        let card = conn
            .query_row(
                "SELECT c.id, c.board_id, c.title, c.open_time, c.close_time, c.position
                 FROM items i JOIN cards c ON c.id = i.card_id
                 WHERE i.id = ?1",
                [item_id],
                parse_card_row,
            )
            .optional()?;
        match card {
            Some(mut card) => {
                card.items = load_items(&conn, &card.id)?;
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    // ─── Action log ─────────────────────────────────────────────────────────

    /// Appends one immutable entry. There is no update or delete counterpart.
    pub fn append_entry(
        &self,
        item_id: &str,
        user_id: &str,
        reference_date: NaiveDate,
        value: bool,
        created_at: DateTime<Utc>,
    ) -> AppResult<ActionLogEntry> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO action_log (id, item_id, user_id, reference_date, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                item_id,
                user_id,
                format_date(reference_date),
                value,
                format_instant(created_at)
            ],
        )?;
        let seq = conn.last_insert_rowid();

        Ok(ActionLogEntry {
            id,
            seq,
            item_id: item_id.to_string(),
            user_id: user_id.to_string(),
            reference_date,
            value,
            created_at,
        })
    }

    pub fn get_entries_for_user_and_date(&self, user_id: &str, reference_date: NaiveDate) -> AppResult<Vec<ActionLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log WHERE user_id = ?1 AND reference_date = ?2 ORDER BY seq ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, format_date(reference_date)], parse_entry_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_entries_for_item(
        &self,
        item_id: &str,
        user_id: &str,
        reference_date: NaiveDate,
    ) -> AppResult<Vec<ActionLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM action_log
             WHERE item_id = ?1 AND user_id = ?2 AND reference_date = ?3
             ORDER BY seq ASC",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![item_id, user_id, format_date(reference_date)],
            parse_entry_row,
        )?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // ─── Notifications ──────────────────────────────────────────────────────

    /// Inserts unless the dedup key already exists. Returns whether a row was written.
    ///
    /// The UNIQUE constraint on `dedup_key` decides races between concurrent sweeps.
    pub fn insert_notification(&self, request: &NotificationRequest) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT INTO notifications (id, team_id, recipient_id, sender_id, title, body, dedup_key, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
             ON CONFLICT(dedup_key) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                request.team_id,
                request.recipient_id,
                request.sender_id,
                request.title,
                request.body,
                request.dedup_key,
                format_instant(request.requested_at)
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn list_notifications(&self, recipient_id: &str, unread_only: bool) -> AppResult<Vec<Notification>> {
        let conn = self.conn()?;
        let query = if unread_only {
            format!(
                "SELECT {} FROM notifications WHERE recipient_id = ?1 AND read = 0 ORDER BY created_at DESC, id ASC",
                NOTIFICATION_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM notifications WHERE recipient_id = ?1 ORDER BY created_at DESC, id ASC",
                NOTIFICATION_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([recipient_id], parse_notification_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_notification_by_dedup_key(&self, dedup_key: &str) -> AppResult<Option<Notification>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM notifications WHERE dedup_key = ?1", NOTIFICATION_COLUMNS),
            [dedup_key],
            parse_notification_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn count_notifications(&self) -> AppResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM notifications", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND read = 0",
            [notification_id],
        )?;
        Ok(changed > 0)
    }
}

fn load_cards(conn: &Connection, board_id: &str) -> AppResult<Vec<Card>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards WHERE board_id = ?1 ORDER BY position ASC, id ASC",
        CARD_COLUMNS
    ))?;
    let rows = stmt.query_map([board_id], parse_card_row)?;
    let mut cards = Vec::new();
    for row in rows {
        cards.push(row?);
    }
    for card in &mut cards {
        card.items = load_items(conn, &card.id)?;
    }
    Ok(cards)
}

fn load_items(conn: &Connection, card_id: &str) -> AppResult<Vec<Item>> {
    let mut stmt = conn.prepare(
        "SELECT id, card_id, description, position FROM items WHERE card_id = ?1 ORDER BY position ASC",
    )?;
    let rows = stmt.query_map([card_id], |row| {
        Ok(Item {
            id: row.get(0)?,
            card_id: row.get(1)?,
            description: row.get(2)?,
            position: row.get(3)?,
        })
    })?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_instant(&row.get::<_, String>(2)?)?,
    })
}

fn parse_board_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        team_id: row.get(1)?,
        name: row.get(2)?,
        target_user_id: row.get(3)?,
        cards: Vec::new(),
    })
}

fn parse_card_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        open_time: parse_clock_time(&row.get::<_, String>(3)?)?,
        close_time: parse_clock_time(&row.get::<_, String>(4)?)?,
        position: row.get(5)?,
        items: Vec::new(),
    })
}

fn parse_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionLogEntry> {
    Ok(ActionLogEntry {
        seq: row.get(0)?,
        id: row.get(1)?,
        item_id: row.get(2)?,
        user_id: row.get(3)?,
        reference_date: parse_date(&row.get::<_, String>(4)?)?,
        value: row.get(5)?,
        created_at: parse_instant(&row.get::<_, String>(6)?)?,
    })
}

fn parse_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        team_id: row.get(1)?,
        recipient_id: row.get(2)?,
        sender_id: row.get(3)?,
        title: row.get(4)?,
        body: row.get(5)?,
        dedup_key: row.get(6)?,
        read: row.get(7)?,
        created_at: parse_instant(&row.get::<_, String>(8)?)?,
    })
}

fn conversion_error(error: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
    )
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_instant(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_error)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(conversion_error)
}

fn format_clock_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_clock_time(raw: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(conversion_error)
}

fn truncate_time(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use crate::models::{CreateCardPayload, NotificationRequest};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn card_payload(board_id: &str, title: &str, open: NaiveTime, close: NaiveTime) -> CreateCardPayload {
        CreateCardPayload {
            board_id: board_id.to_string(),
            title: title.to_string(),
            open_time: open,
            close_time: close,
            position: None,
        }
    }

    fn alert(key: Option<&str>) -> NotificationRequest {
        NotificationRequest {
            team_id: "team".to_string(),
            recipient_id: "boss".to_string(),
            sender_id: None,
            title: "Checklist incompleto".to_string(),
            body: "body".to_string(),
            dedup_key: key.map(ToString::to_string),
            requested_at: Utc.with_ymd_and_hms(2026, 3, 10, 18, 2, 0).unwrap(),
        }
    }

    #[test]
    fn boards_load_nested_in_display_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Abertura", None).expect("board");
        let late = db
            .create_card(CreateCardPayload {
                position: Some(5),
                ..card_payload(&board.id, "Fechamento", t(17, 0), t(18, 0))
            })
            .expect("late card");
        let early = db
            .create_card(CreateCardPayload {
                position: Some(1),
                ..card_payload(&board.id, "Abertura", t(8, 0), t(9, 0))
            })
            .expect("early card");
        db.create_item(&early.id, "second", 20).expect("item");
        db.create_item(&early.id, "first", 10).expect("item");

        let boards = db.get_boards_for_team(&team.id).expect("boards");
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].cards.len(), 2);
        assert_eq!(boards[0].cards[0].id, early.id);
        assert_eq!(boards[0].cards[1].id, late.id);
        let descriptions: Vec<_> = boards[0].cards[0].items.iter().map(|item| item.description.as_str()).collect();
        assert_eq!(descriptions, vec!["first", "second"]);
    }

    #[test]
    fn card_window_must_be_ordered_and_item_positions_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Board", None).expect("board");

        let err = db
            .create_card(card_payload(&board.id, "Invertido", t(18, 0), t(8, 0)))
            .expect_err("inverted window");
        assert!(matches!(err, AppError::InvalidInput(_)));

        let card = db
            .create_card(card_payload(&board.id, "Ok", t(8, 0), t(18, 0)))
            .expect("card");
        db.create_item(&card.id, "a", 1).expect("item");
        let err = db.create_item(&card.id, "b", 1).expect_err("duplicate position");
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = db
            .create_card(card_payload("missing", "x", t(8, 0), t(9, 0)))
            .expect_err("missing board");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn closing_query_handles_plain_and_wrapping_ranges() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Board", None).expect("board");
        let evening = db
            .create_card(card_payload(&board.id, "Noite", t(8, 0), t(23, 58)))
            .expect("card");
        let dawn = db
            .create_card(card_payload(&board.id, "Madrugada", t(0, 0), t(0, 2)))
            .expect("card");
        let noon = db
            .create_card(card_payload(&board.id, "Meio-dia", t(8, 0), t(12, 0)))
            .expect("card");

        let plain = db.get_cards_closing_between(t(11, 55), t(12, 1)).expect("plain");
        assert_eq!(plain.iter().map(|c| c.id.clone()).collect::<Vec<_>>(), vec![noon.id.clone()]);

        let end_exclusive = db.get_cards_closing_between(t(11, 55), t(12, 0)).expect("exclusive");
        assert!(end_exclusive.is_empty());

        let wrapped = db.get_cards_closing_between(t(23, 57), t(0, 3)).expect("wrapped");
        let ids: Vec<_> = wrapped.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&evening.id));
        assert!(ids.contains(&dawn.id));
    }

    #[test]
    fn action_log_is_append_only_and_ordered_by_sequence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.create_user("Ana").expect("user");
        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Board", None).expect("board");
        let card = db
            .create_card(card_payload(&board.id, "Card", t(8, 0), t(18, 0)))
            .expect("card");
        let item = db.create_item(&card.id, "a", 1).expect("item");

        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let first = db.append_entry(&item.id, &user.id, day, true, at).expect("first");
        let second = db.append_entry(&item.id, &user.id, day, false, at).expect("second");
        db.append_entry(&item.id, &user.id, day.succ_opt().unwrap(), true, at)
            .expect("other day");
        assert!(second.seq > first.seq);

        let entries = db.get_entries_for_user_and_date(&user.id, day).expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], first);
        assert_eq!(entries[1], second);

        let history = db.get_entries_for_item(&item.id, &user.id, day).expect("history");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn dedup_key_allows_a_single_notification() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        assert!(db.insert_notification(&alert(Some("auto:fechado:c:u:2026-03-10"))).expect("first"));
        assert!(!db.insert_notification(&alert(Some("auto:fechado:c:u:2026-03-10"))).expect("second"));
        assert!(db.insert_notification(&alert(None)).expect("keyless"));
        assert!(db.insert_notification(&alert(None)).expect("keyless again"));
        assert_eq!(db.count_notifications().expect("count"), 3);

        let stored = db
            .get_notification_by_dedup_key("auto:fechado:c:u:2026-03-10")
            .expect("lookup")
            .expect("exists");
        assert_eq!(stored.created_at, Utc.with_ymd_and_hms(2026, 3, 10, 18, 2, 0).unwrap());
        assert!(!stored.read);
        assert!(db.mark_notification_read(&stored.id).expect("mark"));
        assert!(!db.mark_notification_read(&stored.id).expect("mark twice"));
        assert_eq!(db.list_notifications("boss", true).expect("unread").len(), 2);
        assert_eq!(db.list_notifications("boss", false).expect("all").len(), 3);
    }

    #[test]
    fn settings_are_seeded_and_merged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");

        let settings = db.get_settings().expect("settings");
        assert_eq!(settings.sweep_interval_seconds, 300);

        let updated = db
            .update_settings(serde_json::json!({ "utcOffsetMinutes": -180 }))
            .expect("update");
        assert_eq!(updated.utc_offset_minutes, -180);
        assert_eq!(updated.sweep_lookback_seconds, 360);
        assert_eq!(db.get_settings().expect("reload").utc_offset_minutes, -180);

        let err = db
            .update_settings(serde_json::json!({ "sweepLookbackSeconds": 120 }))
            .expect_err("lookback shorter than interval");
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn deleting_a_board_cascades_to_cards_and_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Board", None).expect("board");
        let card = db
            .create_card(card_payload(&board.id, "Card", t(8, 0), t(18, 0)))
            .expect("card");
        let item = db.create_item(&card.id, "a", 1).expect("item");

        let conn = db.conn().expect("conn");
        conn.execute("DELETE FROM boards WHERE id = ?1", [&board.id]).expect("delete");
        drop(conn);
        assert!(db.get_board(&board.id).expect("board").is_none());
        assert!(db.get_card_for_item(&item.id).expect("card").is_none());
    }

    #[test]
    fn structural_deletes_never_remove_log_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let user = db.create_user("Ana").expect("user");
        let team = db.create_team("Loja", None).expect("team");
        let board = db.create_board(&team.id, "Board", None).expect("board");
        let card = db
            .create_card(card_payload(&board.id, "Card", t(8, 0), t(18, 0)))
            .expect("card");
        let item = db.create_item(&card.id, "a", 1).expect("item");
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        db.append_entry(&item.id, &user.id, day, true, Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap())
            .expect("append");

        let conn = db.conn().expect("conn");
        for (sql, id) in [
            ("DELETE FROM boards WHERE id = ?1", &board.id),
            ("DELETE FROM cards WHERE id = ?1", &card.id),
            ("DELETE FROM items WHERE id = ?1", &item.id),
            ("DELETE FROM users WHERE id = ?1", &user.id),
        ] {
            assert!(conn.execute(sql, [id]).is_err(), "{} must be refused", sql);
        }
        drop(conn);

        assert_eq!(db.get_entries_for_user_and_date(&user.id, day).expect("entries").len(), 1);
        assert!(db.get_board(&board.id).expect("board").is_some());
    }
}
