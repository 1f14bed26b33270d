use crate::clock::{wall_clock, Clock};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::ActionLogEntry;
use crate::window::{card_status, CardWindow};
use chrono::NaiveDate;

/// Validates a mark/unmark request and appends it to the action log.
///
/// Checks run in a fixed order so each failure kind is reported
/// deterministically: unknown item, wrong day, closed window, unknown user.
pub fn record(
    db: &Database,
    clock: &dyn Clock,
    utc_offset_minutes: i32,
    item_id: &str,
    user_id: &str,
    reference_date: NaiveDate,
    value: bool,
) -> AppResult<ActionLogEntry> {
    let card = db
        .get_card_for_item(item_id)?
        .ok_or_else(|| AppError::ItemNotFound(format!("Item {} not found", item_id)))?;

    let instant = clock.now();
    let wall = wall_clock(instant, utc_offset_minutes);
    if reference_date != wall.today {
        return Err(AppError::InvalidDate(format!(
            "Reference date {} is not today ({})",
            reference_date, wall.today
        )));
    }

    let status = card_status(&card, reference_date, wall.today, wall.now);
    if !status.accepts_actions() {
        let window = CardWindow::of(&card);
        return Err(AppError::OutsideWindow(format!(
            "Card {} accepts actions between {} and {} (now {}, status {})",
            card.id,
            window.open_time,
            window.close_time,
            wall.now.format("%H:%M:%S"),
            status.as_str()
        )));
    }

    if db.get_user(user_id)?.is_none() {
        return Err(AppError::UserNotFound(format!("User {} not found", user_id)));
    }

    let entry = db.append_entry(item_id, user_id, reference_date, value, instant)?;
    tracing::debug!(
        item_id = %entry.item_id,
        user_id = %entry.user_id,
        reference_date = %entry.reference_date,
        value = entry.value,
        seq = entry.seq,
        "action recorded"
    );
    Ok(entry)
}
