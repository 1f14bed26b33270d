use crate::clock::{wall_clock, Clock, SystemClock};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActionLogEntry, BoardView, CardView, ChecklistSettings, ItemView, Notification, SweepReport,
};
use crate::notifications::NotificationSink;
use crate::reconstruct::reconstruct;
use crate::recorder;
use crate::scheduler::{executor_fn, Scheduler};
use crate::sweeper::Sweeper;
use crate::window::card_status;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;

const DATABASE_FILE: &str = "checklist.sqlite";

/// Entry point wiring the store, clock, sweeper and its scheduler.
///
/// Every operation takes the team and user explicitly; nothing is read
/// from an ambient request context.
#[derive(Clone)]
pub struct ChecklistCore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    sweeper: Arc<Sweeper>,
    scheduler: Scheduler,
}

impl ChecklistCore {
    pub fn new(app_data_dir: PathBuf) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&app_data_dir.join(DATABASE_FILE))?);
        Self::with_parts(db.clone(), db, Arc::new(SystemClock))
    }

    pub fn with_parts(
        db: Arc<Database>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Arc<Self>> {
        let settings = db.get_settings()?;
        let scheduler = Scheduler::new(Duration::from_secs(settings.sweep_interval_seconds.max(1)));
        let sweeper = Arc::new(Sweeper::new(db.clone(), sink, clock.clone()));

        let this = Arc::new(Self {
            db,
            clock,
            sweeper,
            scheduler: scheduler.clone(),
        });

        let weak = Arc::downgrade(&this);
        scheduler.set_executor(executor_fn(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(strong) => strong.sweep_in_background().await,
                    None => true,
                }
            }
        }));

        Ok(this)
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn start_sweeper(&self) {
        self.scheduler.start();
    }

    pub fn trigger_sweep(&self) {
        self.scheduler.trigger_now();
    }

    pub fn stop_sweeper(&self) {
        self.scheduler.shutdown();
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Boards visible to `user_id` in `team_id`, with each item's checked state
    /// rebuilt from the log for `date` and each card's status as of now.
    pub fn get_day_view(&self, team_id: &str, user_id: &str, date: NaiveDate) -> AppResult<Vec<BoardView>> {
        if self.db.get_team(team_id)?.is_none() {
            return Err(AppError::NotFound(format!("Team {} not found", team_id)));
        }
        if self.db.get_user(user_id)?.is_none() {
            return Err(AppError::UserNotFound(format!("User {} not found", user_id)));
        }
        if !self.db.is_team_member(team_id, user_id)? {
            return Err(AppError::AccessDenied(format!(
                "User {} is not a member of team {}",
                user_id, team_id
            )));
        }

        let settings = self.db.get_settings()?;
        let wall = wall_clock(self.clock.now(), settings.utc_offset_minutes);
        let entries = self.db.get_entries_for_user_and_date(user_id, date)?;

        let boards = self
            .db
            .get_boards_for_team(team_id)?
            .into_iter()
            .filter(|board| board.is_visible_to(user_id))
            .map(|board| {
                let cards = board
                    .cards
                    .iter()
                    .map(|card| {
                        let state = reconstruct(&card.items, &entries);
                        CardView {
                            id: card.id.clone(),
                            title: card.title.clone(),
                            open_time: card.open_time,
                            close_time: card.close_time,
                            status: card_status(card, date, wall.today, wall.now),
                            items: card
                                .items
                                .iter()
                                .map(|item| ItemView {
                                    id: item.id.clone(),
                                    description: item.description.clone(),
                                    position: item.position,
                                    checked: state.get(&item.id).copied().unwrap_or(false),
                                })
                                .collect(),
                        }
                    })
                    .collect();
                BoardView {
                    id: board.id,
                    name: board.name,
                    target_user_id: board.target_user_id,
                    cards,
                }
            })
            .collect();
        Ok(boards)
    }

    pub fn toggle(&self, item_id: &str, user_id: &str, date: NaiveDate, value: bool) -> AppResult<ActionLogEntry> {
        let settings = self.db.get_settings()?;
        recorder::record(
            &self.db,
            self.clock.as_ref(),
            settings.utc_offset_minutes,
            item_id,
            user_id,
            date,
            value,
        )
    }

    /// Every mark/unmark of one item by one user on one day, oldest first.
    pub fn item_history(&self, item_id: &str, user_id: &str, date: NaiveDate) -> AppResult<Vec<ActionLogEntry>> {
        if self.db.get_card_for_item(item_id)?.is_none() {
            return Err(AppError::ItemNotFound(format!("Item {} not found", item_id)));
        }
        self.db.get_entries_for_item(item_id, user_id, date)
    }

    pub fn run_sweep(&self) -> AppResult<SweepReport> {
        self.sweeper.run()
    }

    async fn sweep_in_background(&self) -> bool {
        let sweeper = self.sweeper.clone();
        match tokio::task::spawn_blocking(move || sweeper.run()).await {
            Ok(Ok(report)) => !report.failures.is_empty(),
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "closed card sweep failed");
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "closed card sweep task panicked");
                true
            }
        }
    }

    pub fn list_notifications(&self, recipient_id: &str, unread_only: bool) -> AppResult<Vec<Notification>> {
        self.db.list_notifications(recipient_id, unread_only)
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> AppResult<bool> {
        self.db.mark_notification_read(notification_id)
    }

    pub fn get_settings(&self) -> AppResult<ChecklistSettings> {
        self.db.get_settings()
    }

    /// Persists a partial settings update. The sweep cadence takes effect on
    /// the next start; the offset and lookback apply to the next run, so the
    /// lookback is checked against the cadence that is actually running.
    pub fn update_settings(&self, settings: serde_json::Value) -> AppResult<ChecklistSettings> {
        let updated = self
            .db
            .update_settings_within(settings, self.scheduler.period().as_secs())?;
        if Duration::from_secs(updated.sweep_interval_seconds) != self.scheduler.period() {
            tracing::info!(
                interval_secs = updated.sweep_interval_seconds,
                "sweep interval changed; applies after restart"
            );
        }
        Ok(updated)
    }
}
