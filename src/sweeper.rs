use crate::clock::{wall_clock, Clock};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{
    Board, Card, ChecklistSettings, NotificationRequest, NotificationStatus, SweepFailure, SweepReport, Team,
};
use crate::notifications::{closed_card_body, closed_card_dedup_key, NotificationSink};
use crate::reconstruct::{all_checked, reconstruct};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use std::sync::Arc;

const MAX_LOOKBACK_SECONDS: i64 = 23 * 3600;

enum PairOutcome {
    Complete,
    Alerted(NotificationStatus),
}

struct Incident<'a> {
    date: NaiveDate,
    observed_at: DateTime<Utc>,
    settings: &'a ChecklistSettings,
}

/// Finds cards that closed within the trailing window and alerts the team
/// supervisor for every obligated user who left items unchecked.
///
/// Re-running over the same window is safe: every alert carries a dedup key
/// per (card, user, day) and the sink drops keys it has already seen.
pub struct Sweeper {
    db: Arc<Database>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    pub fn new(db: Arc<Database>, sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self { db, sink, clock }
    }

    pub fn run(&self) -> AppResult<SweepReport> {
        let settings = self.db.get_settings()?;
        self.run_at(self.clock.now(), &settings)
    }

    pub fn run_at(&self, instant: DateTime<Utc>, settings: &ChecklistSettings) -> AppResult<SweepReport> {
        let wall = wall_clock(instant, settings.utc_offset_minutes);
        let end = wall.now.with_nanosecond(0).unwrap_or(wall.now);
        let lookback = i64::try_from(settings.sweep_lookback_seconds)
            .unwrap_or(MAX_LOOKBACK_SECONDS)
            .min(MAX_LOOKBACK_SECONDS);
        let (start, _) = end.overflowing_sub_signed(Duration::seconds(lookback));

        let cards = self.db.get_cards_closing_between(start, end)?;
        let mut report = SweepReport::default();

        for card in &cards {
            report.cards_inspected += 1;
            if card.items.is_empty() {
                continue;
            }
            let incident = Incident {
                date: incident_date(card.close_time, end, wall.today),
                observed_at: instant,
                settings,
            };
            if let Err(error) = self.sweep_card(card, &incident, &mut report) {
                tracing::warn!(card_id = %card.id, error = %error, "closed card could not be evaluated");
                report.failures.push(SweepFailure {
                    card_id: card.id.clone(),
                    user_id: None,
                    error: error.to_string(),
                });
            }
        }

        if report.cards_inspected > 0 || !report.failures.is_empty() {
            tracing::info!(
                window_start = %start,
                window_end = %end,
                cards = report.cards_inspected,
                pairs = report.pairs_evaluated,
                incomplete = report.incomplete_pairs,
                created = report.alerts_created,
                duplicates = report.duplicates_suppressed,
                failures = report.failures.len(),
                "closed card sweep finished"
            );
        } else {
            tracing::debug!(window_start = %start, window_end = %end, "closed card sweep found nothing");
        }
        Ok(report)
    }

    fn sweep_card(&self, card: &Card, incident: &Incident<'_>, report: &mut SweepReport) -> AppResult<()> {
        let board = self
            .db
            .get_board(&card.board_id)?
            .ok_or_else(|| AppError::NotFound(format!("Board {} not found", card.board_id)))?;
        let team = self
            .db
            .get_team(&board.team_id)?
            .ok_or_else(|| AppError::NotFound(format!("Team {} not found", board.team_id)))?;

        let obligated = match board.target_user_id.as_deref() {
            Some(user_id) => vec![user_id.to_string()],
            None => self.db.list_team_member_ids(&team.id)?,
        };

        for user_id in obligated {
            report.pairs_evaluated += 1;
            match self.evaluate_pair(card, &board, &team, &user_id, incident) {
                Ok(PairOutcome::Complete) => {}
                Ok(PairOutcome::Alerted(status)) => {
                    report.incomplete_pairs += 1;
                    match status {
                        NotificationStatus::Created => report.alerts_created += 1,
                        NotificationStatus::Duplicate => report.duplicates_suppressed += 1,
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        card_id = %card.id,
                        user_id = %user_id,
                        error = %error,
                        "closed card check failed for user"
                    );
                    report.failures.push(SweepFailure {
                        card_id: card.id.clone(),
                        user_id: Some(user_id.clone()),
                        error: error.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn evaluate_pair(
        &self,
        card: &Card,
        board: &Board,
        team: &Team,
        user_id: &str,
        incident: &Incident<'_>,
    ) -> AppResult<PairOutcome> {
        let date = incident.date;
        let entries = self.db.get_entries_for_user_and_date(user_id, date)?;
        let state = reconstruct(&card.items, &entries);
        if all_checked(&card.items, &state) {
            return Ok(PairOutcome::Complete);
        }

        let supervisor_id = team
            .supervisor_id
            .as_deref()
            .ok_or_else(|| AppError::NotFound(format!("Team {} has no supervisor", team.id)))?;
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| AppError::UserNotFound(format!("User {} not found", user_id)))?;

        let request = NotificationRequest {
            team_id: team.id.clone(),
            recipient_id: supervisor_id.to_string(),
            sender_id: None,
            title: incident.settings.alert_title.clone(),
            body: closed_card_body(&user.name, &card.title, &board.name, date),
            dedup_key: Some(closed_card_dedup_key(&card.id, user_id, date)),
            requested_at: incident.observed_at,
        };
        let status = self.sink.request(&request)?;
        if status == NotificationStatus::Created {
            tracing::info!(card_id = %card.id, user_id = %user_id, date = %date, "incomplete card alert raised");
        }
        Ok(PairOutcome::Alerted(status))
    }
}

/// A close time later in the day than the window end can only have been
/// reached through a wrap past midnight, so it belongs to yesterday.
fn incident_date(close_time: NaiveTime, window_end: NaiveTime, today: NaiveDate) -> NaiveDate {
    if close_time < window_end {
        today
    } else {
        today.pred_opt().unwrap_or(today)
    }
}
