use crate::models::{Card, CardStatus};
use chrono::{NaiveDate, NaiveTime};

/// Daily open/close window of a card. The window recurs every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardWindow {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl CardWindow {
    pub fn of(card: &Card) -> Self {
        Self {
            open_time: card.open_time,
            close_time: card.close_time,
        }
    }

    pub fn contains(&self, now: NaiveTime) -> bool {
        self.open_time <= now && now <= self.close_time
    }
}

/// Status of a card for `reference_date`, evaluated at local `today`/`now`.
///
/// Past days are always `Historico` and future days `Futuro`, whatever `now`
/// is. For today, the open and close bounds are both inclusive.
pub fn status(window: CardWindow, reference_date: NaiveDate, today: NaiveDate, now: NaiveTime) -> CardStatus {
    if reference_date < today {
        return CardStatus::Historico;
    }
    if reference_date > today {
        return CardStatus::Futuro;
    }
    if now < window.open_time {
        return CardStatus::Pendente;
    }
    if now > window.close_time {
        return CardStatus::Fechado;
    }
    CardStatus::Aberto
}

pub fn card_status(card: &Card, reference_date: NaiveDate, today: NaiveDate, now: NaiveTime) -> CardStatus {
    status(CardWindow::of(card), reference_date, today, now)
}
