use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use daily_checklist::clock::FixedClock;
use daily_checklist::db::Database;
use daily_checklist::models::{CardStatus, CreateCardPayload};
use daily_checklist::{AppError, ChecklistCore};
use std::sync::Arc;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

struct Store {
    _dir: tempfile::TempDir,
    core: Arc<ChecklistCore>,
    clock: Arc<FixedClock>,
    team_id: String,
    supervisor_id: String,
    user_id: String,
    card_id: String,
    items: Vec<String>,
}

fn closing_card_store() -> Store {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(Database::new(&dir.path().join("checklist.sqlite")).expect("db"));
    let clock = Arc::new(FixedClock::new(at(8, 30)));
    let core = ChecklistCore::with_parts(db.clone(), db.clone(), clock.clone()).expect("core");

    let supervisor = db.create_user("Marta").expect("supervisor");
    let user = db.create_user("Ana").expect("user");
    let team = db.create_team("Loja Centro", Some(&supervisor.id)).expect("team");
    db.add_team_member(&team.id, &user.id).expect("member");
    let board = db.create_board(&team.id, "Rotina diária", None).expect("board");
    let card = db
        .create_card(CreateCardPayload {
            board_id: board.id,
            title: "Operação do dia".to_string(),
            open_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            position: None,
        })
        .expect("card");
    let items = ["Abrir caixa", "Conferir estoque", "Limpar vitrine"]
        .iter()
        .enumerate()
        .map(|(index, description)| {
            db.create_item(&card.id, description, (index as i32 + 1) * 10)
                .expect("item")
                .id
        })
        .collect();

    Store {
        _dir: dir,
        core,
        clock,
        team_id: team.id,
        supervisor_id: supervisor.id,
        user_id: user.id,
        card_id: card.id,
        items,
    }
}

#[test]
fn closed_incomplete_card_raises_exactly_one_alert() {
    let store = closing_card_store();

    store.clock.set(at(9, 0));
    store.core.toggle(&store.items[0], &store.user_id, today(), true).expect("item 1");
    store.clock.set(at(9, 5));
    store.core.toggle(&store.items[1], &store.user_id, today(), true).expect("item 2");

    store.clock.set(at(18, 3));
    let first = store.core.run_sweep().expect("first sweep");
    assert_eq!(first.alerts_created, 1);
    assert!(first.failures.is_empty());

    let second = store.core.run_sweep().expect("second sweep");
    assert_eq!(second.alerts_created, 0);
    assert_eq!(second.duplicates_suppressed, 1);

    let alerts = store.core.list_notifications(&store.supervisor_id, false).expect("alerts");
    assert_eq!(alerts.len(), 1);
    let expected_key = format!("auto:fechado:{}:{}:2026-03-10", store.card_id, store.user_id);
    assert_eq!(alerts[0].dedup_key.as_deref(), Some(expected_key.as_str()));
    assert_eq!(alerts[0].team_id, store.team_id);
    assert!(alerts[0].body.contains("Ana"));
    assert!(alerts[0].body.contains("Operação do dia"));
}

#[test]
fn late_completion_neither_reopens_the_card_nor_retracts_the_alert() {
    let store = closing_card_store();
    store.clock.set(at(9, 0));
    store.core.toggle(&store.items[0], &store.user_id, today(), true).expect("item 1");
    store.core.toggle(&store.items[1], &store.user_id, today(), true).expect("item 2");

    store.clock.set(at(18, 3));
    assert_eq!(store.core.run_sweep().expect("sweep").alerts_created, 1);

    store.clock.set(at(19, 30));
    let err = store
        .core
        .toggle(&store.items[2], &store.user_id, today(), true)
        .expect_err("window closed");
    assert!(matches!(err, AppError::OutsideWindow(_)));

    let view = store.core.get_day_view(&store.team_id, &store.user_id, today()).expect("view");
    let card = &view[0].cards[0];
    assert_eq!(card.status, CardStatus::Fechado);
    assert_eq!(card.items.iter().filter(|item| item.checked).count(), 2);

    store.clock.set(at(18, 4));
    let rerun = store.core.run_sweep().expect("rerun");
    assert_eq!(rerun.alerts_created, 0);
    assert_eq!(store.core.list_notifications(&store.supervisor_id, false).expect("alerts").len(), 1);
}

#[test]
fn late_entry_in_the_log_shows_complete_but_keeps_the_card_closed_and_alerted() {
    let store = closing_card_store();
    store.clock.set(at(9, 0));
    store.core.toggle(&store.items[0], &store.user_id, today(), true).expect("item 1");
    store.clock.set(at(9, 5));
    store.core.toggle(&store.items[1], &store.user_id, today(), true).expect("item 2");

    store.clock.set(at(18, 3));
    assert_eq!(store.core.run_sweep().expect("sweep").alerts_created, 1);

    store
        .core
        .database()
        .append_entry(&store.items[2], &store.user_id, today(), true, at(19, 30))
        .expect("late entry");

    store.clock.set(at(19, 31));
    let view = store.core.get_day_view(&store.team_id, &store.user_id, today()).expect("view");
    let card = &view[0].cards[0];
    assert_eq!(card.status, CardStatus::Fechado);
    assert!(card.items.iter().all(|item| item.checked));

    store.clock.set(at(18, 4));
    let rerun = store.core.run_sweep().expect("rerun");
    assert_eq!(rerun.incomplete_pairs, 0);
    assert_eq!(rerun.alerts_created, 0);
    assert_eq!(store.core.list_notifications(&store.supervisor_id, false).expect("alerts").len(), 1);
}

#[test]
fn toggle_rejects_other_days_even_inside_window_hours() {
    let store = closing_card_store();
    store.clock.set(at(12, 0));
    for date in [today().pred_opt().unwrap(), today().succ_opt().unwrap()] {
        let err = store
            .core
            .toggle(&store.items[0], &store.user_id, date, true)
            .expect_err("not today");
        assert!(matches!(err, AppError::InvalidDate(_)));
    }
    assert!(store
        .core
        .item_history(&store.items[0], &store.user_id, today())
        .expect("history")
        .is_empty());
}

#[test]
fn completed_card_is_not_alerted() {
    let store = closing_card_store();
    store.clock.set(at(17, 59));
    for item in &store.items {
        store.core.toggle(item, &store.user_id, today(), true).expect("check");
    }

    store.clock.set(at(18, 2));
    let report = store.core.run_sweep().expect("sweep");
    assert_eq!(report.pairs_evaluated, 1);
    assert_eq!(report.incomplete_pairs, 0);
    assert!(store.core.list_notifications(&store.supervisor_id, false).expect("alerts").is_empty());
}

#[test]
fn settings_offset_moves_today_for_every_operation() {
    let store = closing_card_store();
    store
        .core
        .update_settings(serde_json::json!({ "utcOffsetMinutes": -180 }))
        .expect("settings");

    // 02:00 UTC on the 10th is still 23:00 on the 9th locally.
    store.clock.set(at(2, 0));
    let view = store.core.get_day_view(&store.team_id, &store.user_id, today()).expect("view");
    assert_eq!(view[0].cards[0].status, CardStatus::Futuro);

    // 12:00 UTC is 09:00 locally.
    store.clock.set(at(12, 0));
    store.core.toggle(&store.items[0], &store.user_id, today(), true).expect("local morning");
    let view = store.core.get_day_view(&store.team_id, &store.user_id, today()).expect("view");
    assert_eq!(view[0].cards[0].status, CardStatus::Aberto);
}
