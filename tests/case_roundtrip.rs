use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use strategy_lens::case_file::{CaseFile, read_case_file, read_match_record, write_case_file};
use strategy_lens::match_data::{HeroSlot, Team};
use strategy_lens::prediction::{PredictRequest, PredictResponse};
use strategy_lens::predictor_client::Predictor;
use strategy_lens::session::{PredictorSet, SessionState};
use strategy_lens::store::{ContextSort, MapStyle, Store, TimeWindow};

struct Offline;

impl Predictor for Offline {
    fn predict(&self, _request: &PredictRequest) -> Result<PredictResponse> {
        Err(anyhow::anyhow!("offline"))
    }
}

fn fresh_store() -> Store {
    let (name, record) =
        read_match_record(Path::new("tests/fixtures/match_small.json")).expect("fixture");
    let mut store = Store::new();
    store.set_dev_mode(false);
    store.set_data(name, record).expect("valid fixture");
    store
}

fn analysed_store() -> Store {
    let mut store = fresh_store();
    store.set_frame(6);
    store.focus_on(Some(HeroSlot::new(Team::Dire, 1).unwrap()));
    assert!(store.set_traj_time_window(TimeWindow(-4, 5)));
    assert!(store.predict_with(&Offline));
    store.add_context_limit("tiny", "life");
    store.add_tag(&[0, 3], "push").unwrap();
    store.select_predictors(&[0, 3], PredictorSet::Selected);
    store.select_predictors(&[5], PredictorSet::Compared);
    store
}

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("strategy_lens_{tag}_{nanos}"))
}

#[test]
fn save_then_load_restores_session() {
    let source = analysed_store();
    let case = source.save_case();
    assert_eq!(case.match_id, Some(12345));
    assert_eq!((case.focused_team, case.focused_player), (1, 1));

    let mut target = fresh_store();
    target.load_case(&case).unwrap();

    assert_eq!(target.focus(), source.focus());
    assert_eq!(target.frame(), 6);
    assert_eq!(target.time_window(), TimeWindow(-4, 5));
    assert!(target.has_context_limit("tiny", "life"));
    assert_eq!(target.predictions(), source.predictions());
    assert_eq!(target.prediction_groups(), source.prediction_groups());
    assert_eq!(target.selected_predictors(), &[0, 3]);
    assert_eq!(target.compared_predictors(), &[5]);
    assert_eq!(target.context_sort(), ContextSort::HighDiffFirst);
    assert_eq!(target.map_style(), source.map_style());
    assert_eq!(target.save_tags(), source.save_tags());
    assert_eq!(target.session_state(), SessionState::Settled);
    assert_eq!(target.save_case(), case);
}

#[test]
fn case_survives_disk_round_trip() {
    let source = analysed_store();
    let case = source.save_case();
    let dir = temp_dir("disk");
    let path = write_case_file(&dir, source.game_name(), &case).unwrap();
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("match_small_"));
    assert!(file_name.ends_with(".json"));

    let back: CaseFile = read_case_file(&path).unwrap();
    assert_eq!(back, case);

    // same content, same name
    let again = write_case_file(&dir, source.game_name(), &case).unwrap();
    assert_eq!(again, path);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_case_is_rejected_without_changes() {
    let mut store = analysed_store();
    let before = store.save_case();

    let mut bad_focus = before.clone();
    bad_focus.focused_player = 7;
    assert!(store.load_case(&bad_focus).is_err());

    let mut bad_frame = before.clone();
    bad_frame.frame = 500;
    assert!(store.load_case(&bad_frame).is_err());

    let mut bad_limit = before.clone();
    bad_limit.context_limit = vec!["no separator".to_string()];
    assert!(store.load_case(&bad_limit).is_err());

    let mut bad_tags = before.clone();
    bad_tags.tags = vec![Vec::new(); 21];
    assert!(store.load_case(&bad_tags).is_err());

    assert_eq!(store.save_case(), before);
}

#[test]
fn older_cases_without_optional_fields_load() {
    let mut store = fresh_store();
    let raw = r#"{
        "match_id": 999,
        "tags": [["a"], [], ["b", "c"]],
        "focusedTeam": 0,
        "focusedPlayer": 2,
        "frame": 2,
        "trajTimeWindow": [-2, 4],
        "contextLimit": ["Environment|||night"],
        "predictions": [],
        "predictionGroups": [],
        "selectedPredictors": [],
        "predictionProjection": [],
        "instancesData": {"groups": []}
    }"#;
    let case: CaseFile = serde_json::from_str(raw).unwrap();
    store.load_case(&case).unwrap();

    assert_eq!(store.focus(), Some(HeroSlot::new(Team::Radiant, 2).unwrap()));
    assert_eq!(store.time_window(), TimeWindow(-2, 4));
    assert!(store.has_context_limit("Environment", "night"));
    assert_eq!(store.map_style(), MapStyle::Colored);
    assert_eq!(store.context_sort(), ContextSort::Default);
    assert_eq!(store.session_state(), SessionState::Idle);
    assert!(store.tags().tags(2).unwrap().contains("c"));
    assert_eq!(store.save_tags().len(), 20);
    assert!(
        store
            .logs()
            .iter()
            .any(|l| l.starts_with("[WARN] Case was saved for match 999"))
    );
}

#[test]
fn window_that_does_not_fit_is_clamped() {
    let mut store = fresh_store();
    let mut case = store.save_case();
    case.frame = 1;
    case.traj_time_window = TimeWindow(-5, 2);
    store.load_case(&case).unwrap();
    assert_eq!(store.frame(), 1);
    assert_eq!(store.time_window(), TimeWindow(-1, 2));
    assert!(store.logs().iter().any(|l| l.contains("clamped")));
}

#[test]
fn round_trip_after_moving_the_cursor() {
    let mut source = fresh_store();
    assert!(source.set_traj_time_window(TimeWindow(0, 11)));
    source.set_frame(5);
    let case = source.save_case();

    let mut target = fresh_store();
    assert!(target.set_traj_time_window(TimeWindow(0, 3)));
    target.load_case(&case).unwrap();
    assert_eq!(target.time_window(), source.time_window());
    assert_eq!(target.save_case(), case);
}
