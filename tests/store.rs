use std::path::Path;

use anyhow::{Result, anyhow};
use serde_json::{Map, Value, json};

use strategy_lens::case_file::read_match_record;
use strategy_lens::match_data::{HeroSlot, MatchRecord, Position, Team};
use strategy_lens::prediction::{PredictRequest, PredictResponse, Prediction, empty_instances};
use strategy_lens::predictor_client::Predictor;
use strategy_lens::session::SessionState;
use strategy_lens::store::{ContextSort, MapStyle, Store, TimeWindow};

struct Offline;

impl Predictor for Offline {
    fn predict(&self, _request: &PredictRequest) -> Result<PredictResponse> {
        Err(anyhow!("offline"))
    }
}

// Answers with one certain prediction following `path`.
struct Replay(Vec<Position>);

impl Predictor for Replay {
    fn predict(&self, _request: &PredictRequest) -> Result<PredictResponse> {
        Ok(PredictResponse {
            predictions: vec![Prediction {
                idx: 0,
                probability: 1.0,
                trajectory: self.0.clone(),
                attention: Default::default(),
                extra: Map::new(),
            }],
            pred_groups: vec![vec![0]],
            pred_projection: vec![[0.0, 0.0]],
            pred_instances: empty_instances(),
        })
    }
}

// Builds a record where `pos(frame, team, slot)` places every hero.
fn record(
    frames: usize,
    names: [[&str; 5]; 2],
    pos: impl Fn(usize, usize, usize) -> [f64; 2],
) -> MatchRecord {
    let players = |team: usize| -> Value {
        json!({ "players": names[team].iter().map(|n| json!({ "hero": n })).collect::<Vec<_>>() })
    };
    let records: Vec<Value> = (0..frames)
        .map(|f| {
            let teams: Vec<Value> = (0..2)
                .map(|t| {
                    (0..5)
                        .map(|s| {
                            let [x, y] = pos(f, t, s);
                            json!({ "pos": [x, y], "life": 100.0 })
                        })
                        .collect()
                })
                .collect();
            json!({ "game_time": f as f64, "heroStates": teams })
        })
        .collect();
    serde_json::from_value(json!({
        "gameInfo": { "match_id": 1, "radiant": players(0), "dire": players(1) },
        "gameRecords": records,
    }))
    .expect("valid record json")
}

fn loaded_store() -> Store {
    let (name, record) =
        read_match_record(Path::new("tests/fixtures/match_small.json")).expect("fixture");
    let mut store = Store::new();
    store.set_dev_mode(false);
    store.set_data(name, record).expect("valid fixture");
    store
}

fn slot(team: Team, idx: usize) -> HeroSlot {
    HeroSlot::new(team, idx).unwrap()
}

#[test]
fn set_data_resets_selection() {
    let mut store = loaded_store();
    assert_eq!(store.game_name(), "match_small");
    assert_eq!(store.num_frames(), 12);
    store.set_frame(4);
    store.focus_on(Some(slot(Team::Radiant, 1)));
    store.add_context_limit("axe", "x");

    let (_, record) = read_match_record(Path::new("tests/fixtures/match_small.json")).unwrap();
    store.set_data("again", record).unwrap();
    assert_eq!(store.frame(), 0);
    assert_eq!(store.focus(), None);
    assert!(store.context_limit().is_empty());
    assert!(store.predictions().is_empty());
}

#[test]
fn invalid_record_leaves_store_untouched() {
    let mut store = loaded_store();
    store.set_frame(3);
    let empty: MatchRecord = serde_json::from_str(r#"{"gameRecords": []}"#).unwrap();
    assert!(store.set_data("broken", empty).is_err());
    assert_eq!(store.game_name(), "match_small");
    assert_eq!(store.frame(), 3);
}

#[test]
fn focusing_the_same_hero_twice_toggles_off() {
    let mut store = loaded_store();
    let axe = slot(Team::Radiant, 0);
    store.focus_on(Some(axe));
    assert_eq!(store.focus(), Some(axe));
    assert_eq!(store.focus_wire(), (0, 0));

    assert!(store.predict_with(&Offline));
    store.add_context_limit("axe", "x");
    assert!(!store.predictions().is_empty());

    store.focus_on(Some(axe));
    assert_eq!(store.focus(), None);
    assert_eq!(store.focus_wire(), (-1, -1));
    assert!(store.predictions().is_empty());
    assert!(store.context_limit().is_empty());

    store.add_context_limit("lina", "y");
    store.focus_on(Some(axe));
    assert_eq!(store.focus(), Some(axe));
    assert!(store.context_limit().is_empty());
    assert!(store.predict_with(&Offline));
    store.focus_on(Some(axe));
    assert!(store.predictions().is_empty());
    assert_eq!(store.session_state(), SessionState::Idle);

    assert!(store.focus_on_player(1, 2));
    assert_eq!(store.focus(), Some(slot(Team::Dire, 2)));
    assert!(!store.focus_on_player(1, 9));
    assert_eq!(store.focus(), Some(slot(Team::Dire, 2)));
}

#[test]
fn focus_and_frame_changes_clear_context_limit() {
    let mut store = loaded_store();
    store.add_context_limit("axe", "x");
    assert!(store.has_context_limit("axe", "x"));
    store.set_frame(2);
    assert!(!store.has_context_limit("axe", "x"));

    store.add_context_limit("Environment", "night");
    store.focus_on(Some(slot(Team::Radiant, 0)));
    assert!(store.context_limit().is_empty());
}

#[test]
fn frames_past_the_end_are_ignored() {
    let mut store = loaded_store();
    assert!(store.set_frame(11));
    assert!(!store.set_frame(12));
    assert_eq!(store.frame(), 11);
    assert_eq!(store.cur_time(), -30.0 + 30.0 * 11.0);
}

#[test]
fn time_window_must_stay_inside_record() {
    let mut store = loaded_store();
    assert!(store.set_traj_time_window(TimeWindow(0, 11)));
    assert!(!store.set_traj_time_window(TimeWindow(0, 12)));
    assert!(!store.set_traj_time_window(TimeWindow(-1, 5)));
    assert_eq!(store.time_window(), TimeWindow(0, 11));

    store.set_frame(5);
    assert!(store.set_traj_time_window(TimeWindow(-5, 6)));
    assert!(!store.set_traj_time_window(TimeWindow(-6, 6)));
}

#[test]
fn moving_the_cursor_shrinks_the_window_to_fit() {
    let mut store = loaded_store();
    assert_eq!(store.time_window(), TimeWindow(0, 11));
    assert!(store.set_traj_time_window(TimeWindow(0, 11)));
    store.set_frame(5);
    assert_eq!(store.time_window(), TimeWindow(0, 6));
    assert!(store.set_traj_time_window(TimeWindow(-5, 6)));
    store.set_frame(2);
    assert_eq!(store.time_window(), TimeWindow(-2, 6));
    store.set_frame(11);
    assert_eq!(store.time_window(), TimeWindow(-2, 0));
}

#[test]
fn window_rejected_without_data() {
    let mut store = Store::new();
    assert!(!store.set_traj_time_window(TimeWindow(0, 0)));
    assert_eq!(store.player_positions()[0][0], [0.0, 0.0]);
    assert!(store.selected_player_trajectory().is_empty());
    assert!(store.cur_context().is_empty());
}

#[test]
fn trajectories_follow_cursor_and_window() {
    let mut store = loaded_store();
    store.set_frame(5);
    assert!(store.selected_player_trajectory().is_empty());

    let lina = slot(Team::Radiant, 1);
    store.focus_on(Some(lina));
    // frame 0 is never part of a path
    let full = store.selected_player_trajectory();
    assert_eq!(full.len(), 11);
    assert_eq!(full[0], [1.0 + 1.0, 22.0 + 0.5]);

    // [frame - 2, frame + 3) = frames 3..8
    assert!(store.set_traj_time_window(TimeWindow(-2, 3)));
    let windowed = store.selected_player_trajectory_in_time_window();
    assert_eq!(windowed.len(), 5);
    assert_eq!(windowed[0], [1.0 + 3.0, 22.0 + 1.5]);
    assert_eq!(windowed[4], [1.0 + 7.0, 22.0 + 3.5]);

    let all = store.all_player_trajectory();
    assert!(all.iter().flatten().all(|t| t.len() == 11));
    assert_eq!(all[1][4][0], [15.0, 28.5]);
}

#[test]
fn derived_views_recompute_after_input_changes() {
    let mut store = loaded_store();
    store.focus_on(Some(slot(Team::Radiant, 0)));
    let first = store.selected_player_trajectory_in_time_window();
    let again = store.selected_player_trajectory_in_time_window();
    assert!(std::rc::Rc::ptr_eq(&first, &again));

    assert!(store.set_traj_time_window(TimeWindow(0, 2)));
    let narrowed = store.selected_player_trajectory_in_time_window();
    assert_eq!(narrowed.len(), 1);
    assert_ne!(first.len(), narrowed.len());

    let ctx0 = store.cur_context();
    store.set_frame(1);
    let ctx1 = store.cur_context();
    assert_ne!(ctx0.get("axe", "x"), ctx1.get("axe", "x"));
}

#[test]
fn life_states_and_names() {
    let store = loaded_store();
    let names = store.player_names();
    assert_eq!(names[0][0], "axe");
    assert_eq!(names[1][4], "ursa");
    let alive = store.player_life_states();
    assert!(alive[0].iter().all(|&a| a));
    assert!(!alive[1][4]);
    assert!(alive[1][3]);
}

#[test]
fn context_limit_counts_cover_every_group() {
    let mut store = loaded_store();
    store.add_context_limit("axe", "x");
    store.add_context_limit("axe", "y");
    store.add_context_limit("Environment", "night");
    store.add_context_limit("axe", "x");

    let counts = store.context_limit_counts();
    assert_eq!(counts.len(), 13);
    assert_eq!(counts["axe"], 2);
    assert_eq!(counts["Environment"], 1);
    assert_eq!(counts["lina"], 0);
    assert_eq!(counts["Radiant"], 0);

    store.rm_context_limit("axe", "y");
    assert_eq!(store.context_limit_counts()["axe"], 1);
    store.clear_context_limit();
    assert!(store.context_limit_counts().values().all(|&c| c == 0));
}

#[test]
fn context_groups_and_environment() {
    let mut store = loaded_store();
    let ctx = store.cur_context();
    assert_eq!(ctx.get("Environment", "pre_game"), Some(1.0));
    assert_eq!(ctx.get("Dire", "alive"), Some(4.0));
    assert_eq!(ctx.get("ursa", "alive"), Some(0.0));

    store.set_frame(11);
    let ctx = store.cur_context();
    assert_eq!(ctx.get("Environment", "game_time"), Some(300.0));
    assert_eq!(ctx.get("Environment", "night"), Some(1.0));
}

#[test]
fn map_style_and_sort_defaults() {
    let mut store = loaded_store();
    assert_eq!(store.map_style(), MapStyle::Colored);
    assert_eq!(store.map_image(), "./map.jpeg");
    assert_eq!(store.context_sort(), ContextSort::Default);
    store.set_map_style(MapStyle::Sketch);
    assert_eq!(store.map_image(), "./map_no_color.jpg");
}

#[test]
fn tags_survive_prediction_clears() {
    let mut store = loaded_store();
    store.add_tag(&[0, 2], "gank").unwrap();
    store.set_frame(3);
    assert!(store.tags().tags(0).unwrap().contains("gank"));
    let clusters = store.cluster_tags(&[0, 1, 2]).unwrap();
    assert_eq!(clusters[&0], vec!["gank".to_string()]);
    assert!(store.add_tag(&[25], "x").is_err());
}

#[test]
fn store_trajectory_stats_bin_a_replayed_walk() {
    let path = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
    let walk = record(3, [["a", "b", "c", "d", "e"], ["f", "g", "h", "i", "j"]], |f, t, s| {
        if (t, s) == (0, 0) {
            path[f]
        } else {
            [5.0 + s as f64, 5.0 + t as f64]
        }
    });
    let mut store = Store::new();
    store.set_dev_mode(false);
    store.set_data("walk", walk).unwrap();
    store.focus_on(Some(slot(Team::Radiant, 0)));
    assert!(store.predict_with(&Replay(path.to_vec())));

    let stats = store.trajectory_stats((0.0, 1.0), (0.0, 1.0), 2, 2, &[0]);
    let (x, _) = &*stats;
    assert_eq!(x[0][0].probability, 1.0);
    assert_eq!(x[1][1].probability, 1.0);
    let dir = x[0][0].mean_direction().unwrap();
    assert!((dir[0] - 1.0).abs() < 1e-12 && dir[1].abs() < 1e-12);
}

#[test]
fn limit_counts_follow_renamed_duplicate_heroes() {
    let twins = record(2, [["axe", "b", "c", "d", "e"], ["axe", "g", "h", "i", "j"]], |f, t, s| {
        [f as f64 + s as f64, t as f64]
    });
    let mut store = Store::new();
    store.set_data("twins", twins).unwrap();
    let renamed = store
        .cur_context()
        .groups
        .keys()
        .find(|g| g.starts_with("axe ("))
        .cloned()
        .expect("duplicate hero gets a seat suffix");

    store.add_context_limit(&renamed, "x");
    store.add_context_limit("axe", "y");
    let counts = store.context_limit_counts();
    assert_eq!(counts[&renamed], 1);
    assert_eq!(counts["axe"], 1);
}
