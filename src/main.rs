use std::env;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use strategy_lens::case_file::{read_case_file, read_match_record, write_case_file};
use strategy_lens::match_data::{HeroSlot, team_label};
use strategy_lens::predictor_client::HttpPredictor;
use strategy_lens::provider::spawn_predictor_worker;
use strategy_lens::store::{Store, apply_delta};
use strategy_lens::traj_stat::hottest_cells;

const USAGE: &str = "usage: strategy_lens <match.json> [--case <case.json>] \
[--focus <team>:<player>] [--frame <n>] [--predict] [--save]";

const MAP_RANGE: (f64, f64) = (0.0, 128.0);
const GRID_SIZE: usize = 16;
const TIME_STEPS: usize = 8;

#[derive(Debug, Default)]
struct Args {
    match_path: PathBuf,
    case_path: Option<PathBuf>,
    focus: Option<(i64, i64)>,
    frame: Option<usize>,
    predict: bool,
    save: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut match_path = None;
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--case" => {
                args.case_path = Some(iter.next().map(PathBuf::from).context(USAGE)?);
            }
            "--focus" => {
                let raw = iter.next().context(USAGE)?;
                let (team, player) = raw
                    .split_once(':')
                    .ok_or_else(|| anyhow!("--focus expects <team>:<player>, got {raw}"))?;
                args.focus = Some((team.trim().parse()?, player.trim().parse()?));
            }
            "--frame" => {
                args.frame = Some(iter.next().context(USAGE)?.parse()?);
            }
            "--predict" => args.predict = true,
            "--save" => args.save = true,
            "-h" | "--help" => bail!(USAGE),
            other if match_path.is_none() && !other.starts_with("--") => {
                match_path = Some(PathBuf::from(other));
            }
            other => bail!("unexpected argument {other}\n{USAGE}"),
        }
    }
    args.match_path = match_path.context(USAGE)?;
    Ok(args)
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = parse_args()?;
    let (game_name, record) = read_match_record(&args.match_path)?;
    let mut store = Store::new();
    store.set_data(game_name, record)?;

    if let Some(path) = &args.case_path {
        let case = read_case_file(path)?;
        store.load_case(&case)?;
    }
    if let Some(frame) = args.frame
        && !store.set_frame(frame)
    {
        bail!(
            "frame {frame} outside the record ({} frames)",
            store.num_frames()
        );
    }
    if let Some((team, player)) = args.focus
        && store.focus_wire() != (team, player)
        && !store.focus_on_player(team, player)
    {
        bail!("invalid focus {team}:{player}");
    }

    if args.predict {
        run_prediction(&mut store)?;
    }

    print_summary(&store);

    if args.save {
        let dir = env::var("LENS_CASE_DIR")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let path = write_case_file(&dir, store.game_name(), &store.save_case())?;
        println!("Saved case: {}", path.display());
    }

    for line in store.logs() {
        eprintln!("{line}");
    }
    Ok(())
}

fn run_prediction(store: &mut Store) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let worker = spawn_predictor_worker(HttpPredictor::from_env(), tx, cmd_rx);

    if store.predict_via(&cmd_tx) {
        while store.is_waiting() {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(delta) => apply_delta(store, delta),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    store.abandon_prediction("predictor worker stopped");
                    break;
                }
            }
        }
    }
    drop(cmd_tx);
    while let Ok(delta) = rx.try_recv() {
        apply_delta(store, delta);
    }
    let _ = worker.join();
    Ok(())
}

fn print_summary(store: &Store) {
    println!("Match: {} ({} frames)", store.game_name(), store.num_frames());
    println!("Frame: {} (t={:.1}s)", store.frame(), store.cur_time());

    let names = store.player_names();
    let alive = store.player_life_states();
    for slot in HeroSlot::all() {
        let (t, p) = (slot.team.index(), slot.slot);
        let marker = if store.focus() == Some(slot) { '*' } else { ' ' };
        println!(
            "{marker} {} {}: {}{}",
            team_label(slot.team),
            p,
            names[t][p],
            if alive[t][p] { "" } else { " (dead)" }
        );
    }

    let predictions = store.predictions();
    if predictions.is_empty() {
        println!("Predictions: none ({:?})", store.session_state());
        return;
    }
    println!(
        "Predictions: {} in {} groups ({:?})",
        predictions.len(),
        store.prediction_groups().len(),
        store.session_state()
    );
    for (g, members) in store.prediction_groups().iter().enumerate() {
        let Some(strategy) = store.strategy_from_predictions(members) else {
            continue;
        };
        println!(
            "  group {g}: {} predictors, p={:.3}",
            strategy.predictors.len(),
            strategy.total_probability()
        );
        let stats = store.trajectory_stats(MAP_RANGE, MAP_RANGE, GRID_SIZE, TIME_STEPS, members);
        for (space, time, cell) in hottest_cells(&stats.0, 3) {
            println!(
                "    x-cell {space} t{time}: p={:.3} from {} predictors",
                cell.probability,
                cell.prediction_idxes.len()
            );
        }
    }
}
