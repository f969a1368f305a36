use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::case_file::CaseFile;
use crate::context::{Context, ContextKey, ContextLimit, gen_context};
use crate::fallback::{fallback_predictions, fallback_seed};
use crate::match_data::{HeroSlot, MatchRecord, NUM_TEAMS, Position, TEAM_SIZE, Team};
use crate::memo::{Memo, MemoMap};
use crate::prediction::{PredictRequest, PredictResponse, Prediction, Strategy};
use crate::predictor_client::Predictor;
use crate::session::{PredictTicket, PredictionSession, PredictorSet, SessionState};
use crate::tags::TagRegistry;
use crate::traj_stat::{StatGrid, traj_stat};

pub const LOOKBACK_FRAMES: usize = 450;
pub const LOOKAHEAD_FRAMES: usize = 150;
// Frame 0 is the pre-match snapshot and never drawn as part of a path.
const FIRST_PATH_FRAME: usize = 1;
pub const DEFAULT_TIME_WINDOW: TimeWindow = TimeWindow(0, 150);

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    #[default]
    Colored,
    Sketch,
    Grey,
}

pub fn map_image(style: MapStyle) -> &'static str {
    match style {
        MapStyle::Colored => "./map.jpeg",
        MapStyle::Sketch => "./map_no_color.jpg",
        MapStyle::Grey => "./map_grey.jpg",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextSort {
    #[default]
    Default,
    HighAttFirst,
    HighDiffFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow(pub i64, pub i64);

impl TimeWindow {
    pub fn lo(self) -> i64 {
        self.0
    }

    pub fn hi(self) -> i64 {
        self.1
    }
}

type StrategyKey = (u64, usize, u64, u64, Vec<usize>);
type TrajStatKey = ([u64; 4], usize, usize, StrategyKey);
pub type HeroGrid<T> = [[T; TEAM_SIZE]; NUM_TEAMS];

#[derive(Debug)]
struct DerivedCache {
    context: Memo<(u64, usize), Context>,
    selected_trajectory: Memo<(u64, Option<HeroSlot>, usize), Vec<Position>>,
    window_trajectory: Memo<(u64, Option<HeroSlot>, usize, TimeWindow), Vec<Position>>,
    all_trajectory: Memo<(u64, usize), HeroGrid<Vec<Position>>>,
    strategies: MemoMap<StrategyKey, Option<Rc<Strategy>>>,
    traj_stats: MemoMap<TrajStatKey, (StatGrid, StatGrid)>,
}

impl DerivedCache {
    fn new() -> Self {
        Self {
            context: Memo::default(),
            selected_trajectory: Memo::default(),
            window_trajectory: Memo::default(),
            all_trajectory: Memo::default(),
            strategies: MemoMap::with_capacity(16),
            traj_stats: MemoMap::with_capacity(16),
        }
    }
}

#[derive(Debug)]
pub struct Store {
    data: Option<Rc<MatchRecord>>,
    game_name: String,
    data_generation: u64,
    frame: usize,
    time_window: TimeWindow,
    focus: Option<HeroSlot>,
    context_limit: ContextLimit,
    context_limit_revision: u64,
    context_sort: ContextSort,
    map_style: MapStyle,
    dev_mode: bool,
    viewed_time: Option<f64>,
    tags: TagRegistry,
    session: PredictionSession,
    logs: VecDeque<String>,
    cache: DerivedCache,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let dev_mode = env::var("LENS_DEV_MODE")
            .map(|val| matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        Self {
            data: None,
            game_name: String::new(),
            data_generation: 0,
            frame: 0,
            time_window: DEFAULT_TIME_WINDOW,
            focus: None,
            context_limit: ContextLimit::default(),
            context_limit_revision: 0,
            context_sort: ContextSort::Default,
            map_style: MapStyle::Colored,
            dev_mode,
            viewed_time: None,
            tags: TagRegistry::new(),
            session: PredictionSession::new(),
            logs: VecDeque::with_capacity(MAX_LOGS),
            cache: DerivedCache::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    // --- system ---

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn set_dev_mode(&mut self, dev: bool) {
        self.dev_mode = dev;
    }

    pub fn map_style(&self) -> MapStyle {
        self.map_style
    }

    pub fn set_map_style(&mut self, style: MapStyle) {
        self.map_style = style;
    }

    pub fn map_image(&self) -> &'static str {
        map_image(self.map_style)
    }

    pub fn context_sort(&self) -> ContextSort {
        self.context_sort
    }

    pub fn set_context_sort(&mut self, sort: ContextSort) {
        self.context_sort = sort;
    }

    pub fn auto_determine_context_sort(&mut self) {
        let selected = !self.session.selected().is_empty();
        let compared = !self.session.compared().is_empty();
        self.context_sort = match (selected, compared) {
            (false, false) => ContextSort::Default,
            (true, true) => ContextSort::HighDiffFirst,
            _ => ContextSort::HighAttFirst,
        };
    }

    pub fn viewed_time(&self) -> Option<f64> {
        self.viewed_time
    }

    pub fn set_viewed_time(&mut self, t: Option<f64>) {
        self.viewed_time = t;
    }

    pub fn is_waiting(&self) -> bool {
        self.session.is_waiting()
    }

    // --- tags ---

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn add_tag(&mut self, indices: &[usize], tag: &str) -> Result<()> {
        self.tags.add_tag(indices, tag)
    }

    pub fn remove_tag(&mut self, indices: &[usize], tag: &str) -> Result<()> {
        self.tags.remove_tag(indices, tag)
    }

    pub fn set_tags(
        &mut self,
        indices: &[usize],
        new_tags: &BTreeSet<String>,
        old_tags: &BTreeSet<String>,
    ) -> Result<()> {
        self.tags.set_tags(indices, new_tags, old_tags)
    }

    pub fn init_tags(&mut self, lists: &[Vec<String>]) -> Result<()> {
        self.tags.init_tags(lists)
    }

    pub fn save_tags(&self) -> Vec<Vec<String>> {
        self.tags.save_tags()
    }

    pub fn cluster_tags(&self, indices: &[usize]) -> Result<Rc<BTreeMap<usize, Vec<String>>>> {
        self.tags.cluster_tags(indices)
    }

    // --- match data ---

    pub fn set_data(&mut self, game_name: impl Into<String>, record: MatchRecord) -> Result<()> {
        record.validate()?;
        self.game_name = game_name.into();
        let frames = record.num_frames();
        self.data = Some(Rc::new(record));
        self.data_generation += 1;
        self.focus = None;
        self.frame = 0;
        self.time_window = self.fit_window(self.time_window);
        self.clear_predictions();
        self.clear_context_limit();
        self.push_log(format!(
            "[INFO] Loaded {} ({} frames)",
            self.game_name, frames
        ));
        Ok(())
    }

    pub fn data(&self) -> Option<&MatchRecord> {
        self.data.as_deref()
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    pub fn num_frames(&self) -> usize {
        self.data.as_ref().map(|d| d.num_frames()).unwrap_or(0)
    }

    pub fn player_names(&self) -> HeroGrid<String> {
        std::array::from_fn(|team| {
            std::array::from_fn(|slot| {
                let Some(data) = self.data.as_ref() else {
                    return String::new();
                };
                Team::from_index(team)
                    .and_then(|t| HeroSlot::new(t, slot))
                    .map(|s| data.hero_name(s).to_string())
                    .unwrap_or_default()
            })
        })
    }

    pub fn player_positions(&self) -> HeroGrid<Position> {
        std::array::from_fn(|team| {
            std::array::from_fn(|slot| {
                Team::from_index(team)
                    .and_then(|t| HeroSlot::new(t, slot))
                    .and_then(|s| self.data.as_ref()?.position(self.frame, s))
                    .unwrap_or([0.0, 0.0])
            })
        })
    }

    pub fn player_life_states(&self) -> HeroGrid<bool> {
        std::array::from_fn(|team| {
            std::array::from_fn(|slot| {
                Team::from_index(team)
                    .and_then(|t| HeroSlot::new(t, slot))
                    .and_then(|s| self.data.as_ref()?.frames.get(self.frame)?.hero(s))
                    .map(|h| h.is_alive())
                    .unwrap_or(false)
            })
        })
    }

    pub fn focused_player_position(&self) -> Position {
        self.focus
            .and_then(|s| self.data.as_ref()?.position(self.frame, s))
            .unwrap_or([0.0, 0.0])
    }

    pub fn cur_time(&self) -> f64 {
        self.frame_time(self.frame)
    }

    pub fn frame_time(&self, frame: usize) -> f64 {
        self.data
            .as_ref()
            .and_then(|d| d.frames.get(frame))
            .map(|f| f.game_time)
            .unwrap_or(0.0)
    }

    // --- focus / frame ---

    pub fn focus(&self) -> Option<HeroSlot> {
        self.focus
    }

    pub fn focus_wire(&self) -> (i64, i64) {
        HeroSlot::to_wire(self.focus)
    }

    pub fn focus_on(&mut self, target: Option<HeroSlot>) {
        self.focus = if target == self.focus { None } else { target };
        self.clear_predictions();
        self.clear_context_limit();
    }

    pub fn focus_on_player(&mut self, team: i64, player: i64) -> bool {
        match HeroSlot::from_wire(team, player) {
            Ok(target) => {
                self.focus_on(target);
                true
            }
            Err(err) => {
                self.push_log(format!("[WARN] Focus ignored: {err}"));
                false
            }
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    // Frames past the end are ignored. The time window is shrunk so it
    // still fits around the new cursor.
    pub fn set_frame(&mut self, frame: usize) -> bool {
        if frame >= self.num_frames().max(1) {
            return false;
        }
        self.frame = frame;
        self.time_window = self.fit_window(self.time_window);
        self.clear_predictions();
        self.clear_context_limit();
        true
    }

    pub fn time_window(&self) -> TimeWindow {
        self.time_window
    }

    // Accepts `window` only if it keeps `[frame + lo, frame + hi]` inside the
    // record; otherwise the current window is kept.
    pub fn set_traj_time_window(&mut self, window: TimeWindow) -> bool {
        let frame = self.frame as i64;
        if frame + window.lo() < 0 || frame + window.hi() >= self.num_frames() as i64 {
            return false;
        }
        self.time_window = window;
        true
    }

    // Clamps `window` to the record around the current frame. A window that
    // cannot be clamped (lo past hi) falls back to the clamped default.
    fn fit_window(&self, window: TimeWindow) -> TimeWindow {
        let n = self.num_frames() as i64;
        if n == 0 {
            return window;
        }
        let frame = self.frame as i64;
        let clamp = |w: TimeWindow| {
            let lo = w.lo().max(-frame);
            let hi = w.hi().min(n - 1 - frame);
            (lo <= hi).then_some(TimeWindow(lo, hi))
        };
        clamp(window)
            .or_else(|| clamp(DEFAULT_TIME_WINDOW))
            .unwrap_or(TimeWindow(0, 0))
    }

    // --- context ---

    pub fn cur_context(&self) -> Rc<Context> {
        self.cache
            .context
            .get_or_compute((self.data_generation, self.frame), || {
                gen_context(self.data.as_deref(), self.frame)
            })
    }

    pub fn context_limit(&self) -> &ContextLimit {
        &self.context_limit
    }

    pub fn has_context_limit(&self, group: &str, item: &str) -> bool {
        self.context_limit.contains(group, item)
    }

    pub fn add_context_limit(&mut self, group: &str, item: &str) {
        if self.context_limit.insert(ContextKey::new(group, item)) {
            self.context_limit_revision += 1;
        }
    }

    pub fn rm_context_limit(&mut self, group: &str, item: &str) {
        if self.context_limit.remove(&ContextKey::new(group, item)) {
            self.context_limit_revision += 1;
        }
    }

    pub fn clear_context_limit(&mut self) {
        if !self.context_limit.is_empty() {
            self.context_limit.clear();
            self.context_limit_revision += 1;
        }
    }

    pub fn set_context_limit(&mut self, limit: ContextLimit) {
        self.context_limit = limit;
        self.context_limit_revision += 1;
    }

    // Excluded items per group of the current context.
    pub fn context_limit_counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .cur_context()
            .groups
            .keys()
            .map(|group| (group.clone(), 0))
            .collect();
        for key in self.context_limit.iter() {
            if let Some(count) = counts.get_mut(&key.group) {
                *count += 1;
            }
        }
        counts
    }

    // --- trajectories ---

    pub fn selected_player_trajectory(&self) -> Rc<Vec<Position>> {
        let key = (self.data_generation, self.focus, self.frame);
        self.cache.selected_trajectory.get_or_compute(key, || {
            let (Some(data), Some(slot)) = (self.data.as_deref(), self.focus) else {
                return Vec::new();
            };
            let (start, end) = self.fixed_window(data);
            (start..=end).filter_map(|f| data.position(f, slot)).collect()
        })
    }

    // Frames `[frame + lo, frame + hi)`, never before the first path frame.
    pub fn selected_player_trajectory_in_time_window(&self) -> Rc<Vec<Position>> {
        let key = (
            self.data_generation,
            self.focus,
            self.frame,
            self.time_window,
        );
        self.cache.window_trajectory.get_or_compute(key, || {
            let (Some(data), Some(slot)) = (self.data.as_deref(), self.focus) else {
                return Vec::new();
            };
            let frame = self.frame as i64;
            let start = (frame + self.time_window.lo()).max(FIRST_PATH_FRAME as i64);
            let end = (frame + self.time_window.hi()).min(data.num_frames() as i64);
            if start >= end {
                return Vec::new();
            }
            (start as usize..end as usize)
                .filter_map(|f| data.position(f, slot))
                .collect()
        })
    }

    pub fn all_player_trajectory(&self) -> Rc<HeroGrid<Vec<Position>>> {
        let key = (self.data_generation, self.frame);
        self.cache.all_trajectory.get_or_compute(key, || {
            let mut out: HeroGrid<Vec<Position>> = Default::default();
            let Some(data) = self.data.as_deref() else {
                return out;
            };
            let (start, end) = self.fixed_window(data);
            for slot in HeroSlot::all() {
                out[slot.team.index()][slot.slot] =
                    (start..=end).filter_map(|f| data.position(f, slot)).collect();
            }
            out
        })
    }

    // Inclusive `[max(1, frame - 450), min(last, frame + 150)]`.
    fn fixed_window(&self, data: &MatchRecord) -> (usize, usize) {
        let start = self
            .frame
            .saturating_sub(LOOKBACK_FRAMES)
            .max(FIRST_PATH_FRAME);
        let end = (self.frame + LOOKAHEAD_FRAMES).min(data.num_frames().saturating_sub(1));
        (start, end)
    }

    // --- predictions ---

    pub fn session(&self) -> &PredictionSession {
        &self.session
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn predictions(&self) -> &[Prediction] {
        self.session.predictions()
    }

    pub fn prediction_groups(&self) -> &[Vec<usize>] {
        self.session.groups()
    }

    pub fn selected_predictors(&self) -> &[usize] {
        self.session.selected()
    }

    pub fn compared_predictors(&self) -> &[usize] {
        self.session.compared()
    }

    pub fn viewed_predictions(&self) -> &[usize] {
        self.session.viewed()
    }

    pub fn prediction_projection(&self) -> &[Position] {
        self.session.projection()
    }

    pub fn instances_data(&self) -> &Value {
        self.session.instances()
    }

    pub fn viewed_prediction(&self) -> Option<usize> {
        match self.session.viewed() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn view_prediction(&mut self, idx: Option<usize>) {
        let indices: Vec<usize> = idx.into_iter().collect();
        self.view_predictions(&indices);
    }

    pub fn view_predictions(&mut self, indices: &[usize]) {
        self.session.view(indices);
    }

    pub fn select_predictors(&mut self, indices: &[usize], set: PredictorSet) {
        self.session.select(indices, set);
        let style = match set {
            PredictorSet::Selected => self.session.selected(),
            PredictorSet::Compared => self.session.compared(),
        };
        self.map_style = if style.is_empty() {
            MapStyle::Colored
        } else {
            MapStyle::Grey
        };
        self.auto_determine_context_sort();
    }

    pub fn clear_predictions(&mut self) {
        self.session.clear();
        self.select_predictors(&[], PredictorSet::Selected);
        self.select_predictors(&[], PredictorSet::Compared);
    }

    pub fn strategy_from_predictions(&self, indices: &[usize]) -> Option<Rc<Strategy>> {
        let key = self.strategy_key(indices);
        let cached = self.cache.strategies.get_or_compute(key, || {
            let context = self.cur_context();
            Strategy::from_predictions(
                self.session.predictions(),
                indices,
                &context,
                &self.context_limit,
            )
            .map(Rc::new)
        });
        cached.as_ref().clone()
    }

    pub fn selected_predictors_as_a_strategy(&self) -> Option<Rc<Strategy>> {
        self.strategy_from_predictions(self.session.selected())
    }

    pub fn compared_predictors_as_a_strategy(&self) -> Option<Rc<Strategy>> {
        self.strategy_from_predictions(self.session.compared())
    }

    pub fn viewed_predictors_as_a_strategy(&self) -> Option<Rc<Strategy>> {
        self.strategy_from_predictions(self.session.viewed())
    }

    pub fn trajectory_stats(
        &self,
        x_range: (f64, f64),
        y_range: (f64, f64),
        grid_size: usize,
        time_steps: usize,
        indices: &[usize],
    ) -> Rc<(StatGrid, StatGrid)> {
        let ranges = [
            x_range.0.to_bits(),
            x_range.1.to_bits(),
            y_range.0.to_bits(),
            y_range.1.to_bits(),
        ];
        let key = (ranges, grid_size, time_steps, self.strategy_key(indices));
        self.cache.traj_stats.get_or_compute(key, || {
            let strategy = self.strategy_from_predictions(indices);
            traj_stat(x_range, y_range, grid_size, time_steps, strategy.as_deref())
        })
    }

    fn strategy_key(&self, indices: &[usize]) -> StrategyKey {
        (
            self.data_generation,
            self.frame,
            self.session.revision(),
            self.context_limit_revision,
            indices.to_vec(),
        )
    }

    pub fn can_predict(&self) -> bool {
        let Some(slot) = self.focus else {
            return false;
        };
        self.data.is_some()
            && !self.session.is_waiting()
            && self.player_life_states()[slot.team.index()][slot.slot]
    }

    pub fn predict_request(&self) -> Option<PredictRequest> {
        let slot = self.focus?;
        let (team_id, player_id) = HeroSlot::to_wire(Some(slot));
        Some(PredictRequest {
            game_name: self.game_name.clone(),
            team_id,
            player_id,
            frame: self.frame,
            context_limit: self.context_limit.to_wire(),
        })
    }

    pub fn begin_predict(&mut self) -> Option<(PredictTicket, PredictRequest)> {
        if !self.can_predict() {
            self.push_log("[INFO] Prediction unavailable for the current selection");
            return None;
        }
        let request = self.predict_request()?;
        let slot = self.focus?;
        let ticket = self
            .session
            .begin(slot, self.frame, self.data_generation)?;
        Some((ticket, request))
    }

    // Completes the request identified by `ticket`. Failures fall back to
    // locally synthesized predictions; answers for a selection that is no
    // longer current are discarded.
    pub fn resolve_prediction(
        &mut self,
        ticket: PredictTicket,
        outcome: Result<PredictResponse>,
    ) -> bool {
        let current = self.focus == Some(ticket.focus)
            && self.frame == ticket.frame
            && self.data_generation == ticket.data_generation;
        if !current || !self.session.accepts(&ticket) {
            self.push_log(format!(
                "[INFO] Discarded stale prediction for frame {}",
                ticket.frame
            ));
            return false;
        }
        match outcome {
            Ok(response) => {
                let count = response.predictions.len();
                if let Some(dropped) = self.session.settle(&ticket, response, false) {
                    if dropped > 0 {
                        self.push_log(format!(
                            "[WARN] Dropped {dropped} invalid prediction group entries"
                        ));
                    }
                    self.push_log(format!("[INFO] Received {count} predictions"));
                }
            }
            Err(err) => {
                self.push_log(format!(
                    "[WARN] Predictor failed: {err:#}; using local fallback"
                ));
                self.settle_fallback(ticket);
            }
        }
        self.select_predictors(&[], PredictorSet::Selected);
        self.select_predictors(&[], PredictorSet::Compared);
        true
    }

    // Resolves the request in flight, if any, through the fallback path.
    // Used when the worker that owned it is gone.
    pub fn abandon_prediction(&mut self, reason: &str) -> bool {
        let Some(ticket) = self.session.in_flight() else {
            return false;
        };
        self.resolve_prediction(ticket, Err(anyhow!("{reason}")))
    }

    fn settle_fallback(&mut self, ticket: PredictTicket) {
        let seed = fallback_seed(&self.game_name, ticket.focus, ticket.frame);
        let start = self.focused_player_position();
        let context = self.cur_context();
        let response = fallback_predictions(seed, start, &context);
        self.session.settle(&ticket, response, true);
    }

    pub fn predict_with(&mut self, predictor: &dyn Predictor) -> bool {
        let Some((ticket, request)) = self.begin_predict() else {
            return false;
        };
        let outcome = if self.dev_mode {
            Err(anyhow!("dev mode"))
        } else {
            predictor.predict(&request)
        };
        self.resolve_prediction(ticket, outcome)
    }

    pub fn predict_via(&mut self, cmd_tx: &Sender<ProviderCommand>) -> bool {
        let Some((ticket, request)) = self.begin_predict() else {
            return false;
        };
        if self.dev_mode {
            return self.resolve_prediction(ticket, Err(anyhow!("dev mode")));
        }
        if cmd_tx
            .send(ProviderCommand::Predict { ticket, request })
            .is_err()
        {
            return self.resolve_prediction(ticket, Err(anyhow!("predictor worker unavailable")));
        }
        self.push_log("[INFO] Prediction request sent");
        true
    }

    // --- case snapshot ---

    pub fn save_case(&self) -> CaseFile {
        let (focused_team, focused_player) = self.focus_wire();
        CaseFile {
            match_id: self.data.as_ref().and_then(|d| d.match_id()),
            tags: self.tags.save_tags(),
            context_sort: Some(self.context_sort),
            focused_team,
            focused_player,
            frame: self.frame,
            traj_time_window: self.time_window,
            context_limit: self.context_limit.to_wire(),
            predictions: self.session.predictions().to_vec(),
            prediction_groups: self.session.groups().to_vec(),
            selected_predictors: self.session.selected().to_vec(),
            compared_predictors: self.session.compared().to_vec(),
            prediction_projection: self.session.projection().to_vec(),
            instances_data: self.session.instances().clone(),
            map_style: Some(self.map_style),
        }
    }

    // Restores everything a case file carries. The case is checked against
    // the loaded record before anything is changed.
    pub fn load_case(&mut self, case: &CaseFile) -> Result<()> {
        let focus = HeroSlot::from_wire(case.focused_team, case.focused_player)?;
        if case.frame >= self.num_frames().max(1) {
            bail!(
                "case frame {} outside the loaded record ({} frames)",
                case.frame,
                self.num_frames()
            );
        }
        let limit = ContextLimit::from_wire(&case.context_limit)?;
        let mut tags = TagRegistry::new();
        tags.init_tags(&case.tags)?;

        if let (Some(expected), Some(found)) =
            (self.data.as_ref().and_then(|d| d.match_id()), case.match_id)
            && expected != found
        {
            self.push_log(format!(
                "[WARN] Case was saved for match {found}, loaded match is {expected}"
            ));
        }

        self.tags = tags;
        self.focus = focus;
        self.frame = case.frame;
        self.clear_predictions();
        self.clear_context_limit();
        self.time_window = self.fit_window(case.traj_time_window);
        if self.time_window != case.traj_time_window {
            self.push_log(format!(
                "[WARN] Case time window {:?} clamped to {:?}",
                case.traj_time_window, self.time_window
            ));
        }
        self.set_context_limit(limit);

        let dropped = self.session.restore(PredictResponse {
            predictions: case.predictions.clone(),
            pred_groups: case.prediction_groups.clone(),
            pred_projection: case.prediction_projection.clone(),
            pred_instances: case.instances_data.clone(),
        });
        if dropped > 0 {
            self.push_log(format!(
                "[WARN] Dropped {dropped} invalid prediction group entries from case"
            ));
        }
        self.session.view(&[]);
        self.select_predictors(&case.selected_predictors, PredictorSet::Selected);
        self.select_predictors(&case.compared_predictors, PredictorSet::Compared);
        if let Some(sort) = case.context_sort {
            self.context_sort = sort;
        }
        self.map_style = case.map_style.unwrap_or(
            if case.selected_predictors.is_empty() && case.compared_predictors.is_empty() {
                MapStyle::Colored
            } else {
                MapStyle::Grey
            },
        );
        self.push_log("[INFO] Case restored");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    PredictionReady {
        ticket: PredictTicket,
        outcome: std::result::Result<PredictResponse, String>,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Predict {
        ticket: PredictTicket,
        request: PredictRequest,
    },
}

pub fn apply_delta(store: &mut Store, delta: Delta) {
    match delta {
        Delta::PredictionReady { ticket, outcome } => {
            store.resolve_prediction(ticket, outcome.map_err(|err| anyhow!(err)));
        }
        Delta::Log(msg) => store.push_log(msg),
    }
}
