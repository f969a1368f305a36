use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::match_data::{MatchRecord, Position};
use crate::prediction::{Prediction, empty_instances};
use crate::store::{ContextSort, DEFAULT_TIME_WINDOW, MapStyle, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
    #[serde(rename = "match_id", default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_sort: Option<ContextSort>,
    #[serde(default = "no_focus")]
    pub focused_team: i64,
    #[serde(default = "no_focus")]
    pub focused_player: i64,
    #[serde(default)]
    pub frame: usize,
    #[serde(default = "default_window")]
    pub traj_time_window: TimeWindow,
    #[serde(default)]
    pub context_limit: Vec<String>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub prediction_groups: Vec<Vec<usize>>,
    #[serde(default)]
    pub selected_predictors: Vec<usize>,
    #[serde(default)]
    pub compared_predictors: Vec<usize>,
    #[serde(default)]
    pub prediction_projection: Vec<Position>,
    #[serde(default = "empty_instances")]
    pub instances_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_style: Option<MapStyle>,
}

fn no_focus() -> i64 {
    -1
}

fn default_window() -> TimeWindow {
    DEFAULT_TIME_WINDOW
}

/// Writes `case` as `<game_name>_<hash>.json` under `dir`, where the hash
/// covers the serialized body. Returns the written path.
pub fn write_case_file(dir: &Path, game_name: &str, case: &CaseFile) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let json = serde_json::to_string_pretty(case).context("serialize case")?;
    let digest = Sha256::digest(json.as_bytes());
    let short: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    let stem = if game_name.is_empty() { "case" } else { game_name };
    let path = dir.join(format!("{stem}_{short}.json"));
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("rename to {}", path.display()))?;
    Ok(path)
}

pub fn read_case_file(path: &Path) -> Result<CaseFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse case {}", path.display()))
}

pub fn read_match_record(path: &Path) -> Result<(String, MatchRecord)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let record: MatchRecord =
        serde_json::from_str(&raw).with_context(|| format!("parse match {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((name, record))
}
