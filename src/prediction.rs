use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{Context, ContextLimit};
use crate::match_data::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub idx: usize,
    pub probability: f64,
    pub trajectory: Vec<Position>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attention: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    pub fn attention_for(&self, group: &str, item: &str) -> f64 {
        self.attention
            .get(group)
            .and_then(|items| items.get(item))
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub game_name: String,
    pub team_id: i64,
    pub player_id: i64,
    pub frame: usize,
    pub context_limit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub pred_groups: Vec<Vec<usize>>,
    #[serde(default)]
    pub pred_projection: Vec<Position>,
    #[serde(default = "empty_instances")]
    pub pred_instances: Value,
}

pub fn empty_instances() -> Value {
    serde_json::json!({ "groups": [] })
}

pub fn reindex(predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions
        .into_iter()
        .enumerate()
        .map(|(idx, mut p)| {
            p.idx = idx;
            p
        })
        .collect()
}

/// Drops group members that are out of range or already claimed by an
/// earlier group so the groups form a partition of `0..len`. Returns the
/// number of dropped entries.
pub fn sanitize_groups(groups: &mut [Vec<usize>], len: usize) -> usize {
    let mut seen = HashSet::new();
    let mut dropped = 0;
    for group in groups.iter_mut() {
        let before = group.len();
        group.retain(|&idx| idx < len && seen.insert(idx));
        dropped += before - group.len();
    }
    dropped
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub predictors: Vec<Prediction>,
    pub attention: Context,
}

impl Strategy {
    // Collects `indices` from `predictions` (unknown indices are skipped) and
    // scores every context entity not excluded by `limit`. `None` when no
    // predictor survives.
    pub fn from_predictions(
        predictions: &[Prediction],
        indices: &[usize],
        context: &Context,
        limit: &ContextLimit,
    ) -> Option<Strategy> {
        let predictors: Vec<Prediction> = indices
            .iter()
            .filter_map(|&idx| predictions.get(idx).cloned())
            .collect();
        if predictors.is_empty() {
            return None;
        }
        let attention = context.map_leaves(|group, item| {
            if limit.contains(group, item) {
                0.0
            } else {
                strategy_attention(&predictors, group, item)
            }
        });
        Some(Strategy {
            predictors,
            attention,
        })
    }

    pub fn total_probability(&self) -> f64 {
        self.predictors.iter().map(|p| p.probability).sum()
    }
}

pub fn strategy_attention(predictors: &[Prediction], group: &str, item: &str) -> f64 {
    let weight: f64 = predictors.iter().map(|p| p.probability).sum();
    if weight <= 0.0 {
        return 0.0;
    }
    predictors
        .iter()
        .map(|p| p.probability * p.attention_for(group, item))
        .sum::<f64>()
        / weight
}
