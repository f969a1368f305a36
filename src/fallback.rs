use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, json};
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::match_data::{HeroSlot, Position};
use crate::prediction::{PredictResponse, Prediction};
use crate::rot::{DIRECTION_BUCKETS, bucket_heading};

pub const FALLBACK_STRATEGIES: usize = 4;
pub const PREDICTORS_PER_STRATEGY: usize = 5;
const TRAJECTORY_POINTS: usize = 16;
const STEP_LEN: f64 = 1.5;
const HEADING_JITTER: f64 = 0.35;

pub fn fallback_seed(game_name: &str, slot: HeroSlot, frame: usize) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(game_name.as_bytes());
    hasher.update([slot.team.index() as u8, slot.slot as u8]);
    hasher.update((frame as u64).to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

// Synthesizes a prediction set locally: a handful of strategies, each a
// bundle of noisy walks from `start` along a shared heading. Predictions are
// scattered over the flat index space by a seeded shuffle and the groups
// record where each strategy's members landed.
pub fn fallback_predictions(seed: u64, start: Position, context: &Context) -> PredictResponse {
    let mut rng = StdRng::seed_from_u64(seed);
    let total = FALLBACK_STRATEGIES * PREDICTORS_PER_STRATEGY;

    let mut slots: Vec<usize> = (0..total).collect();
    slots.shuffle(&mut rng);

    let mut weights: Vec<f64> = (0..total).map(|_| rng.gen_range(0.2..1.0)).collect();
    let weight_sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= weight_sum;
    }

    let context_keys: Vec<_> = context.keys().collect();
    let mut placed: Vec<Option<Prediction>> = vec![None; total];
    let mut groups = Vec::with_capacity(FALLBACK_STRATEGIES);
    let mut next = 0;

    for strategy in 0..FALLBACK_STRATEGIES {
        let bucket = (strategy * DIRECTION_BUCKETS / FALLBACK_STRATEGIES
            + rng.gen_range(0..2))
            % DIRECTION_BUCKETS;
        let [hx, hy] = bucket_heading(bucket);
        let base_heading = hy.atan2(hx);
        let focus_keys: Vec<_> = context_keys
            .choose_multiple(&mut rng, 3.min(context_keys.len()))
            .cloned()
            .collect();

        let mut members = Vec::with_capacity(PREDICTORS_PER_STRATEGY);
        for _ in 0..PREDICTORS_PER_STRATEGY {
            let slot = slots[next];
            let probability = weights[next];
            next += 1;

            let mut heading = base_heading + rng.gen_range(-HEADING_JITTER..HEADING_JITTER);
            let mut point = start;
            let mut trajectory = Vec::with_capacity(TRAJECTORY_POINTS);
            trajectory.push(point);
            for _ in 1..TRAJECTORY_POINTS {
                heading += rng.gen_range(-HEADING_JITTER..HEADING_JITTER) / 2.0;
                let len = STEP_LEN * rng.gen_range(0.6..1.4);
                point = [point[0] + heading.cos() * len, point[1] + heading.sin() * len];
                trajectory.push(point);
            }

            let mut attention = BTreeMap::new();
            for key in &context_keys {
                let emphasis: f64 = if focus_keys.contains(key) { 0.6 } else { 0.0 };
                let score = (emphasis + rng.gen_range(0.0..0.4)).min(1.0);
                attention
                    .entry(key.group.clone())
                    .or_insert_with(BTreeMap::new)
                    .insert(key.item.clone(), score);
            }

            let mut extra = Map::new();
            extra.insert("strategy".to_string(), json!(strategy));
            extra.insert("synthetic".to_string(), json!(true));
            placed[slot] = Some(Prediction {
                idx: slot,
                probability,
                trajectory,
                attention,
                extra,
            });
            members.push(slot);
        }
        groups.push(members);
    }

    let predictions: Vec<Prediction> = placed.into_iter().flatten().collect();
    let projection = project_groups(&groups, total, &mut rng);
    let instances = storyline_instances(&groups, &predictions);

    PredictResponse {
        predictions,
        pred_groups: groups,
        pred_projection: projection,
        pred_instances: instances,
    }
}

fn project_groups(groups: &[Vec<usize>], total: usize, rng: &mut StdRng) -> Vec<Position> {
    let mut out = vec![[0.0, 0.0]; total];
    let n = groups.len().max(1) as f64;
    for (g, members) in groups.iter().enumerate() {
        let angle = std::f64::consts::TAU * g as f64 / n;
        let center = [angle.cos(), angle.sin()];
        for &idx in members {
            if let Some(slot) = out.get_mut(idx) {
                *slot = [
                    center[0] + rng.gen_range(-0.15..0.15),
                    center[1] + rng.gen_range(-0.15..0.15),
                ];
            }
        }
    }
    out
}

fn storyline_instances(groups: &[Vec<usize>], predictions: &[Prediction]) -> serde_json::Value {
    let rows: Vec<_> = groups
        .iter()
        .enumerate()
        .map(|(g, members)| {
            let probability: f64 = members
                .iter()
                .filter_map(|&idx| predictions.get(idx))
                .map(|p| p.probability)
                .sum();
            json!({ "group": g, "members": members, "probability": probability })
        })
        .collect();
    json!({ "groups": rows })
}
