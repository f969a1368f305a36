use std::collections::BTreeSet;

use crate::discretize::discretize;
use crate::prediction::Strategy;
use crate::rot::rot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixCell {
    pub probability: f64,
    pub avg_direction: [f64; 2],
    pub dir_range: Vec<usize>,
    pub prediction_idxes: BTreeSet<usize>,
}

impl MatrixCell {
    fn accumulate(&mut self, probability: f64, delta: [f64; 2], idx: usize) {
        self.probability += probability;
        self.avg_direction[0] += delta[0] * probability;
        self.avg_direction[1] += delta[1] * probability;
        self.dir_range.push(rot(delta));
        self.prediction_idxes.insert(idx);
    }

    pub fn mean_direction(&self) -> Option<[f64; 2]> {
        (self.probability > 0.0).then(|| {
            [
                self.avg_direction[0] / self.probability,
                self.avg_direction[1] / self.probability,
            ]
        })
    }
}

pub type StatGrid = Vec<Vec<MatrixCell>>;

fn empty_grid(grid_size: usize, time_steps: usize) -> StatGrid {
    vec![vec![MatrixCell::default(); time_steps]; grid_size]
}

/// Bins the strategy's predicted trajectories into `grid_size x time_steps`
/// cells, once per axis. Step `i` of a trajectory (from point `i` to `i+1`)
/// is placed by its start position and by `i` relative to the trajectory
/// length; steps outside a range are skipped on that axis only.
pub fn traj_stat(
    x_range: (f64, f64),
    y_range: (f64, f64),
    grid_size: usize,
    time_steps: usize,
    strategy: Option<&Strategy>,
) -> (StatGrid, StatGrid) {
    let mut x_data = empty_grid(grid_size, time_steps);
    let mut y_data = empty_grid(grid_size, time_steps);
    let Some(strategy) = strategy else {
        return (x_data, y_data);
    };

    for pred in &strategy.predictors {
        let traj = &pred.trajectory;
        if traj.len() < 2 {
            continue;
        }
        let last_step = (traj.len() - 2) as f64;
        for (i, step) in traj.windows(2).enumerate() {
            let Some(t_pos) = discretize(i as f64, (0.0, last_step), time_steps) else {
                continue;
            };
            let [from, to] = [step[0], step[1]];
            let delta = [to[0] - from[0], to[1] - from[1]];
            if let Some(x_pos) = discretize(from[0], x_range, grid_size) {
                x_data[x_pos][t_pos].accumulate(pred.probability, delta, pred.idx);
            }
            if let Some(y_pos) = discretize(from[1], y_range, grid_size) {
                y_data[y_pos][t_pos].accumulate(pred.probability, delta, pred.idx);
            }
        }
    }
    (x_data, y_data)
}

pub fn hottest_cells(grid: &StatGrid, limit: usize) -> Vec<(usize, usize, &MatrixCell)> {
    let mut cells: Vec<(usize, usize, &MatrixCell)> = grid
        .iter()
        .enumerate()
        .flat_map(|(s, row)| row.iter().enumerate().map(move |(t, cell)| (s, t, cell)))
        .filter(|(_, _, cell)| cell.probability > 0.0)
        .collect();
    cells.sort_by(|a, b| {
        b.2.probability
            .partial_cmp(&a.2.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });
    cells.truncate(limit);
    cells
}
