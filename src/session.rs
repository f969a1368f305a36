use serde_json::Value;

use crate::match_data::{HeroSlot, Position};
use crate::prediction::{PredictResponse, Prediction, empty_instances, reindex, sanitize_groups};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Waiting,
    Settled,
    FallbackSettled,
}

// Identity of one prediction request: which selection it was issued for
// and which session generation may accept its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictTicket {
    pub generation: u64,
    pub focus: HeroSlot,
    pub frame: usize,
    pub data_generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorSet {
    Selected,
    Compared,
}

#[derive(Debug, Clone)]
pub struct PredictionSession {
    state: SessionState,
    generation: u64,
    in_flight: Option<PredictTicket>,
    revision: u64,
    predictions: Vec<Prediction>,
    groups: Vec<Vec<usize>>,
    selected: Vec<usize>,
    compared: Vec<usize>,
    viewed: Vec<usize>,
    projection: Vec<Position>,
    instances: Value,
}

impl Default for PredictionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            in_flight: None,
            revision: 0,
            predictions: Vec::new(),
            groups: Vec::new(),
            selected: Vec::new(),
            compared: Vec::new(),
            viewed: Vec::new(),
            projection: Vec::new(),
            instances: empty_instances(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_waiting(&self) -> bool {
        self.state == SessionState::Waiting
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn compared(&self) -> &[usize] {
        &self.compared
    }

    pub fn viewed(&self) -> &[usize] {
        &self.viewed
    }

    pub fn projection(&self) -> &[Position] {
        &self.projection
    }

    pub fn instances(&self) -> &Value {
        &self.instances
    }

    pub fn begin(
        &mut self,
        focus: HeroSlot,
        frame: usize,
        data_generation: u64,
    ) -> Option<PredictTicket> {
        if self.is_waiting() {
            return None;
        }
        self.generation += 1;
        let ticket = PredictTicket {
            generation: self.generation,
            focus,
            frame,
            data_generation,
        };
        self.in_flight = Some(ticket);
        self.state = SessionState::Waiting;
        Some(ticket)
    }

    pub fn in_flight(&self) -> Option<PredictTicket> {
        self.in_flight
    }

    pub fn accepts(&self, ticket: &PredictTicket) -> bool {
        self.is_waiting() && self.in_flight.as_ref() == Some(ticket)
    }

    /// Stores an answer for `ticket`. Returns the number of group entries
    /// dropped while sanitizing, or `None` when the ticket is stale.
    pub fn settle(
        &mut self,
        ticket: &PredictTicket,
        response: PredictResponse,
        fallback: bool,
    ) -> Option<usize> {
        if !self.accepts(ticket) {
            return None;
        }
        self.in_flight = None;
        let dropped = self.install(response);
        self.state = if fallback {
            SessionState::FallbackSettled
        } else {
            SessionState::Settled
        };
        Some(dropped)
    }

    pub fn restore(&mut self, response: PredictResponse) -> usize {
        self.generation += 1;
        self.in_flight = None;
        let dropped = self.install(response);
        self.state = if self.predictions.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Settled
        };
        dropped
    }

    fn install(&mut self, response: PredictResponse) -> usize {
        let PredictResponse {
            predictions,
            pred_groups,
            pred_projection,
            pred_instances,
        } = response;
        self.predictions = reindex(predictions);
        self.groups = pred_groups;
        let dropped = sanitize_groups(&mut self.groups, self.predictions.len());
        self.projection = pred_projection;
        self.instances = pred_instances;
        self.selected.clear();
        self.compared.clear();
        self.viewed.clear();
        self.revision += 1;
        dropped
    }

    // Back to `Idle` with nothing shown. Any request still in flight becomes
    // stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.state = SessionState::Idle;
        self.predictions.clear();
        self.groups.clear();
        self.selected.clear();
        self.compared.clear();
        self.viewed.clear();
        self.projection.clear();
        self.instances = empty_instances();
        self.revision += 1;
    }

    pub fn select(&mut self, indices: &[usize], set: PredictorSet) {
        let valid = self.valid_indices(indices);
        match set {
            PredictorSet::Selected => self.selected = valid,
            PredictorSet::Compared => self.compared = valid,
        }
    }

    pub fn view(&mut self, indices: &[usize]) -> bool {
        let mut unique = self.valid_indices(indices);
        unique.sort_unstable();
        unique.dedup();
        let mut current = self.viewed.clone();
        current.sort_unstable();
        current.dedup();
        if unique == current {
            return false;
        }
        self.viewed = self.valid_indices(indices);
        true
    }

    fn valid_indices(&self, indices: &[usize]) -> Vec<usize> {
        indices
            .iter()
            .copied()
            .filter(|&idx| idx < self.predictions.len())
            .collect()
    }
}
