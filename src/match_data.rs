use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const NUM_TEAMS: usize = 2;
pub const TEAM_SIZE: usize = 5;

pub type Position = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    Radiant,
    Dire,
}

impl Team {
    pub const ALL: [Team; NUM_TEAMS] = [Team::Radiant, Team::Dire];

    pub fn index(self) -> usize {
        match self {
            Team::Radiant => 0,
            Team::Dire => 1,
        }
    }

    pub fn from_index(idx: usize) -> Option<Team> {
        Team::ALL.get(idx).copied()
    }
}

pub fn team_label(team: Team) -> &'static str {
    match team {
        Team::Radiant => "Radiant",
        Team::Dire => "Dire",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeroSlot {
    pub team: Team,
    pub slot: usize,
}

impl HeroSlot {
    pub fn new(team: Team, slot: usize) -> Option<Self> {
        (slot < TEAM_SIZE).then_some(Self { team, slot })
    }

    // Decodes the `(team, player)` integer pair used on the wire, where
    // `(-1, -1)` means "nobody". Mixed or out-of-range pairs are rejected.
    pub fn from_wire(team: i64, player: i64) -> Result<Option<Self>> {
        let slot = match (team, player) {
            (-1, -1) => return Ok(None),
            (t, p) if t >= 0 && p >= 0 => {
                Team::from_index(t as usize).and_then(|team| HeroSlot::new(team, p as usize))
            }
            _ => None,
        };
        match slot {
            Some(slot) => Ok(Some(slot)),
            None => bail!("invalid hero selection ({team}, {player})"),
        }
    }

    pub fn to_wire(slot: Option<Self>) -> (i64, i64) {
        match slot {
            Some(s) => (s.team.index() as i64, s.slot as i64),
            None => (-1, -1),
        }
    }

    pub fn all() -> impl Iterator<Item = HeroSlot> {
        Team::ALL
            .into_iter()
            .flat_map(|team| (0..TEAM_SIZE).map(move |slot| HeroSlot { team, slot }))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(default)]
    pub hero: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamInfo {
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameInfo {
    #[serde(default)]
    pub match_id: Option<u64>,
    #[serde(default)]
    pub radiant: TeamInfo,
    #[serde(default)]
    pub dire: TeamInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroState {
    pub pos: Vec<f64>,
    pub life: f64,
}

impl HeroState {
    pub fn xy(&self) -> Position {
        [
            self.pos.first().copied().unwrap_or(0.0),
            self.pos.get(1).copied().unwrap_or(0.0),
        ]
    }

    pub fn is_alive(&self) -> bool {
        self.life != 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub game_time: f64,
    #[serde(rename = "heroStates")]
    pub hero_states: Vec<Vec<HeroState>>,
}

impl Frame {
    pub fn hero(&self, slot: HeroSlot) -> Option<&HeroState> {
        self.hero_states
            .get(slot.team.index())
            .and_then(|team| team.get(slot.slot))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "gameInfo", default)]
    pub game_info: GameInfo,
    #[serde(rename = "gameRecords")]
    pub frames: Vec<Frame>,
}

impl MatchRecord {
    pub fn validate(&self) -> Result<()> {
        if self.frames.is_empty() {
            bail!("match record has no frames");
        }
        for (idx, frame) in self.frames.iter().enumerate() {
            if frame.hero_states.len() != NUM_TEAMS {
                bail!(
                    "frame {idx}: expected {NUM_TEAMS} teams, found {}",
                    frame.hero_states.len()
                );
            }
            for (team_idx, team) in frame.hero_states.iter().enumerate() {
                if team.len() != TEAM_SIZE {
                    bail!(
                        "frame {idx}: team {team_idx} has {} heroes, expected {TEAM_SIZE}",
                        team.len()
                    );
                }
                if let Some(bad) = team.iter().position(|h| h.pos.len() < 2) {
                    bail!("frame {idx}: hero {team_idx}/{bad} has no 2D position");
                }
            }
        }
        Ok(())
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn match_id(&self) -> Option<u64> {
        self.game_info.match_id
    }

    pub fn position(&self, frame: usize, slot: HeroSlot) -> Option<Position> {
        self.frames.get(frame)?.hero(slot).map(HeroState::xy)
    }

    pub fn hero_name(&self, slot: HeroSlot) -> &str {
        let team = match slot.team {
            Team::Radiant => &self.game_info.radiant,
            Team::Dire => &self.game_info.dire,
        };
        team.players
            .get(slot.slot)
            .map(|p| p.hero.as_str())
            .unwrap_or("")
    }
}
