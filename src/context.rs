use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::match_data::{HeroSlot, MatchRecord, Team, team_label};

pub const ENVIRONMENT_GROUP: &str = "Environment";

// Separator of the flattened `group|||item` form used in case files and
// predictor requests.
const WIRE_SEPARATOR: &str = "|||";

const DAY_PHASE_SECS: f64 = 300.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub groups: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, group: &str, item: &str) -> Option<f64> {
        self.groups.get(group)?.get(item).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = ContextKey> + '_ {
        self.groups.iter().flat_map(|(group, items)| {
            items.keys().map(move |item| ContextKey::new(group, item))
        })
    }

    pub fn map_leaves(&self, mut score: impl FnMut(&str, &str) -> f64) -> Context {
        let groups = self
            .groups
            .iter()
            .map(|(group, items)| {
                let scored = items
                    .keys()
                    .map(|item| (item.clone(), score(group, item)))
                    .collect();
                (group.clone(), scored)
            })
            .collect();
        Context { groups }
    }
}

pub fn hero_group_name(record: &MatchRecord, slot: HeroSlot) -> String {
    let name = record.hero_name(slot).trim();
    if name.is_empty() {
        format!("{} {}", team_label(slot.team), slot.slot + 1)
    } else {
        name.to_string()
    }
}

/// Derives the context of `frame`. An absent record or a frame past the end
/// yields the empty context.
pub fn gen_context(record: Option<&MatchRecord>, frame: usize) -> Context {
    let Some(record) = record else {
        return Context::default();
    };
    let Some(cur) = record.frames.get(frame) else {
        return Context::default();
    };

    let mut groups: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();

    for team in Team::ALL {
        let mut alive = 0.0;
        let mut sum = [0.0, 0.0];
        for slot in HeroSlot::all().filter(|s| s.team == team) {
            let Some(hero) = cur.hero(slot) else {
                continue;
            };
            let [x, y] = hero.xy();
            let mut group_name = hero_group_name(record, slot);
            if groups.contains_key(&group_name) {
                group_name = format!("{group_name} ({} {})", team_label(team), slot.slot + 1);
            }
            let is_alive = hero.is_alive();
            groups.insert(
                group_name,
                BTreeMap::from([
                    ("x".to_string(), x),
                    ("y".to_string(), y),
                    ("life".to_string(), hero.life),
                    ("alive".to_string(), if is_alive { 1.0 } else { 0.0 }),
                ]),
            );
            if is_alive {
                alive += 1.0;
                sum[0] += x;
                sum[1] += y;
            }
        }
        let centroid = if alive > 0.0 {
            [sum[0] / alive, sum[1] / alive]
        } else {
            [0.0, 0.0]
        };
        groups.insert(
            team_label(team).to_string(),
            BTreeMap::from([
                ("alive".to_string(), alive),
                ("centroid_x".to_string(), centroid[0]),
                ("centroid_y".to_string(), centroid[1]),
            ]),
        );
    }

    let t = cur.game_time;
    let night = t >= 0.0 && ((t / DAY_PHASE_SECS).floor() as i64) % 2 == 1;
    groups.insert(
        ENVIRONMENT_GROUP.to_string(),
        BTreeMap::from([
            ("game_time".to_string(), t),
            ("pre_game".to_string(), if t < 0.0 { 1.0 } else { 0.0 }),
            ("night".to_string(), if night { 1.0 } else { 0.0 }),
        ]),
    );

    Context { groups }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey {
    pub group: String,
    pub item: String,
}

impl ContextKey {
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }

    pub fn to_wire(&self) -> String {
        format!("{}{WIRE_SEPARATOR}{}", self.group, self.item)
    }

    pub fn from_wire(raw: &str) -> Result<Self> {
        let (group, item) = raw
            .split_once(WIRE_SEPARATOR)
            .ok_or_else(|| anyhow!("context limit entry {raw:?} has no group separator"))?;
        Ok(Self::new(group, item))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextLimit {
    keys: BTreeSet<ContextKey>,
}

impl ContextLimit {
    pub fn contains(&self, group: &str, item: &str) -> bool {
        self.keys.contains(&ContextKey::new(group, item))
    }

    pub fn insert(&mut self, key: ContextKey) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: &ContextKey) -> bool {
        self.keys.remove(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextKey> {
        self.keys.iter()
    }

    pub fn to_wire(&self) -> Vec<String> {
        self.keys.iter().map(ContextKey::to_wire).collect()
    }

    pub fn from_wire<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let keys = entries
            .iter()
            .map(|raw| ContextKey::from_wire(raw.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { keys })
    }
}

impl FromIterator<ContextKey> for ContextLimit {
    fn from_iter<I: IntoIterator<Item = ContextKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
