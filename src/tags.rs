use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::memo::MemoMap;

pub const TAG_CAPACITY: usize = 20;

#[derive(Debug)]
pub struct TagRegistry {
    slots: Vec<BTreeSet<String>>,
    revision: u64,
    clusters: MemoMap<(u64, Vec<usize>), BTreeMap<usize, Vec<String>>>,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            slots: vec![BTreeSet::new(); TAG_CAPACITY],
            revision: 0,
            clusters: MemoMap::with_capacity(32),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn tags(&self, idx: usize) -> Option<&BTreeSet<String>> {
        self.slots.get(idx)
    }

    pub fn add_tag(&mut self, indices: &[usize], tag: &str) -> Result<()> {
        self.check_indices(indices)?;
        for &idx in indices {
            self.slots[idx].insert(tag.to_string());
        }
        self.touch();
        Ok(())
    }

    pub fn remove_tag(&mut self, indices: &[usize], tag: &str) -> Result<()> {
        self.check_indices(indices)?;
        for &idx in indices {
            self.slots[idx].remove(tag);
        }
        self.touch();
        Ok(())
    }

    // Applies the difference between `old_tags` and `new_tags` to every slot
    // in `indices`; tags present in both are left untouched.
    pub fn set_tags(
        &mut self,
        indices: &[usize],
        new_tags: &BTreeSet<String>,
        old_tags: &BTreeSet<String>,
    ) -> Result<()> {
        self.check_indices(indices)?;
        for tag in new_tags.difference(old_tags) {
            self.add_tag(indices, tag)?;
        }
        for tag in old_tags.difference(new_tags) {
            self.remove_tag(indices, tag)?;
        }
        Ok(())
    }

    pub fn init_tags(&mut self, lists: &[Vec<String>]) -> Result<()> {
        if lists.len() > TAG_CAPACITY {
            bail!(
                "{} tag lists exceed the registry capacity of {TAG_CAPACITY}",
                lists.len()
            );
        }
        let mut slots = vec![BTreeSet::new(); TAG_CAPACITY];
        for (slot, list) in slots.iter_mut().zip(lists) {
            slot.extend(list.iter().cloned());
        }
        self.slots = slots;
        self.touch();
        Ok(())
    }

    pub fn save_tags(&self) -> Vec<Vec<String>> {
        self.slots
            .iter()
            .map(|set| set.iter().cloned().collect())
            .collect()
    }

    pub fn cluster_tags(&self, indices: &[usize]) -> Result<Rc<BTreeMap<usize, Vec<String>>>> {
        self.check_indices(indices)?;
        let key = (self.revision, indices.to_vec());
        Ok(self.clusters.get_or_compute(key, || {
            indices
                .iter()
                .map(|&idx| (idx, self.slots[idx].iter().cloned().collect()))
                .collect()
        }))
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        if let Some(bad) = indices.iter().find(|&&idx| idx >= self.slots.len()) {
            bail!("tag slot {bad} out of range (capacity {})", self.slots.len());
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.clusters.clear();
    }
}
