use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

#[derive(Debug)]
pub struct Memo<K, V> {
    slot: RefCell<Option<(K, Rc<V>)>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> Rc<V> {
        if let Some((cached_key, value)) = self.slot.borrow().as_ref()
            && *cached_key == key
        {
            return Rc::clone(value);
        }
        let value = Rc::new(compute());
        *self.slot.borrow_mut() = Some((key, Rc::clone(&value)));
        value
    }
}

// Keyed cache for derived views requested with many argument sets at once
// (one entry per strategy or per grid configuration). Entries are dropped
// wholesale once `capacity` is reached.
#[derive(Debug)]
pub struct MemoMap<K, V> {
    entries: RefCell<HashMap<K, Rc<V>>>,
    capacity: usize,
}

impl<K: Eq + Hash, V> MemoMap<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RefCell::new(HashMap::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> Rc<V> {
        if let Some(value) = self.entries.borrow().get(&key) {
            return Rc::clone(value);
        }
        let value = Rc::new(compute());
        let mut entries = self.entries.borrow_mut();
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, Rc::clone(&value));
        value
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
