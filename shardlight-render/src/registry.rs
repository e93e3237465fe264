//! Handle registries.

use slab::Slab;

/// Issued by a `Registry`. Remembers the generation of its slot, so a key kept past `remove`
/// never reaches whatever was inserted there next.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    index: usize,
    generation: u64,
}

impl Key {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Values behind keys. Freed slots are handed out again.
#[derive(Debug)]
pub struct Registry<T> {
    slab: Slab<(u64, T)>,
    generation: u64,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slab: Slab::new(),
            generation: 0,
        }
    }
}

impl<T> Registry<T> {
    pub fn insert(&mut self, value: T) -> Key {
        self.generation += 1;
        let index = self.slab.insert((self.generation, value));
        Key {
            index,
            generation: self.generation,
        }
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        self.slab
            .get(key.index)
            .filter(|entry| entry.0 == key.generation)
            .map(|entry| &entry.1)
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.slab
            .get_mut(key.index)
            .filter(|entry| entry.0 == key.generation)
            .map(|entry| &mut entry.1)
    }

    pub fn remove(&mut self, key: Key) -> Option<T> {
        self.get(key)?;
        Some(self.slab.remove(key.index).1)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }
}
