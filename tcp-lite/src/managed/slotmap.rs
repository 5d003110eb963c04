/// A fixed-capacity table with generational keys.
///
/// A slotmap provides a `Vec`-like interface where each entry is associated with a stable
/// index-like key. Lookup with the key will detect if an entry has been removed, even if the slot
/// it occupied has since been reused for another entry.
///
/// Unlike a `Vec` the capacity is a hard limit chosen at construction. Slots are only allocated
/// once they are first needed and a freed slot is always reused before a new one is allocated,
/// lowest index first.
///
/// ## Usage
///
/// ```
/// # use tcp_lite::managed::SlotMap;
/// let mut map = SlotMap::with_capacity(2);
/// let key = map.insert(42).unwrap();
/// assert_eq!(map.get(key).cloned(), Some(42));
/// assert_eq!(map.remove(key), Some(42));
/// assert_eq!(map.get(key), None);
/// ```
#[derive(Debug)]
pub struct SlotMap<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    generation: Generation,
    len: usize,
}

/// An index into a slotmap.
///
/// The index remains valid until the entry is removed. If accessing the slotmap with the index
/// again after the entry was removed will fail, even if the index where the element was previously
/// stored has been reused for another element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Key {
    idx: usize,
    generation: Generation,
}

#[derive(Debug)]
struct Slot<T> {
    /// The generation of the current occupant, or of the last one if the slot is free.
    generation_id: Generation,
    element: Option<T>,
}

/// The generation counter.
///
/// Has strictly positive values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Generation(isize);

impl<T> SlotMap<T> {
    /// Create an empty map that holds at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        SlotMap {
            slots: Vec::with_capacity(capacity),
            capacity,
            generation: Generation::default(),
            len: 0,
        }
    }

    /// The maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Retrieve a value by index.
    pub fn get(&self, index: Key) -> Option<&T> {
        let slot = self.slots.get(index.idx)?;
        if slot.generation_id != index.generation {
            return None;
        }

        slot.element.as_ref()
    }

    /// Retrieve a mutable value by index.
    pub fn get_mut(&mut self, index: Key) -> Option<&mut T> {
        let slot = self.slots.get_mut(index.idx)?;
        if slot.generation_id != index.generation {
            return None;
        }

        slot.element.as_mut()
    }

    /// Check if the key refers to a current entry.
    pub fn contains_key(&self, index: Key) -> bool {
        self.get(index).is_some()
    }

    /// Insert a value into the first free slot.
    ///
    /// Returns `None` and drops nothing if all slots are occupied.
    pub fn insert(&mut self, value: T) -> Option<Key> {
        let idx = self.free()?;
        let generation = self.generation;
        self.generation.advance();

        let slot = Slot {
            generation_id: generation,
            element: Some(value),
        };
        if idx == self.slots.len() {
            self.slots.push(slot);
        } else {
            self.slots[idx] = slot;
        }
        self.len += 1;

        Some(Key { idx, generation })
    }

    /// Remove an element.
    ///
    /// If successful, return the removed element. Returns `None` if the provided index did not
    /// refer to a current element, in particular if it was removed already.
    pub fn remove(&mut self, index: Key) -> Option<T> {
        let slot = self.slots.get_mut(index.idx)?;
        if slot.generation_id != index.generation {
            return None;
        }

        let element = slot.element.take()?;
        self.len -= 1;
        Some(element)
    }

    /// Iterate over all current entries and their keys.
    pub fn iter(&self) -> impl Iterator<Item=(Key, &T)> + '_ {
        self.slots.iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let key = Key { idx, generation: slot.generation_id };
                slot.element.as_ref().map(|element| (key, element))
            })
    }

    /// Get the next free slot, possibly one past the allocated ones.
    fn free(&self) -> Option<usize> {
        let vacant = self.slots.iter()
            .position(|slot| slot.element.is_none());
        match vacant {
            Some(idx) => Some(idx),
            None if self.slots.len() < self.capacity => Some(self.slots.len()),
            None => None,
        }
    }
}

impl Key {
    /// The slot index of this key.
    pub fn index(self) -> usize {
        self.idx
    }
}

impl Generation {
    fn advance(&mut self) {
        assert!(self.0 > 0);
        self.0 = self.0.wrapping_add(1).max(1)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Generation(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let mut map = SlotMap::with_capacity(2);
        let key42 = map.insert(42u32).unwrap();
        let keylo = map.insert('K' as _).unwrap();

        assert_eq!(map.insert(0x9999), None);
        assert_eq!(map.get(key42).cloned(), Some(42));
        assert_eq!(map.get(keylo).cloned(), Some('K' as _));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn retained() {
        let mut map = SlotMap::with_capacity(1);
        let key = map.insert(0xdeu32).unwrap();
        assert_eq!(map.remove(key), Some(0xde));
        assert_eq!(map.get(key), None);

        let new_key = map.insert(0xad).unwrap();
        assert_eq!(new_key.index(), key.index());

        assert_eq!(map.get(key), None);
        assert_eq!(map.get_mut(key), None);
        assert_eq!(map.get(new_key).cloned(), Some(0xad));

        assert_eq!(map.remove(key), None);
        assert_eq!(map.remove(new_key), Some(0xad));

        assert_eq!(map.get(key), None);
        assert_eq!(map.get(new_key), None);
        assert!(map.is_empty());
    }

    #[test]
    fn lowest_slot_reused() {
        let mut map = SlotMap::with_capacity(4);
        let keys: Vec<_> = (0..4u8).map(|i| map.insert(i).unwrap()).collect();
        map.remove(keys[2]).unwrap();
        map.remove(keys[1]).unwrap();

        let reused = map.insert(10).unwrap();
        assert_eq!(reused.index(), 1);
        assert_eq!(map.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![0, 10, 3]);
        assert!(map.contains_key(keys[0]));
        assert!(!map.contains_key(keys[1]));
    }

    #[test]
    fn full_capacity() {
        let mut map = SlotMap::with_capacity(64);
        for i in 0..64 {
            assert!(map.insert(i).is_some());
        }
        assert_eq!(map.insert(64), None);
        assert_eq!(map.len(), map.capacity());
    }
}
