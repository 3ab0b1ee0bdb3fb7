use std::ops::{Index, IndexMut};

/// A slot arena with stable indices and free-slot reuse.
///
/// Values live densely in `entries`; `slots` maps a stable index to the
/// current entry position. Removal swaps the last entry into the hole and
/// pushes the freed slot for reuse, so lookups stay O(1) and indices
/// handed out earlier remain valid until their slot is removed.
pub struct Arena<T> {
    entries: Vec<(usize, T)>,
    slots: Vec<Option<usize>>,
    free_indexes: Vec<usize>,
}

impl<T> Arena<T> {
    pub const fn new() -> Arena<T> {
        Arena {
            entries: Vec::new(),
            slots: Vec::new(),
            free_indexes: Vec::new(),
        }
    }

    pub fn push(&mut self, value: T) -> usize {
        let index = if let Some(index) = self.free_indexes.pop() {
            debug_assert!(self.slots[index].is_none());
            self.slots[index] = Some(self.entries.len());
            index
        } else {
            let index = self.slots.len();
            self.slots.push(Some(self.entries.len()));
            index
        };
        self.entries.push((index, value));
        index
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, Option::is_some)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        let entries = &self.entries;
        self.slots
            .get(index)
            .copied()
            .flatten()
            .map(move |position| &entries[position].1)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let entries = &mut self.entries;
        self.slots
            .get(index)
            .copied()
            .flatten()
            .map(move |position| &mut entries[position].1)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        let position = self.slots.get(index).copied().flatten()?;
        self.slots[index] = None;
        self.free_indexes.push(index);

        let (_, value) = self.entries.swap_remove(position);
        if let Some(&(moved_index, _)) = self.entries.get(position) {
            self.slots[moved_index] = Some(position);
        }
        Some(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
        self.free_indexes.clear();
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        self.get(index)
            .unwrap_or_else(|| panic!("invalid arena index: {}", index))
    }
}

impl<T> IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.get_mut(index)
            .unwrap_or_else(|| panic!("invalid arena index: {}", index))
    }
}
