use std::cell::Cell;

use bitflags::bitflags;

bitflags! {
    /// The per-view lifecycle state. `RENDERED` may be re-entered on every
    /// render cycle; `DESTROYED` is terminal.
    #[derive(Default)]
    pub struct LifecycleFlags: u8 {
        const RENDERED = 0b001;
        const ATTACHED = 0b010;
        const DESTROYED = 0b100;
    }
}

/// Interior-mutable holder for a view's lifecycle flags.
#[derive(Debug, Default)]
pub struct LifecycleCell {
    flags: Cell<LifecycleFlags>,
}

impl LifecycleCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> LifecycleFlags {
        self.flags.get()
    }

    pub fn insert(&self, flags: LifecycleFlags) {
        self.flags.set(self.flags.get() | flags);
    }

    pub fn remove(&self, flags: LifecycleFlags) {
        self.flags.set(self.flags.get() - flags);
    }

    pub fn is_rendered(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::RENDERED)
    }

    pub fn is_attached(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::ATTACHED)
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::DESTROYED)
    }
}
