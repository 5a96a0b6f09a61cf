//! Instance registry - Zero-or-one live instance plus the creation guard

use super::instance::{InstanceRecord, LifecycleState};

/// Holds the single instance slot. Pure state, no I/O.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    record: Option<InstanceRecord>,
    guarded: bool,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&InstanceRecord> {
        self.record.as_ref()
    }

    pub fn set(&mut self, record: InstanceRecord) {
        self.record = Some(record);
    }

    pub fn clear(&mut self) {
        self.record = None;
    }

    /// Remove and return the record, leaving the slot absent
    pub fn take(&mut self) -> Option<InstanceRecord> {
        self.record.take()
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    pub fn set_guarded(&mut self, guarded: bool) {
        self.guarded = guarded;
    }

    pub fn state(&self) -> LifecycleState {
        match (&self.record, self.guarded) {
            (Some(_), _) => LifecycleState::Active,
            (None, true) => LifecycleState::Creating,
            (None, false) => LifecycleState::Empty,
        }
    }

    /// Enter `Creating` if the registry is `Empty`; otherwise report the current state
    pub fn try_begin_creation(&mut self) -> Result<(), LifecycleState> {
        match self.state() {
            LifecycleState::Empty => {
                self.guarded = true;
                Ok(())
            }
            state => Err(state),
        }
    }

    /// Store a fully created instance and release the guard
    pub fn complete_creation(&mut self, record: InstanceRecord) {
        self.set(record);
        self.set_guarded(false);
    }
}
