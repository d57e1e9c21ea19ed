//! Per-plugin persistent state.
//!
//! Stateful plugins (recency tracking, recently placed VMs) keep data
//! across requests. Each plugin owns one slot, keyed by its name and
//! guarded by its own mutex, so concurrent requests serialize on a
//! plugin's slot without contending on anybody else's.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{EngineError, EngineResult};

/// One plugin's private state, opaque to the orchestrator.
#[derive(Default)]
pub struct PluginState {
    value: Option<Box<dyn Any + Send>>,
}

impl PluginState {
    /// Borrow the state as `T`, creating it empty on first use.
    pub fn get_or_default<T: Default + Send + 'static>(&mut self) -> &mut T {
        let slot = self.value.get_or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            *slot = Box::new(T::default());
        }
        match slot.downcast_mut::<T>() {
            Some(state) => state,
            None => unreachable!("slot was just set to the requested type"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

type Slot = Arc<Mutex<PluginState>>;

/// Process-wide map from plugin name to that plugin's state slot.
#[derive(Default)]
pub struct StateStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `plugin`, created empty on first use.
    pub fn slot(&self, plugin: &str) -> EngineResult<Slot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| EngineError::StatePoisoned("<store>".to_string()))?;
        Ok(slots.entry(plugin.to_string()).or_default().clone())
    }

    /// Number of plugins that have touched their state.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a slot, mapping poisoning to an engine error.
pub(crate) fn lock<'a>(slot: &'a Slot, plugin: &str) -> EngineResult<MutexGuard<'a, PluginState>> {
    slot.lock()
        .map_err(|_| EngineError::StatePoisoned(plugin.to_string()))
}
