//! Lazily produced, screen-owned surfaces.
//!
//! A producer runs at most once per registration; its surface is kept until
//! the entry is invalidated or registered again. A failing producer leaves
//! nothing behind and the entry stays failed until re-registered or
//! invalidated, so a screen can detect the failure and draw a fallback.

use crate::{CacheError, Surface};
use ahash::AHashMap;
use std::rc::Rc;
use tracing::{debug, warn};

type Producer = Box<dyn Fn() -> anyhow::Result<Surface>>;

enum Slot {
    Pending,
    Ready(Rc<Surface>),
    Failed(String),
}

struct Entry {
    producer: Producer,
    slot: Slot,
}

#[derive(Default)]
pub struct StaticSurfaceCache {
    entries: AHashMap<String, Entry>,
    producer_runs: u64,
}

impl StaticSurfaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the producer for `name`. Any cached surface or
    /// recorded failure for that name is dropped.
    pub fn register<F>(&mut self, name: impl Into<String>, producer: F)
    where
        F: Fn() -> anyhow::Result<Surface> + 'static,
    {
        let name = name.into();
        debug!(target: "render.cache", name = %name, "static_surface_registered");
        self.entries.insert(
            name,
            Entry {
                producer: Box::new(producer),
                slot: Slot::Pending,
            },
        );
    }

    pub fn get(&mut self, name: &str) -> Result<Rc<Surface>, CacheError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| CacheError::NotRegistered(name.to_string()))?;
        match &entry.slot {
            Slot::Ready(surface) => return Ok(Rc::clone(surface)),
            Slot::Failed(reason) => {
                return Err(CacheError::ProducerFailed {
                    name: name.to_string(),
                    reason: reason.clone(),
                });
            }
            Slot::Pending => {}
        }
        self.producer_runs += 1;
        match (entry.producer)() {
            Ok(surface) => {
                let surface = Rc::new(surface);
                entry.slot = Slot::Ready(Rc::clone(&surface));
                Ok(surface)
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(target: "render.cache", name, error = %reason, "static_surface_producer_failed");
                entry.slot = Slot::Failed(reason.clone());
                Err(CacheError::ProducerFailed {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Drop the cached surface (or failure) so the next `get` produces again.
    /// Returns whether `name` is registered.
    pub fn invalidate(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.slot = Slot::Pending;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.slot = Slot::Pending;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        matches!(
            self.entries.get(name).map(|e| &e.slot),
            Some(Slot::Ready(_))
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total producer invocations since construction.
    pub fn producer_runs(&self) -> u64 {
        self.producer_runs
    }
}

impl std::fmt::Debug for StaticSurfaceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSurfaceCache")
            .field("entries", &self.entries.len())
            .field("producer_runs", &self.producer_runs)
            .finish()
    }
}
