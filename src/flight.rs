use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// At most one in-flight operation per key, process wide. A second caller is turned
/// away instead of queued.
#[derive(Debug, Default, Clone)]
pub struct SingleFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Held for the duration of an operation; releases the key on drop.
#[derive(Debug)]
pub struct FlightPermit {
    key: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: &str) -> Option<FlightPermit> {
        let mut active = self.active.lock();
        if !active.insert(key.to_string()) {
            return None;
        }
        Some(FlightPermit {
            key: key.to_string(),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.lock().contains(key)
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}
