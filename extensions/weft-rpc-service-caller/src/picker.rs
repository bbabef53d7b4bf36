use crate::resolver::Endpoint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Per-endpoint health as seen by the picker. Marked down on connect
/// failure, up again on successful connect or re-resolution.
#[derive(Debug)]
pub struct EndpointState {
    endpoint: Endpoint,
    healthy: AtomicBool,
}

impl EndpointState {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

/// Chooses which endpoint serves a call.
///
/// The endpoint list is an immutable snapshot swapped wholesale on
/// re-resolution, so in-flight picks never observe a half-updated list. A
/// rotating cursor walks healthy endpoints; unhealthy ones are skipped,
/// and the rotation never sticks to a single endpoint while others are
/// healthy. A pick is fixed for its call's lifetime; the picker is never
/// consulted again mid-call.
#[derive(Default)]
pub struct RoundRobinPicker {
    snapshot: RwLock<Arc<Vec<Arc<EndpointState>>>>,
    cursor: AtomicUsize,
}

impl RoundRobinPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the endpoint set. A fresh resolution is a fresh health
    /// view: every endpoint starts healthy again.
    pub fn update(&self, endpoints: Vec<Endpoint>) {
        let next: Vec<Arc<EndpointState>> = endpoints
            .into_iter()
            .map(|endpoint| {
                Arc::new(EndpointState {
                    endpoint,
                    healthy: AtomicBool::new(true),
                })
            })
            .collect();
        *self.snapshot.write().unwrap() = Arc::new(next);
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap().len()
    }

    /// The next healthy endpoint in rotation, or `None` when every
    /// endpoint is down.
    pub fn pick(&self) -> Option<Arc<EndpointState>> {
        let snapshot = self.snapshot.read().unwrap().clone();
        if snapshot.is_empty() {
            return None;
        }

        let len = snapshot.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..len {
            let candidate = &snapshot[(start + offset) % len];
            if candidate.is_healthy() {
                return Some(candidate.clone());
            }
        }
        None
    }

    /// The first healthy endpoint, without rotating. Used by the
    /// pick-first policy.
    pub fn pick_first(&self) -> Option<Arc<EndpointState>> {
        let snapshot = self.snapshot.read().unwrap().clone();
        snapshot.iter().find(|s| s.is_healthy()).cloned()
    }

    pub fn mark_down(&self, endpoint: &Endpoint) {
        self.set_health(endpoint, false);
    }

    pub fn mark_up(&self, endpoint: &Endpoint) {
        self.set_health(endpoint, true);
    }

    fn set_health(&self, endpoint: &Endpoint, healthy: bool) {
        let snapshot = self.snapshot.read().unwrap().clone();
        for state in snapshot.iter() {
            if &state.endpoint == endpoint {
                state.healthy.store(healthy, Ordering::Release);
            }
        }
    }
}
