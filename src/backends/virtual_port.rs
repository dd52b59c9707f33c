//! In-memory MIDI transport.
//!
//! [`VirtualBackend`] simulates a set of named endpoints. Every endpoint has a
//! per-direction *availability* (whether an open attempt succeeds), can be
//! limited to a number of successful opens, and can be told to jam open so that
//! a close attempt fails. The backend is cheap to clone;
//! clones share the same endpoints, so a host (or a test) can keep one clone to
//! flip availability while the registry owns the handles.

use crate::direction::{Direction, DirectionSet};
use crate::transport::{PortHandle, PortProvider};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default, Clone)]
struct Endpoint {
    name: String,
    available: DirectionSet,
    stuck_open: DirectionSet,
    open: DirectionSet,
    open_limit: [Option<usize>; 2],
    calls: usize,
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Input => 0,
        Direction::Output => 1,
    }
}

#[derive(Debug, Default)]
struct Endpoints(Vec<Endpoint>);

impl Endpoints {
    fn get(&self, name: &str) -> Option<&Endpoint> {
        self.0.iter().find(|e| e.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Endpoint> {
        self.0.iter_mut().find(|e| e.name == name)
    }
}

/// Shared, in-memory set of endpoints.
#[derive(Debug, Default, Clone)]
pub struct VirtualBackend {
    endpoints: Arc<Mutex<Endpoints>>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Endpoints> {
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add (or reset) an endpoint whose directions open according to `available`.
    pub fn add_endpoint(&self, name: &str, available: DirectionSet) {
        let mut endpoints = self.lock();
        match endpoints.get_mut(name) {
            Some(endpoint) => endpoint.available = available,
            None => endpoints.0.push(Endpoint {
                name: name.to_string(),
                available,
                ..Endpoint::default()
            }),
        }
    }

    /// Unplug an endpoint. Existing handles stay valid but can no longer open.
    pub fn remove_endpoint(&self, name: &str) {
        self.lock().0.retain(|e| e.name != name);
    }

    /// Change whether opening `direction` of `name` succeeds.
    pub fn set_available(&self, name: &str, direction: Direction, available: bool) {
        if let Some(endpoint) = self.lock().get_mut(name) {
            endpoint.available.set(direction, available);
        }
    }

    /// Make closing `direction` of `name` fail while it is open.
    pub fn set_stuck_open(&self, name: &str, direction: Direction, stuck: bool) {
        if let Some(endpoint) = self.lock().get_mut(name) {
            endpoint.stuck_open.set(direction, stuck);
        }
    }

    /// Let only `opens` more open attempts on `direction` of `name` succeed;
    /// `None` lifts the limit.
    pub fn set_open_limit(&self, name: &str, direction: Direction, opens: Option<usize>) {
        if let Some(endpoint) = self.lock().get_mut(name) {
            endpoint.open_limit[slot(direction)] = opens;
        }
    }

    /// Whether `direction` of `name` is open.
    pub fn is_open(&self, name: &str, direction: Direction) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|e| e.open.get(direction))
    }

    /// Number of open/close calls made against `name` so far.
    pub fn calls(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, |e| e.calls)
    }
}

impl PortProvider for VirtualBackend {
    fn connect(&mut self, name: &str) -> Box<dyn PortHandle> {
        Box::new(VirtualPort {
            name: name.to_string(),
            backend: self.clone(),
        })
    }

    fn port_names(&self) -> Vec<String> {
        self.lock().0.iter().map(|e| e.name.clone()).collect()
    }
}

/// Handle onto one endpoint of a [`VirtualBackend`].
#[derive(Debug, Clone)]
pub struct VirtualPort {
    name: String,
    backend: VirtualBackend,
}

impl PortHandle for VirtualPort {
    fn open_port(&mut self, direction: Direction) -> Result<(), String> {
        let mut endpoints = self.backend.lock();
        let endpoint = endpoints
            .get_mut(&self.name)
            .ok_or_else(|| format!("no endpoint named {:?}", self.name))?;
        endpoint.calls += 1;
        if !endpoint.available.get(direction) {
            return Err(format!("{direction} side unavailable"));
        }
        match &mut endpoint.open_limit[slot(direction)] {
            Some(0) => return Err(format!("{direction} side out of opens")),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        endpoint.open.set(direction, true);
        Ok(())
    }

    fn close_port(&mut self, direction: Direction) -> Result<(), String> {
        let mut endpoints = self.backend.lock();
        let Some(endpoint) = endpoints.get_mut(&self.name) else {
            return Ok(());
        };
        endpoint.calls += 1;
        if endpoint.open.get(direction) && endpoint.stuck_open.get(direction) {
            return Err(format!("{direction} side refused to close"));
        }
        endpoint.open.set(direction, false);
        Ok(())
    }

    fn is_port_open(&self, direction: Direction) -> bool {
        self.backend.is_open(&self.name, direction)
    }
}
