//! Device state machine.
//!
//! A [`Device`] is one named MIDI endpoint. For each [`Direction`] it tracks
//! two flags:
//!
//! - **capable**: the port opened the last time it was probed
//!   ([`Device::check_capable`]). Never set by callers directly.
//! - **active**: the direction was requested *and* the port is open.
//!
//! ## Transitions
//! [`Device::set_active`] is the only way the active flags change:
//!
//! ```text
//! Inactive --set_active(d, true),  capable(d), port opens  --> Active
//! Active   --set_active(d, false),             port closes --> Inactive
//! ```
//!
//! The flag is flipped only after the transport confirms the new port state. If
//! the port ends up in the wrong state the call returns
//! [`PortError::PortOpen`] and the flag is left alone, so recorded state never
//! disagrees with reality.
//!
//! Devices do not know about bindings. Operations report what they changed as
//! [`Transition`]s; the [`DeviceRegistry`](crate::registry::DeviceRegistry) turns
//! activations into binding refreshes.

use crate::config::DeviceRecord;
use crate::direction::{Direction, DirectionSet, PortQuery};
use crate::error::PortError;
use crate::transport::PortHandle;
use std::fmt;

/// Registry-assigned device identity. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// What a single `set_active` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do: locked device, state already matches, or not capable.
    Unchanged,
    Activated(Direction),
    Deactivated(Direction),
}

/// Outcome of one per-direction toggle inside a multi-step operation.
pub type Toggle = Result<Transition, PortError>;

/// One named MIDI endpoint.
pub struct Device {
    id: DeviceId,
    name: String,
    active: DirectionSet,
    capable: DirectionSet,
    thru: Option<String>,
    editable: bool,
    port: Box<dyn PortHandle>,
}

impl Device {
    /// Wrap a port handle. The device starts inactive and not capable; call
    /// [`check_capable`](Device::check_capable) to probe.
    pub fn new(id: DeviceId, name: impl Into<String>, port: Box<dyn PortHandle>) -> Self {
        Self {
            id,
            name: name.into(),
            active: DirectionSet::NONE,
            capable: DirectionSet::NONE,
            thru: None,
            editable: true,
            port,
        }
    }

    /// A locked device: its active state can never be changed.
    pub fn locked(id: DeviceId, name: impl Into<String>, port: Box<dyn PortHandle>) -> Self {
        Self {
            editable: false,
            ..Self::new(id, name, port)
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thru(&self) -> Option<&str> {
        self.thru.as_deref()
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn active(&self) -> DirectionSet {
        self.active
    }

    pub fn capable(&self) -> DirectionSet {
        self.capable
    }

    /// Whether the queried direction is active. `Either` is true when any is.
    pub fn is_active(&self, query: impl Into<PortQuery>) -> bool {
        self.active.matches(query.into())
    }

    pub fn is_capable(&self, query: impl Into<PortQuery>) -> bool {
        self.capable.matches(query.into())
    }

    /// Apply a config record: request each direction per the `active` bitmask and
    /// store `thru` (empty clears it). The record's name is not looked at.
    pub fn update(&mut self, record: &DeviceRecord) -> Vec<Toggle> {
        let wanted = record.active_set();
        let toggles = Direction::ALL
            .iter()
            .map(|&direction| self.set_active(direction, wanted.get(direction)))
            .collect();
        self.thru = record.thru_name().map(str::to_string);
        toggles
    }

    /// Drive `direction` toward `want`.
    ///
    /// Returns `Ok(Transition::Unchanged)` without touching the port if the device
    /// is locked, already in the requested state, or not capable of `direction`.
    pub fn set_active(&mut self, direction: Direction, want: bool) -> Toggle {
        if !self.editable || self.active.get(direction) == want || !self.capable.get(direction) {
            return Ok(Transition::Unchanged);
        }

        let result = if want {
            self.port.open_port(direction)
        } else {
            self.port.close_port(direction)
        };
        if let Err(reason) = &result {
            tracing::debug!(device = %self.name, %direction, %reason, "transport call failed");
        }

        if self.port.is_port_open(direction) != want {
            return Err(PortError::PortOpen {
                device: self.name.clone(),
                direction,
                expected_open: want,
                reason: result.err(),
            });
        }

        self.active.set(direction, want);
        Ok(if want {
            Transition::Activated(direction)
        } else {
            Transition::Deactivated(direction)
        })
    }

    /// Re-probe which directions can open, then restore the requested state.
    ///
    /// Ports are closed for the duration of the probe. Directions that were
    /// active and are still capable come back active; directions that lost
    /// capability end up inactive.
    pub fn check_capable(&mut self) -> Vec<Toggle> {
        let previous = self.active;
        self.active = DirectionSet::NONE;

        tracing::info!(device = %self.name, "checking device capabilities");

        self.close_ports();
        for direction in Direction::ALL {
            // Failures show up as a closed port, which is what gets recorded.
            let _ = self.port.open_port(direction);
            self.capable.set(direction, self.port.is_port_open(direction));
            let _ = self.port.close_port(direction);
        }

        tracing::info!(
            device = %self.name,
            input = self.capable.input,
            output = self.capable.output,
            "device capabilities checked, re-opening active ports"
        );

        Direction::ALL
            .iter()
            .map(|&direction| self.set_active(direction, previous.get(direction)))
            .collect()
    }

    /// Close both directions without touching the active flags.
    pub(crate) fn close_ports(&mut self) {
        for direction in Direction::ALL {
            if let Err(reason) = self.port.close_port(direction) {
                tracing::debug!(device = %self.name, %direction, %reason, "close failed");
            }
        }
    }

    /// Persisted form: name, active bitmask, and thru when set.
    pub fn to_record(&self) -> DeviceRecord {
        DeviceRecord {
            name: self.name.clone(),
            active: self.active.to_mask(),
            thru: self.thru.clone(),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("capable", &self.capable)
            .field("thru", &self.thru)
            .field("editable", &self.editable)
            .finish_non_exhaustive()
    }
}
