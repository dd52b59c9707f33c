//! Transport seam.
//!
//! The crate never talks to a MIDI driver directly. A [`PortProvider`] hands out
//! one [`PortHandle`] per device name, and each [`Device`](crate::device::Device)
//! drives its handle through open/close calls, then reads back the actual port
//! state with [`PortHandle::is_port_open`].
//!
//! # Contract
//! - Calls are synchronous and either take effect or fail before returning.
//! - Opening an open port, or closing a closed one, is a harmless no-op.
//! - `is_port_open` reports reality; it is the only source the device trusts.

use crate::direction::Direction;

/// Opens and closes one named endpoint, per direction.
pub trait PortHandle: Send {
    /// Try to open `direction`. An `Err` is informational: callers still check
    /// [`is_port_open`](PortHandle::is_port_open) afterwards.
    fn open_port(&mut self, direction: Direction) -> Result<(), String>;

    /// Close `direction`.
    fn close_port(&mut self, direction: Direction) -> Result<(), String>;

    /// Whether `direction` is open right now.
    fn is_port_open(&self, direction: Direction) -> bool;
}

/// Source of port handles.
pub trait PortProvider: Send {
    /// Create a handle bound to the endpoint called `name`.
    ///
    /// Names unknown to the transport still get a handle; it simply never opens,
    /// which probing records as "not capable".
    fn connect(&mut self, name: &str) -> Box<dyn PortHandle>;

    /// Names of the endpoints the transport currently sees, in enumeration order.
    fn port_names(&self) -> Vec<String>;
}
