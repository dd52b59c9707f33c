//! midiport — MIDI device port lifecycle for binding configurations.
//!
//! Tracks, per named MIDI endpoint, which directions (input/output) can open and
//! which are active, keeps that state consistent with the transport, and
//! cascades device changes through the binding tree that references devices by
//! name.
//!
//! ```
//! use midiport::backends::VirtualBackend;
//! use midiport::{Binding, Collection, DeviceRecord, DeviceRegistry, Direction, DirectionSet,
//!                Message, MessageKind, ReferenceGraph};
//!
//! let backend = VirtualBackend::new();
//! backend.add_endpoint("Launchpad", DirectionSet::BOTH);
//!
//! let mut graph = ReferenceGraph::new(vec![Collection::new(
//!     "Live",
//!     vec![Binding::new("Scene", vec![Message::new("Launchpad", MessageKind::NoteOn)])],
//! )]);
//!
//! let mut registry = DeviceRegistry::new(backend.clone());
//! registry.add(&DeviceRecord::named("Launchpad").with_active(DirectionSet::BOTH), &mut graph);
//!
//! assert!(backend.is_open("Launchpad", Direction::Input));
//! assert!(graph.collections[0].bindings[0].state().trigger_live);
//! ```

pub mod backends;
pub mod binding;
pub mod config;
pub mod device;
pub mod direction;
pub mod error;
pub mod notify;
pub mod registry;
pub mod transport;

pub use binding::*;
pub use config::*;
pub use device::*;
pub use direction::*;
pub use error::*;
pub use notify::*;
pub use registry::*;
pub use transport::*;
