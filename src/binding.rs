//! Binding configuration tree.
//!
//! ```text
//! ReferenceGraph
//! └── Collection (ordered)
//!     └── Binding (ordered)
//!         └── Message (ordered) ── device name + cached DeviceId
//! ```
//!
//! A [`Message`] names its device. The name is the persisted key; the cached
//! [`DeviceId`] is a non-owning handle that the
//! [`DeviceRegistry`](crate::registry::DeviceRegistry) fills in and repoints. A
//! handle that no longer resolves (the device was removed) reads the same as no
//! handle at all: "no device selected".
//!
//! The first message of a binding is its *trigger*. [`Binding::refresh`]
//! recomputes the binding's derived [`BindingState`] from the registry.

use crate::device::{Device, DeviceId};
use crate::direction::PortQuery;
use crate::registry::DeviceRegistry;
use serde::{Deserialize, Serialize};

/// MIDI message category a binding listens for or sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
}

/// One message slot of a binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    device: String,
    #[serde(default)]
    pub kind: MessageKind,
    /// MIDI channel, 1..=16.
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(skip)]
    handle: Option<DeviceId>,
}

fn default_channel() -> u8 {
    1
}

impl Message {
    pub fn new(device_name: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            device: device_name.into(),
            kind,
            channel: default_channel(),
            handle: None,
        }
    }

    /// The device this message refers to by name. Empty means none chosen.
    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// Cached handle of the referenced device, if one was resolved.
    pub fn device(&self) -> Option<DeviceId> {
        self.handle
    }

    /// Point at `device`, adopting its name.
    pub fn set_device(&mut self, device: &Device) {
        self.handle = Some(device.id());
        self.device = device.name().to_string();
    }

    /// Drop the cached handle; the name is kept.
    pub fn clear_device(&mut self) {
        self.handle = None;
    }
}

/// Derived state recomputed by [`Binding::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingState {
    /// Bumped on every refresh.
    pub revision: u64,
    /// The trigger message's device resolves and has any direction active.
    pub trigger_live: bool,
    /// Messages whose handle does not resolve to a registered device.
    pub unresolved: usize,
}

/// An ordered list of messages; the first one triggers the binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(skip)]
    state: BindingState,
}

impl Binding {
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            state: BindingState::default(),
        }
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    /// Number of times this binding has been refreshed.
    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    pub fn trigger(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// The trigger message names `device_name`.
    pub fn is_triggered_by(&self, device_name: &str) -> bool {
        self.trigger().is_some_and(|m| m.device_name() == device_name)
    }

    /// Any message names `device_name`.
    pub fn uses_device(&self, device_name: &str) -> bool {
        self.messages.iter().any(|m| m.device_name() == device_name)
    }

    /// Recompute derived state against the current registry contents.
    pub fn refresh(&mut self, registry: &DeviceRegistry) {
        let resolve = |m: &Message| m.device().and_then(|id| registry.get(id));

        self.state.revision += 1;
        self.state.trigger_live = self
            .trigger()
            .and_then(resolve)
            .is_some_and(|d| d.is_active(PortQuery::Either));
        self.state.unresolved = self.messages.iter().filter(|m| resolve(*m).is_none()).count();
    }
}

/// A named, ordered group of bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl Collection {
    pub fn new(name: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self {
            name: name.into(),
            bindings,
        }
    }
}

/// Root of the binding tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGraph {
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl ReferenceGraph {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    /// Every binding, in collection order then binding order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.collections.iter().flat_map(|c| c.bindings.iter())
    }

    pub fn bindings_mut(&mut self) -> impl Iterator<Item = &mut Binding> {
        self.collections.iter_mut().flat_map(|c| c.bindings.iter_mut())
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.bindings().flat_map(|b| b.messages.iter())
    }

    pub fn messages_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.bindings_mut().flat_map(|b| b.messages.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> ReferenceGraph {
        ReferenceGraph::new(vec![
            Collection::new(
                "Live",
                vec![
                    Binding::new(
                        "Scene",
                        vec![
                            Message::new("Keys", MessageKind::NoteOn),
                            Message::new("Pads", MessageKind::ControlChange),
                        ],
                    ),
                    Binding::new("Empty", vec![]),
                ],
            ),
            Collection::new(
                "Studio",
                vec![Binding::new(
                    "Fader",
                    vec![Message::new("Pads", MessageKind::PitchBend)],
                )],
            ),
        ])
    }

    #[test]
    fn trigger_is_first_message_only() {
        let graph = graph();
        let scene = &graph.collections[0].bindings[0];
        assert!(scene.is_triggered_by("Keys"));
        assert!(!scene.is_triggered_by("Pads"));
        assert!(scene.uses_device("Pads"));
        assert!(!graph.collections[0].bindings[1].is_triggered_by("Keys"));
    }

    #[test]
    fn traversal_is_ordered() {
        let graph = graph();
        let names: Vec<&str> = graph.messages().map(Message::device_name).collect();
        assert_eq!(names, vec!["Keys", "Pads", "Pads"]);
        assert_eq!(graph.bindings().count(), 3);
    }

    #[test]
    fn handle_and_state_are_not_serialized() {
        let json = r#"{"collections":[{"name":"Live","bindings":[{"name":"Scene",
            "messages":[{"device":"Keys","kind":"control_change"}]}]}]}"#;
        let graph: ReferenceGraph = serde_json::from_str(json).unwrap();
        let message = &graph.collections[0].bindings[0].messages[0];
        assert_eq!(message.device_name(), "Keys");
        assert_eq!(message.kind, MessageKind::ControlChange);
        assert_eq!(message.channel, 1);
        assert_eq!(message.device(), None);

        let out = serde_json::to_string(&graph).unwrap();
        assert!(!out.contains("handle"));
        assert!(!out.contains("revision"));
    }
}
