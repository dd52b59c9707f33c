//! Device registry tests

#![cfg(feature = "virtual")]

use midiport::backends::VirtualBackend;
use midiport::{
    Binding, Collection, DeviceRecord, DeviceRegistry, Direction, DirectionSet, Message,
    MessageKind, Prompt, RecordingNotifier, ReferenceGraph, RegistryConfig, DUMMY_DEVICE_NAME,
};

fn registry(backend: &VirtualBackend) -> (DeviceRegistry, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let registry = DeviceRegistry::new(backend.clone()).with_notifier(notifier.clone());
    (registry, notifier)
}

fn graph(bindings: Vec<Binding>) -> ReferenceGraph {
    ReferenceGraph::new(vec![Collection::new("Main", bindings)])
}

fn binding(name: &str, devices: &[&str]) -> Binding {
    Binding::new(
        name,
        devices
            .iter()
            .map(|d| Message::new(*d, MessageKind::NoteOn))
            .collect(),
    )
}

fn revision(graph: &ReferenceGraph, index: usize) -> u64 {
    graph.collections[0].bindings[index].revision()
}

fn load(registry: &mut DeviceRegistry, names: &[&str], graph: &mut ReferenceGraph) {
    let config = RegistryConfig {
        devices: names.iter().map(|n| DeviceRecord::named(*n)).collect(),
    };
    registry.load_config(&config, graph);
}

fn port_open_error(device: &str, direction: Direction) -> Prompt {
    Prompt::PortOpenError {
        device: device.into(),
        direction,
    }
}

#[test]
fn activation_opens_port_and_refreshes_trigger_binding_once() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, notifier) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    registry.add_name("A", &mut graph);
    let before = revision(&graph, 0);

    assert!(registry.set_active("A", Direction::Output, true, &mut graph));

    let device = registry.find("A").unwrap();
    assert!(device.is_active(Direction::Output));
    assert!(backend.is_open("A", Direction::Output));
    assert_eq!(revision(&graph, 0), before + 1);
    assert!(graph.collections[0].bindings[0].state().trigger_live);
    assert!(notifier.prompts().is_empty());
}

#[test]
fn activation_cascade_only_checks_first_message() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    backend.add_endpoint("B", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Trigger", &["A"]), binding("Tail", &["B", "A"])]);

    load(&mut registry, &["A", "B"], &mut graph);
    let (trigger, tail) = (revision(&graph, 0), revision(&graph, 1));

    registry.set_active("A", Direction::Input, true, &mut graph);

    assert_eq!(revision(&graph, 0), trigger + 1);
    assert_eq!(revision(&graph, 1), tail);
}

#[test]
fn deactivation_does_not_cascade() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    registry.add(&DeviceRecord::named("A").with_active(DirectionSet::BOTH), &mut graph);
    let before = revision(&graph, 0);

    assert!(registry.set_active("A", Direction::Input, false, &mut graph));
    assert!(!backend.is_open("A", Direction::Input));
    assert_eq!(revision(&graph, 0), before);
}

#[test]
fn update_refreshes_every_binding_mentioning_the_device() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![
        binding("Trigger", &["A"]),
        binding("Tail", &["B", "A"]),
        binding("Other", &["B"]),
    ]);

    load(&mut registry, &["A", "B"], &mut graph);
    assert_eq!((revision(&graph, 0), revision(&graph, 1), revision(&graph, 2)), (1, 1, 1));

    let device = registry.update(
        &DeviceRecord::named("A").with_active(DirectionSet::from_mask(1)).with_thru("B"),
        &mut graph,
    );
    assert!(device.is_active(Direction::Input));
    assert_eq!(device.thru(), Some("B"));
    assert_eq!((revision(&graph, 0), revision(&graph, 1), revision(&graph, 2)), (2, 2, 1));
    let tail = &graph.collections[0].bindings[1].messages;
    assert_eq!(tail[0].device_name(), "B");
    assert_eq!(tail[0].device(), registry.find("B").map(|d| d.id()));
}

#[test]
fn port_open_failure_is_reported_and_state_kept() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, notifier) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    registry.add_name("A", &mut graph);
    backend.set_available("A", Direction::Output, false);
    let before = revision(&graph, 0);

    assert!(!registry.set_active("A", Direction::Output, true, &mut graph));

    assert!(!registry.find("A").unwrap().is_active(Direction::Output));
    assert_eq!(revision(&graph, 0), before);
    assert_eq!(notifier.prompts(), vec![port_open_error("A", Direction::Output)]);
    assert_eq!(notifier.prompts()[0].kind(), "PortOpenError");
}

#[test]
fn add_reports_each_direction_that_fails_to_open_on_an_existing_device() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, notifier) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    registry.add_name("A", &mut graph);
    backend.set_available("A", Direction::Output, false);

    let record = DeviceRecord::named("A").with_active(DirectionSet::BOTH);
    let device = registry.add(&record, &mut graph);

    assert!(device.is_active(Direction::Input));
    assert!(!device.is_active(Direction::Output));
    assert!(!backend.is_open("A", Direction::Output));
    assert_eq!(notifier.prompts(), vec![port_open_error("A", Direction::Output)]);
}

#[test]
fn add_reports_each_direction_that_fails_to_open_on_a_new_device() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    // Capability check gets its one open; applying the record does not.
    backend.set_open_limit("A", Direction::Output, Some(1));
    let (mut registry, notifier) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    let record = DeviceRecord::named("A").with_active(DirectionSet::BOTH);
    let device = registry.add(&record, &mut graph);

    assert!(device.is_capable(Direction::Output));
    assert!(!device.is_active(Direction::Output));
    assert!(device.is_active(Direction::Input));
    assert_eq!(device.to_record().active, 1);
    assert_eq!(notifier.prompts(), vec![port_open_error("A", Direction::Output)]);
}

#[test]
fn requesting_current_state_never_touches_transport() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    registry.add(&DeviceRecord::named("A").with_active(DirectionSet::from_mask(1)), &mut graph);
    let calls = backend.calls("A");

    assert!(!registry.set_active("A", Direction::Input, true, &mut graph));
    assert!(!registry.set_active("A", Direction::Output, false, &mut graph));
    assert_eq!(backend.calls("A"), calls);
    assert!(registry.find("A").unwrap().is_active(Direction::Input));
}

#[test]
fn unknown_device_is_a_no_op() {
    let backend = VirtualBackend::new();
    let (mut registry, notifier) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    assert!(!registry.set_active("Nope", Direction::Input, true, &mut graph));
    assert!(!registry.check_capable("Nope", &mut graph));
    assert!(notifier.prompts().is_empty());
}

#[test]
fn check_capable_keeps_intent_for_still_capable_directions() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    registry.add(&DeviceRecord::named("A").with_active(DirectionSet::BOTH), &mut graph);
    backend.set_available("A", Direction::Output, false);
    let before = revision(&graph, 0);

    assert!(registry.check_capable("A", &mut graph));

    let device = registry.find("A").unwrap();
    assert!(device.is_active(Direction::Input));
    assert!(!device.is_active(Direction::Output));
    assert!(backend.is_open("A", Direction::Input));
    assert!(registry.capable_devices(Direction::Output).is_empty());
    // Input came back, which counts as an activation.
    assert_eq!(revision(&graph, 0), before + 1);
}

#[test]
fn check_capable_picks_up_new_capability_without_activating() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::NONE);
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    registry.add(&DeviceRecord::named("A").with_active(DirectionSet::BOTH), &mut graph);
    assert!(registry.capable_devices(Direction::Input).is_empty());

    backend.set_available("A", Direction::Input, true);
    registry.check_all_capable(&mut graph);

    let device = registry.find("A").unwrap();
    assert!(device.is_capable(Direction::Input));
    assert!(!device.is_active(Direction::Input));
}

#[test]
fn record_round_trips() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("Keys", DirectionSet::BOTH);
    backend.add_endpoint("Pads", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    let keys = DeviceRecord::named("Keys").with_active(DirectionSet::BOTH).with_thru("Pads");
    assert_eq!(registry.add(&keys, &mut graph).to_record(), keys);

    let pads = DeviceRecord::named("Pads").with_active(DirectionSet::from_mask(2)).with_thru("");
    let out = registry.add(&pads, &mut graph).to_record();
    assert_eq!(out.name, "Pads");
    assert_eq!(out.active, 2);
    assert_eq!(out.thru, None);
    assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"name":"Pads","active":2}"#);
}

#[test]
fn new_device_claims_unresolved_messages_with_its_name() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("Foo", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["Foo"])]);
    assert_eq!(graph.collections[0].bindings[0].messages[0].device(), None);

    let id = registry
        .add(&DeviceRecord::named("Foo").with_active(DirectionSet::from_mask(3)), &mut graph)
        .id();

    assert_eq!(graph.collections[0].bindings[0].messages[0].device(), Some(id));
    let device = registry.find("Foo").unwrap();
    assert!(device.is_active(Direction::Input));
    assert!(device.is_active(Direction::Output));
    assert_eq!(graph.collections[0].bindings[0].state().unresolved, 0);
    assert!(graph.collections[0].bindings[0].state().trigger_live);
}

#[test]
fn new_device_takes_over_every_message_without_a_live_device() {
    let backend = VirtualBackend::new();
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["Bar", "", "Other"])]);

    let other = registry.add_name("Other", &mut ReferenceGraph::default()).id();
    registry.resolve_references(&mut graph);
    assert_eq!(graph.collections[0].bindings[0].messages[2].device(), Some(other));

    let foo = registry.add_name("Foo", &mut graph).id();

    let messages = &graph.collections[0].bindings[0].messages;
    assert_eq!(messages[0].device(), Some(foo));
    assert_eq!(messages[0].device_name(), "Foo");
    assert_eq!(messages[1].device(), Some(foo));
    assert_eq!(messages[1].device_name(), "Foo");
    // Still points at a live device with another name.
    assert_eq!(messages[2].device(), Some(other));
    assert_eq!(messages[2].device_name(), "Other");
}

#[test]
fn batch_load_resolves_messages_by_name() {
    let backend = VirtualBackend::new();
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["Bar", "Foo", ""])]);

    load(&mut registry, &["Foo", "Bar"], &mut graph);

    let messages = &graph.collections[0].bindings[0].messages;
    assert_eq!(messages[0].device(), registry.find("Bar").map(|d| d.id()));
    assert_eq!(messages[1].device(), registry.find("Foo").map(|d| d.id()));
    assert_eq!(messages[2].device(), None);
    assert_eq!(graph.collections[0].bindings[0].state().unresolved, 1);
    assert_eq!(graph.collections[0].bindings[0].revision(), 1);
}

#[test]
fn removed_device_handles_are_repointed_on_re_add() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["A"])]);

    let old = registry
        .add(&DeviceRecord::named("A").with_active(DirectionSet::BOTH), &mut graph)
        .id();
    let removed = registry.remove("A").unwrap();
    assert!(!backend.is_open("A", Direction::Input));
    assert!(removed.is_active(Direction::Input));
    assert!(registry.is_empty());

    let new = registry.add_name("A", &mut graph).id();
    assert_ne!(old, new);
    assert_eq!(graph.collections[0].bindings[0].messages[0].device(), Some(new));
}

#[test]
fn capable_devices_filters_by_direction() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("A", DirectionSet::BOTH);
    backend.add_endpoint("B", DirectionSet { input: true, output: false });
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    registry.add_name("A", &mut graph);
    registry.add_name("B", &mut graph);

    assert_eq!(registry.capable_devices(Direction::Output), vec!["A"]);
    assert_eq!(registry.capable_devices(Direction::Input), vec!["A", "B"]);
}

#[test]
fn adding_real_device_replaces_dummy() {
    let backend = VirtualBackend::new();
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    assert!(registry.add_dummy().is_some());
    assert_eq!(registry.names(), vec![DUMMY_DEVICE_NAME]);
    assert!(registry.to_config().devices.is_empty());

    registry.add_name("Real", &mut graph);

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.names(), vec!["Real"]);
    assert!(registry.add_dummy().is_none());
}

#[test]
fn editable_device_with_placeholder_name_survives_later_adds() {
    let backend = VirtualBackend::new();
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    registry.add_name(DUMMY_DEVICE_NAME, &mut graph);
    registry.add_name("Real", &mut graph);

    assert_eq!(registry.names(), vec![DUMMY_DEVICE_NAME, "Real"]);
    assert_eq!(registry.to_config().devices.len(), 2);
}

#[test]
fn adopt_references_creates_missing_devices_once() {
    let backend = VirtualBackend::new();
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("One", &["Foo", "Bar"]), binding("Two", &["Foo", ""])]);

    registry.adopt_references(&mut graph);

    assert_eq!(registry.names(), vec!["Foo", "Bar"]);
    assert_eq!(graph.messages().filter(|m| m.device().is_none()).count(), 1);
    assert_eq!(graph.messages().filter(|m| m.device_name() == "Foo").count(), 2);
}

#[test]
fn sync_ports_registers_enumerated_endpoints() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("X", DirectionSet::BOTH);
    backend.add_endpoint("Y", DirectionSet { input: false, output: true });
    let (mut registry, _) = registry(&backend);
    let mut graph = ReferenceGraph::default();

    registry.add(&DeviceRecord::named("X").with_active(DirectionSet::BOTH), &mut graph);
    registry.sync_ports(&mut graph);

    assert_eq!(registry.names(), vec!["X", "Y"]);
    assert!(registry.find("X").unwrap().is_active(Direction::Output));
    assert_eq!(registry.capable_devices(Direction::Input), vec!["X"]);
    // Checked once on creation, not again by the sync.
    assert_eq!(backend.calls("Y"), 6);
}

#[test]
fn config_loads_and_exports() {
    let backend = VirtualBackend::new();
    backend.add_endpoint("Keys", DirectionSet::BOTH);
    backend.add_endpoint("Synth", DirectionSet::BOTH);
    let (mut registry, _) = registry(&backend);
    let mut graph = graph(vec![binding("Play", &["Keys", "Synth"])]);

    let config = RegistryConfig::from_json_str(
        r#"{"devices":[{"name":"Keys","active":1,"thru":"Synth"},{"name":"Synth","active":2}]}"#,
    )
    .unwrap();
    registry.load_config(&config, &mut graph);

    assert_eq!(registry.to_config(), config);
    assert!(backend.is_open("Keys", Direction::Input));
    assert!(backend.is_open("Synth", Direction::Output));
    assert_eq!(graph.collections[0].bindings[0].state().unresolved, 0);
}
