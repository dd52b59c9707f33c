//! Device registry.
//!
//! [`DeviceRegistry`] is the single owner of every [`Device`], keyed by unique
//! name and kept in insertion order. It is also the only component that walks
//! the [`ReferenceGraph`]. The graph is passed in explicitly to every
//! operation that may need to cascade.
//!
//! ## Cascades
//! Two refresh rules apply, and they differ on purpose:
//!
//! - **Activation** (a direction of a device becomes active): refresh every
//!   binding whose *first* message names the device. The first message is the
//!   binding's trigger.
//! - **Add / update** (a device record is applied): refresh every binding in
//!   which *any* message names the device.
//!
//! Within [`DeviceRegistry::add`] the order is fixed: the device is created or
//! updated first, then message handles are repointed, then bindings are
//! refreshed. A refresh therefore never sees a half-applied device or a message
//! still pointing at a removed one.
//!
//! ## Single vs. batch
//! A single [`add`](DeviceRegistry::add) hands every message without a live
//! handle to the new device. Batch operations ([`load_config`],
//! [`adopt_references`], [`sync_ports`]) create all of their devices first and
//! then resolve handles by name, so one record cannot claim messages meant for
//! a later one.
//!
//! [`load_config`]: DeviceRegistry::load_config
//! [`adopt_references`]: DeviceRegistry::adopt_references
//! [`sync_ports`]: DeviceRegistry::sync_ports
//!
//! ## Errors
//! Port mismatches ([`PortError::PortOpen`]) never escape the registry. They are
//! logged and handed to the [`Notifier`] as a [`Prompt::PortOpenError`]; the
//! device keeps its previous state.
//!
//! ## Threading
//! Everything runs synchronously on the caller's thread. The registry is `Send`;
//! a multi-threaded host should guard the registry and its graph with a single
//! lock.

use crate::binding::ReferenceGraph;
use crate::config::{DeviceRecord, RegistryConfig};
use crate::device::{Device, DeviceId, Toggle, Transition};
use crate::direction::{Direction, PortQuery};
use crate::error::PortError;
use crate::notify::{Notifier, Prompt, TracingNotifier};
use crate::transport::PortProvider;

/// Name of the placeholder device that stands in while nothing is configured.
pub const DUMMY_DEVICE_NAME: &str = "No Device";

/// Owner of all known devices.
pub struct DeviceRegistry {
    devices: Vec<Device>,
    provider: Box<dyn PortProvider>,
    notifier: Box<dyn Notifier>,
    next_id: u64,
}

impl DeviceRegistry {
    /// Empty registry that reports prompts through `tracing`.
    pub fn new(provider: impl PortProvider + 'static) -> Self {
        Self {
            devices: Vec::new(),
            provider: Box::new(provider),
            notifier: Box::new(TracingNotifier::new()),
            next_id: 1,
        }
    }

    /// Replace the notifier.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Exact, case-sensitive name lookup.
    pub fn find(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name() == name)
    }

    /// Resolve a message handle.
    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.devices.iter().map(Device::name).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Names of devices whose last probe opened `direction`, in insertion order.
    pub fn capable_devices(&self, direction: Direction) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| d.is_capable(direction))
            .map(Device::name)
            .collect()
    }

    /// Names of devices active for `query`, in insertion order.
    pub fn active_devices(&self, query: PortQuery) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| d.is_active(query))
            .map(Device::name)
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name() == name)
    }

    // ---------------------------------------------------------------------
    // Creation / update / removal
    // ---------------------------------------------------------------------

    /// Apply a device record.
    ///
    /// An existing device with the same name is updated in place. Otherwise the
    /// placeholder device (if any) is removed, a new device is probed and
    /// configured, and every message whose handle does not resolve is pointed at
    /// it. In both cases every binding that mentions the device is refreshed
    /// afterwards.
    pub fn add(&mut self, record: &DeviceRecord, graph: &mut ReferenceGraph) -> &Device {
        let index = match self.position(&record.name) {
            Some(index) => {
                // The add cascade below covers every binding the activation
                // cascade would, so only failures are handled here.
                let toggles = self.devices[index].update(record);
                self.settle(&record.name, toggles, graph, false);
                index
            }
            None => self.insert(record),
        };

        self.repoint_references(index, graph);
        self.refresh_bindings_using(&record.name, graph);
        &self.devices[index]
    }

    /// Same as [`add`](Self::add); reads better at call sites that know the
    /// device exists.
    pub fn update(&mut self, record: &DeviceRecord, graph: &mut ReferenceGraph) -> &Device {
        self.add(record, graph)
    }

    /// [`add`](Self::add) with a record that carries only `name`.
    ///
    /// Applied to an existing device this requests both directions inactive,
    /// like any record without an `active` field.
    pub fn add_name(&mut self, name: &str, graph: &mut ReferenceGraph) -> &Device {
        self.add(&DeviceRecord::named(name), graph)
    }

    /// Install the locked placeholder device. Only allowed while the registry is
    /// empty; returns `None` otherwise.
    pub fn add_dummy(&mut self) -> Option<DeviceId> {
        if !self.devices.is_empty() {
            return None;
        }
        let id = self.allocate_id();
        let port = self.provider.connect(DUMMY_DEVICE_NAME);
        self.devices.push(Device::locked(id, DUMMY_DEVICE_NAME, port));
        tracing::debug!(%id, "placeholder device installed");
        Some(id)
    }

    /// Drop the device called `name`, closing its ports. Message handles that
    /// pointed at it simply stop resolving; repointing is up to the caller.
    pub fn remove(&mut self, name: &str) -> Option<Device> {
        let index = self.position(name)?;
        let mut device = self.devices.remove(index);
        device.close_ports();
        tracing::debug!(device = %device.name(), id = %device.id(), "device removed");
        Some(device)
    }

    /// Drop the locked placeholder, if present. An editable device that happens
    /// to carry the placeholder name is left alone.
    fn remove_placeholder(&mut self) {
        let placeholder = self
            .devices
            .iter()
            .any(|d| d.name() == DUMMY_DEVICE_NAME && !d.is_editable());
        if placeholder {
            self.remove(DUMMY_DEVICE_NAME);
        }
    }

    /// Create and register a device for a name that is not known yet.
    fn insert(&mut self, record: &DeviceRecord) -> usize {
        self.remove_placeholder();
        let device = self.create(record);
        self.devices.push(device);
        self.devices.len() - 1
    }

    /// Apply several records, then resolve handles by name and refresh every
    /// binding that mentions one of them, once.
    fn add_batch(&mut self, records: &[DeviceRecord], graph: &mut ReferenceGraph) {
        let mut touched: Vec<&str> = Vec::with_capacity(records.len());
        for record in records {
            match self.position(&record.name) {
                Some(index) => {
                    let toggles = self.devices[index].update(record);
                    self.settle(&record.name, toggles, graph, false);
                }
                None => {
                    self.insert(record);
                }
            }
            if !touched.contains(&record.name.as_str()) {
                touched.push(&record.name);
            }
        }

        self.resolve_references(graph);
        let mut refreshed = 0usize;
        for binding in graph
            .bindings_mut()
            .filter(|b| touched.iter().any(|name| b.uses_device(name)))
        {
            binding.refresh(self);
            refreshed += 1;
        }
        tracing::debug!(devices = touched.len(), refreshed, "batch applied");
    }

    fn allocate_id(&mut self) -> DeviceId {
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn create(&mut self, record: &DeviceRecord) -> Device {
        let id = self.allocate_id();
        let port = self.provider.connect(&record.name);
        let mut device = Device::new(id, record.name.clone(), port);

        // Nothing is active yet, so the probe cannot toggle anything.
        device.check_capable();
        let toggles = device.update(record);
        tracing::debug!(
            device = %record.name,
            %id,
            active = device.active().to_mask(),
            "device created"
        );

        for error in toggles.into_iter().filter_map(Result::err) {
            self.report(&error);
        }
        device
    }

    // ---------------------------------------------------------------------
    // Port state
    // ---------------------------------------------------------------------

    /// Request `direction` of `name` active or inactive.
    ///
    /// Returns whether the device's state changed. Activating refreshes the
    /// bindings triggered by the device. Unknown names, locked devices and
    /// non-capable directions are no-ops.
    pub fn set_active(
        &mut self,
        name: &str,
        direction: Direction,
        want: bool,
        graph: &mut ReferenceGraph,
    ) -> bool {
        let Some(index) = self.position(name) else {
            return false;
        };
        let toggle = self.devices[index].set_active(direction, want);
        let changed = matches!(toggle, Ok(Transition::Activated(_) | Transition::Deactivated(_)));
        self.settle(name, vec![toggle], graph, true);
        changed
    }

    /// Re-probe the capabilities of `name` and restore its requested state.
    /// Returns `false` if there is no such device.
    pub fn check_capable(&mut self, name: &str, graph: &mut ReferenceGraph) -> bool {
        let Some(index) = self.position(name) else {
            return false;
        };
        let toggles = self.devices[index].check_capable();
        self.settle(name, toggles, graph, true);
        true
    }

    /// Re-probe every device, e.g. after the transport re-enumerated.
    pub fn check_all_capable(&mut self, graph: &mut ReferenceGraph) {
        for index in 0..self.devices.len() {
            let name = self.devices[index].name().to_string();
            let toggles = self.devices[index].check_capable();
            self.settle(&name, toggles, graph, true);
        }
    }

    /// Register a device for every port the transport reports that is not known
    /// yet, then re-probe the devices that were already registered. New devices
    /// were probed on creation and are not probed again.
    pub fn sync_ports(&mut self, graph: &mut ReferenceGraph) {
        let known = self.devices.len();
        let unknown: Vec<DeviceRecord> = self
            .provider
            .port_names()
            .into_iter()
            .filter(|name| self.find(name).is_none())
            .map(DeviceRecord::named)
            .collect();

        let existing: Vec<DeviceId> = self.devices[..known].iter().map(Device::id).collect();
        self.add_batch(&unknown, graph);

        for id in existing {
            // The placeholder may have been dropped by the batch.
            let Some(index) = self.devices.iter().position(|d| d.id() == id) else {
                continue;
            };
            let name = self.devices[index].name().to_string();
            let toggles = self.devices[index].check_capable();
            self.settle(&name, toggles, graph, true);
        }
    }

    /// Create a device for every message that names one the registry does not
    /// know yet, then resolve message handles by name.
    pub fn adopt_references(&mut self, graph: &mut ReferenceGraph) {
        let mut missing: Vec<DeviceRecord> = Vec::new();
        for message in graph.messages() {
            let name = message.device_name();
            if !name.is_empty()
                && self.find(name).is_none()
                && !missing.iter().any(|m| m.name == name)
            {
                missing.push(DeviceRecord::named(name));
            }
        }
        self.add_batch(&missing, graph);
    }

    /// Fill in the handle of every message whose handle does not resolve but
    /// whose name matches a registered device. Needed after a graph is
    /// deserialized, since handles are not persisted.
    pub fn resolve_references(&self, graph: &mut ReferenceGraph) {
        let mut resolved = 0usize;
        for message in graph.messages_mut() {
            if message.device().and_then(|id| self.get(id)).is_some() {
                continue;
            }
            if let Some(device) = self.find(message.device_name()) {
                message.set_device(device);
                resolved += 1;
            }
        }
        if resolved > 0 {
            tracing::debug!(resolved, "message references resolved by name");
        }
    }

    // ---------------------------------------------------------------------
    // Config
    // ---------------------------------------------------------------------

    /// Apply every record of `config`, in order, as one batch.
    pub fn load_config(&mut self, config: &RegistryConfig, graph: &mut ReferenceGraph) {
        self.add_batch(&config.devices, graph);
    }

    /// Records for every editable device, in insertion order.
    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig {
            devices: self
                .devices
                .iter()
                .filter(|d| d.is_editable())
                .map(Device::to_record)
                .collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Cascades
    // ---------------------------------------------------------------------

    fn settle(
        &mut self,
        name: &str,
        toggles: Vec<Toggle>,
        graph: &mut ReferenceGraph,
        cascade: bool,
    ) {
        for toggle in toggles {
            match toggle {
                Ok(Transition::Activated(direction)) if cascade => {
                    tracing::debug!(device = name, %direction, "direction activated");
                    self.refresh_bindings_triggered_by(name, graph);
                }
                Ok(_) => {}
                Err(error) => self.report(&error),
            }
        }
    }

    fn report(&mut self, error: &PortError) {
        tracing::warn!(%error, "port did not reach the requested state");
        match error {
            PortError::PortOpen { device, direction, .. } => {
                self.notifier.prompt(&Prompt::PortOpenError {
                    device: device.clone(),
                    direction: *direction,
                });
            }
        }
    }

    /// Point at the device every message whose handle does not resolve, or
    /// resolves to a device with the same name.
    fn repoint_references(&self, index: usize, graph: &mut ReferenceGraph) {
        let device = &self.devices[index];
        let mut repointed = 0usize;
        for message in graph.messages_mut() {
            let current = message.device().and_then(|id| self.get(id));
            let stale = current.map_or(true, |d| d.name() == device.name());
            if stale && message.device() != Some(device.id()) {
                message.set_device(device);
                repointed += 1;
            }
        }
        if repointed > 0 {
            tracing::debug!(device = %device.name(), repointed, "message references repointed");
        }
    }

    /// Activation cascade: bindings whose first message names `name`.
    fn refresh_bindings_triggered_by(&self, name: &str, graph: &mut ReferenceGraph) {
        let mut refreshed = 0usize;
        for binding in graph.bindings_mut().filter(|b| b.is_triggered_by(name)) {
            binding.refresh(self);
            refreshed += 1;
        }
        tracing::debug!(device = name, refreshed, "trigger bindings refreshed");
    }

    /// Add/update cascade: bindings where any message names `name`.
    fn refresh_bindings_using(&self, name: &str, graph: &mut ReferenceGraph) {
        let mut refreshed = 0usize;
        for binding in graph.bindings_mut().filter(|b| b.uses_device(name)) {
            binding.refresh(self);
            refreshed += 1;
        }
        tracing::debug!(device = name, refreshed, "bindings refreshed");
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
