//! Device inventory for SR-IOV candidate NICs.
//!
//! Walks every host interface, drops the ones that fail the cheap
//! prechecks, and records the capabilities of the rest.

use tracing::{debug, info};

use crate::error::DetectResult;
use crate::probe::{HardwareProbe, LinkState, NetInterface, BUS_INFO_PLACEHOLDER};

/// Capabilities of one physical network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Interface name, unique within a run.
    pub interface: String,
    /// PCI bus address.
    pub bus_address: String,
    /// PCI product id (lowercase hex).
    pub device_id: String,
    /// Bound driver, empty if the lookup failed.
    pub driver: String,
    /// Link speed in Mb/s, 0 if unknown.
    pub link_speed: u64,
    /// Maximum supported virtual functions.
    pub max_vfs: u32,
    /// Link state.
    pub link_state: LinkState,
    /// NUMA node.
    pub numa_node: Option<i32>,
    /// Connector module type.
    pub connector_type: Option<String>,
    /// Dynamic Device Personalization support.
    pub ddp_support: Option<bool>,
    /// Precision Time Protocol support.
    pub ptp_support: Option<bool>,
    /// Protocol tag of incoming packets.
    pub incoming_protocol: Option<String>,
    /// Port number.
    pub port_number: Option<u64>,
    /// Card affinity.
    pub card_affinity: Option<String>,
}

impl DeviceRecord {
    /// Create a record with only identity fields set and every capability
    /// at its unknown value.
    #[must_use]
    pub fn new(
        interface: impl Into<String>,
        bus_address: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            bus_address: bus_address.into(),
            device_id: device_id.into(),
            driver: String::new(),
            link_speed: 0,
            max_vfs: 0,
            link_state: LinkState::Unknown,
            numa_node: None,
            connector_type: None,
            ddp_support: None,
            ptp_support: None,
            incoming_protocol: None,
            port_number: None,
            card_affinity: None,
        }
    }
}

/// Build the candidate device list from every host interface.
///
/// Interfaces are kept in enumeration order.
///
/// # Errors
///
/// Returns an error only if interface enumeration fails. Per-device probe
/// failures skip or degrade the device instead.
pub fn build_inventory<P: HardwareProbe + ?Sized>(probe: &P) -> DetectResult<Vec<DeviceRecord>> {
    let interfaces = probe.interfaces()?;
    let devices: Vec<DeviceRecord> = interfaces
        .iter()
        .filter_map(|iface| inspect_interface(probe, iface))
        .collect();

    info!(
        "Found {} SR-IOV candidate NIC(s) among {} interface(s)",
        devices.len(),
        interfaces.len()
    );
    Ok(devices)
}

/// Run the prechecks on one interface and, if it passes, record it.
///
/// Checks run cheapest first: bus address, current use, VF capacity, then
/// vendor. The first failure skips the interface.
fn inspect_interface<P: HardwareProbe + ?Sized>(
    probe: &P,
    iface: &NetInterface,
) -> Option<DeviceRecord> {
    let name = iface.name.as_str();

    let bus_address = match probe.bus_info(name) {
        Ok(bus) if !bus.is_empty() && bus != BUS_INFO_PLACEHOLDER => bus,
        Ok(bus) => {
            debug!("Interface {} has no valid bus information: '{}'", name, bus);
            return None;
        }
        Err(e) => {
            debug!("Interface {} has no valid bus information: {}", name, e);
            return None;
        }
    };

    if iface.is_in_use() {
        debug!(
            "Interface {} is up with an IPv4 address (or unreadable addresses), not using it for SR-IOV",
            name
        );
        return None;
    }

    let max_vfs = probe.total_vfs(name).unwrap_or_else(|e| {
        debug!("Interface {}: {}", name, e);
        0
    });
    if max_vfs == 0 {
        debug!("Interface {} has 0 sriov_totalvfs, no SR-IOV support", name);
        return None;
    }

    let device_id = match probe
        .pci_device(&bus_address)
        .and_then(|pci| pci.target_product_id().map(str::to_string))
    {
        Ok(id) => id,
        Err(e) => {
            debug!("Interface {} at {} skipped: {}", name, bus_address, e);
            return None;
        }
    };

    let driver = probe.driver(name).unwrap_or_else(|e| {
        debug!("Could not find the driver of interface {}: {}", name, e);
        String::new()
    });
    let link_speed = probe.link_speed(name).unwrap_or_else(|e| {
        debug!("Could not find the link speed of interface {}: {}", name, e);
        0
    });
    let link_state = probe.link_state(name).unwrap_or_else(|e| {
        debug!("Could not find the link state of interface {}: {}", name, e);
        LinkState::Unknown
    });

    Some(DeviceRecord {
        driver,
        link_speed,
        max_vfs,
        link_state,
        numa_node: probe.numa_node(name),
        ..DeviceRecord::new(name, bus_address, device_id)
    })
}
