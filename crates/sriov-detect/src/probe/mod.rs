//! Hardware probe abstractions.
//!
//! A [`HardwareProbe`] answers per-interface questions about link
//! capabilities, PCI identity and SR-IOV capacity. Every per-device query
//! returns its own [`ProbeError`]; deciding what a failure means is left to
//! the inventory builder.

mod sysfs;

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::{DetectResult, ProbeError};

pub use sysfs::{AddressTable, SysfsProbe};

/// PCI vendor id of the only vendor whose NICs are selected.
pub const TARGET_VENDOR_ID: &str = "8086";

/// Vendor name reported for [`TARGET_VENDOR_ID`].
pub const TARGET_VENDOR_NAME: &str = "Intel Corporation";

/// Bus info value some drivers report when they have no bus address.
pub const BUS_INFO_PLACEHOLDER: &str = "N/A";

/// Known PCI network vendors.
const VENDOR_NAMES: &[(&str, &str)] = &[
    ("8086", TARGET_VENDOR_NAME),
    ("15b3", "Mellanox Technologies"),
    ("14e4", "Broadcom Inc. and subsidiaries"),
    ("1077", "QLogic Corp."),
    ("1924", "Solarflare Communications"),
    ("1d0f", "Amazon.com, Inc."),
    ("1af4", "Red Hat, Inc."),
    ("10ec", "Realtek Semiconductor Co., Ltd."),
];

/// Resolve a PCI vendor id to its name.
#[must_use]
pub fn vendor_name(vendor_id: &str) -> Option<&'static str> {
    VENDOR_NAMES
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(vendor_id))
        .map(|(_, name)| *name)
}

/// Link state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Carrier detected.
    Up,
    /// No carrier.
    Down,
    /// State could not be determined.
    Unknown,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A host network interface as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    /// Interface name (e.g., "ens801f0").
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
    /// Whether the interface is administratively up.
    pub is_up: bool,
    /// Addresses assigned to the interface, `None` if the lookup failed.
    pub addresses: Option<Vec<IpAddr>>,
}

impl NetInterface {
    /// Whether the interface is already carrying traffic.
    ///
    /// An interface that is up and holds an IPv4 address is in use. An
    /// interface that is up but whose addresses could not be read is also
    /// treated as in use.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        if !self.is_up {
            return false;
        }
        self.addresses
            .as_ref()
            .map_or(true, |addrs| addrs.iter().any(IpAddr::is_ipv4))
    }
}

/// PCI identity of a network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDevice {
    /// Bus address (e.g., "0000:18:00.0").
    pub address: String,
    /// Vendor id, lowercase hex without prefix.
    pub vendor_id: String,
    /// Product ("device") id, lowercase hex without prefix.
    pub product_id: String,
}

impl PciDevice {
    /// Vendor name, if the vendor is known.
    #[must_use]
    pub fn vendor_name(&self) -> Option<&'static str> {
        vendor_name(&self.vendor_id)
    }

    /// Product id of a device made by the target vendor.
    ///
    /// # Errors
    ///
    /// Returns an error if the product id is empty or the vendor is not the
    /// target vendor.
    pub fn target_product_id(&self) -> Result<&str, ProbeError> {
        if self.product_id.is_empty() {
            return Err(ProbeError::Missing(format!(
                "product id of {}",
                self.address
            )));
        }
        match self.vendor_name() {
            Some(TARGET_VENDOR_NAME) => Ok(&self.product_id),
            Some(name) => Err(ProbeError::Missing(format!(
                "{TARGET_VENDOR_NAME} vendor for {} (found {name})",
                self.address
            ))),
            None => Err(ProbeError::Missing(format!(
                "{TARGET_VENDOR_NAME} vendor for {} (found unknown vendor {})",
                self.address, self.vendor_id
            ))),
        }
    }
}

/// Source of host network hardware information.
pub trait HardwareProbe {
    /// List the host's network interfaces in kernel index order.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration itself fails. This is fatal.
    fn interfaces(&self) -> DetectResult<Vec<NetInterface>>;

    /// PCI bus address of the interface's device.
    ///
    /// # Errors
    ///
    /// Returns an error if the interface has no backing device.
    fn bus_info(&self, iface: &str) -> Result<String, ProbeError>;

    /// Total number of virtual functions the device supports.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter is missing or not numeric.
    fn total_vfs(&self, iface: &str) -> Result<u32, ProbeError>;

    /// PCI vendor and product of the device at `bus`.
    ///
    /// # Errors
    ///
    /// Returns an error if no PCI device exists at that address.
    fn pci_device(&self, bus: &str) -> Result<PciDevice, ProbeError>;

    /// Name of the kernel driver bound to the interface's device.
    ///
    /// # Errors
    ///
    /// Returns an error if no driver is bound.
    fn driver(&self, iface: &str) -> Result<String, ProbeError>;

    /// Negotiated link speed in Mb/s.
    ///
    /// # Errors
    ///
    /// Returns an error if the speed cannot be read.
    fn link_speed(&self, iface: &str) -> Result<u64, ProbeError>;

    /// Current link state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    fn link_state(&self, iface: &str) -> Result<LinkState, ProbeError>;

    /// NUMA node the device is attached to, if known.
    fn numa_node(&self, _iface: &str) -> Option<i32> {
        None
    }
}
