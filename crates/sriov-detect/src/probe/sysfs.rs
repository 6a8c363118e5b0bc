//! Linux sysfs hardware probe.
//!
//! Reads interface attributes from `<root>/class/net/<iface>` and PCI
//! identity from `<root>/bus/pci/devices/<bus>`. Interface addresses come
//! from a single `getifaddrs` snapshot taken when the probe is opened.

use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};

use nix::ifaddrs::getifaddrs;
use tracing::debug;

use super::{HardwareProbe, LinkState, NetInterface, PciDevice};
use crate::error::{DetectError, DetectResult, ProbeError};

/// Administrative "up" bit of the interface `flags` attribute.
const IFF_UP: u32 = 0x1;

/// Interface addresses keyed by interface name.
pub type AddressTable = HashMap<String, Vec<IpAddr>>;

/// Hardware probe backed by sysfs.
///
/// The probe is a scoped handle: open it once per run and let it drop when
/// the run ends.
#[derive(Debug)]
pub struct SysfsProbe {
    root: PathBuf,
    addresses: AddressTable,
}

impl SysfsProbe {
    /// Open a probe over the sysfs tree at `root` (normally `/sys`).
    ///
    /// # Errors
    ///
    /// Returns an error if the sysfs tree is missing the network or PCI
    /// class directories, or if the interface address snapshot fails.
    pub fn open(root: impl Into<PathBuf>) -> DetectResult<Self> {
        let addresses = snapshot_addresses()
            .map_err(|e| DetectError::ProbeInit(format!("getifaddrs failed: {e}")))?;
        Self::with_addresses(root, addresses)
    }

    /// Open a probe with a pre-built address table instead of querying the
    /// kernel.
    ///
    /// # Errors
    ///
    /// Returns an error if the sysfs tree is missing the network or PCI
    /// class directories.
    pub fn with_addresses(root: impl Into<PathBuf>, addresses: AddressTable) -> DetectResult<Self> {
        let root = root.into();
        for dir in ["class/net", "bus/pci/devices"] {
            let path = root.join(dir);
            if !path.is_dir() {
                return Err(DetectError::ProbeInit(format!(
                    "{} is not a directory",
                    path.display()
                )));
            }
        }
        debug!("Opened hardware probe at {}", root.display());
        Ok(Self { root, addresses })
    }

    /// Root of the sysfs tree this probe reads.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn net_dir(&self) -> PathBuf {
        self.root.join("class/net")
    }

    fn net_attr(&self, iface: &str, attr: &str) -> PathBuf {
        self.net_dir().join(iface).join(attr)
    }
}

impl Drop for SysfsProbe {
    fn drop(&mut self) {
        debug!("Released hardware probe at {}", self.root.display());
    }
}

fn snapshot_addresses() -> nix::Result<AddressTable> {
    let mut table = AddressTable::new();
    for ifaddr in getifaddrs()? {
        let entry = table.entry(ifaddr.interface_name.clone()).or_default();
        let Some(address) = ifaddr.address else {
            continue;
        };
        if let Some(sin) = address.as_sockaddr_in() {
            entry.push(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
        } else if let Some(sin6) = address.as_sockaddr_in6() {
            entry.push(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()));
        }
    }
    Ok(table)
}

fn read_attr(path: &Path) -> Result<String, ProbeError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| ProbeError::io(path, e))
}

fn link_target_name(path: &Path) -> Result<String, ProbeError> {
    let target = fs::read_link(path).map_err(|e| ProbeError::io(path, e))?;
    target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ProbeError::Parse {
            path: path.to_path_buf(),
            value: target.display().to_string(),
        })
}

/// Normalize a sysfs hex id ("0x8086\n") to "8086".
fn normalize_hex(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
        .to_ascii_lowercase()
}

fn parse_flags(raw: &str) -> Option<u32> {
    u32::from_str_radix(raw.trim().trim_start_matches("0x"), 16).ok()
}

impl HardwareProbe for SysfsProbe {
    fn interfaces(&self) -> DetectResult<Vec<NetInterface>> {
        let dir = self.net_dir();
        let entries = fs::read_dir(&dir)
            .map_err(|e| DetectError::Enumeration(format!("{}: {e}", dir.display())))?;

        let mut interfaces = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| DetectError::Enumeration(format!("{}: {e}", dir.display())))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let index = read_attr(&self.net_attr(&name, "ifindex"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(u32::MAX);

            // Unreadable flags count as up so the interface is never
            // repurposed on a guess.
            let is_up = read_attr(&self.net_attr(&name, "flags"))
                .ok()
                .and_then(|s| parse_flags(&s))
                .map_or(true, |flags| flags & IFF_UP != 0);

            let addresses = self.addresses.get(&name).cloned();
            if addresses.is_none() {
                debug!("No address snapshot entry for interface {}", name);
            }

            interfaces.push(NetInterface {
                name,
                index,
                is_up,
                addresses,
            });
        }

        interfaces.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));
        Ok(interfaces)
    }

    fn bus_info(&self, iface: &str) -> Result<String, ProbeError> {
        let path = self.net_attr(iface, "device");
        let device = fs::canonicalize(&path).map_err(|e| ProbeError::io(&path, e))?;
        device
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ProbeError::Missing(format!("bus address of {iface}")))
    }

    fn total_vfs(&self, iface: &str) -> Result<u32, ProbeError> {
        let path = self.net_attr(iface, "device/sriov_totalvfs");
        let raw = read_attr(&path)?;
        raw.parse().map_err(|_| ProbeError::Parse { path, value: raw })
    }

    fn pci_device(&self, bus: &str) -> Result<PciDevice, ProbeError> {
        let dir = self.root.join("bus/pci/devices").join(bus);
        if !dir.is_dir() {
            return Err(ProbeError::Missing(format!("PCI device at {bus}")));
        }
        let vendor_id = normalize_hex(&read_attr(&dir.join("vendor"))?);
        let product_id = match read_attr(&dir.join("device")) {
            Ok(raw) => normalize_hex(&raw),
            Err(e) => {
                debug!("No product id for PCI device {}: {}", bus, e);
                String::new()
            }
        };
        Ok(PciDevice {
            address: bus.to_string(),
            vendor_id,
            product_id,
        })
    }

    fn driver(&self, iface: &str) -> Result<String, ProbeError> {
        link_target_name(&self.net_attr(iface, "device/driver"))
    }

    fn link_speed(&self, iface: &str) -> Result<u64, ProbeError> {
        let path = self.net_attr(iface, "speed");
        let raw = read_attr(&path)?;
        let speed: i64 = raw.parse().map_err(|_| ProbeError::Parse {
            path: path.clone(),
            value: raw.clone(),
        })?;
        u64::try_from(speed).map_err(|_| ProbeError::Missing(format!("link speed of {iface}")))
    }

    fn link_state(&self, iface: &str) -> Result<LinkState, ProbeError> {
        let path = self.net_attr(iface, "carrier");
        match read_attr(&path)?.as_str() {
            "1" => Ok(LinkState::Up),
            "0" => Ok(LinkState::Down),
            other => Err(ProbeError::Parse {
                path,
                value: other.to_string(),
            }),
        }
    }

    fn numa_node(&self, iface: &str) -> Option<i32> {
        read_attr(&self.net_attr(iface, "device/numa_node"))
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|node| *node >= 0)
    }
}
