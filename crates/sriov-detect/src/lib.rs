//! SR-IOV capable NIC selection for edge node provisioning.
//!
//! This crate enumerates the host's network interfaces, drops the ones that
//! cannot host virtual functions, and selects the first N interfaces that
//! satisfy a deployment profile's capability requirements.
//!
//! # Example
//!
//! ```rust,ignore
//! use sriov_detect::criteria::Catalog;
//! use sriov_detect::probe::SysfsProbe;
//!
//! fn main() -> anyhow::Result<()> {
//!     let catalog = Catalog::builtin();
//!     let criteria = catalog.lookup("dek")?;
//!
//!     let probe = SysfsProbe::open("/sys")?;
//!     for name in sriov_detect::detect(criteria, &probe)? {
//!         println!("{name}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod criteria;
pub mod error;
pub mod filter;
pub mod inventory;
pub mod output;
pub mod pipeline;
pub mod probe;

pub use criteria::{CapabilityRequirement, Catalog};
pub use error::{DetectError, ProbeError};
pub use filter::{select_devices, Rejection};
pub use inventory::{build_inventory, DeviceRecord};
pub use pipeline::detect;
pub use probe::{HardwareProbe, LinkState, NetInterface, PciDevice, SysfsProbe};
