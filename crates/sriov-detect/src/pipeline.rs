//! Detection pipeline: probe, inventory, filter.

use tracing::{debug, info};

use crate::criteria::CapabilityRequirement;
use crate::error::{DetectError, DetectResult};
use crate::filter::select_devices;
use crate::inventory::build_inventory;
use crate::probe::HardwareProbe;

/// Select the interfaces that satisfy `criteria` on the host seen by `probe`.
///
/// # Errors
///
/// Returns an error if enumeration fails, if no interface passes the
/// inventory prechecks, or if fewer than `criteria.required_count`
/// interfaces qualify.
pub fn detect<P: HardwareProbe + ?Sized>(
    criteria: &CapabilityRequirement,
    probe: &P,
) -> DetectResult<Vec<String>> {
    let devices = build_inventory(probe)?;
    if devices.is_empty() {
        return Err(DetectError::NoCandidates);
    }
    if devices.len() < criteria.required_count {
        return Err(DetectError::InsufficientDevices {
            found: devices.len(),
            required: criteria.required_count,
        });
    }

    debug!("Devices before checking against criteria:");
    for device in &devices {
        debug!("{:?}", device);
    }

    let selected = select_devices(criteria, &devices)?;
    info!("Selected NIC(s) for SR-IOV: {}", selected.join(", "));
    Ok(selected)
}
