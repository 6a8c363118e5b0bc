//! Eligibility filter: matches inventory devices against a profile.
//!
//! Each device is run through an ordered list of named checks. The first
//! failing check rejects the device. Devices are taken in inventory order
//! until the profile's required count is reached.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::criteria::CapabilityRequirement;
use crate::error::{DetectError, DetectResult};
use crate::inventory::DeviceRecord;

/// Why a device was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Name of the failing check.
    pub check: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} check failed: {}", self.check, self.detail)
    }
}

type CheckFn = fn(&CapabilityRequirement, &DeviceRecord) -> Result<(), String>;

struct Check {
    name: &'static str,
    eval: CheckFn,
}

/// Checks in evaluation order. New constraints go here.
const CHECKS: &[Check] = &[
    Check {
        name: "device id",
        eval: check_device_id,
    },
    Check {
        name: "driver",
        eval: check_driver,
    },
    Check {
        name: "link speed",
        eval: check_link_speed,
    },
    Check {
        name: "VF count",
        eval: check_vf_count,
    },
    Check {
        name: "link state",
        eval: check_link_state,
    },
    Check {
        name: "NUMA node",
        eval: check_numa_node,
    },
    Check {
        name: "connector type",
        eval: check_connector_type,
    },
    Check {
        name: "DDP support",
        eval: check_ddp,
    },
    Check {
        name: "PTP support",
        eval: check_ptp,
    },
    Check {
        name: "incoming protocol",
        eval: check_incoming_protocol,
    },
    Check {
        name: "port number",
        eval: check_port_number,
    },
    Check {
        name: "card affinity",
        eval: check_card_affinity,
    },
];

fn one_of(allowed: &BTreeSet<String>, actual: Option<&str>, what: &str) -> Result<(), String> {
    if allowed.is_empty() {
        return Ok(());
    }
    match actual {
        Some(value) if allowed.contains(value) => Ok(()),
        Some(value) => Err(format!("{what} '{value}' is not one of {allowed:?}")),
        None => Err(format!("{what} is unknown, required one of {allowed:?}")),
    }
}

fn exactly<T: PartialEq + fmt::Debug>(
    required: Option<&T>,
    actual: Option<&T>,
    what: &str,
) -> Result<(), String> {
    match (required, actual) {
        (None, _) => Ok(()),
        (Some(req), Some(act)) if req == act => Ok(()),
        (Some(req), Some(act)) => Err(format!("{what} is {act:?}, required {req:?}")),
        (Some(req), None) => Err(format!("{what} is unknown, required {req:?}")),
    }
}

fn supported(required: bool, actual: Option<bool>, what: &str) -> Result<(), String> {
    if required && actual != Some(true) {
        return Err(format!("{what} is not supported"));
    }
    Ok(())
}

fn check_device_id(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    one_of(&req.device_ids, Some(dev.device_id.as_str()), "device id")
}

fn check_driver(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    one_of(&req.drivers, Some(dev.driver.as_str()), "driver")
}

fn check_link_speed(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    if req.min_link_speed > 0 && dev.link_speed < req.min_link_speed {
        return Err(format!(
            "link speed is {} Mb/s, required at least {} Mb/s",
            dev.link_speed, req.min_link_speed
        ));
    }
    Ok(())
}

fn check_vf_count(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    if req.min_vfs > 0 && dev.max_vfs < req.min_vfs {
        return Err(format!(
            "supports {} VFs, required at least {}",
            dev.max_vfs, req.min_vfs
        ));
    }
    Ok(())
}

fn check_link_state(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    exactly(req.link_state.as_ref(), Some(&dev.link_state), "link state")
}

fn check_numa_node(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    exactly(req.numa_node.as_ref(), dev.numa_node.as_ref(), "NUMA node")
}

/// A device that reports no connector type is not held against the profile.
fn check_connector_type(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    match dev.connector_type.as_deref() {
        Some(connector) => one_of(&req.connector_types, Some(connector), "connector type"),
        None => Ok(()),
    }
}

fn check_ddp(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    supported(req.ddp_support, dev.ddp_support, "DDP")
}

fn check_ptp(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    supported(req.ptp_support, dev.ptp_support, "PTP")
}

fn check_incoming_protocol(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    exactly(
        req.incoming_protocol.as_ref(),
        dev.incoming_protocol.as_ref(),
        "incoming packet protocol",
    )
}

fn check_port_number(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    exactly(req.port_number.as_ref(), dev.port_number.as_ref(), "port number")
}

fn check_card_affinity(req: &CapabilityRequirement, dev: &DeviceRecord) -> Result<(), String> {
    exactly(
        req.card_affinity.as_ref(),
        dev.card_affinity.as_ref(),
        "card affinity",
    )
}

/// Run every check against one device, stopping at the first failure.
///
/// # Errors
///
/// Returns the first failing check.
pub fn evaluate(criteria: &CapabilityRequirement, device: &DeviceRecord) -> Result<(), Rejection> {
    for check in CHECKS {
        (check.eval)(criteria, device).map_err(|detail| Rejection {
            check: check.name,
            detail,
        })?;
    }
    Ok(())
}

/// Select exactly `criteria.required_count` interfaces from `devices`.
///
/// Devices are taken in the order given; scanning stops as soon as enough
/// have been found.
///
/// # Errors
///
/// Returns [`DetectError::InsufficientDevices`] if fewer devices qualify.
/// A partial selection is never returned.
pub fn select_devices(
    criteria: &CapabilityRequirement,
    devices: &[DeviceRecord],
) -> DetectResult<Vec<String>> {
    let required = criteria.required_count;
    let mut selected = Vec::with_capacity(required);
    if required == 0 {
        return Ok(selected);
    }

    for device in devices {
        match evaluate(criteria, device) {
            Ok(()) => {
                debug!("NIC {} fits the profile", device.interface);
                selected.push(device.interface.clone());
                if selected.len() == required {
                    return Ok(selected);
                }
            }
            Err(rejection) => {
                debug!(
                    "NIC {} is not fit for SR-IOV: {}",
                    device.interface, rejection
                );
            }
        }
    }

    debug!(
        "Found {} fitting NIC(s) while {} are required",
        selected.len(),
        required
    );
    Err(DetectError::InsufficientDevices {
        found: selected.len(),
        required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::criteria_for;
    use crate::probe::LinkState;

    fn device(name: &str, device_id: &str, driver: &str, speed: u64, vfs: u32) -> DeviceRecord {
        DeviceRecord {
            driver: driver.to_string(),
            link_speed: speed,
            max_vfs: vfs,
            ..DeviceRecord::new(name, "", device_id)
        }
    }

    fn fully_described(mut dev: DeviceRecord) -> DeviceRecord {
        dev.link_state = LinkState::Up;
        dev.numa_node = Some(0);
        dev.connector_type = Some("SATA".to_string());
        dev.ddp_support = Some(true);
        dev.ptp_support = Some(true);
        dev.incoming_protocol = Some("RRU".to_string());
        dev.port_number = Some(8888);
        dev.card_affinity = Some("0000:cc:00.x".to_string());
        dev
    }

    fn mixed_inventory() -> Vec<DeviceRecord> {
        let base = device("", "0d58", "driver2", 40000, 64);
        vec![
            device("eth0", "1593", "", 0, 64),
            device("eth1", "abcd", "driver2", 0, 64),
            device("eth2", "0d58", "driver1", 0, 128),
            device("eth3", "158a", "driver2", 40000, 256),
            device("eth4", "158a", "driver2", 40000, 60),
            device("eth5", "0d58", "driver2", 20000, 64),
            device("eth6", "0d58", "driver2", 40000, 64),
            DeviceRecord {
                interface: "eth7".to_string(),
                link_state: LinkState::Up,
                numa_node: Some(7),
                ..base.clone()
            },
            DeviceRecord {
                interface: "eth8".to_string(),
                connector_type: Some("QSFP".to_string()),
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth9".to_string(),
                ddp_support: Some(false),
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth10".to_string(),
                ptp_support: None,
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth11".to_string(),
                incoming_protocol: None,
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth12".to_string(),
                port_number: Some(0),
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth13".to_string(),
                card_affinity: Some("0000:18:00.x".to_string()),
                ..fully_described(base.clone())
            },
            DeviceRecord {
                interface: "eth14".to_string(),
                ..fully_described(base)
            },
        ]
    }

    fn strict_criteria() -> CapabilityRequirement {
        let mut criteria = criteria_for("dek").unwrap();
        criteria.drivers.insert("driver2".to_string());
        criteria.min_link_speed = 40000;
        criteria.link_state = Some(LinkState::Up);
        criteria.numa_node = Some(0);
        criteria.connector_types.insert("SATA".to_string());
        criteria.ddp_support = true;
        criteria.ptp_support = true;
        criteria.incoming_protocol = Some("RRU".to_string());
        criteria.port_number = Some(8888);
        criteria.card_affinity = Some("0000:cc:00.x".to_string());
        criteria
    }

    #[test]
    fn test_dek_selects_first_four_in_order() {
        let criteria = criteria_for("dek").unwrap();
        let selected = select_devices(&criteria, &mixed_inventory()).unwrap();
        assert_eq!(selected, vec!["eth0", "eth2", "eth3", "eth5"]);
    }

    #[test]
    fn test_every_constraint_rejects_its_device() {
        let mut criteria = strict_criteria();
        criteria.required_count = 1;
        let selected = select_devices(&criteria, &mixed_inventory()).unwrap();
        assert_eq!(selected, vec!["eth14"]);

        criteria.required_count = 2;
        assert!(matches!(
            select_devices(&criteria, &mixed_inventory()),
            Err(DetectError::InsufficientDevices {
                found: 1,
                required: 2
            })
        ));
    }

    #[test]
    fn test_first_failing_check_is_reported() {
        let criteria = strict_criteria();
        let inventory = mixed_inventory();
        let expected = [
            ("eth0", "driver"),
            ("eth1", "device id"),
            ("eth2", "driver"),
            ("eth4", "VF count"),
            ("eth5", "link speed"),
            ("eth6", "link state"),
            ("eth7", "NUMA node"),
            ("eth8", "connector type"),
            ("eth9", "DDP support"),
            ("eth10", "PTP support"),
            ("eth11", "incoming protocol"),
            ("eth12", "port number"),
            ("eth13", "card affinity"),
        ];
        for (name, check) in expected {
            let dev = inventory.iter().find(|d| d.interface == name).unwrap();
            let rejection = evaluate(&criteria, dev).unwrap_err();
            assert_eq!(rejection.check, check, "unexpected rejection for {name}");
        }
        let eth14 = inventory.iter().find(|d| d.interface == "eth14").unwrap();
        assert!(evaluate(&criteria, eth14).is_ok());
    }

    #[test]
    fn test_unconstrained_criteria_accept_anything() {
        let criteria = CapabilityRequirement {
            required_count: 2,
            ..CapabilityRequirement::default()
        };
        let devices = vec![
            device("a", "", "", 0, 0),
            device("b", "ffff", "r8169", 100, 0),
        ];
        assert_eq!(select_devices(&criteria, &devices).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_relaxing_a_constraint_never_shrinks_selection() {
        let inventory = mixed_inventory();
        let strict = strict_criteria();
        let strict_fit: Vec<_> = inventory
            .iter()
            .filter(|d| evaluate(&strict, d).is_ok())
            .map(|d| d.interface.clone())
            .collect();

        let mut relaxed = strict.clone();
        relaxed.numa_node = None;
        relaxed.min_link_speed = 0;
        let relaxed_fit: Vec<_> = inventory
            .iter()
            .filter(|d| evaluate(&relaxed, d).is_ok())
            .map(|d| d.interface.clone())
            .collect();

        assert!(strict_fit.iter().all(|name| relaxed_fit.contains(name)));
        assert!(relaxed_fit.len() >= strict_fit.len());
    }

    #[test]
    fn test_exact_count_boundary() {
        let mut criteria = criteria_for("dek").unwrap();
        let devices = vec![
            device("eth0", "1593", "ice", 25000, 64),
            device("eth1", "1593", "ice", 25000, 64),
            device("eth2", "1593", "ice", 25000, 64),
        ];

        criteria.required_count = 3;
        assert_eq!(
            select_devices(&criteria, &devices).unwrap(),
            vec!["eth0", "eth1", "eth2"]
        );

        criteria.required_count = 4;
        assert!(matches!(
            select_devices(&criteria, &devices),
            Err(DetectError::InsufficientDevices {
                found: 3,
                required: 4
            })
        ));
    }

    #[test]
    fn test_selection_is_repeatable() {
        let criteria = criteria_for("dek").unwrap();
        let inventory = mixed_inventory();
        let first = select_devices(&criteria, &inventory).unwrap();
        let second = select_devices(&criteria, &inventory).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_driver_fails_driver_constraint() {
        let mut criteria = criteria_for("dek").unwrap();
        criteria.drivers.insert("ice".to_string());
        let dev = device("eth0", "1593", "", 25000, 64);
        let rejection = evaluate(&criteria, &dev).unwrap_err();
        assert_eq!(rejection.check, "driver");
        assert!(rejection.to_string().contains("driver check failed"));
    }

    #[test]
    fn test_missing_connector_type_is_not_rejected() {
        let mut criteria = CapabilityRequirement::dek();
        criteria.connector_types.insert("QSFP".to_string());
        let dev = device("eth0", "1593", "ice", 25000, 64);
        assert_eq!(dev.connector_type, None);
        assert!(evaluate(&criteria, &dev).is_ok());

        let sfp = DeviceRecord {
            connector_type: Some("SFP".to_string()),
            ..dev
        };
        assert_eq!(evaluate(&criteria, &sfp).unwrap_err().check, "connector type");
    }

    #[test]
    fn test_missing_ptp_support_still_rejected_when_required() {
        let mut criteria = CapabilityRequirement::dek();
        criteria.ptp_support = true;
        let dev = device("eth0", "1593", "ice", 25000, 64);
        assert_eq!(evaluate(&criteria, &dev).unwrap_err().check, "PTP support");
    }

    #[test]
    fn test_unknown_link_state_rejected_when_constrained() {
        let mut criteria = criteria_for("dek").unwrap();
        criteria.link_state = Some(LinkState::Up);
        let dev = device("eth0", "1593", "ice", 25000, 64);
        assert_eq!(dev.link_state, LinkState::Unknown);
        assert_eq!(evaluate(&criteria, &dev).unwrap_err().check, "link state");
    }
}
