//! Capability requirements per deployment profile.
//!
//! The built-in catalog covers the supported experience kits. Extra
//! profiles can be layered on top from a YAML file:
//!
//! ```yaml
//! profiles:
//!   dek-ptp:
//!     device_ids: ["1593", "159b"]
//!     min_vfs: 32
//!     ptp_support: true
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DetectError, DetectResult};
use crate::probe::LinkState;

/// Number of NICs a profile asks for unless it says otherwise.
pub const DEFAULT_REQUIRED_COUNT: usize = 4;

/// Profile id of the Developer Experience Kit.
pub const DEK_PROFILE: &str = "dek";

/// Intel E810 and related product ids accepted for the DEK.
const DEK_DEVICE_IDS: &[&str] = &["158a", "0d58", "1593", "159b", "1592", "188a"];

/// Minimum VF capacity for the DEK.
const DEK_MIN_VFS: u32 = 64;

/// Capabilities a NIC must have to be selected for a profile.
///
/// Every constraint except `required_count` has an unconstrained value
/// (empty set, zero, `false` or `None`) that never rejects a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityRequirement {
    /// How many NICs must be selected.
    pub required_count: usize,
    /// Accepted PCI product ids.
    pub device_ids: BTreeSet<String>,
    /// Minimum supported VFs.
    pub min_vfs: u32,
    /// Accepted driver names.
    pub drivers: BTreeSet<String>,
    /// Minimum link speed in Mb/s.
    pub min_link_speed: u64,
    /// Required link state.
    pub link_state: Option<LinkState>,
    /// Required NUMA node.
    pub numa_node: Option<i32>,
    /// Accepted connector types.
    pub connector_types: BTreeSet<String>,
    /// Require DDP support.
    pub ddp_support: bool,
    /// Require PTP support.
    pub ptp_support: bool,
    /// Required incoming packet protocol tag.
    pub incoming_protocol: Option<String>,
    /// Required port number.
    pub port_number: Option<u64>,
    /// Required card affinity.
    pub card_affinity: Option<String>,
}

impl Default for CapabilityRequirement {
    fn default() -> Self {
        Self {
            required_count: DEFAULT_REQUIRED_COUNT,
            device_ids: BTreeSet::new(),
            min_vfs: 0,
            drivers: BTreeSet::new(),
            min_link_speed: 0,
            link_state: None,
            numa_node: None,
            connector_types: BTreeSet::new(),
            ddp_support: false,
            ptp_support: false,
            incoming_protocol: None,
            port_number: None,
            card_affinity: None,
        }
    }
}

impl CapabilityRequirement {
    /// Requirements of the Developer Experience Kit.
    #[must_use]
    pub fn dek() -> Self {
        Self {
            device_ids: DEK_DEVICE_IDS.iter().map(ToString::to_string).collect(),
            min_vfs: DEK_MIN_VFS,
            ..Self::default()
        }
    }

    fn validate(&self, profile: &str) -> DetectResult<()> {
        if self.required_count == 0 {
            return Err(DetectError::InvalidProfile {
                profile: profile.to_string(),
                reason: "required_count must be at least 1".to_string(),
            });
        }
        if let Some(node) = self.numa_node.filter(|node| *node < 0) {
            return Err(DetectError::InvalidProfile {
                profile: profile.to_string(),
                reason: format!("numa_node must not be negative, got {node}"),
            });
        }
        Ok(())
    }
}

/// On-disk catalog format.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    profiles: BTreeMap<String, CapabilityRequirement>,
}

/// Mapping from profile id to its capability requirements.
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: BTreeMap<String, CapabilityRequirement>,
}

impl Catalog {
    /// The built-in profiles.
    #[must_use]
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEK_PROFILE.to_string(), CapabilityRequirement::dek());
        Self { profiles }
    }

    /// The built-in profiles overlaid with the profiles in a YAML file.
    ///
    /// A profile in the file replaces a built-in profile with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any of
    /// its profiles is invalid.
    pub fn load(path: impl AsRef<Path>) -> DetectResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| DetectError::CatalogLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut catalog = Self::builtin();
        catalog.merge_yaml(&contents).map_err(|e| match e {
            DetectError::CatalogLoad { reason, .. } => DetectError::CatalogLoad {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        info!(
            "Loaded profile catalog from {} ({} profile(s))",
            path.display(),
            catalog.profiles.len()
        );
        Ok(catalog)
    }

    /// Merge profiles from YAML text into this catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid catalog or any profile
    /// is invalid. The catalog is left unchanged on error.
    pub fn merge_yaml(&mut self, contents: &str) -> DetectResult<()> {
        let file: CatalogFile =
            serde_yaml::from_str(contents).map_err(|e| DetectError::CatalogLoad {
                path: "<inline>".into(),
                reason: e.to_string(),
            })?;

        for (id, requirement) in &file.profiles {
            requirement.validate(id)?;
        }
        for (id, requirement) in file.profiles {
            if self.profiles.insert(id.clone(), requirement).is_some() {
                debug!("Profile '{}' overridden by catalog file", id);
            }
        }
        Ok(())
    }

    /// Look up the requirements of a profile.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::UnknownProfile`] if the id is not in the
    /// catalog. An empty id is never a profile.
    pub fn lookup(&self, profile_id: &str) -> DetectResult<&CapabilityRequirement> {
        self.profiles
            .get(profile_id)
            .ok_or_else(|| DetectError::UnknownProfile(profile_id.to_string()))
    }

    /// Known profile ids, sorted.
    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

/// Requirements of a built-in profile.
///
/// # Errors
///
/// Returns [`DetectError::UnknownProfile`] if the id is not built in.
pub fn criteria_for(profile_id: &str) -> DetectResult<CapabilityRequirement> {
    Catalog::builtin().lookup(profile_id).cloned()
}
