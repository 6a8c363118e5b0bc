//! sriov-detect - select SR-IOV capable NICs for a deployment profile.
//!
//! Prints the selected interface names, one per line, on stdout. Nothing is
//! printed on stdout unless the full quota of NICs was found.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sriov_detect::criteria::Catalog;
use sriov_detect::output;
use sriov_detect::probe::SysfsProbe;

/// Second positional value that turns on diagnostics.
const DEBUG_MODE_TOKEN: &str = "debug_mode";

/// Select SR-IOV capable NICs for a deployment profile.
#[derive(Parser)]
#[command(name = "sriov-detect")]
#[command(about = "Select SR-IOV capable NICs for a deployment profile")]
struct Cli {
    /// Deployment profile (e.g., dek).
    profile: String,

    /// Pass `debug_mode` to log diagnostics to stderr.
    mode: Option<String>,

    /// Root of the sysfs tree.
    #[arg(long, env = "SRIOV_DETECT_SYSFS_ROOT", default_value = "/sys", hide = true)]
    sysfs_root: PathBuf,

    /// YAML file with extra profiles.
    #[arg(long, env = "SRIOV_DETECT_CATALOG", hide = true)]
    catalog: Option<PathBuf>,
}

fn init_logging(debug_mode: bool) {
    let filter = if debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("error")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.mode.as_deref() == Some(DEBUG_MODE_TOKEN));

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    let criteria = catalog
        .lookup(&cli.profile)
        .context("Creating the criteria list for the profile failed")?;
    debug!("Criteria for profile {}: {:?}", cli.profile, criteria);

    let selected = {
        let probe = SysfsProbe::open(cli.sysfs_root.clone())
            .context("Failed to initialize hardware probe")?;
        sriov_detect::detect(criteria, &probe)
            .with_context(|| format!("No SR-IOV NIC set fits profile '{}'", cli.profile))?
    };

    output::write_selection(&mut io::stdout().lock(), &selected)
        .context("Failed to write selected interfaces")?;
    Ok(())
}
