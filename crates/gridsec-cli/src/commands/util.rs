use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use gridsec_algo::SecurityAnalysisResult;
use gridsec_core::{Network, NetworkBuilder};
use tracing::info;

use gridsec_cli::report::{write_ascii, write_json, ReportOptions};
use gridsec_cli::OutputFormat;

/// Read a JSON network case.
pub fn load_network(path: &Path) -> Result<Network> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading network case '{}'", path.display()))?;
    let builder: NetworkBuilder = serde_json::from_str(&data)
        .with_context(|| format!("parsing network case '{}'", path.display()))?;
    let network = builder
        .build()
        .with_context(|| format!("building network from '{}'", path.display()))?;
    info!(
        network = network.id(),
        buses = network.buses().count(),
        "loaded network case"
    );
    Ok(network)
}

/// Stdout, or a freshly created file.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory '{}'", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating output file '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

pub fn write_result(
    result: &SecurityAnalysisResult,
    network: &Network,
    format: OutputFormat,
    path: Option<&Path>,
    options: &ReportOptions,
) -> Result<()> {
    let mut out = open_output(path)?;
    match format {
        OutputFormat::Ascii => write_ascii(&mut out, result, network, options)?,
        OutputFormat::Json => write_json(&mut out, result)?,
    }
    out.flush()?;
    if let Some(path) = path {
        info!("report written to {}", path.display());
    }
    Ok(())
}
