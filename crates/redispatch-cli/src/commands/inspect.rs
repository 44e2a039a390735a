//! `redispatch inspect`: size, topology and validation of a network folder.

use anyhow::{bail, Result};
use redispatch_cli::OutputFormat;
use redispatch_core::{graph_stats, DiagnosticIssue, NetworkStats};
use redispatch_io::importer::import_with_diagnostics;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct InspectReport<'a> {
    name: &'a str,
    stats: NetworkStats,
    islands: usize,
    issues: Vec<&'a DiagnosticIssue>,
}

pub fn handle(path: &Path, format: OutputFormat) -> Result<()> {
    if !path.is_dir() {
        bail!("Input '{}' is not a network folder", path.display());
    }
    let imported = import_with_diagnostics(path)?;
    let network = &imported.network;
    let graph = graph_stats(network);

    match format {
        OutputFormat::Plain => {
            println!("Network {}", network.name);
            println!("  {}", network.stats());
            println!(
                "  Topology: {} buses, {} branches, {} islands, degree [min/avg/max] {}/{:.2}/{}",
                graph.node_count,
                graph.edge_count,
                graph.connected_components,
                graph.min_degree,
                graph.avg_degree,
                graph.max_degree
            );
            print!("Diagnostics: {}", imported.diagnostics);
        }
        OutputFormat::Json => {
            let report = InspectReport {
                name: &network.name,
                stats: network.stats(),
                islands: graph.connected_components,
                issues: imported
                    .diagnostics
                    .errors()
                    .chain(imported.diagnostics.warnings())
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    if imported.diagnostics.has_errors() {
        bail!("network has {}", imported.diagnostics.summary());
    }
    Ok(())
}
