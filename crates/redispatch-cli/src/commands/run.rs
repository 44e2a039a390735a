//! `redispatch run`

use anyhow::{bail, Context, Result};
use redispatch_algo::{
    optimizer_for, AsymmetricBids, ByCountry, ByLatitude, PipelineOutcome, RedispatchPipeline,
    Stage,
};
use redispatch_cli::{load_config, OutputFormat, RunArgs, ZoneStrategy};
use redispatch_io::{importer::import_with_diagnostics, CsvResultsStore};
use std::io::{self, Write};
use tabwriter::TabWriter;
use tracing::{info, warn};

pub fn handle(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(solver) = &args.solver {
        config.solver.name = solver.clone();
    }
    if let Some(preset) = &args.settings {
        config.solver.preset = preset.clone();
    }
    if args.asymmetric_bids {
        config.bidding.asymmetric = true;
    }
    let zones = match args.zones {
        Some(strategy) => strategy,
        None => config.zones.strategy()?,
    };
    let settings = config.solver.settings()?;
    let optimizer = optimizer_for(&settings)?;

    let mut pipeline = RedispatchPipeline::new(args.network_id.clone(), args.folder.clone(), settings);
    pipeline = match zones {
        ZoneStrategy::Country => pipeline.with_zone_assignment(ByCountry),
        ZoneStrategy::Latitude(threshold) => pipeline.with_zone_assignment(ByLatitude::new(threshold)),
    };
    if config.bidding.asymmetric {
        pipeline = pipeline.with_cost_transform(AsymmetricBids {
            up_factor: config.bidding.up_factor,
            down_factor: config.bidding.down_factor,
        });
    }

    let network_path = pipeline.network_path();
    if !network_path.is_dir() {
        bail!("network folder {} does not exist", network_path.display());
    }
    let imported = import_with_diagnostics(&network_path)
        .with_context(|| format!("loading network {}", network_path.display()))?;
    for issue in imported.diagnostics.warnings() {
        warn!("{issue}");
    }
    if imported.diagnostics.has_errors() {
        bail!(
            "network {} is invalid: {}",
            network_path.display(),
            imported.diagnostics
        );
    }

    info!(
        network = %pipeline.network_id(),
        zones = %zones,
        solver = %pipeline.settings().solver,
        "running redispatch"
    );
    let store = CsvResultsStore::new(pipeline.results_folder());
    let outcome = pipeline.run(&imported.network, optimizer.as_ref(), &store)?;

    match args.format {
        OutputFormat::Plain => print_summary(&outcome),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &outcome.summary())
                .context("serializing summary to JSON")?;
            println!();
            Ok(())
        }
    }
}

fn print_summary(outcome: &PipelineOutcome) -> Result<()> {
    let summary = outcome.summary();
    println!(
        "Redispatch results for {} ({} zones: {})",
        summary.model,
        summary.zones.len(),
        summary.zones.join(", ")
    );
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "STAGE\tOBJECTIVE\tGENERATORS")?;
    for stage in Stage::ALL {
        let solved = outcome.stage(stage);
        writeln!(
            writer,
            "{}\t{:.2}\t{}",
            stage,
            solved.objective(),
            solved.network().generators.len()
        )?;
    }
    writer.flush()?;
    println!("Removed intra-zone branches: {}", summary.removed_branches);
    println!(
        "Redispatch premium: {:.2} ({} bids)",
        summary.redispatch_premium, summary.cost_transform
    );
    println!(
        "Redispatch volume: {:.2} MWh up, {:.2} MWh down",
        summary.redispatch_volume.up, summary.redispatch_volume.down
    );
    Ok(())
}
