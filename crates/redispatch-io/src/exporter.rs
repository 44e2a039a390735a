//! CSV folder exporter.

use crate::tables::{
    series_file, static_file, write_records, write_series, BusRecord, GeneratorRecord,
    LineRecord, LinkRecord, LoadRecord, SnapshotRecord, StorageUnitRecord, OBJECTIVE, SNAPSHOTS,
};
use anyhow::{Context, Result};
use redispatch_core::{ComponentKind, Network, SeriesTable, SnapshotSeries, SolvedNetwork};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ObjectiveRecord<'a> {
    objective: f64,
    solver: &'a str,
}

/// Write the input tables of `network` into `path`, creating it if needed.
///
/// Existing files with the same names are overwritten; other files are left
/// alone.
pub fn export_csv_folder(network: &Network, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)
        .with_context(|| format!("creating network folder {}", path.display()))?;

    write_records(
        &path.join(SNAPSHOTS),
        network.snapshots().iter().map(SnapshotRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::Bus),
        network.buses.iter().map(BusRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::Generator),
        network.generators.iter().map(GeneratorRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::Load),
        network.loads.iter().map(LoadRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::StorageUnit),
        network.storage_units.iter().map(StorageUnitRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::Line),
        network.lines.iter().map(LineRecord::from),
    )?;
    write_records(
        &table(path, ComponentKind::Link),
        network.links.iter().map(LinkRecord::from),
    )?;

    write_varying(
        path,
        network,
        ComponentKind::Generator,
        "p_min_pu",
        varying(network.generators.iter().map(|g| (g.name.as_str(), &g.p_min_pu))),
    )?;
    write_varying(
        path,
        network,
        ComponentKind::Generator,
        "p_max_pu",
        varying(network.generators.iter().map(|g| (g.name.as_str(), &g.p_max_pu))),
    )?;
    write_varying(
        path,
        network,
        ComponentKind::Load,
        "p_set",
        varying(network.loads.iter().map(|l| (l.name.as_str(), &l.p_set))),
    )?;
    Ok(())
}

/// Write a solved network: its input tables plus every result series and
/// `objective.json`.
pub fn export_solved(solved: &SolvedNetwork, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let network = solved.network();
    export_csv_folder(network, path)?;

    let dispatch = solved.dispatch();
    let outputs: [(ComponentKind, &str, &SeriesTable); 7] = [
        (ComponentKind::Generator, "p", &dispatch.generators_p),
        (ComponentKind::Load, "p", &dispatch.loads_p),
        (ComponentKind::StorageUnit, "p", &dispatch.storage_units_p),
        (
            ComponentKind::StorageUnit,
            "state_of_charge",
            &dispatch.storage_units_state_of_charge,
        ),
        (ComponentKind::Line, "p0", &dispatch.lines_p0),
        (ComponentKind::Link, "p0", &dispatch.links_p0),
        (ComponentKind::Bus, "marginal_price", &dispatch.buses_marginal_price),
    ];
    for (kind, attribute, series) in outputs {
        if series.is_empty() {
            continue;
        }
        let file = path.join(series_file(kind.list_name(), attribute));
        write_series(
            &file,
            network.snapshots(),
            series.iter().map(|(name, values)| (name.as_str(), values.as_slice())),
        )?;
    }

    let objective = ObjectiveRecord {
        objective: dispatch.objective,
        solver: &dispatch.solver,
    };
    let json = serde_json::to_string_pretty(&objective).context("serializing objective")?;
    let objective_path = path.join(OBJECTIVE);
    std::fs::write(&objective_path, json)
        .with_context(|| format!("writing {}", objective_path.display()))?;
    Ok(())
}

fn table(folder: &Path, kind: ComponentKind) -> std::path::PathBuf {
    folder.join(static_file(kind.list_name()))
}

/// Columns for components whose series differs from the static value.
fn varying<'a>(
    items: impl Iterator<Item = (&'a str, &'a SnapshotSeries)>,
) -> Vec<(String, Vec<f64>)> {
    items
        .filter_map(|(name, series)| series.values().map(|v| (name.to_string(), v.to_vec())))
        .collect()
}

fn write_varying(
    folder: &Path,
    network: &Network,
    kind: ComponentKind,
    attribute: &str,
    columns: Vec<(String, Vec<f64>)>,
) -> Result<()> {
    if columns.is_empty() {
        return Ok(());
    }
    write_series(
        &folder.join(series_file(kind.list_name(), attribute)),
        network.snapshots(),
        columns.iter().map(|(name, values)| (name.as_str(), values.as_slice())),
    )
}
