//! CSV folder importer.

use crate::tables::{
    read_records, read_series, series_file, static_file, BusRecord, GeneratorRecord, LineRecord,
    LinkRecord, LoadRecord, SeriesFile, SnapshotRecord, StorageUnitRecord, SNAPSHOTS,
};
use anyhow::{bail, Context, Result};
use redispatch_core::{ComponentKind, Diagnostics, Network, NetworkError, Snapshot, SnapshotSeries};
use std::path::{Path, PathBuf};

/// Imported network plus the validation issues found while loading it.
#[derive(Debug)]
pub struct ImportResult {
    pub network: Network,
    pub diagnostics: Diagnostics,
}

/// Load a network from a CSV folder.
///
/// The network is named after the folder. Series files must have one row per
/// snapshot and only reference existing components.
pub fn import_csv_folder(path: impl AsRef<Path>) -> Result<Network> {
    let path = path.as_ref();
    if !path.is_dir() {
        bail!("network folder {} does not exist", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_string());
    let mut network = Network::new(name);

    let snapshots: Vec<SnapshotRecord> = read_records(&path.join(SNAPSHOTS))?;
    if !snapshots.is_empty() {
        network.set_snapshots(snapshots.into_iter().map(Snapshot::from).collect());
    }

    let buses_path = table(path, ComponentKind::Bus);
    if !buses_path.exists() {
        bail!("{} is missing", buses_path.display());
    }
    for record in read_records::<BusRecord>(&buses_path)? {
        network.add_bus(record.into())?;
    }
    for record in read_records::<GeneratorRecord>(&table(path, ComponentKind::Generator))? {
        network.add_generator(record.into())?;
    }
    for record in read_records::<LoadRecord>(&table(path, ComponentKind::Load))? {
        network.add_load(record.into())?;
    }
    for record in read_records::<StorageUnitRecord>(&table(path, ComponentKind::StorageUnit))? {
        network.add_storage_unit(record.into())?;
    }
    for record in read_records::<LineRecord>(&table(path, ComponentKind::Line))? {
        network.add_line(record.into())?;
    }
    for record in read_records::<LinkRecord>(&table(path, ComponentKind::Link))? {
        network.add_link(record.into())?;
    }

    let n = network.snapshot_count();
    for attribute in ["p_min_pu", "p_max_pu"] {
        for (column, values) in series_columns(path, ComponentKind::Generator, attribute, n)? {
            let generator = network
                .generator_mut(&column)
                .ok_or_else(|| unknown(ComponentKind::Generator, &column))?;
            let series = if attribute == "p_min_pu" {
                &mut generator.p_min_pu
            } else {
                &mut generator.p_max_pu
            };
            fill(series, values);
        }
    }
    for (column, values) in series_columns(path, ComponentKind::Load, "p_set", n)? {
        let load = network
            .loads
            .iter_mut()
            .find(|l| l.name == column)
            .ok_or_else(|| unknown(ComponentKind::Load, &column))?;
        fill(&mut load.p_set, values);
    }

    tracing::debug!(network = %network.name, stats = %network.stats(), "imported CSV folder");
    Ok(network)
}

/// Import and validate in one step.
pub fn import_with_diagnostics(path: impl AsRef<Path>) -> Result<ImportResult> {
    let network = import_csv_folder(path)?;
    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);
    Ok(ImportResult {
        network,
        diagnostics,
    })
}

fn table(folder: &Path, kind: ComponentKind) -> PathBuf {
    folder.join(static_file(kind.list_name()))
}

fn unknown(kind: ComponentKind, name: &str) -> NetworkError {
    NetworkError::UnknownComponent {
        kind,
        name: name.to_string(),
    }
}

/// Blank cells keep the static value.
fn fill(series: &mut SnapshotSeries, values: Vec<f64>) {
    let default = series.static_value();
    series.set_values(
        values
            .into_iter()
            .map(|v| if v.is_nan() { default } else { v })
            .collect(),
    );
}

fn series_columns(
    folder: &Path,
    kind: ComponentKind,
    attribute: &str,
    snapshot_count: usize,
) -> Result<Vec<(String, Vec<f64>)>> {
    let path = folder.join(series_file(kind.list_name(), attribute));
    let Some(SeriesFile {
        snapshots,
        columns,
        mut table,
    }) = read_series(&path)?
    else {
        return Ok(Vec::new());
    };
    if snapshots.len() != snapshot_count {
        return Err(NetworkError::SeriesLength {
            kind,
            component: columns.first().cloned().unwrap_or_default(),
            attribute: attribute.to_string(),
            expected: snapshot_count,
            found: snapshots.len(),
        })
        .with_context(|| format!("reading {}", path.display()));
    }
    Ok(columns
        .into_iter()
        .filter_map(|column| table.remove(&column).map(|values| (column, values)))
        .collect())
}
