//! CSV record layouts and snapshot-series tables.
//!
//! Static tables map one row to one component. Optional attributes are
//! `Option`s so that an empty cell or a missing column falls back to the
//! component default.

use anyhow::{anyhow, bail, Context, Result};
use redispatch_core::{Bus, Generator, Line, Link, Load, SeriesTable, Snapshot, StorageUnit};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

pub const SNAPSHOTS: &str = "snapshots.csv";
pub const OBJECTIVE: &str = "objective.json";

/// File name of a series table, e.g. `generators-p_max_pu.csv`.
pub fn series_file(list_name: &str, attribute: &str) -> String {
    format!("{list_name}-{attribute}.csv")
}

/// File name of a static table, e.g. `generators.csv`.
pub fn static_file(list_name: &str) -> String {
    format!("{list_name}.csv")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub name: String,
    #[serde(default)]
    pub weighting: Option<f64>,
}

impl From<SnapshotRecord> for Snapshot {
    fn from(record: SnapshotRecord) -> Self {
        Snapshot::new(record.name).with_weighting(record.weighting.unwrap_or(1.0))
    }
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            weighting: Some(snapshot.weighting),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BusRecord {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl From<BusRecord> for Bus {
    fn from(record: BusRecord) -> Self {
        Bus {
            name: record.name,
            country: record.country.filter(|c| !c.is_empty()),
            x: record.x.unwrap_or(0.0),
            y: record.y.unwrap_or(0.0),
        }
    }
}

impl From<&Bus> for BusRecord {
    fn from(bus: &Bus) -> Self {
        Self {
            name: bus.name.clone(),
            country: bus.country.clone(),
            x: Some(bus.x),
            y: Some(bus.y),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratorRecord {
    pub name: String,
    pub bus: String,
    #[serde(default)]
    pub p_nom: Option<f64>,
    #[serde(default)]
    pub marginal_cost: Option<f64>,
    #[serde(default)]
    pub p_min_pu: Option<f64>,
    #[serde(default)]
    pub p_max_pu: Option<f64>,
    #[serde(default)]
    pub carrier: Option<String>,
}

impl From<GeneratorRecord> for Generator {
    fn from(record: GeneratorRecord) -> Self {
        let mut generator = Generator::new(record.name, record.bus, record.p_nom.unwrap_or(0.0))
            .with_marginal_cost(record.marginal_cost.unwrap_or(0.0))
            .with_carrier(record.carrier.unwrap_or_default());
        generator.p_min_pu.set_static(record.p_min_pu.unwrap_or(0.0));
        generator.p_max_pu.set_static(record.p_max_pu.unwrap_or(1.0));
        generator
    }
}

impl From<&Generator> for GeneratorRecord {
    fn from(generator: &Generator) -> Self {
        Self {
            name: generator.name.clone(),
            bus: generator.bus.clone(),
            p_nom: Some(generator.p_nom),
            marginal_cost: Some(generator.marginal_cost),
            p_min_pu: Some(generator.p_min_pu.static_value()),
            p_max_pu: Some(generator.p_max_pu.static_value()),
            carrier: Some(generator.carrier.clone()).filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadRecord {
    pub name: String,
    pub bus: String,
    #[serde(default)]
    pub p_set: Option<f64>,
}

impl From<LoadRecord> for Load {
    fn from(record: LoadRecord) -> Self {
        Load::new(record.name, record.bus, record.p_set.unwrap_or(0.0))
    }
}

impl From<&Load> for LoadRecord {
    fn from(load: &Load) -> Self {
        Self {
            name: load.name.clone(),
            bus: load.bus.clone(),
            p_set: Some(load.p_set.static_value()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageUnitRecord {
    pub name: String,
    pub bus: String,
    #[serde(default)]
    pub p_nom: Option<f64>,
    #[serde(default)]
    pub max_hours: Option<f64>,
    #[serde(default)]
    pub efficiency_store: Option<f64>,
    #[serde(default)]
    pub efficiency_dispatch: Option<f64>,
    #[serde(default)]
    pub state_of_charge_initial: Option<f64>,
    #[serde(default)]
    pub cyclic_state_of_charge: Option<bool>,
    #[serde(default)]
    pub marginal_cost: Option<f64>,
}

impl From<StorageUnitRecord> for StorageUnit {
    fn from(record: StorageUnitRecord) -> Self {
        let defaults = StorageUnit::new(record.name, record.bus, record.p_nom.unwrap_or(0.0));
        StorageUnit {
            max_hours: record.max_hours.unwrap_or(defaults.max_hours),
            efficiency_store: record.efficiency_store.unwrap_or(defaults.efficiency_store),
            efficiency_dispatch: record
                .efficiency_dispatch
                .unwrap_or(defaults.efficiency_dispatch),
            state_of_charge_initial: record
                .state_of_charge_initial
                .unwrap_or(defaults.state_of_charge_initial),
            cyclic_state_of_charge: record
                .cyclic_state_of_charge
                .unwrap_or(defaults.cyclic_state_of_charge),
            marginal_cost: record.marginal_cost.unwrap_or(defaults.marginal_cost),
            ..defaults
        }
    }
}

impl From<&StorageUnit> for StorageUnitRecord {
    fn from(storage: &StorageUnit) -> Self {
        Self {
            name: storage.name.clone(),
            bus: storage.bus.clone(),
            p_nom: Some(storage.p_nom),
            max_hours: Some(storage.max_hours),
            efficiency_store: Some(storage.efficiency_store),
            efficiency_dispatch: Some(storage.efficiency_dispatch),
            state_of_charge_initial: Some(storage.state_of_charge_initial),
            cyclic_state_of_charge: Some(storage.cyclic_state_of_charge),
            marginal_cost: Some(storage.marginal_cost),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineRecord {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub x: f64,
    #[serde(default)]
    pub r: Option<f64>,
    /// Empty means unconstrained
    #[serde(default)]
    pub s_nom: Option<f64>,
    #[serde(default)]
    pub s_max_pu: Option<f64>,
}

impl From<LineRecord> for Line {
    fn from(record: LineRecord) -> Self {
        let mut line = Line::new(record.name, record.bus0, record.bus1, record.x);
        line.r = record.r.unwrap_or(0.0);
        line.s_nom = record.s_nom.unwrap_or(f64::INFINITY);
        line.s_max_pu = record.s_max_pu.unwrap_or(1.0);
        line
    }
}

impl From<&Line> for LineRecord {
    fn from(line: &Line) -> Self {
        Self {
            name: line.name.clone(),
            bus0: line.bus0.clone(),
            bus1: line.bus1.clone(),
            x: line.x,
            r: Some(line.r),
            s_nom: Some(line.s_nom).filter(|s| s.is_finite()),
            s_max_pu: Some(line.s_max_pu),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkRecord {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    #[serde(default)]
    pub p_nom: Option<f64>,
    #[serde(default)]
    pub p_min_pu: Option<f64>,
    #[serde(default)]
    pub p_max_pu: Option<f64>,
    #[serde(default)]
    pub marginal_cost: Option<f64>,
}

impl From<LinkRecord> for Link {
    fn from(record: LinkRecord) -> Self {
        let mut link = Link::new(record.name, record.bus0, record.bus1, record.p_nom.unwrap_or(0.0));
        link.p_min_pu = record.p_min_pu.unwrap_or(0.0);
        link.p_max_pu = record.p_max_pu.unwrap_or(1.0);
        link.marginal_cost = record.marginal_cost.unwrap_or(0.0);
        link
    }
}

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        Self {
            name: link.name.clone(),
            bus0: link.bus0.clone(),
            bus1: link.bus1.clone(),
            p_nom: Some(link.p_nom),
            p_min_pu: Some(link.p_min_pu),
            p_max_pu: Some(link.p_max_pu),
            marginal_cost: Some(link.marginal_cost),
        }
    }
}

/// Read a static table; a missing file yields no rows.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    for (row, result) in reader.deserialize().enumerate() {
        let record: T =
            result.with_context(|| format!("parsing row {} of {}", row + 2, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_records<T: Serialize>(path: &Path, records: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("writing record to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Series table as read from disk.
#[derive(Debug, Default)]
pub struct SeriesFile {
    /// Snapshot names from the first column
    pub snapshots: Vec<String>,
    /// Component columns in file order
    pub columns: Vec<String>,
    pub table: SeriesTable,
}

/// Read a `snapshot,<component>...` table; a missing file yields `None`.
pub fn read_series(path: &Path) -> Result<Option<SeriesFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    if headers.is_empty() {
        bail!("{} has no header", path.display());
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    let mut file = SeriesFile {
        columns: columns.clone(),
        ..SeriesFile::default()
    };
    for column in &columns {
        if file.table.insert(column.clone(), Vec::new()).is_some() {
            bail!("duplicate column '{}' in {}", column, path.display());
        }
    }
    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("reading row {} of {}", row + 2, path.display()))?;
        let snapshot = record
            .get(0)
            .ok_or_else(|| anyhow!("missing snapshot column in {}", path.display()))?;
        file.snapshots.push(snapshot.to_string());
        for (i, column) in columns.iter().enumerate() {
            let cell = record.get(i + 1).unwrap_or("").trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>().with_context(|| {
                    format!(
                        "parsing '{}' for column '{}' row {} of {}",
                        cell,
                        column,
                        row + 2,
                        path.display()
                    )
                })?
            };
            if let Some(series) = file.table.get_mut(column) {
                series.push(value);
            }
        }
    }
    Ok(Some(file))
}

/// Write a series table with one row per snapshot. Missing values are left empty.
pub fn write_series<'a>(
    path: &Path,
    snapshots: &[Snapshot],
    columns: impl IntoIterator<Item = (&'a str, &'a [f64])>,
) -> Result<()> {
    let columns: Vec<(&str, &[f64])> = columns.into_iter().collect();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;
    let mut header = vec!["snapshot"];
    header.extend(columns.iter().map(|(name, _)| *name));
    writer
        .write_record(&header)
        .with_context(|| format!("writing header of {}", path.display()))?;
    for (t, snapshot) in snapshots.iter().enumerate() {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(snapshot.name.clone());
        for (_, values) in &columns {
            row.push(
                values
                    .get(t)
                    .filter(|v| v.is_finite())
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .with_context(|| format!("writing row {} of {}", t + 2, path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
