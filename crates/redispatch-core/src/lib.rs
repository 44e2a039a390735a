//! # redispatch-core: Power Network Model
//!
//! Provides the data structures the redispatch pipeline operates on: a
//! multi-period power network made of buses, one-port components attached
//! to a single bus (generators, loads, storage units) and branch components
//! connecting two buses (lines, links).
//!
//! ## Design Philosophy
//!
//! Components live in typed collections keyed by their unique name and
//! reference buses by name, in the spirit of the tabular models used by
//! power-system planning tools. Instead of mapping dynamic columns, the
//! fields that reference buses are part of each component's schema and are
//! exposed through two traits:
//!
//! - [`OnePort`]: `bus`
//! - [`BranchComponent`]: `bus0`, `bus1`
//!
//! which makes topology rewrites (for example collapsing buses into bidding
//! zones) an explicit typed iteration over [`Network::one_ports_mut`] and
//! [`Network::branches_mut`].
//!
//! `Network` is `Clone`; a clone is a deep copy and shares no state with the
//! original, so every pipeline stage can own its copy.
//!
//! ## Quick Start
//!
//! ```rust
//! use redispatch_core::*;
//!
//! let mut network = Network::new("two-bus")
//!     .with_snapshots(vec![Snapshot::new("2013-01-01 00:00"), Snapshot::new("2013-01-01 01:00")]);
//!
//! network.add_bus(Bus::new("north").with_country("DE")).unwrap();
//! network.add_bus(Bus::new("south").with_country("DE")).unwrap();
//!
//! network
//!     .add_generator(Generator::new("wind", "north", 100.0).with_p_max_pu(vec![0.9, 0.4]))
//!     .unwrap();
//! network
//!     .add_generator(Generator::new("gas", "south", 100.0).with_marginal_cost(50.0))
//!     .unwrap();
//! network.add_load(Load::new("city", "south", 80.0)).unwrap();
//! network.add_line(Line::new("north-south", "north", "south", 0.1).with_s_nom(60.0)).unwrap();
//!
//! assert_eq!(network.stats().num_buses, 2);
//! assert!(network.check_references().is_ok());
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation issue collection
//! - [`graph_utils`] - Topology queries (sub-networks, islands) on petgraph
//! - [`series`] - Snapshot-indexed attributes with static fallback
//! - [`solved`] - Immutable solved view (network + dispatch)
//! - [`store`] - Results persistence interface

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod series;
pub mod solved;
pub mod store;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{NetworkError, NetworkResult};
pub use graph_utils::*;
pub use series::SnapshotSeries;
pub use solved::{Dispatch, SeriesTable, SolvedNetwork};
pub use store::ResultsStore;

/// Component categories of a [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Bus,
    Generator,
    Load,
    StorageUnit,
    Line,
    Link,
}

impl ComponentKind {
    pub const ONE_PORTS: [ComponentKind; 3] = [
        ComponentKind::Generator,
        ComponentKind::Load,
        ComponentKind::StorageUnit,
    ];
    pub const BRANCHES: [ComponentKind; 2] = [ComponentKind::Line, ComponentKind::Link];

    /// Collection name, also used as file stem by exporters.
    pub fn list_name(&self) -> &'static str {
        match self {
            ComponentKind::Bus => "buses",
            ComponentKind::Generator => "generators",
            ComponentKind::Load => "loads",
            ComponentKind::StorageUnit => "storage_units",
            ComponentKind::Line => "lines",
            ComponentKind::Link => "links",
        }
    }

    pub fn is_one_port(&self) -> bool {
        Self::ONE_PORTS.contains(self)
    }

    pub fn is_branch(&self) -> bool {
        Self::BRANCHES.contains(self)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ComponentKind::Bus => "Bus",
            ComponentKind::Generator => "Generator",
            ComponentKind::Load => "Load",
            ComponentKind::StorageUnit => "StorageUnit",
            ComponentKind::Line => "Line",
            ComponentKind::Link => "Link",
        };
        f.write_str(label)
    }
}

/// Anything stored in a network collection.
pub trait Component {
    fn kind(&self) -> ComponentKind;
    fn name(&self) -> &str;
}

/// Components attached to exactly one bus.
pub trait OnePort: Component {
    fn bus(&self) -> &str;
    fn set_bus(&mut self, bus: String);
}

/// Components connecting two buses.
pub trait BranchComponent: Component {
    fn bus0(&self) -> &str;
    fn bus1(&self) -> &str;
    fn set_buses(&mut self, bus0: String, bus1: String);
}

macro_rules! impl_component {
    ($type:ty, $kind:expr) => {
        impl Component for $type {
            fn kind(&self) -> ComponentKind {
                $kind
            }
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

macro_rules! impl_one_port {
    ($type:ty, $kind:expr) => {
        impl_component!($type, $kind);

        impl OnePort for $type {
            fn bus(&self) -> &str {
                &self.bus
            }
            fn set_bus(&mut self, bus: String) {
                self.bus = bus;
            }
        }
    };
}

macro_rules! impl_branch {
    ($type:ty, $kind:expr) => {
        impl_component!($type, $kind);

        impl BranchComponent for $type {
            fn bus0(&self) -> &str {
                &self.bus0
            }
            fn bus1(&self) -> &str {
                &self.bus1
            }
            fn set_buses(&mut self, bus0: String, bus1: String) {
                self.bus0 = bus0;
                self.bus1 = bus1;
            }
        }
    };
}

/// Discrete time step shared by all series of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    /// Objective weighting (hours represented by this snapshot)
    pub weighting: f64,
}

impl Snapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weighting: 1.0,
        }
    }

    pub fn with_weighting(mut self, weighting: f64) -> Self {
        self.weighting = weighting;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bus {
    pub name: String,
    /// Country tag, the default bidding-zone assignment
    pub country: Option<String>,
    /// Longitude
    pub x: f64,
    /// Latitude
    pub y: f64,
}

impl Bus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_coordinates(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

impl_component!(Bus, ComponentKind::Bus);

#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub name: String,
    pub bus: String,
    /// Nominal capacity (MW)
    pub p_nom: f64,
    /// Marginal cost (currency/MWh)
    pub marginal_cost: f64,
    /// Lower dispatch bound as a fraction of `p_nom`
    pub p_min_pu: SnapshotSeries,
    /// Upper dispatch bound (availability) as a fraction of `p_nom`
    pub p_max_pu: SnapshotSeries,
    pub carrier: String,
}

impl Generator {
    pub fn new(name: impl Into<String>, bus: impl Into<String>, p_nom: f64) -> Self {
        Self {
            name: name.into(),
            bus: bus.into(),
            p_nom,
            marginal_cost: 0.0,
            p_min_pu: SnapshotSeries::constant(0.0),
            p_max_pu: SnapshotSeries::constant(1.0),
            carrier: String::new(),
        }
    }

    pub fn with_marginal_cost(mut self, marginal_cost: f64) -> Self {
        self.marginal_cost = marginal_cost;
        self
    }

    pub fn with_p_min_pu(mut self, p_min_pu: impl Into<SnapshotSeries>) -> Self {
        self.p_min_pu = p_min_pu.into();
        self
    }

    /// Set availability. Per-snapshot values keep a static default of 1.
    pub fn with_p_max_pu(mut self, p_max_pu: impl Into<SnapshotSeries>) -> Self {
        let series = p_max_pu.into();
        self.p_max_pu = if series.is_varying() {
            series.with_default(1.0)
        } else {
            series
        };
        self
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    /// Dispatch bounds in MW at snapshot `t`.
    pub fn p_bounds(&self, t: usize) -> (f64, f64) {
        (
            self.p_nom * self.p_min_pu.get(t),
            self.p_nom * self.p_max_pu.get(t),
        )
    }
}

impl_one_port!(Generator, ComponentKind::Generator);

#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub name: String,
    pub bus: String,
    /// Active power demand (MW)
    pub p_set: SnapshotSeries,
}

impl Load {
    pub fn new(name: impl Into<String>, bus: impl Into<String>, p_set: impl Into<SnapshotSeries>) -> Self {
        Self {
            name: name.into(),
            bus: bus.into(),
            p_set: p_set.into(),
        }
    }
}

impl_one_port!(Load, ComponentKind::Load);

/// Storage with a state of charge linking consecutive snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    pub name: String,
    pub bus: String,
    /// Power capacity for both dispatch and store (MW)
    pub p_nom: f64,
    /// Energy capacity as hours at full power
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// State of charge before the first snapshot (MWh), unless cyclic
    pub state_of_charge_initial: f64,
    /// Tie the final state of charge to the initial one
    pub cyclic_state_of_charge: bool,
    pub marginal_cost: f64,
}

impl StorageUnit {
    pub fn new(name: impl Into<String>, bus: impl Into<String>, p_nom: f64) -> Self {
        Self {
            name: name.into(),
            bus: bus.into(),
            p_nom,
            max_hours: 1.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            state_of_charge_initial: 0.0,
            cyclic_state_of_charge: false,
            marginal_cost: 0.0,
        }
    }

    pub fn with_max_hours(mut self, max_hours: f64) -> Self {
        self.max_hours = max_hours;
        self
    }

    pub fn with_efficiencies(mut self, store: f64, dispatch: f64) -> Self {
        self.efficiency_store = store;
        self.efficiency_dispatch = dispatch;
        self
    }

    pub fn with_initial_state(mut self, state_of_charge: f64) -> Self {
        self.state_of_charge_initial = state_of_charge;
        self
    }

    pub fn cyclic(mut self) -> Self {
        self.cyclic_state_of_charge = true;
        self
    }
}

impl_one_port!(StorageUnit, ComponentKind::StorageUnit);

/// AC line obeying Kirchhoff's voltage law in the linear power flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    /// Series reactance
    pub x: f64,
    /// Series resistance (ignored by the linear power flow)
    pub r: f64,
    /// Thermal capacity (MVA); infinite means unconstrained
    pub s_nom: f64,
    pub s_max_pu: f64,
}

impl Line {
    pub fn new(
        name: impl Into<String>,
        bus0: impl Into<String>,
        bus1: impl Into<String>,
        x: f64,
    ) -> Self {
        Self {
            name: name.into(),
            bus0: bus0.into(),
            bus1: bus1.into(),
            x,
            r: 0.0,
            s_nom: f64::INFINITY,
            s_max_pu: 1.0,
        }
    }

    pub fn with_s_nom(mut self, s_nom: f64) -> Self {
        self.s_nom = s_nom;
        self
    }

    /// Flow limit in MW, `None` when unconstrained.
    pub fn flow_limit(&self) -> Option<f64> {
        let limit = self.s_nom * self.s_max_pu;
        limit.is_finite().then_some(limit)
    }
}

impl_branch!(Line, ComponentKind::Line);

/// Controllable point-to-point transfer (e.g. HVDC), no voltage-law coupling.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    /// Transfer capacity (MW)
    pub p_nom: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub marginal_cost: f64,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        bus0: impl Into<String>,
        bus1: impl Into<String>,
        p_nom: f64,
    ) -> Self {
        Self {
            name: name.into(),
            bus0: bus0.into(),
            bus1: bus1.into(),
            p_nom,
            p_min_pu: 0.0,
            p_max_pu: 1.0,
            marginal_cost: 0.0,
        }
    }

    /// Allow transfer in both directions up to `p_nom`.
    pub fn bidirectional(mut self) -> Self {
        self.p_min_pu = -1.0;
        self
    }
}

impl_branch!(Link, ComponentKind::Link);

/// Multi-period power network
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub name: String,
    snapshots: Vec<Snapshot>,
    pub buses: Vec<Bus>,
    pub generators: Vec<Generator>,
    pub loads: Vec<Load>,
    pub storage_units: Vec<StorageUnit>,
    pub lines: Vec<Line>,
    pub links: Vec<Link>,
}

impl Network {
    /// Create an empty network with a single snapshot `now`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshots: vec![Snapshot::new("now")],
            ..Self::default()
        }
    }

    pub fn with_snapshots(mut self, snapshots: Vec<Snapshot>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn set_snapshots(&mut self, snapshots: Vec<Snapshot>) {
        self.snapshots = snapshots;
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn has_bus(&self, name: &str) -> bool {
        self.buses.iter().any(|b| b.name == name)
    }

    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name == name)
    }

    pub fn generator(&self, name: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.name == name)
    }

    pub fn generator_mut(&mut self, name: &str) -> Option<&mut Generator> {
        self.generators.iter_mut().find(|g| g.name == name)
    }

    pub fn add_bus(&mut self, bus: Bus) -> NetworkResult<()> {
        if self.has_bus(&bus.name) {
            return Err(NetworkError::DuplicateComponent {
                kind: ComponentKind::Bus,
                name: bus.name,
            });
        }
        self.buses.push(bus);
        Ok(())
    }

    pub fn add_generator(&mut self, generator: Generator) -> NetworkResult<()> {
        self.ensure_one_port_insertable(&generator, self.generators.iter().map(|g| g.name.as_str()))?;
        self.generators.push(generator);
        Ok(())
    }

    /// Bulk insert; nothing is added if any generator is rejected.
    pub fn add_generators(&mut self, generators: Vec<Generator>) -> NetworkResult<()> {
        let mut seen: HashSet<&str> = self.generators.iter().map(|g| g.name.as_str()).collect();
        for generator in &generators {
            if !seen.insert(generator.name.as_str()) {
                return Err(NetworkError::DuplicateComponent {
                    kind: ComponentKind::Generator,
                    name: generator.name.clone(),
                });
            }
            self.ensure_bus(generator)?;
        }
        self.generators.extend(generators);
        Ok(())
    }

    pub fn add_load(&mut self, load: Load) -> NetworkResult<()> {
        self.ensure_one_port_insertable(&load, self.loads.iter().map(|l| l.name.as_str()))?;
        self.loads.push(load);
        Ok(())
    }

    pub fn add_storage_unit(&mut self, storage: StorageUnit) -> NetworkResult<()> {
        self.ensure_one_port_insertable(&storage, self.storage_units.iter().map(|s| s.name.as_str()))?;
        self.storage_units.push(storage);
        Ok(())
    }

    pub fn add_line(&mut self, line: Line) -> NetworkResult<()> {
        self.ensure_branch_insertable(&line, self.lines.iter().map(|l| l.name.as_str()))?;
        self.lines.push(line);
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> NetworkResult<()> {
        self.ensure_branch_insertable(&link, self.links.iter().map(|l| l.name.as_str()))?;
        self.links.push(link);
        Ok(())
    }

    fn ensure_unique<'a>(
        component: &dyn Component,
        mut existing: impl Iterator<Item = &'a str>,
    ) -> NetworkResult<()> {
        if existing.any(|name| name == component.name()) {
            return Err(NetworkError::DuplicateComponent {
                kind: component.kind(),
                name: component.name().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_bus(&self, component: &dyn OnePort) -> NetworkResult<()> {
        if !self.has_bus(component.bus()) {
            return Err(NetworkError::UnknownBus {
                kind: component.kind(),
                component: component.name().to_string(),
                bus: component.bus().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_one_port_insertable<'a>(
        &self,
        component: &dyn OnePort,
        existing: impl Iterator<Item = &'a str>,
    ) -> NetworkResult<()> {
        Self::ensure_unique(component, existing)?;
        self.ensure_bus(component)
    }

    fn ensure_branch_insertable<'a>(
        &self,
        component: &dyn BranchComponent,
        existing: impl Iterator<Item = &'a str>,
    ) -> NetworkResult<()> {
        Self::ensure_unique(component, existing)?;
        for bus in [component.bus0(), component.bus1()] {
            if !self.has_bus(bus) {
                return Err(NetworkError::UnknownBus {
                    kind: component.kind(),
                    component: component.name().to_string(),
                    bus: bus.to_string(),
                });
            }
        }
        Ok(())
    }

    /// All one-port components, generators first.
    pub fn one_ports(&self) -> impl Iterator<Item = &dyn OnePort> + '_ {
        self.generators
            .iter()
            .map(|g| g as &dyn OnePort)
            .chain(self.loads.iter().map(|l| l as &dyn OnePort))
            .chain(self.storage_units.iter().map(|s| s as &dyn OnePort))
    }

    pub fn one_ports_mut(&mut self) -> impl Iterator<Item = &mut dyn OnePort> + '_ {
        self.generators
            .iter_mut()
            .map(|g| g as &mut dyn OnePort)
            .chain(self.loads.iter_mut().map(|l| l as &mut dyn OnePort))
            .chain(self.storage_units.iter_mut().map(|s| s as &mut dyn OnePort))
    }

    /// All branch components, lines first.
    pub fn branches(&self) -> impl Iterator<Item = &dyn BranchComponent> + '_ {
        self.lines
            .iter()
            .map(|l| l as &dyn BranchComponent)
            .chain(self.links.iter().map(|l| l as &dyn BranchComponent))
    }

    pub fn branches_mut(&mut self) -> impl Iterator<Item = &mut dyn BranchComponent> + '_ {
        self.lines
            .iter_mut()
            .map(|l| l as &mut dyn BranchComponent)
            .chain(self.links.iter_mut().map(|l| l as &mut dyn BranchComponent))
    }

    /// Remove components of `kind` by name; returns how many were removed.
    ///
    /// Removing buses does not touch components attached to them, run
    /// [`Network::check_references`] afterwards if that matters.
    pub fn remove(&mut self, kind: ComponentKind, names: &HashSet<String>) -> usize {
        fn drop_named<T: Component>(items: &mut Vec<T>, names: &HashSet<String>) -> usize {
            let before = items.len();
            items.retain(|item| !names.contains(item.name()));
            before - items.len()
        }
        match kind {
            ComponentKind::Bus => drop_named(&mut self.buses, names),
            ComponentKind::Generator => drop_named(&mut self.generators, names),
            ComponentKind::Load => drop_named(&mut self.loads, names),
            ComponentKind::StorageUnit => drop_named(&mut self.storage_units, names),
            ComponentKind::Line => drop_named(&mut self.lines, names),
            ComponentKind::Link => drop_named(&mut self.links, names),
        }
    }

    /// Swap the whole bus set. Fails, leaving the network untouched, if a
    /// name is duplicated or a component would be left dangling.
    pub fn replace_buses(&mut self, buses: Vec<Bus>) -> NetworkResult<()> {
        let mut names = HashSet::new();
        for bus in &buses {
            if !names.insert(bus.name.as_str()) {
                return Err(NetworkError::DuplicateComponent {
                    kind: ComponentKind::Bus,
                    name: bus.name.clone(),
                });
            }
        }
        if let Some(err) = self.dangling_reference(|bus| names.contains(bus)) {
            return Err(err);
        }
        self.buses = buses;
        Ok(())
    }

    pub fn component_count(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Bus => self.buses.len(),
            ComponentKind::Generator => self.generators.len(),
            ComponentKind::Load => self.loads.len(),
            ComponentKind::StorageUnit => self.storage_units.len(),
            ComponentKind::Line => self.lines.len(),
            ComponentKind::Link => self.links.len(),
        }
    }

    fn dangling_reference(&self, exists: impl Fn(&str) -> bool) -> Option<NetworkError> {
        for component in self.one_ports() {
            if !exists(component.bus()) {
                return Some(NetworkError::UnknownBus {
                    kind: component.kind(),
                    component: component.name().to_string(),
                    bus: component.bus().to_string(),
                });
            }
        }
        for branch in self.branches() {
            for bus in [branch.bus0(), branch.bus1()] {
                if !exists(bus) {
                    return Some(NetworkError::UnknownBus {
                        kind: branch.kind(),
                        component: branch.name().to_string(),
                        bus: bus.to_string(),
                    });
                }
            }
        }
        None
    }

    /// Fail on the first component whose bus does not exist.
    pub fn check_references(&self) -> NetworkResult<()> {
        let buses: HashSet<&str> = self.buses.iter().map(|b| b.name.as_str()).collect();
        match self.dangling_reference(|bus| buses.contains(bus)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let n = self.snapshot_count();
        let peak_load_mw = (0..n)
            .map(|t| self.loads.iter().map(|l| l.p_set.get(t)).sum::<f64>())
            .fold(0.0, f64::max);
        NetworkStats {
            num_snapshots: n,
            num_buses: self.buses.len(),
            num_generators: self.generators.len(),
            num_loads: self.loads.len(),
            num_storage_units: self.storage_units.len(),
            num_lines: self.lines.len(),
            num_links: self.links.len(),
            total_gen_capacity_mw: self
                .generators
                .iter()
                .map(|g| g.p_nom)
                .filter(|p| p.is_finite())
                .sum(),
            peak_load_mw,
        }
    }

    /// Validate network data for issues that make the optimization fail or
    /// produce meaningless results.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.buses.is_empty() {
            diag.add_error("structure", "Network has no buses");
            return;
        }
        if self.snapshots.is_empty() {
            diag.add_error("structure", "Network has no snapshots");
        }
        if self.generators.is_empty() {
            diag.add_error("structure", "Network has no generators");
        }
        if self.loads.is_empty() {
            diag.add_warning("structure", "Network has no loads");
        }

        let buses: HashSet<&str> = self.buses.iter().map(|b| b.name.as_str()).collect();
        for component in self.one_ports() {
            if !buses.contains(component.bus()) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("unknown bus '{}'", component.bus()),
                    &format!("{} {}", component.kind(), component.name()),
                );
            }
        }
        for branch in self.branches() {
            for bus in [branch.bus0(), branch.bus1()] {
                if !buses.contains(bus) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("unknown bus '{}'", bus),
                        &format!("{} {}", branch.kind(), branch.name()),
                    );
                }
            }
            if branch.bus0() == branch.bus1() {
                diag.add_warning_with_entity(
                    "structure",
                    "branch connects a bus to itself",
                    &format!("{} {}", branch.kind(), branch.name()),
                );
            }
        }

        let n = self.snapshot_count();
        for generator in &self.generators {
            let entity = format!("Generator {}", generator.name);
            if !generator.p_nom.is_finite() || generator.p_nom < 0.0 {
                diag.add_error_with_entity(
                    "capacity",
                    &format!("p_nom must be finite and non-negative, got {}", generator.p_nom),
                    &entity,
                );
            } else if generator.p_nom == 0.0 {
                diag.add_warning_with_entity("capacity", "p_nom is zero", &entity);
            }
            for (attribute, series) in [("p_min_pu", &generator.p_min_pu), ("p_max_pu", &generator.p_max_pu)] {
                if let Some(values) = series.values() {
                    if values.len() != n {
                        diag.add_warning_with_entity(
                            "series",
                            &format!(
                                "{} has {} values for {} snapshots, missing values use the static default",
                                attribute,
                                values.len(),
                                n
                            ),
                            &entity,
                        );
                    }
                }
            }
            if (0..n).any(|t| generator.p_min_pu.get(t) > generator.p_max_pu.get(t)) {
                diag.add_error_with_entity("capacity", "p_min_pu exceeds p_max_pu", &entity);
            }
        }
        for load in &self.loads {
            if let Some(values) = load.p_set.values() {
                if values.len() != n {
                    diag.add_warning_with_entity(
                        "series",
                        &format!("p_set has {} values for {} snapshots", values.len(), n),
                        &format!("Load {}", load.name),
                    );
                }
            }
        }
        for line in &self.lines {
            if line.x.abs() < 1e-12 {
                diag.add_error_with_entity(
                    "structure",
                    "zero reactance",
                    &format!("Line {}", line.name),
                );
            }
        }

        let stats = self.stats();
        if stats.total_gen_capacity_mw < stats.peak_load_mw {
            diag.add_warning(
                "capacity",
                &format!(
                    "Total generation capacity ({:.1} MW) is less than peak load ({:.1} MW)",
                    stats.total_gen_capacity_mw, stats.peak_load_mw
                ),
            );
        }
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub num_snapshots: usize,
    pub num_buses: usize,
    pub num_generators: usize,
    pub num_loads: usize,
    pub num_storage_units: usize,
    pub num_lines: usize,
    pub num_links: usize,
    pub total_gen_capacity_mw: f64,
    pub peak_load_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} snapshots, {} buses, {} lines, {} links, {} generators ({:.0} MW), {} loads (peak {:.0} MW), {} storage units",
            self.num_snapshots,
            self.num_buses,
            self.num_lines,
            self.num_links,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.peak_load_mw,
            self.num_storage_units
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> Network {
        let mut network = Network::new("two-bus");
        network.add_bus(Bus::new("a").with_country("DE")).unwrap();
        network.add_bus(Bus::new("b").with_country("FR")).unwrap();
        network
            .add_generator(Generator::new("g1", "a", 100.0).with_marginal_cost(10.0))
            .unwrap();
        network.add_load(Load::new("l1", "b", 50.0)).unwrap();
        network.add_line(Line::new("a-b", "a", "b", 0.1)).unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus();
        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_generators, 1);
        assert_eq!(stats.num_lines, 1);
        assert!((stats.total_gen_capacity_mw - 100.0).abs() < 1e-9);
        assert!((stats.peak_load_mw - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_generator_rejected() {
        let mut network = two_bus();
        let err = network
            .add_generator(Generator::new("g1", "b", 10.0))
            .unwrap_err();
        assert!(matches!(
            err,
            NetworkError::DuplicateComponent {
                kind: ComponentKind::Generator,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_bus_rejected_on_insert() {
        let mut network = two_bus();
        let err = network.add_load(Load::new("l2", "nowhere", 1.0)).unwrap_err();
        assert!(matches!(err, NetworkError::UnknownBus { .. }));
        let err = network
            .add_line(Line::new("a-x", "a", "x", 0.1))
            .unwrap_err();
        assert!(matches!(err, NetworkError::UnknownBus { ref bus, .. } if bus == "x"));
    }

    #[test]
    fn test_bulk_add_is_all_or_nothing() {
        let mut network = two_bus();
        let err = network
            .add_generators(vec![
                Generator::new("g2", "a", 10.0),
                Generator::new("g2", "b", 10.0),
            ])
            .unwrap_err();
        assert!(matches!(err, NetworkError::DuplicateComponent { .. }));
        assert_eq!(network.generators.len(), 1);
    }

    #[test]
    fn test_clone_is_deep_copy() {
        let network = two_bus();
        let mut copy = network.clone();
        copy.generator_mut("g1").unwrap().p_nom = 5.0;
        copy.buses[0].name = "renamed".into();
        assert_eq!(network.generator("g1").unwrap().p_nom, 100.0);
        assert_eq!(network.buses[0].name, "a");
    }

    #[test]
    fn test_one_port_iteration_covers_all_categories() {
        let mut network = two_bus();
        network
            .add_storage_unit(StorageUnit::new("battery", "a", 10.0))
            .unwrap();
        let kinds: Vec<ComponentKind> = network.one_ports().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ComponentKind::Generator,
                ComponentKind::Load,
                ComponentKind::StorageUnit
            ]
        );
        for component in network.one_ports_mut() {
            component.set_bus("b".into());
        }
        assert!(network.one_ports().all(|c| c.bus() == "b"));
    }

    #[test]
    fn test_replace_buses_refuses_dangling() {
        let mut network = two_bus();
        let err = network.replace_buses(vec![Bus::new("a")]).unwrap_err();
        assert!(matches!(err, NetworkError::UnknownBus { .. }));
        assert_eq!(network.buses.len(), 2);
    }

    #[test]
    fn test_remove_by_name() {
        let mut network = two_bus();
        let names: HashSet<String> = ["g1".to_string(), "missing".to_string()].into();
        assert_eq!(network.remove(ComponentKind::Generator, &names), 1);
        assert!(network.generators.is_empty());
    }

    #[test]
    fn test_network_validation_empty() {
        let network = Network::new("empty");
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_network_validation_flags_zero_capacity_and_dangling_bus() {
        let mut network = two_bus();
        network.add_generator(Generator::new("idle", "a", 0.0)).unwrap();
        network.loads[0].bus = "gone".into();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag
            .warnings()
            .any(|i| i.message.contains("p_nom is zero")));
        assert!(diag
            .errors()
            .any(|i| i.category == "reference" && i.message.contains("gone")));
        assert!(network.check_references().is_err());
    }

    #[test]
    fn test_generator_bounds_follow_series() {
        let generator = Generator::new("pv", "a", 50.0).with_p_max_pu(vec![0.0, 0.5]);
        assert_eq!(generator.p_bounds(1), (0.0, 25.0));
        // outside the series the static default of 1.0 applies
        assert_eq!(generator.p_bounds(2), (0.0, 50.0));
    }

    #[test]
    fn test_line_flow_limit() {
        let line = Line::new("l", "a", "b", 0.1);
        assert_eq!(line.flow_limit(), None);
        let line = line.with_s_nom(80.0);
        assert_eq!(line.flow_limit(), Some(80.0));
    }
}
