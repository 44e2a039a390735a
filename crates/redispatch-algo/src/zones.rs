//! Bidding-zone aggregation
//!
//! Collapses a nodal network into a zonal one for market clearing:
//!
//! 1. Every bus is assigned a zone by a [`ZoneAssignment`]
//! 2. One-port components are moved to their bus's zone
//! 3. Branch endpoints are moved to their zones; branches inside a zone are dropped
//! 4. The bus set is replaced by one bus per distinct zone
//!
//! Zones are identified by name only, so two buses with the same zone value
//! always end up on the same zone bus.

use redispatch_core::{
    island_count, BranchComponent, Bus, Component, ComponentKind, Network, NetworkError, OnePort,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

/// A bus without a zone, or a component pointing at a bus the map does not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("bus '{bus}' has no bidding zone assignment")]
pub struct UnmappedBusError {
    pub bus: String,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    UnmappedBus(#[from] UnmappedBusError),

    #[error("zonal network of '{network}' is inconsistent")]
    Inconsistent {
        network: String,
        #[source]
        source: NetworkError,
    },
}

/// Decides which bidding zone a bus belongs to.
pub trait ZoneAssignment {
    fn zone(&self, bus: &Bus) -> Option<String>;
}

impl<F> ZoneAssignment for F
where
    F: Fn(&Bus) -> Option<String>,
{
    fn zone(&self, bus: &Bus) -> Option<String> {
        self(bus)
    }
}

/// Each country is one bidding zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByCountry;

impl ZoneAssignment for ByCountry {
    fn zone(&self, bus: &Bus) -> Option<String> {
        bus.country.clone().filter(|c| !c.trim().is_empty())
    }
}

/// Two zones split at a latitude.
#[derive(Debug, Clone)]
pub struct ByLatitude {
    pub threshold: f64,
    pub north: String,
    pub south: String,
}

impl ByLatitude {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

impl Default for ByLatitude {
    fn default() -> Self {
        Self {
            threshold: 51.0,
            north: "North".to_string(),
            south: "South".to_string(),
        }
    }
}

impl ZoneAssignment for ByLatitude {
    fn zone(&self, bus: &Bus) -> Option<String> {
        if bus.y.is_nan() {
            return None;
        }
        Some(if bus.y > self.threshold {
            self.north.clone()
        } else {
            self.south.clone()
        })
    }
}

/// Fixed bus-to-zone table; buses missing from it are unmapped.
#[derive(Debug, Clone, Default)]
pub struct ExplicitZones(pub BTreeMap<String, String>);

impl ExplicitZones {
    pub fn with(mut self, bus: impl Into<String>, zone: impl Into<String>) -> Self {
        self.0.insert(bus.into(), zone.into());
        self
    }
}

impl ZoneAssignment for ExplicitZones {
    fn zone(&self, bus: &Bus) -> Option<String> {
        self.0.get(&bus.name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub name: String,
    /// Member buses in network order
    pub buses: Vec<String>,
    /// Mean longitude of members
    pub x: f64,
    /// Mean latitude of members
    pub y: f64,
}

/// Resolved bus-to-zone mapping of one network.
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    by_bus: HashMap<String, usize>,
    zones: Vec<Zone>,
}

impl ZoneMap {
    /// Assign every bus of `network`. Zones are ordered by first appearance.
    pub fn build(network: &Network, assignment: &dyn ZoneAssignment) -> Result<Self, UnmappedBusError> {
        let mut map = ZoneMap::default();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for bus in &network.buses {
            let zone = assignment.zone(bus).ok_or_else(|| UnmappedBusError {
                bus: bus.name.clone(),
            })?;
            let index = *by_name.entry(zone.clone()).or_insert_with(|| {
                map.zones.push(Zone {
                    name: zone,
                    buses: Vec::new(),
                    x: 0.0,
                    y: 0.0,
                });
                map.zones.len() - 1
            });
            let entry = &mut map.zones[index];
            entry.buses.push(bus.name.clone());
            entry.x += bus.x;
            entry.y += bus.y;
            map.by_bus.insert(bus.name.clone(), index);
        }
        for zone in &mut map.zones {
            let n = zone.buses.len() as f64;
            zone.x /= n;
            zone.y /= n;
        }
        Ok(map)
    }

    pub fn zone_of(&self, bus: &str) -> Result<&str, UnmappedBusError> {
        self.by_bus
            .get(bus)
            .map(|&i| self.zones[i].name.as_str())
            .ok_or_else(|| UnmappedBusError {
                bus: bus.to_string(),
            })
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// One bus per zone, tagged with the zone as its country.
    pub fn zone_buses(&self) -> Vec<Bus> {
        self.zones
            .iter()
            .map(|zone| {
                Bus::new(zone.name.clone())
                    .with_country(zone.name.clone())
                    .with_coordinates(zone.x, zone.y)
            })
            .collect()
    }
}

/// Move a one-port component to the zone of its bus.
pub fn rewrite_bus_ref<C>(component: &mut C, zones: &ZoneMap) -> Result<(), UnmappedBusError>
where
    C: OnePort + ?Sized,
{
    let zone = zones.zone_of(component.bus())?.to_string();
    component.set_bus(zone);
    Ok(())
}

/// Move both endpoints of a branch to their zones.
pub fn rewrite_branch_refs<C>(component: &mut C, zones: &ZoneMap) -> Result<(), UnmappedBusError>
where
    C: BranchComponent + ?Sized,
{
    let bus0 = zones.zone_of(component.bus0())?.to_string();
    let bus1 = zones.zone_of(component.bus1())?.to_string();
    component.set_buses(bus0, bus1);
    Ok(())
}

/// Result of [`aggregate_bidding_zones`].
#[derive(Debug, Clone)]
pub struct ZonalNetwork {
    pub network: Network,
    /// Branches dropped because both endpoints fell into the same zone
    pub removed_branches: Vec<String>,
}

/// Build the zonal copy of `source`. `source` itself is never modified.
pub fn aggregate_bidding_zones(
    source: &Network,
    zones: &ZoneMap,
) -> Result<ZonalNetwork, AggregationError> {
    let mut network = source.clone();

    for component in network.one_ports_mut() {
        rewrite_bus_ref(component, zones)?;
    }
    for branch in network.branches_mut() {
        rewrite_branch_refs(branch, zones)?;
    }

    let removed_branches: Vec<String> = network
        .branches()
        .filter(|branch| branch.bus0() == branch.bus1())
        .map(|branch| branch.name().to_string())
        .collect();
    for kind in ComponentKind::BRANCHES {
        let internal: HashSet<String> = network
            .branches()
            .filter(|branch| branch.kind() == kind && branch.bus0() == branch.bus1())
            .map(|branch| branch.name().to_string())
            .collect();
        network.remove(kind, &internal);
    }
    debug!(removed = ?removed_branches, "dropped intra-zone branches");

    network
        .replace_buses(zones.zone_buses())
        .map_err(|err| AggregationError::Inconsistent {
            network: network.name.clone(),
            source: err,
        })?;

    info!(
        network = %network.name,
        zones = zones.zone_count(),
        removed_branches = removed_branches.len(),
        kept_branches = ComponentKind::BRANCHES
            .iter()
            .map(|kind| network.component_count(*kind))
            .sum::<usize>(),
        islands = island_count(&network),
        "aggregated bidding zones"
    );
    Ok(ZonalNetwork {
        network,
        removed_branches,
    })
}
