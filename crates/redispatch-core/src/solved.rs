//! Results of an optimization run.
//!
//! A [`SolvedNetwork`] pairs the network that was optimized with its
//! [`Dispatch`]. It is immutable: downstream stages read from it and build new
//! networks instead of mutating a solved one.

use crate::Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-component series keyed by component name, one value per snapshot.
pub type SeriesTable = BTreeMap<String, Vec<f64>>;

/// Optimal dispatch and prices of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Total system cost (snapshot-weighted)
    pub objective: f64,
    /// Identifier of the backend that produced the result
    pub solver: String,
    pub generators_p: SeriesTable,
    pub loads_p: SeriesTable,
    /// Net output, positive when discharging
    pub storage_units_p: SeriesTable,
    pub storage_units_state_of_charge: SeriesTable,
    pub lines_p0: SeriesTable,
    pub links_p0: SeriesTable,
    /// Nodal balance duals (currency/MWh)
    pub buses_marginal_price: SeriesTable,
}

impl Dispatch {
    /// Energy-weighted sum of a generator series.
    pub fn generator_energy(&self, name: &str, weightings: &[f64]) -> f64 {
        self.generators_p
            .get(name)
            .map(|series| weighted_sum(series, weightings))
            .unwrap_or(0.0)
    }
}

fn weighted_sum(series: &[f64], weightings: &[f64]) -> f64 {
    series
        .iter()
        .enumerate()
        .map(|(t, value)| value * weightings.get(t).copied().unwrap_or(1.0))
        .sum()
}

#[derive(Debug, Clone)]
pub struct SolvedNetwork {
    network: Network,
    dispatch: Dispatch,
}

impl SolvedNetwork {
    pub fn new(network: Network, dispatch: Dispatch) -> Self {
        Self { network, dispatch }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn objective(&self) -> f64 {
        self.dispatch.objective
    }

    /// Dispatch of a generator, `None` if the generator is unknown.
    pub fn generator_p(&self, name: &str) -> Option<&[f64]> {
        self.dispatch.generators_p.get(name).map(Vec::as_slice)
    }

    pub fn marginal_price(&self, bus: &str) -> Option<&[f64]> {
        self.dispatch.buses_marginal_price.get(bus).map(Vec::as_slice)
    }

    pub fn snapshot_weightings(&self) -> Vec<f64> {
        self.network.snapshots().iter().map(|s| s.weighting).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snapshot;

    #[test]
    fn weighted_generation_uses_snapshot_weightings() {
        let network = Network::new("w").with_snapshots(vec![
            Snapshot::new("t0"),
            Snapshot::new("t1").with_weighting(3.0),
        ]);
        let mut dispatch = Dispatch::default();
        dispatch.generators_p.insert("g".into(), vec![10.0, 20.0]);
        let solved = SolvedNetwork::new(network, dispatch);
        let weightings = solved.snapshot_weightings();
        assert_eq!(weightings, vec![1.0, 3.0]);
        assert_eq!(solved.generator_p("g"), Some(&[10.0, 20.0][..]));
        assert!(solved.generator_p("missing").is_none());
        assert_eq!(solved.dispatch().generator_energy("g", &weightings), 70.0);
        assert_eq!(solved.dispatch().generator_energy("missing", &weightings), 0.0);
    }
}
