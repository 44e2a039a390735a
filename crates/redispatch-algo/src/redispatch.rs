//! Redispatch generator splitting
//!
//! Turns a market outcome into nodal bids: every generator is pinned to its
//! market dispatch and gets two companions, `"<name> ramp up"` (may add
//! output up to its remaining headroom) and `"<name> ramp down"` (may take
//! back output down to zero). Re-optimizing the nodal network with these
//! bids yields the redispatch cost.

use redispatch_core::{Generator, Network, NetworkError, SnapshotSeries, SolvedNetwork};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

pub const RAMP_UP_SUFFIX: &str = " ramp up";
pub const RAMP_DOWN_SUFFIX: &str = " ramp down";

#[derive(Debug, Error)]
pub enum SplitError {
    #[error(
        "generator sets differ between nodal and market network \
         (missing in market: {missing_in_market:?}, unexpected in market: {unexpected_in_market:?})"
    )]
    GeneratorMismatch {
        missing_in_market: Vec<String>,
        unexpected_in_market: Vec<String>,
    },

    #[error("generator '{0}' already exists in the nodal network")]
    NameCollision(String),

    #[error("market network has {found} snapshots, nodal network has {expected}")]
    SnapshotMismatch { expected: usize, found: usize },

    #[error("ramp generators rejected by the nodal network")]
    Rejected(#[source] NetworkError),
}

impl From<NetworkError> for SplitError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::DuplicateComponent { name, .. } => SplitError::NameCollision(name),
            other => SplitError::Rejected(other),
        }
    }
}

/// Marginal costs of the synthetic ramp generators.
///
/// Bounds are derived independently of the transform.
pub trait CostTransform {
    fn name(&self) -> &str;
    fn ramp_up_cost(&self, marginal_cost: f64) -> f64;
    fn ramp_down_cost(&self, marginal_cost: f64) -> f64;
}

/// Ramp generators bid at the original marginal cost. The redispatch
/// optimum then reproduces the nodal optimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricBids;

impl CostTransform for SymmetricBids {
    fn name(&self) -> &str {
        "symmetric"
    }

    fn ramp_up_cost(&self, marginal_cost: f64) -> f64 {
        marginal_cost
    }

    fn ramp_down_cost(&self, marginal_cost: f64) -> f64 {
        marginal_cost
    }
}

/// Scaled bids modelling redispatch compensation.
#[derive(Debug, Clone, Copy)]
pub struct AsymmetricBids {
    pub up_factor: f64,
    pub down_factor: f64,
}

impl Default for AsymmetricBids {
    fn default() -> Self {
        Self {
            up_factor: 2.0,
            down_factor: -0.5,
        }
    }
}

impl CostTransform for AsymmetricBids {
    fn name(&self) -> &str {
        "asymmetric"
    }

    fn ramp_up_cost(&self, marginal_cost: f64) -> f64 {
        marginal_cost * self.up_factor
    }

    fn ramp_down_cost(&self, marginal_cost: f64) -> f64 {
        marginal_cost * self.down_factor
    }
}

/// Summary of a split, for logging and reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitReport {
    pub generators: usize,
    pub ramp_up_generators: usize,
    pub ramp_down_generators: usize,
    pub cost_transform: String,
    /// Generators whose ratios were forced to zero because `p_nom` is not positive
    pub zero_capacity: Vec<String>,
    /// Generators without a market dispatch series (treated as zero output)
    pub missing_dispatch: Vec<String>,
    /// Total upward headroom offered, MW summed over snapshots
    pub ramp_up_headroom: f64,
    /// Total downward flexibility offered, MW summed over snapshots
    pub ramp_down_headroom: f64,
}

/// Market dispatch as a fraction of `p_nom`; 0 whenever the ratio is undefined.
pub fn realized_ratio(p: f64, p_nom: f64) -> f64 {
    if !(p_nom.is_finite() && p_nom > 0.0) {
        return 0.0;
    }
    let ratio = p / p_nom;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Build the redispatch network from the nodal network and the market result.
///
/// `nodal` is left untouched; the returned network has the same buses and
/// branches with three generators for every original one.
pub fn split_generators(
    nodal: &Network,
    market: &SolvedNetwork,
    costs: &dyn CostTransform,
) -> Result<(Network, SplitReport), SplitError> {
    let market_network = market.network();
    check_generator_sets(nodal, market_network)?;

    let snapshots = nodal.snapshot_count();
    if market_network.snapshot_count() != snapshots {
        return Err(SplitError::SnapshotMismatch {
            expected: snapshots,
            found: market_network.snapshot_count(),
        });
    }

    let mut report = SplitReport {
        generators: nodal.generators.len(),
        cost_transform: costs.name().to_string(),
        ..SplitReport::default()
    };
    let mut network = nodal.clone();
    let mut ramp_up = Vec::with_capacity(network.generators.len());
    let mut ramp_down = Vec::with_capacity(network.generators.len());

    for generator in &mut network.generators {
        // Presence was checked above.
        let Some(offer) = market_network.generator(&generator.name) else {
            continue;
        };
        let p_nom = offer.p_nom;
        let has_capacity = p_nom.is_finite() && p_nom > 0.0;
        if !has_capacity {
            report.zero_capacity.push(generator.name.clone());
        }
        let dispatch = match market.generator_p(&generator.name) {
            Some(series) => series.to_vec(),
            None => {
                report.missing_dispatch.push(generator.name.clone());
                vec![0.0; snapshots]
            }
        };

        let mut fixed = Vec::with_capacity(snapshots);
        let mut up = Vec::with_capacity(snapshots);
        let mut down = Vec::with_capacity(snapshots);
        for t in 0..snapshots {
            let ratio = realized_ratio(dispatch.get(t).copied().unwrap_or(0.0), p_nom);
            let available = offer.p_max_pu.get(t);
            let headroom = if has_capacity {
                (available - ratio).max(0.0)
            } else {
                0.0
            };
            fixed.push(ratio);
            up.push(if headroom.is_finite() { headroom } else { 0.0 });
            down.push((-ratio).min(0.0));
        }
        if has_capacity {
            report.ramp_up_headroom += up.iter().sum::<f64>() * p_nom;
            report.ramp_down_headroom -= down.iter().sum::<f64>() * p_nom;
        }

        let (up_name, down_name) = ramp_names(&generator.name);
        let mut up_generator = generator.clone();
        up_generator.name = up_name;
        up_generator.marginal_cost = costs.ramp_up_cost(generator.marginal_cost);
        up_generator.p_min_pu = SnapshotSeries::constant(0.0);
        up_generator.p_max_pu = SnapshotSeries::from_values(up);

        let mut down_generator = generator.clone();
        down_generator.name = down_name;
        down_generator.marginal_cost = costs.ramp_down_cost(generator.marginal_cost);
        down_generator.p_min_pu = SnapshotSeries::from_values(down);
        down_generator.p_max_pu = SnapshotSeries::constant(0.0);

        generator.p_min_pu = SnapshotSeries::from_values(fixed.clone());
        generator.p_max_pu = SnapshotSeries::from_values(fixed);

        debug!(generator = %generator.name, p_nom, "split generator");
        ramp_up.push(up_generator);
        ramp_down.push(down_generator);
    }

    report.ramp_up_generators = ramp_up.len();
    report.ramp_down_generators = ramp_down.len();
    // all-or-nothing; an existing generator named like a ramp aborts the split
    network.add_generators(ramp_up.into_iter().chain(ramp_down).collect())?;

    info!(
        generators = report.generators,
        cost_transform = %report.cost_transform,
        zero_capacity = report.zero_capacity.len(),
        missing_dispatch = report.missing_dispatch.len(),
        "split generators for redispatch"
    );
    Ok((network, report))
}

fn check_generator_sets(nodal: &Network, market: &Network) -> Result<(), SplitError> {
    let nodal_names: BTreeSet<&str> = nodal.generators.iter().map(|g| g.name.as_str()).collect();
    let market_names: BTreeSet<&str> = market.generators.iter().map(|g| g.name.as_str()).collect();
    if nodal_names == market_names {
        return Ok(());
    }
    Err(SplitError::GeneratorMismatch {
        missing_in_market: nodal_names
            .difference(&market_names)
            .map(|s| s.to_string())
            .collect(),
        unexpected_in_market: market_names
            .difference(&nodal_names)
            .map(|s| s.to_string())
            .collect(),
    })
}

/// Energy moved by the ramp generators of a solved redispatch model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RedispatchVolume {
    /// MWh added by ramp-up generators
    pub up: f64,
    /// MWh taken back by ramp-down generators, positive
    pub down: f64,
}

pub fn redispatch_volume(solved: &SolvedNetwork) -> RedispatchVolume {
    let weightings = solved.snapshot_weightings();
    let mut volume = RedispatchVolume::default();
    for generator in solved.network().generators.iter().filter(|g| is_ramp_generator(g)) {
        let energy = solved.dispatch().generator_energy(&generator.name, &weightings);
        if generator.name.ends_with(RAMP_UP_SUFFIX) {
            volume.up += energy;
        } else {
            volume.down -= energy;
        }
    }
    volume
}

/// Generators added by [`split_generators`] for `original`.
pub fn ramp_names(original: &str) -> (String, String) {
    (
        format!("{original}{RAMP_UP_SUFFIX}"),
        format!("{original}{RAMP_DOWN_SUFFIX}"),
    )
}

/// True for generators created by [`split_generators`].
pub fn is_ramp_generator(generator: &Generator) -> bool {
    generator.name.ends_with(RAMP_UP_SUFFIX) || generator.name.ends_with(RAMP_DOWN_SUFFIX)
}
