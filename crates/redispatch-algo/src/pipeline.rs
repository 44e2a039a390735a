//! Three-stage redispatch pipeline
//!
//! ```text
//! nodal network ──► network_model ──────────────────────────────► reference cost
//!      │
//!      ├──► zones ──► market_model ──► market dispatch
//!      │                                     │
//!      └────────────► split generators ◄─────┘
//!                           │
//!                           └──► redispatch_model ──────────────► redispatch cost
//! ```
//!
//! Every stage works on its own copy of the nodal network and exports its
//! solved state before the next stage starts. The first failure aborts the run.

use crate::opf::{OptimizeError, Optimizer, SolverSettings};
use crate::redispatch::{
    redispatch_volume, split_generators, CostTransform, RedispatchVolume, SplitError, SplitReport,
    SymmetricBids,
};
use crate::zones::{
    aggregate_bidding_zones, AggregationError, ByCountry, UnmappedBusError, ZoneAssignment, ZoneMap,
};
use redispatch_core::{Network, NetworkError, ResultsStore, SeriesTable, SolvedNetwork};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Folder, below the pipeline's base folder, receiving all stage exports.
pub const RESULTS_DIR: &str = "results_redispatch";

const NETCDF_SUFFIX: &str = ".nc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NetworkModel,
    MarketModel,
    RedispatchModel,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::NetworkModel, Stage::MarketModel, Stage::RedispatchModel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NetworkModel => "network_model",
            Stage::MarketModel => "market_model",
            Stage::RedispatchModel => "redispatch_model",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage}: no feasible dispatch ({reason})")]
    SolverInfeasible { stage: Stage, reason: String },

    #[error("{stage}: solver failed ({reason})")]
    SolverError { stage: Stage, reason: String },

    #[error("market_model: {0}")]
    UnmappedBus(#[from] UnmappedBusError),

    #[error("market_model: zonal network of '{network}' is inconsistent")]
    ZonalNetwork {
        network: String,
        #[source]
        source: NetworkError,
    },

    #[error("redispatch_model: {0}")]
    Split(#[from] SplitError),

    #[error("{stage}: failed to export results to '{destination}'")]
    Export {
        stage: Stage,
        destination: String,
        #[source]
        source: NetworkError,
    },
}

impl From<AggregationError> for PipelineError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::UnmappedBus(err) => PipelineError::UnmappedBus(err),
            AggregationError::Inconsistent { network, source } => {
                PipelineError::ZonalNetwork { network, source }
            }
        }
    }
}

impl PipelineError {
    fn from_optimize(stage: Stage, err: OptimizeError) -> Self {
        match err {
            OptimizeError::Infeasible(reason) => PipelineError::SolverInfeasible { stage, reason },
            OptimizeError::Solver(reason) => PipelineError::SolverError { stage, reason },
        }
    }

    /// Stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::SolverInfeasible { stage, .. }
            | PipelineError::SolverError { stage, .. }
            | PipelineError::Export { stage, .. } => *stage,
            PipelineError::UnmappedBus(_) | PipelineError::ZonalNetwork { .. } => Stage::MarketModel,
            PipelineError::Split(_) => Stage::RedispatchModel,
        }
    }
}

fn solve(
    stage: Stage,
    network: Network,
    optimizer: &dyn Optimizer,
    settings: &SolverSettings,
) -> Result<SolvedNetwork, PipelineError> {
    let start = Instant::now();
    info!(%stage, network = %network.name, solver = optimizer.id(), "solving");
    let solved = optimizer
        .optimize(network, settings)
        .map_err(|err| PipelineError::from_optimize(stage, err))?;
    info!(
        %stage,
        objective = solved.objective(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "stage solved"
    );
    Ok(solved)
}

/// Reference run on an unmodified copy of the nodal network.
pub fn network_model_stage(
    network: &Network,
    optimizer: &dyn Optimizer,
    settings: &SolverSettings,
) -> Result<SolvedNetwork, PipelineError> {
    solve(Stage::NetworkModel, network.clone(), optimizer, settings)
}

/// Market clearing on the zonal copy. Also returns the dropped intra-zone branches.
pub fn market_model_stage(
    network: &Network,
    zones: &ZoneMap,
    optimizer: &dyn Optimizer,
    settings: &SolverSettings,
) -> Result<(SolvedNetwork, Vec<String>), PipelineError> {
    let zonal = aggregate_bidding_zones(network, zones)?;
    let solved = solve(Stage::MarketModel, zonal.network, optimizer, settings)?;
    Ok((solved, zonal.removed_branches))
}

/// Nodal re-optimization with generation pinned to the market outcome.
pub fn redispatch_model_stage(
    network: &Network,
    market: &SolvedNetwork,
    costs: &dyn CostTransform,
    optimizer: &dyn Optimizer,
    settings: &SolverSettings,
) -> Result<(SolvedNetwork, SplitReport), PipelineError> {
    let (augmented, report) = split_generators(network, market, costs)?;
    let solved = solve(Stage::RedispatchModel, augmented, optimizer, settings)?;
    Ok((solved, report))
}

/// Solved networks of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub model: String,
    pub network_model: SolvedNetwork,
    pub market_model: SolvedNetwork,
    pub redispatch_model: SolvedNetwork,
    pub zones: ZoneMap,
    pub removed_branches: Vec<String>,
    pub split: SplitReport,
}

impl PipelineOutcome {
    /// Extra cost of correcting the market dispatch to a feasible nodal one.
    pub fn redispatch_premium(&self) -> f64 {
        self.redispatch_model.objective() - self.network_model.objective()
    }

    pub fn redispatch_volume(&self) -> RedispatchVolume {
        redispatch_volume(&self.redispatch_model)
    }

    /// Zonal prices, keyed by zone.
    pub fn market_prices(&self) -> &SeriesTable {
        &self.market_model.dispatch().buses_marginal_price
    }

    pub fn stage(&self, stage: Stage) -> &SolvedNetwork {
        match stage {
            Stage::NetworkModel => &self.network_model,
            Stage::MarketModel => &self.market_model,
            Stage::RedispatchModel => &self.redispatch_model,
        }
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            model: self.model.clone(),
            network_cost: self.network_model.objective(),
            market_cost: self.market_model.objective(),
            redispatch_cost: self.redispatch_model.objective(),
            redispatch_premium: self.redispatch_premium(),
            redispatch_volume: self.redispatch_volume(),
            zones: self.zones.zones().iter().map(|z| z.name.clone()).collect(),
            removed_branches: self.removed_branches.len(),
            cost_transform: self.split.cost_transform.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub model: String,
    pub network_cost: f64,
    pub market_cost: f64,
    pub redispatch_cost: f64,
    pub redispatch_premium: f64,
    pub redispatch_volume: RedispatchVolume,
    pub zones: Vec<String>,
    pub removed_branches: usize,
    pub cost_transform: String,
}

/// Drives the three stages for one network.
pub struct RedispatchPipeline {
    network_id: String,
    folder: PathBuf,
    settings: SolverSettings,
    zones: Box<dyn ZoneAssignment + Send + Sync>,
    costs: Box<dyn CostTransform + Send + Sync>,
}

impl fmt::Debug for RedispatchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedispatchPipeline")
            .field("network_id", &self.network_id)
            .field("folder", &self.folder)
            .field("settings", &self.settings)
            .field("cost_transform", &self.costs.name())
            .finish()
    }
}

impl RedispatchPipeline {
    /// Zones default to bus countries and ramp bids to the original costs.
    pub fn new(network_id: impl Into<String>, folder: impl Into<PathBuf>, settings: SolverSettings) -> Self {
        Self {
            network_id: network_id.into(),
            folder: folder.into(),
            settings,
            zones: Box::new(ByCountry),
            costs: Box::new(SymmetricBids),
        }
    }

    pub fn with_zone_assignment(mut self, zones: impl ZoneAssignment + Send + Sync + 'static) -> Self {
        self.zones = Box::new(zones);
        self
    }

    pub fn with_cost_transform(mut self, costs: impl CostTransform + Send + Sync + 'static) -> Self {
        self.costs = Box::new(costs);
        self
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Network identifier without a trailing `.nc`. Other dots are part of
    /// the name (`elec_s_37_ec_lv1.5_CO2L-24H`).
    pub fn model_name(&self) -> String {
        self.network_id
            .strip_suffix(NETCDF_SUFFIX)
            .unwrap_or(&self.network_id)
            .to_string()
    }

    /// Where the input network is expected: `<folder>/../networks/<network_id>`.
    pub fn network_path(&self) -> PathBuf {
        self.folder.join("..").join("networks").join(&self.network_id)
    }

    pub fn results_folder(&self) -> PathBuf {
        self.folder.join(RESULTS_DIR)
    }

    /// Destination of a stage, relative to [`Self::results_folder`].
    pub fn destination(&self, stage: Stage) -> String {
        format!("{}/{}", self.model_name(), stage)
    }

    fn export(&self, store: &dyn ResultsStore, stage: Stage, solved: &SolvedNetwork) -> Result<(), PipelineError> {
        let destination = self.destination(stage);
        store
            .export(solved, &destination)
            .map_err(|source| PipelineError::Export {
                stage,
                destination,
                source,
            })
    }

    /// Run all stages on `network`, exporting after each solve.
    ///
    /// Zones are resolved before the first solve, so an unmapped bus fails fast.
    pub fn run(
        &self,
        network: &Network,
        optimizer: &dyn Optimizer,
        store: &dyn ResultsStore,
    ) -> Result<PipelineOutcome, PipelineError> {
        let zones = ZoneMap::build(network, self.zones.as_ref())?;
        let model = self.model_name();
        info!(
            model = %model,
            zones = zones.zone_count(),
            snapshots = network.snapshot_count(),
            solver = optimizer.id(),
            "starting redispatch pipeline"
        );

        let network_model = network_model_stage(network, optimizer, &self.settings)?;
        self.export(store, Stage::NetworkModel, &network_model)?;

        let (market_model, removed_branches) =
            market_model_stage(network, &zones, optimizer, &self.settings)?;
        self.export(store, Stage::MarketModel, &market_model)?;

        let (redispatch_model, split) = redispatch_model_stage(
            network,
            &market_model,
            self.costs.as_ref(),
            optimizer,
            &self.settings,
        )?;
        self.export(store, Stage::RedispatchModel, &redispatch_model)?;

        let outcome = PipelineOutcome {
            model,
            network_model,
            market_model,
            redispatch_model,
            zones,
            removed_branches,
            split,
        };
        let premium = outcome.redispatch_premium();
        if premium < -1e-6 * outcome.network_model.objective().abs().max(1.0) {
            warn!(premium, "redispatch is cheaper than the nodal optimum");
        }
        info!(
            model = %outcome.model,
            network_cost = outcome.network_model.objective(),
            market_cost = outcome.market_model.objective(),
            redispatch_cost = outcome.redispatch_model.objective(),
            premium,
            "redispatch pipeline finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(names, vec!["network_model", "market_model", "redispatch_model"]);
        assert_eq!(serde_json::to_string(&Stage::MarketModel).unwrap(), "\"market_model\"");
    }

    #[test]
    fn paths_follow_network_id() {
        let pipeline = RedispatchPipeline::new("elec_s_37.nc", "/data/run", SolverSettings::default());
        assert_eq!(pipeline.model_name(), "elec_s_37");
        assert_eq!(
            pipeline.network_path(),
            PathBuf::from("/data/run/../networks/elec_s_37.nc")
        );
        assert_eq!(pipeline.results_folder(), PathBuf::from("/data/run/results_redispatch"));
        assert_eq!(pipeline.destination(Stage::RedispatchModel), "elec_s_37/redispatch_model");
    }

    #[test]
    fn dotted_network_ids_keep_their_own_results() {
        let a = RedispatchPipeline::new("elec_s_37_ec_lv1.5_CO2L-24H", "/data/run", SolverSettings::default());
        let b = RedispatchPipeline::new("elec_s_37_ec_lv1.25_CO2L-24H", "/data/run", SolverSettings::default());
        assert_eq!(a.destination(Stage::MarketModel), "elec_s_37_ec_lv1.5_CO2L-24H/market_model");
        assert_ne!(a.destination(Stage::MarketModel), b.destination(Stage::MarketModel));

        let nc = RedispatchPipeline::new("elec_s_37_ec_lv1.5_CO2L-24H.nc", "/data/run", SolverSettings::default());
        assert_eq!(nc.model_name(), "elec_s_37_ec_lv1.5_CO2L-24H");
    }

    #[test]
    fn errors_name_their_stage() {
        let err = PipelineError::from_optimize(
            Stage::MarketModel,
            OptimizeError::Infeasible("zone short".into()),
        );
        assert_eq!(err.stage(), Stage::MarketModel);
        assert!(err.to_string().starts_with("market_model"));

        let err: PipelineError = UnmappedBusError { bus: "b".into() }.into();
        assert_eq!(err.stage(), Stage::MarketModel);
        let err: PipelineError = AggregationError::Inconsistent {
            network: "n".into(),
            source: NetworkError::DuplicateComponent {
                kind: redispatch_core::ComponentKind::Bus,
                name: "DE".into(),
            },
        }
        .into();
        assert_eq!(err.stage(), Stage::MarketModel);
        assert!(matches!(err, PipelineError::ZonalNetwork { .. }));
        let err: PipelineError = SplitError::NameCollision("g ramp up".into()).into();
        assert_eq!(err.stage(), Stage::RedispatchModel);
    }
}
