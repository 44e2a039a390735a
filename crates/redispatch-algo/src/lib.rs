//! Zonal market redispatch on top of `redispatch-core` networks.
//!
//! - [`opf`]: optimizer trait and the built-in linear OPF
//! - [`zones`]: bidding-zone assignment and aggregation
//! - [`redispatch`]: ramp-up/ramp-down generator splitting
//! - [`pipeline`]: the network, market and redispatch stages and their driver

pub mod opf;
pub mod pipeline;
pub mod redispatch;
pub mod zones;

pub use opf::{optimizer_for, LpSolverKind, OptimizeError, Optimizer, SolverOption, SolverSettings};
#[cfg(feature = "solver-clarabel")]
pub use opf::LinearOpf;
pub use pipeline::{
    market_model_stage, network_model_stage, redispatch_model_stage, PipelineError,
    PipelineOutcome, PipelineSummary, RedispatchPipeline, Stage,
};
pub use redispatch::{
    is_ramp_generator, ramp_names, realized_ratio, redispatch_volume, split_generators,
    AsymmetricBids, CostTransform, RedispatchVolume, SplitError, SplitReport, SymmetricBids,
};
pub use zones::{
    aggregate_bidding_zones, rewrite_branch_refs, rewrite_bus_ref, AggregationError, ByCountry,
    ByLatitude, ExplicitZones, UnmappedBusError, ZonalNetwork, ZoneAssignment, ZoneMap,
};
