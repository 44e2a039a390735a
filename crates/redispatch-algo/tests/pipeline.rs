use redispatch_algo::{
    AsymmetricBids, ExplicitZones, LinearOpf, OptimizeError, Optimizer, PipelineError,
    RedispatchPipeline, SolverSettings, Stage,
};
use redispatch_core::{
    Bus, Dispatch, Generator, Line, Load, Network, NetworkResult, ResultsStore, SolvedNetwork,
};
use redispatch_io::CsvResultsStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::tempdir;

/// Two buses in one zone: cheap generation at `a`, dear generation and the
/// load at `b`, connected by one line.
fn two_bus(load_mw: f64, line_limit: Option<f64>) -> Network {
    let mut network = Network::new("two-bus");
    network.add_bus(Bus::new("a").with_country("DE")).unwrap();
    network.add_bus(Bus::new("b").with_country("DE")).unwrap();
    network
        .add_generator(Generator::new("cheap", "a", 100.0).with_marginal_cost(10.0))
        .unwrap();
    network
        .add_generator(Generator::new("dear", "b", 100.0).with_marginal_cost(50.0))
        .unwrap();
    network.add_load(Load::new("demand", "b", load_mw)).unwrap();
    let mut line = Line::new("a-b", "a", "b", 0.1);
    if let Some(limit) = line_limit {
        line = line.with_s_nom(limit);
    }
    network.add_line(line).unwrap();
    network
}

fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-4 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}

#[derive(Default)]
struct RecordingStore {
    destinations: Mutex<Vec<String>>,
}

impl RecordingStore {
    fn destinations(&self) -> Vec<String> {
        self.destinations.lock().unwrap().clone()
    }
}

impl ResultsStore for RecordingStore {
    fn export(&self, _solved: &SolvedNetwork, destination: &str) -> NetworkResult<()> {
        self.destinations.lock().unwrap().push(destination.to_string());
        Ok(())
    }
}

/// Returns an empty dispatch, failing on the `fail_on`-th call (0-based).
struct ScriptedOptimizer {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl ScriptedOptimizer {
    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(call),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Optimizer for ScriptedOptimizer {
    fn id(&self) -> &str {
        "scripted"
    }

    fn optimize(
        &self,
        network: Network,
        _settings: &SolverSettings,
    ) -> Result<SolvedNetwork, OptimizeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(OptimizeError::Infeasible(
                "zonal load exceeds zonal capacity".into(),
            ));
        }
        Ok(SolvedNetwork::new(network, Dispatch::default()))
    }
}

#[test]
fn single_zone_redispatch_matches_nodal_cost() {
    let network = two_bus(50.0, None);
    let pipeline = RedispatchPipeline::new("two-bus.nc", "/unused", SolverSettings::default());
    let store = RecordingStore::default();

    let outcome = pipeline.run(&network, &LinearOpf::new(), &store).unwrap();

    assert_close(outcome.network_model.objective(), 500.0);
    assert_close(outcome.redispatch_model.objective(), 500.0);
    assert_close(outcome.redispatch_premium(), 0.0);

    // one zone bus, internal line dropped
    let market = outcome.market_model.network();
    assert_eq!(market.buses.len(), 1);
    assert!(market.lines.is_empty());
    assert_eq!(outcome.removed_branches, vec!["a-b"]);

    let redispatch = outcome.redispatch_model.network();
    assert_eq!(redispatch.generators.len(), 6);
    assert_eq!(outcome.split.ramp_up_generators, 2);
    assert_eq!(
        store.destinations(),
        vec![
            "two-bus/network_model",
            "two-bus/market_model",
            "two-bus/redispatch_model"
        ]
    );
    // source network untouched
    assert_eq!(network.generators.len(), 2);
    assert_eq!(network.buses.len(), 2);
}

#[test]
fn equal_costs_make_redispatch_free() {
    let mut network = two_bus(100.0, Some(60.0));
    network.generators[1].marginal_cost = 10.0;
    network
        .add_generator(Generator::new("idle", "a", 0.0).with_marginal_cost(10.0))
        .unwrap();

    let outcome = RedispatchPipeline::new("two-bus", "/unused", SolverSettings::default())
        .run(&network, &LinearOpf::new(), &RecordingStore::default())
        .unwrap();

    assert_close(outcome.network_model.objective(), 1000.0);
    assert_close(outcome.market_model.objective(), 1000.0);
    assert_close(outcome.redispatch_model.objective(), 1000.0);
    assert_close(outcome.redispatch_premium(), 0.0);
    assert_eq!(outcome.market_model.network().buses.len(), 1);
    assert_eq!(outcome.removed_branches, vec!["a-b"]);
    assert_eq!(outcome.redispatch_model.network().generators.len(), 9);
    assert_eq!(outcome.split.zero_capacity, vec!["idle"]);
    // the line still binds in the nodal re-solve
    let flow = outcome.redispatch_model.dispatch().lines_p0["a-b"][0];
    assert!(flow <= 60.0 + 1e-3, "flow {flow}");
}

#[test]
fn congestion_shows_up_as_redispatch_cost() {
    let network = two_bus(100.0, Some(60.0));
    let store = RecordingStore::default();

    let symmetric = RedispatchPipeline::new("two-bus", "/unused", SolverSettings::default())
        .run(&network, &LinearOpf::new(), &store)
        .unwrap();
    assert_close(symmetric.network_model.objective(), 2600.0);
    // copper plate market runs the cheap unit flat out
    assert_close(symmetric.market_model.objective(), 1000.0);
    assert_close(symmetric.market_model.generator_p("cheap").unwrap()[0], 100.0);
    assert_close(symmetric.redispatch_model.objective(), 2600.0);
    assert_close(symmetric.redispatch_model.generator_p("dear ramp up").unwrap()[0], 40.0);
    assert_close(symmetric.redispatch_model.generator_p("cheap ramp down").unwrap()[0], -40.0);
    let volume = symmetric.redispatch_volume();
    assert_close(volume.up, 40.0);
    assert_close(volume.down, 40.0);

    let prices = symmetric.market_prices();
    assert_eq!(prices.len(), 1);
    // cheap unit sits at its limit, so any price between the two costs clears
    let price = prices["DE"][0];
    assert!((10.0 - 1e-3..=50.0 + 1e-3).contains(&price), "price {price}");

    let asymmetric = RedispatchPipeline::new("two-bus", "/unused", SolverSettings::default())
        .with_cost_transform(AsymmetricBids::default())
        .run(&network, &LinearOpf::new(), &store)
        .unwrap();
    // 1000 market + 40 MW up at 100 + 40 MW down at 5
    assert_close(asymmetric.redispatch_model.objective(), 5200.0);
    assert_close(asymmetric.redispatch_premium(), 2600.0);

    let summary = asymmetric.summary();
    assert_eq!(summary.zones, vec!["DE"]);
    assert_eq!(summary.cost_transform, "asymmetric");
}

#[test]
fn unmapped_bus_fails_before_any_solve() {
    let mut network = two_bus(50.0, None);
    network.buses[1].country = None;
    let optimizer = ScriptedOptimizer {
        calls: AtomicUsize::new(0),
        fail_on: None,
    };
    let store = RecordingStore::default();

    let err = RedispatchPipeline::new("two-bus", "/unused", SolverSettings::default())
        .run(&network, &optimizer, &store)
        .unwrap_err();

    assert!(matches!(&err, PipelineError::UnmappedBus(e) if e.bus == "b"));
    assert_eq!(optimizer.calls(), 0);
    assert!(store.destinations().is_empty());
}

#[test]
fn explicit_zones_cover_missing_countries() {
    let mut network = two_bus(50.0, None);
    network.buses[1].country = None;
    let zones = ExplicitZones::default().with("a", "north").with("b", "south");
    let optimizer = ScriptedOptimizer {
        calls: AtomicUsize::new(0),
        fail_on: None,
    };

    let outcome = RedispatchPipeline::new("two-bus", "/unused", SolverSettings::default())
        .with_zone_assignment(zones)
        .run(&network, &optimizer, &RecordingStore::default())
        .unwrap();

    assert_eq!(optimizer.calls(), 3);
    assert_eq!(outcome.zones.zone_count(), 2);
    assert_eq!(outcome.market_model.network().lines.len(), 1);
    assert!(outcome.removed_branches.is_empty());
}

#[test]
fn market_infeasibility_aborts_before_redispatch() {
    let network = two_bus(50.0, None);
    let optimizer = ScriptedOptimizer::failing_on(1);
    let dir = tempdir().unwrap();
    let pipeline = RedispatchPipeline::new("two-bus.nc", dir.path(), SolverSettings::default());
    let store = CsvResultsStore::new(pipeline.results_folder());

    let err = pipeline.run(&network, &optimizer, &store).unwrap_err();

    assert_eq!(err.stage(), Stage::MarketModel);
    assert!(matches!(err, PipelineError::SolverInfeasible { .. }));
    assert_eq!(optimizer.calls(), 2);

    let model_dir = dir.path().join("results_redispatch").join("two-bus");
    assert!(model_dir.join("network_model").join("buses.csv").exists());
    assert!(!model_dir.join("market_model").exists());
    assert!(!model_dir.join("redispatch_model").exists());
}

#[test]
fn stage_results_are_written_per_stage() {
    let network = two_bus(50.0, None);
    let dir = tempdir().unwrap();
    let pipeline = RedispatchPipeline::new("two-bus.nc", dir.path(), SolverSettings::default());
    let store = CsvResultsStore::new(pipeline.results_folder());

    pipeline.run(&network, &LinearOpf::new(), &store).unwrap();

    let model_dir = dir.path().join("results_redispatch").join("two-bus");
    for stage in Stage::ALL {
        let stage_dir = model_dir.join(stage.as_str());
        assert!(stage_dir.join("generators-p.csv").exists(), "{stage}");
        assert!(stage_dir.join("objective.json").exists(), "{stage}");
    }
    let redispatch_generators =
        std::fs::read_to_string(model_dir.join("redispatch_model").join("generators.csv")).unwrap();
    assert!(redispatch_generators.contains("cheap ramp up"));
    assert!(redispatch_generators.contains("dear ramp down"));
}
