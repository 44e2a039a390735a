//! Multi-period linear optimal power flow
//!
//! Linearized (DC) OPF over all snapshots of a network:
//! - Generators dispatch within `p_nom * [p_min_pu, p_max_pu]`
//! - Storage units dispatch, store and carry a state of charge between snapshots
//! - Links transfer power within `p_nom * [p_min_pu, p_max_pu]`
//! - Lines follow `p0 = (θ0 - θ1) / x` with one angle reference per AC sub-network
//! - Power balance holds at every bus and snapshot; its duals are the nodal prices
//!
//! Decisions whose bounds coincide are substituted as constants, so a fully
//! fixed generator adds no variable to the LP.

use super::{OptimizeError, Optimizer, SolverSettings};
use good_lp::constraint::{self, ConstraintReference};
use good_lp::solvers::clarabel::clarabel;
use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{
    variable, variables, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use redispatch_core::{
    sub_networks, Coupling, Dispatch, Network, SeriesTable, SolvedNetwork,
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Bounds closer than this are treated as a fixed decision.
const DEFAULT_FIXED_TOLERANCE: f64 = 1e-9;
/// Slack for the static feasibility checks (MW).
const BALANCE_TOLERANCE: f64 = 1e-6;

const RECOGNIZED_OPTIONS: &[&str] = &["fixed_tolerance"];

/// Linear OPF solved with Clarabel.
#[derive(Debug, Clone, Default)]
pub struct LinearOpf;

impl LinearOpf {
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for LinearOpf {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn optimize(
        &self,
        network: Network,
        settings: &SolverSettings,
    ) -> Result<SolvedNetwork, OptimizeError> {
        let start = Instant::now();
        let mut dispatch = solve(&network, settings)?;
        dispatch.solver = self.id().to_string();
        info!(
            network = %network.name,
            objective = dispatch.objective,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "linear OPF solved"
        );
        Ok(SolvedNetwork::new(network, dispatch))
    }
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Free(Variable),
    Fixed(f64),
}

impl Decision {
    fn scaled(self, coeff: f64) -> Expression {
        match self {
            Decision::Free(v) => coeff * v,
            Decision::Fixed(c) => Expression::from(coeff * c),
        }
    }

    fn value(self, lookup: &impl Fn(Variable) -> f64) -> f64 {
        match self {
            Decision::Free(v) => lookup(v),
            Decision::Fixed(c) => c,
        }
    }
}

/// Linear expression that keeps its constant part separately, so constraints
/// without free terms can be checked without the solver.
struct Affine {
    expr: Expression,
    constant: f64,
    free_terms: usize,
}

impl Affine {
    fn new() -> Self {
        Self {
            expr: Expression::from(0.0),
            constant: 0.0,
            free_terms: 0,
        }
    }

    fn add(&mut self, decision: Decision, coeff: f64) {
        match decision {
            Decision::Free(v) => {
                self.expr += coeff * v;
                self.free_terms += 1;
            }
            Decision::Fixed(c) => self.constant += coeff * c,
        }
    }

    fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    fn into_expression(self) -> Expression {
        self.expr + self.constant
    }
}

struct Variables {
    vars: ProblemVariables,
    tolerance: f64,
    free: usize,
}

impl Variables {
    fn decision(&mut self, lo: f64, hi: f64, what: impl Fn() -> String) -> Result<Decision, OptimizeError> {
        if lo.is_nan() || hi.is_nan() {
            return Err(OptimizeError::Solver(format!("{} has undefined bounds", what())));
        }
        if lo > hi + self.tolerance {
            return Err(OptimizeError::Infeasible(format!(
                "{}: lower bound {} exceeds upper bound {}",
                what(),
                lo,
                hi
            )));
        }
        if lo.is_finite() && (hi - lo).abs() <= self.tolerance {
            return Ok(Decision::Fixed(lo));
        }
        let mut definition = variable();
        if lo.is_finite() {
            definition = definition.min(lo);
        }
        if hi.is_finite() {
            definition = definition.max(hi);
        }
        self.free += 1;
        Ok(Decision::Free(self.vars.add(definition)))
    }

    fn free(&mut self) -> Decision {
        self.free += 1;
        Decision::Free(self.vars.add(variable()))
    }
}

/// Decision tables indexed by `[component][snapshot]`.
struct Model {
    gen_p: Vec<Vec<Decision>>,
    store: Vec<Vec<Decision>>,
    dispatch: Vec<Vec<Decision>>,
    soc: Vec<Vec<Decision>>,
    link_p: Vec<Vec<Decision>>,
    theta: Vec<Vec<Decision>>,
}

fn fixed_tolerance(settings: &SolverSettings) -> f64 {
    for (key, value) in &settings.options {
        if !RECOGNIZED_OPTIONS.contains(&key.as_str()) {
            debug!(option = %key, value = %value, "passing through unrecognized solver option");
        }
    }
    settings
        .option("fixed_tolerance")
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(DEFAULT_FIXED_TOLERANCE)
}

fn invalid(message: String) -> OptimizeError {
    OptimizeError::Solver(format!("invalid network: {message}"))
}

/// Every island needs enough capacity for its load at every snapshot.
fn check_adequacy(network: &Network, bus_index: &HashMap<&str, usize>) -> Result<(), OptimizeError> {
    let islands = sub_networks(network, Coupling::All);
    let mut island_of = vec![0; network.buses.len()];
    for (island, members) in islands.iter().enumerate() {
        for &bus in members {
            island_of[bus] = island;
        }
    }
    let island = |bus: &str| bus_index.get(bus).map(|&i| island_of[i]);

    for (t, snapshot) in network.snapshots().iter().enumerate() {
        let mut demand = vec![0.0; islands.len()];
        let mut max_supply = vec![0.0; islands.len()];
        let mut min_supply = vec![0.0; islands.len()];
        let mut absorb = vec![0.0; islands.len()];
        for load in &network.loads {
            if let Some(i) = island(&load.bus) {
                demand[i] += load.p_set.get(t);
            }
        }
        for generator in &network.generators {
            if let Some(i) = island(&generator.bus) {
                let (lo, hi) = generator.p_bounds(t);
                max_supply[i] += hi;
                min_supply[i] += lo;
            }
        }
        for storage in &network.storage_units {
            if let Some(i) = island(&storage.bus) {
                max_supply[i] += storage.p_nom;
                absorb[i] += storage.p_nom;
            }
        }
        for i in 0..islands.len() {
            if demand[i] > max_supply[i] + BALANCE_TOLERANCE {
                return Err(OptimizeError::Infeasible(format!(
                    "snapshot '{}': load {:.3} MW in island of bus '{}' exceeds available capacity {:.3} MW",
                    snapshot.name, demand[i], network.buses[islands[i][0]].name, max_supply[i]
                )));
            }
            if min_supply[i] > demand[i] + absorb[i] + BALANCE_TOLERANCE {
                return Err(OptimizeError::Infeasible(format!(
                    "snapshot '{}': must-run generation {:.3} MW in island of bus '{}' exceeds load {:.3} MW",
                    snapshot.name, min_supply[i], network.buses[islands[i][0]].name, demand[i]
                )));
            }
        }
    }
    Ok(())
}

fn solve(network: &Network, settings: &SolverSettings) -> Result<Dispatch, OptimizeError> {
    network
        .check_references()
        .map_err(|e| invalid(e.to_string()))?;
    if network.buses.is_empty() {
        return Err(invalid("no buses".into()));
    }
    if let Some(line) = network.lines.iter().find(|l| l.x.abs() < 1e-12) {
        return Err(invalid(format!("line '{}' has zero reactance", line.name)));
    }
    if let Some(storage) = network
        .storage_units
        .iter()
        .find(|s| s.efficiency_dispatch <= 0.0 || s.efficiency_store < 0.0)
    {
        return Err(invalid(format!(
            "storage unit '{}' has non-positive efficiency",
            storage.name
        )));
    }

    let n_t = network.snapshot_count();
    let bus_index: HashMap<&str, usize> = network
        .buses
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();
    check_adequacy(network, &bus_index)?;

    let mut vars = Variables {
        vars: variables!(),
        tolerance: fixed_tolerance(settings),
        free: 0,
    };

    // === Decisions ===
    let mut model = Model {
        gen_p: Vec::with_capacity(network.generators.len()),
        store: Vec::with_capacity(network.storage_units.len()),
        dispatch: Vec::with_capacity(network.storage_units.len()),
        soc: Vec::with_capacity(network.storage_units.len()),
        link_p: Vec::with_capacity(network.links.len()),
        theta: Vec::with_capacity(network.buses.len()),
    };
    for generator in &network.generators {
        let mut row = Vec::with_capacity(n_t);
        for t in 0..n_t {
            let (lo, hi) = generator.p_bounds(t);
            row.push(vars.decision(lo, hi, || {
                format!("generator '{}' at snapshot {}", generator.name, t)
            })?);
        }
        model.gen_p.push(row);
    }
    for storage in &network.storage_units {
        let what = |kind: &str, t: usize| format!("storage unit '{}' {} at snapshot {}", storage.name, kind, t);
        let e_nom = storage.p_nom * storage.max_hours;
        let mut store = Vec::with_capacity(n_t);
        let mut dispatch = Vec::with_capacity(n_t);
        let mut soc = Vec::with_capacity(n_t);
        for t in 0..n_t {
            store.push(vars.decision(0.0, storage.p_nom, || what("store", t))?);
            dispatch.push(vars.decision(0.0, storage.p_nom, || what("dispatch", t))?);
            soc.push(vars.decision(0.0, e_nom, || what("state of charge", t))?);
        }
        model.store.push(store);
        model.dispatch.push(dispatch);
        model.soc.push(soc);
    }
    for link in &network.links {
        let mut row = Vec::with_capacity(n_t);
        for t in 0..n_t {
            row.push(vars.decision(
                link.p_nom * link.p_min_pu,
                link.p_nom * link.p_max_pu,
                || format!("link '{}' at snapshot {}", link.name, t),
            )?);
        }
        model.link_p.push(row);
    }
    let mut is_reference = vec![false; network.buses.len()];
    for group in sub_networks(network, Coupling::Lines) {
        if let Some(&first) = group.first() {
            is_reference[first] = true;
        }
    }
    for reference in is_reference.iter().copied() {
        let mut row = Vec::with_capacity(n_t);
        for _ in 0..n_t {
            row.push(if reference { Decision::Fixed(0.0) } else { vars.free() });
        }
        model.theta.push(row);
    }

    // === Objective ===
    let weightings: Vec<f64> = network.snapshots().iter().map(|s| s.weighting).collect();
    let mut objective = Expression::from(0.0);
    for t in 0..n_t {
        let w = weightings[t];
        for (g, generator) in network.generators.iter().enumerate() {
            objective += model.gen_p[g][t].scaled(w * generator.marginal_cost);
        }
        for (s, storage) in network.storage_units.iter().enumerate() {
            objective += model.dispatch[s][t].scaled(w * storage.marginal_cost);
        }
        for (l, link) in network.links.iter().enumerate() {
            objective += model.link_p[l][t].scaled(w * link.marginal_cost);
        }
    }

    // === Constraints ===
    let mut constraints: Vec<Constraint> = Vec::new();
    let mut require = |affine: Affine, bound: Bound, what: &dyn Fn() -> String| -> Result<(), OptimizeError> {
        if let Some(c) = bounded(affine, bound, what)? {
            constraints.push(c);
        }
        Ok(())
    };

    // State of charge: soc_t = soc_{t-1} + w_t (eta_store * store_t - dispatch_t / eta_dispatch)
    for (s, storage) in network.storage_units.iter().enumerate() {
        for t in 0..n_t {
            let mut balance = Affine::new();
            balance.add(model.soc[s][t], 1.0);
            if t > 0 {
                balance.add(model.soc[s][t - 1], -1.0);
            } else if storage.cyclic_state_of_charge && n_t > 0 {
                balance.add(model.soc[s][n_t - 1], -1.0);
            } else {
                balance.add_constant(-storage.state_of_charge_initial);
            }
            balance.add(model.store[s][t], -weightings[t] * storage.efficiency_store);
            balance.add(model.dispatch[s][t], weightings[t] / storage.efficiency_dispatch);
            require(balance, Bound::Eq, &|| {
                format!("state of charge of '{}' at snapshot {}", storage.name, t)
            })?;
        }
    }

    // Line flow limits
    let mut line_buses = Vec::with_capacity(network.lines.len());
    for line in &network.lines {
        let i = bus_index[line.bus0.as_str()];
        let j = bus_index[line.bus1.as_str()];
        line_buses.push((i, j, 1.0 / line.x));
        let Some(limit) = line.flow_limit() else {
            continue;
        };
        for t in 0..n_t {
            let b = 1.0 / line.x;
            // |p0| <= limit as two one-sided rows
            let flow = |direction: f64| {
                let mut flow = Affine::new();
                flow.add(model.theta[i][t], direction * b);
                flow.add(model.theta[j][t], -direction * b);
                flow
            };
            let what = || format!("flow limit of line '{}' at snapshot {}", line.name, t);
            require(flow(1.0), Bound::Le(limit), &what)?;
            require(flow(-1.0), Bound::Le(limit), &what)?;
        }
    }

    // Nodal balance: injections - withdrawals == 0, so the duals read as prices
    let mut balances: Vec<Vec<Affine>> = (0..network.buses.len())
        .map(|_| (0..n_t).map(|_| Affine::new()).collect())
        .collect();
    for t in 0..n_t {
        for load in &network.loads {
            balances[bus_index[load.bus.as_str()]][t].add_constant(-load.p_set.get(t));
        }
        for (g, generator) in network.generators.iter().enumerate() {
            balances[bus_index[generator.bus.as_str()]][t].add(model.gen_p[g][t], 1.0);
        }
        for (s, storage) in network.storage_units.iter().enumerate() {
            let bus = bus_index[storage.bus.as_str()];
            balances[bus][t].add(model.store[s][t], -1.0);
            balances[bus][t].add(model.dispatch[s][t], 1.0);
        }
        for (l, link) in network.links.iter().enumerate() {
            balances[bus_index[link.bus0.as_str()]][t].add(model.link_p[l][t], -1.0);
            balances[bus_index[link.bus1.as_str()]][t].add(model.link_p[l][t], 1.0);
        }
        for &(i, j, b) in &line_buses {
            balances[i][t].add(model.theta[i][t], -b);
            balances[i][t].add(model.theta[j][t], b);
            balances[j][t].add(model.theta[i][t], b);
            balances[j][t].add(model.theta[j][t], -b);
        }
    }
    let mut balance_constraints: Vec<(usize, usize, Constraint)> = Vec::new();
    for (bus, per_snapshot) in balances.into_iter().enumerate() {
        for (t, balance) in per_snapshot.into_iter().enumerate() {
            let what = || format!("power balance at bus '{}' snapshot {}", network.buses[bus].name, t);
            if let Some(c) = bounded(balance, Bound::Eq, &what)? {
                balance_constraints.push((bus, t, c));
            }
        }
    }

    info!(
        network = %network.name,
        snapshots = n_t,
        variables = vars.free,
        constraints = constraints.len() + balance_constraints.len(),
        "building linear OPF"
    );

    let mut prices = vec![vec![f64::NAN; n_t]; network.buses.len()];
    if vars.free == 0 {
        // every decision is pinned and every constraint was checked statically
        return Ok(extract(network, &model, &weightings, &|_: Variable| 0.0, prices));
    }

    let mut problem = vars.vars.minimise(objective).using(clarabel);
    for c in constraints {
        problem.add_constraint(c);
    }
    let refs: Vec<(usize, usize, ConstraintReference)> = balance_constraints
        .into_iter()
        .map(|(bus, t, c)| (bus, t, problem.add_constraint(c)))
        .collect();

    let mut solution = problem.solve().map_err(|e| match e {
        ResolutionError::Infeasible => {
            OptimizeError::Infeasible(format!("{} has no feasible dispatch", network.name))
        }
        other => OptimizeError::Solver(format!("LP solver failed: {other}")),
    })?;

    let primal: HashMap<Variable, f64> = collect_primal(&model)
        .into_iter()
        .map(|v| (v, solution.value(v)))
        .collect();

    let duals = solution.compute_dual();
    for (bus, t, reference) in refs {
        let w = weightings[t];
        let dual = duals.dual(reference);
        prices[bus][t] = if w > 0.0 { dual / w } else { dual };
    }

    let lookup = |v: Variable| primal.get(&v).copied().unwrap_or(0.0);
    Ok(extract(network, &model, &weightings, &lookup, prices))
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Eq,
    Le(f64),
}

/// Turn `affine (op) bound` into a solver constraint, or check it directly
/// when it has no free terms.
fn bounded(
    affine: Affine,
    bound: Bound,
    what: &dyn Fn() -> String,
) -> Result<Option<Constraint>, OptimizeError> {
    if affine.free_terms == 0 {
        let value = affine.constant;
        let holds = match bound {
            Bound::Eq => value.abs() <= BALANCE_TOLERANCE,
            Bound::Le(limit) => value <= limit + BALANCE_TOLERANCE,
        };
        return if holds {
            Ok(None)
        } else {
            Err(OptimizeError::Infeasible(format!(
                "{} violated by fixed decisions (residual {:.6})",
                what(),
                value
            )))
        };
    }
    let expr = affine.into_expression();
    Ok(Some(match bound {
        Bound::Eq => constraint::eq(expr, 0.0),
        Bound::Le(limit) => constraint::leq(expr, limit),
    }))
}

fn collect_primal(model: &Model) -> Vec<Variable> {
    [
        &model.gen_p,
        &model.store,
        &model.dispatch,
        &model.soc,
        &model.link_p,
        &model.theta,
    ]
    .into_iter()
    .flatten()
    .flatten()
    .filter_map(|d| match d {
        Decision::Free(v) => Some(*v),
        Decision::Fixed(_) => None,
    })
    .collect()
}

fn extract(
    network: &Network,
    model: &Model,
    weightings: &[f64],
    lookup: &impl Fn(Variable) -> f64,
    prices: Vec<Vec<f64>>,
) -> Dispatch {
    let n_t = network.snapshot_count();
    let series = |row: &[Decision]| -> Vec<f64> { row.iter().map(|d| d.value(lookup)).collect() };

    let mut dispatch = Dispatch::default();
    let mut objective = 0.0;

    for (g, generator) in network.generators.iter().enumerate() {
        let p = series(&model.gen_p[g]);
        objective += weighted(&p, weightings) * generator.marginal_cost;
        dispatch.generators_p.insert(generator.name.clone(), p);
    }
    for load in &network.loads {
        dispatch
            .loads_p
            .insert(load.name.clone(), load.p_set.to_dense(n_t));
    }
    for (s, storage) in network.storage_units.iter().enumerate() {
        let discharge = series(&model.dispatch[s]);
        let charge = series(&model.store[s]);
        objective += weighted(&discharge, weightings) * storage.marginal_cost;
        let net = discharge.iter().zip(&charge).map(|(d, c)| d - c).collect();
        dispatch.storage_units_p.insert(storage.name.clone(), net);
        dispatch
            .storage_units_state_of_charge
            .insert(storage.name.clone(), series(&model.soc[s]));
    }
    for (l, link) in network.links.iter().enumerate() {
        let p0 = series(&model.link_p[l]);
        objective += weighted(&p0, weightings) * link.marginal_cost;
        dispatch.links_p0.insert(link.name.clone(), p0);
    }

    let bus_index: HashMap<&str, usize> = network
        .buses
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();
    let theta: Vec<Vec<f64>> = model.theta.iter().map(|row| series(row)).collect();
    for line in &network.lines {
        let i = bus_index[line.bus0.as_str()];
        let j = bus_index[line.bus1.as_str()];
        let p0 = (0..n_t)
            .map(|t| (theta[i][t] - theta[j][t]) / line.x)
            .collect();
        dispatch.lines_p0.insert(line.name.clone(), p0);
    }

    let mut marginal_price = SeriesTable::new();
    for (bus, row) in network.buses.iter().zip(prices) {
        marginal_price.insert(bus.name.clone(), row);
    }
    dispatch.buses_marginal_price = marginal_price;
    dispatch.objective = objective;
    dispatch
}

fn weighted(series: &[f64], weightings: &[f64]) -> f64 {
    series.iter().zip(weightings).map(|(v, w)| v * w).sum()
}
