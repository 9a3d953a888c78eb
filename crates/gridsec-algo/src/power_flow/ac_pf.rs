//! # AC power flow with the Newton-Raphson method
//!
//! Solves the polar power balance equations of every synchronous island that
//! has at least one connected generator:
//!
//! ```text
//! P_i = Σ V_i V_j (G_ij cos θ_ij + B_ij sin θ_ij)
//! Q_i = Σ V_i V_j (G_ij sin θ_ij - B_ij cos θ_ij)
//! ```
//!
//! ## Bus classification
//!
//! ```text
//! ┌───────────┬─────────────────┬─────────────────┐
//! │ BUS TYPE  │ SPECIFIED       │ CALCULATED      │
//! ├───────────┼─────────────────┼─────────────────┤
//! │ SLACK     │ V, θ (θ = 0)    │ P, Q            │
//! │ PV        │ P, |V|          │ Q, θ            │
//! │ PQ        │ P, Q            │ |V|, θ          │
//! └───────────┴─────────────────┴─────────────────┘
//! ```
//!
//! The slack of an island is the bus of its generator with the largest target
//! active power. Other buses with a voltage-regulating generator are PV, at the
//! generator's target voltage (1.0 pu when none is given). Islands without
//! generation keep NaN voltages.
//!
//! ## Model
//!
//! Impedances are per-unit on `base_mva` and the nominal voltage of each bus.
//! Branches are pi models with the tap `t = ratio·e^(jφ)` on side one:
//!
//! ```text
//! Y11 = ys/|t|² + jb/2    Y12 = -ys/t*
//! Y21 = -ys/t             Y22 = ys + jb/2
//! ```
//!
//! Three-winding transformers get an internal star bus joined to each closed
//! leg. HVDC lines are fixed active power injections at both ends.

use super::{
    ComponentResult, LoadFlowParameters, LoadFlowProvider, LoadFlowResult, LoadFlowStatus,
    VoltageInitMode,
};
use gridsec_core::solver::DenseMatrix;
use gridsec_core::{GridSecError, GridSecResult, LinearSystemBackend, Network, VariantState};
use num_complex::Complex64;
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;
use tracing::debug;

/// Stand-in for zero-impedance branches (pu)
const MIN_REACTANCE_PU: f64 = 1e-5;

/// Bus type classification for power flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// V and θ fixed, P and Q calculated
    Slack,
    /// P and V specified, Q and θ calculated
    PV,
    /// P and Q specified, V and θ calculated
    PQ,
}

/// Full AC Newton-Raphson power flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonRaphsonLoadFlow;

impl NewtonRaphsonLoadFlow {
    pub fn new() -> Self {
        Self
    }
}

impl LoadFlowProvider for NewtonRaphsonLoadFlow {
    fn name(&self) -> &str {
        "newton-raphson"
    }

    fn run(
        &self,
        network: &Network,
        state: &mut VariantState,
        parameters: &LoadFlowParameters,
    ) -> GridSecResult<LoadFlowResult> {
        parameters.validate()?;
        check_state_shape(network, state)?;

        let model = AcModel::build(network, state, parameters.base_mva);
        let (mut v_mag, mut v_ang) = model.initial_voltages(state, parameters.voltage_init_mode);
        let solver = parameters.linear_solver.build_solver();
        let mut solved = vec![false; model.bus_count()];
        let mut components = Vec::new();

        for (position, island) in model.islands().into_iter().enumerate() {
            let Some(setup) = model.setup_island(&island) else {
                debug!(island = position, buses = island.len(), "island without generation left unsolved");
                continue;
            };

            let mut mag: Vec<f64> = island.iter().map(|&bus| v_mag[bus]).collect();
            let mut ang: Vec<f64> = island.iter().map(|&bus| v_ang[bus]).collect();
            for (local, v_set) in setup.v_set.iter().enumerate() {
                if let Some(v) = v_set {
                    mag[local] = *v;
                }
            }

            let y_bus = model.island_admittance(&island, &setup.local);
            let p_spec: Vec<f64> = island
                .iter()
                .map(|&bus| model.p_spec_mw[bus] / model.base_mva)
                .collect();
            let q_spec: Vec<f64> = island
                .iter()
                .map(|&bus| model.q_spec_mvar[bus] / model.base_mva)
                .collect();

            let outcome = newton_raphson(
                &y_bus,
                &setup.bus_type,
                &p_spec,
                &q_spec,
                &mut mag,
                &mut ang,
                parameters,
                solver.as_ref(),
            );
            debug!(
                island = position,
                buses = island.len(),
                status = ?outcome.status,
                iterations = outcome.iterations,
                max_mismatch = outcome.max_mismatch,
                "island solved"
            );

            if outcome.status == LoadFlowStatus::Converged {
                for (local, &bus) in island.iter().enumerate() {
                    v_mag[bus] = mag[local];
                    v_ang[bus] = ang[local];
                    solved[bus] = true;
                }
                let (p_calc, q_calc) = compute_power(&y_bus, &mag, &ang);
                model.dispatch_generators(state, &island, &setup, &p_calc, &q_calc);
            }

            components.push(ComponentResult {
                synchronous_component: position,
                bus_count: island.iter().filter(|&&bus| bus < model.network_buses).count(),
                slack_bus_id: network
                    .graph()
                    .node_weight(NodeIndex::new(setup.slack))
                    .map(|bus| bus.id.clone()),
                status: outcome.status,
                iterations: outcome.iterations,
                max_mismatch: outcome.max_mismatch,
            });
        }

        state.clear_solution();
        model.write_solution(network, state, &v_mag, &v_ang, &solved);

        Ok(match components.first() {
            Some(main) => LoadFlowResult {
                status: main.status,
                iterations: main.iterations,
                max_mismatch: main.max_mismatch,
                components,
            },
            None => LoadFlowResult::failed(),
        })
    }
}

fn check_state_shape(network: &Network, state: &VariantState) -> GridSecResult<()> {
    let matches = state.buses.len() == network.bus_count()
        && state.branches.len() == network.graph().edge_count()
        && state.three_windings.len() == network.three_windings_transformers().len()
        && state.generators.len() == network.generators().len()
        && state.loads.len() == network.loads().len();
    if matches {
        Ok(())
    } else {
        Err(GridSecError::Variant(format!(
            "state does not belong to network '{}'",
            network.id()
        )))
    }
}

/// Where the flows of an admittance branch are reported.
#[derive(Debug, Clone, Copy)]
enum FlowTarget {
    Branch(usize),
    Leg { transformer: usize, leg: usize },
}

#[derive(Debug, Clone)]
struct AcBranch {
    from: usize,
    to: usize,
    y: [Complex64; 4],
    target: FlowTarget,
}

#[derive(Debug, Clone)]
struct GeneratorSlot {
    index: usize,
    bus: usize,
    target_p: f64,
    regulating: bool,
    /// Voltage setpoint (pu)
    v_set: Option<f64>,
}

struct IslandSetup {
    local: HashMap<usize, usize>,
    bus_type: Vec<BusType>,
    v_set: Vec<Option<f64>>,
    slack: usize,
    slack_generator: usize,
}

/// Network buses first, then one star bus per energized three-winding transformer.
struct AcModel {
    network_buses: usize,
    base_kv: Vec<f64>,
    stars: Vec<Option<usize>>,
    branches: Vec<AcBranch>,
    p_spec_mw: Vec<f64>,
    q_spec_mvar: Vec<f64>,
    generators: Vec<GeneratorSlot>,
    base_mva: f64,
}

fn two_port(resistance: f64, reactance: f64, charging_b: f64, tap: Complex64) -> [Complex64; 4] {
    let mut z = Complex64::new(resistance, reactance);
    if z.norm_sqr() < 1e-12 {
        z = Complex64::new(0.0, MIN_REACTANCE_PU);
    }
    let y_series = z.inv();
    let shunt = Complex64::new(0.0, charging_b / 2.0);
    [
        y_series / tap.norm_sqr() + shunt,
        -(y_series / tap.conj()),
        -(y_series / tap),
        y_series + shunt,
    ]
}

impl AcModel {
    fn build(network: &Network, state: &VariantState, base_mva: f64) -> Self {
        let network_buses = network.bus_count();
        let mut base_kv: Vec<f64> = (0..network_buses)
            .map(|i| {
                network
                    .bus_voltage_level(NodeIndex::new(i))
                    .map(|vl| vl.nominal_v.value())
                    .unwrap_or(1.0)
            })
            .collect();

        let mut stars = Vec::with_capacity(network.three_windings_transformers().len());
        for legs in &state.three_windings {
            if legs.legs.iter().any(|leg| leg.connected) {
                stars.push(Some(base_kv.len()));
                base_kv.push(1.0);
            } else {
                stars.push(None);
            }
        }

        let mut branches = Vec::new();
        for (edge, branch) in network.branches() {
            if !state.branches[edge.index()].is_connected() {
                continue;
            }
            let Some((a, b)) = network.edge_buses(edge) else {
                continue;
            };
            let tap = Complex64::from_polar(branch.tap_ratio, branch.phase_shift.to_radians());
            branches.push(AcBranch {
                from: a.index(),
                to: b.index(),
                y: two_port(branch.resistance, branch.reactance, branch.charging_b, tap),
                target: FlowTarget::Branch(edge.index()),
            });
        }
        for (t, transformer) in network.three_windings_transformers().iter().enumerate() {
            let Some(star) = stars[t] else {
                continue;
            };
            for (leg_index, leg) in transformer.legs.iter().enumerate() {
                if !state.three_windings[t].legs[leg_index].connected {
                    continue;
                }
                let Some(bus) = network.bus_index(&leg.bus) else {
                    continue;
                };
                branches.push(AcBranch {
                    from: bus.index(),
                    to: star,
                    y: two_port(leg.resistance, leg.reactance, 0.0, Complex64::new(leg.ratio, 0.0)),
                    target: FlowTarget::Leg {
                        transformer: t,
                        leg: leg_index,
                    },
                });
            }
        }

        let n = base_kv.len();
        let mut p_spec_mw = vec![0.0; n];
        let mut q_spec_mvar = vec![0.0; n];
        let mut generators = Vec::new();
        for (i, generator) in network.generators().iter().enumerate() {
            let injection = state.generators[i];
            let Some(bus) = network.bus_index(&generator.bus) else {
                continue;
            };
            if !injection.connected {
                continue;
            }
            let bus = bus.index();
            p_spec_mw[bus] += injection.p;
            q_spec_mvar[bus] += injection.q;
            generators.push(GeneratorSlot {
                index: i,
                bus,
                target_p: generator.target_p.value(),
                regulating: generator.voltage_regulator_on,
                v_set: generator.target_v.map(|v| v.value() / base_kv[bus]),
            });
        }
        for (i, load) in network.loads().iter().enumerate() {
            let injection = state.loads[i];
            if let (true, Some(bus)) = (injection.connected, network.bus_index(&load.bus)) {
                p_spec_mw[bus.index()] -= injection.p;
                q_spec_mvar[bus.index()] -= injection.q;
            }
        }
        for (edge, line) in network.hvdc_lines() {
            if !state.branches[edge.index()].is_connected() {
                continue;
            }
            if let Some((a, b)) = network.edge_buses(edge) {
                p_spec_mw[a.index()] -= line.active_power_setpoint.value();
                p_spec_mw[b.index()] += line.active_power_setpoint.value();
            }
        }

        Self {
            network_buses,
            base_kv,
            stars,
            branches,
            p_spec_mw,
            q_spec_mvar,
            generators,
            base_mva,
        }
    }

    fn bus_count(&self) -> usize {
        self.base_kv.len()
    }

    fn initial_voltages(&self, state: &VariantState, mode: VoltageInitMode) -> (Vec<f64>, Vec<f64>) {
        let n = self.bus_count();
        let mut v_mag = vec![1.0; n];
        let mut v_ang = vec![0.0; n];
        if mode == VoltageInitMode::PreviousValues {
            for (i, bus) in state.buses.iter().enumerate() {
                if bus.is_solved() && self.base_kv[i] > 0.0 {
                    v_mag[i] = bus.v / self.base_kv[i];
                    v_ang[i] = bus.angle.to_radians();
                }
            }
            for (t, star) in self.stars.iter().enumerate() {
                let (Some(star), Some(legs)) = (star, state.three_windings.get(t)) else {
                    continue;
                };
                if legs.star_v.is_finite() && legs.star_angle.is_finite() {
                    v_mag[*star] = legs.star_v;
                    v_ang[*star] = legs.star_angle;
                }
            }
        }
        (v_mag, v_ang)
    }

    /// Synchronous islands of the admittance graph, largest first.
    fn islands(&self) -> Vec<Vec<usize>> {
        let mut sets = UnionFind::<usize>::new(self.bus_count());
        for branch in &self.branches {
            sets.union(branch.from, branch.to);
        }
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (bus, label) in sets.into_labeling().into_iter().enumerate() {
            groups.entry(label).or_default().push(bus);
        }
        let mut islands: Vec<Vec<usize>> = groups.into_values().collect();
        islands.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        islands
    }

    fn setup_island(&self, island: &[usize]) -> Option<IslandSetup> {
        let local: HashMap<usize, usize> = island
            .iter()
            .enumerate()
            .map(|(position, &bus)| (bus, position))
            .collect();
        let in_island: Vec<&GeneratorSlot> = self
            .generators
            .iter()
            .filter(|g| local.contains_key(&g.bus))
            .collect();
        let slack = in_island
            .iter()
            .max_by(|a, b| {
                a.target_p
                    .total_cmp(&b.target_p)
                    .then(b.index.cmp(&a.index))
            })
            .copied()?;

        let mut bus_type = vec![BusType::PQ; island.len()];
        let mut v_set = vec![None; island.len()];
        for generator in in_island.iter().filter(|g| g.regulating) {
            let position = local[&generator.bus];
            bus_type[position] = BusType::PV;
            if v_set[position].is_none() {
                v_set[position] = Some(generator.v_set.unwrap_or(1.0));
            }
        }
        let slack_position = local[&slack.bus];
        bus_type[slack_position] = BusType::Slack;
        if slack.regulating {
            if let Some(v) = slack.v_set {
                v_set[slack_position] = Some(v);
            }
        }
        if v_set[slack_position].is_none() {
            v_set[slack_position] = Some(1.0);
        }

        Some(IslandSetup {
            local,
            bus_type,
            v_set,
            slack: slack.bus,
            slack_generator: slack.index,
        })
    }

    /// Dense admittance matrix of one island as `(G, B)` pairs.
    fn island_admittance(
        &self,
        island: &[usize],
        local: &HashMap<usize, usize>,
    ) -> Vec<Vec<(f64, f64)>> {
        let m = island.len();
        let mut y_bus = vec![vec![(0.0, 0.0); m]; m];
        let mut add = |i: usize, j: usize, y: Complex64| {
            y_bus[i][j].0 += y.re;
            y_bus[i][j].1 += y.im;
        };
        for branch in &self.branches {
            let (Some(&i), Some(&j)) = (local.get(&branch.from), local.get(&branch.to)) else {
                continue;
            };
            add(i, i, branch.y[0]);
            add(i, j, branch.y[1]);
            add(j, i, branch.y[2]);
            add(j, j, branch.y[3]);
        }
        y_bus
    }

    /// The slack generator takes the active power balance; the first regulating
    /// generator of every PV or slack bus takes its reactive balance.
    fn dispatch_generators(
        &self,
        state: &mut VariantState,
        island: &[usize],
        setup: &IslandSetup,
        p_calc: &[f64],
        q_calc: &[f64],
    ) {
        let slack_position = setup.local[&setup.slack];
        let p_missing = p_calc[slack_position] * self.base_mva - self.p_spec_mw[setup.slack];
        if let Some(generator) = state.generators.get_mut(setup.slack_generator) {
            generator.p += p_missing;
        }

        for (position, &bus) in island.iter().enumerate() {
            if setup.bus_type[position] == BusType::PQ {
                continue;
            }
            let regulating = self
                .generators
                .iter()
                .find(|g| g.bus == bus && (g.regulating || g.index == setup.slack_generator));
            if let Some(slot) = regulating {
                let q_missing = q_calc[position] * self.base_mva - self.q_spec_mvar[bus];
                if let Some(generator) = state.generators.get_mut(slot.index) {
                    generator.q += q_missing;
                }
            }
        }
    }

    fn current_amperes(&self, current_pu: Complex64, bus: usize) -> f64 {
        current_pu.norm() * self.base_mva * 1000.0 / (3f64.sqrt() * self.base_kv[bus])
    }

    fn write_solution(
        &self,
        network: &Network,
        state: &mut VariantState,
        v_mag: &[f64],
        v_ang: &[f64],
        solved: &[bool],
    ) {
        for (i, bus) in state.buses.iter_mut().enumerate() {
            if solved[i] {
                bus.v = v_mag[i] * self.base_kv[i];
                bus.angle = v_ang[i].to_degrees();
            }
        }
        for (t, star) in self.stars.iter().enumerate() {
            if let Some(star) = star.filter(|&s| solved[s]) {
                state.three_windings[t].star_v = v_mag[star];
                state.three_windings[t].star_angle = v_ang[star];
            }
        }

        let phasor = |bus: usize| Complex64::from_polar(v_mag[bus], v_ang[bus]);
        for branch in &self.branches {
            if !(solved[branch.from] && solved[branch.to]) {
                continue;
            }
            let v1 = phasor(branch.from);
            let v2 = phasor(branch.to);
            let i1 = branch.y[0] * v1 + branch.y[1] * v2;
            let i2 = branch.y[2] * v1 + branch.y[3] * v2;
            let s1 = v1 * i1.conj() * self.base_mva;
            let s2 = v2 * i2.conj() * self.base_mva;
            match branch.target {
                FlowTarget::Branch(edge) => {
                    let terminals = &mut state.branches[edge];
                    terminals.terminal1.p = s1.re;
                    terminals.terminal1.q = s1.im;
                    terminals.terminal1.i = self.current_amperes(i1, branch.from);
                    terminals.terminal2.p = s2.re;
                    terminals.terminal2.q = s2.im;
                    terminals.terminal2.i = self.current_amperes(i2, branch.to);
                }
                FlowTarget::Leg { transformer, leg } => {
                    let terminal = &mut state.three_windings[transformer].legs[leg];
                    terminal.p = s1.re;
                    terminal.q = s1.im;
                    terminal.i = self.current_amperes(i1, branch.from);
                }
            }
        }

        // open at one end: no flow through the closed end
        for (edge, _) in network.branches() {
            let Some((a, b)) = network.edge_buses(edge) else {
                continue;
            };
            let terminals = &mut state.branches[edge.index()];
            for (terminal, bus) in [
                (&mut terminals.terminal1, a.index()),
                (&mut terminals.terminal2, b.index()),
            ] {
                if terminal.connected && terminal.p.is_nan() && solved[bus] {
                    terminal.p = 0.0;
                    terminal.q = 0.0;
                    terminal.i = 0.0;
                }
            }
        }

        for (edge, line) in network.hvdc_lines() {
            let Some((a, b)) = network.edge_buses(edge) else {
                continue;
            };
            let terminals = &mut state.branches[edge.index()];
            if !terminals.is_connected() {
                continue;
            }
            let setpoint = line.active_power_setpoint.value();
            for (terminal, bus, p) in [
                (&mut terminals.terminal1, a.index(), setpoint),
                (&mut terminals.terminal2, b.index(), -setpoint),
            ] {
                if solved[bus] {
                    terminal.p = p;
                    terminal.q = 0.0;
                    terminal.i = p.abs() * 1000.0 / (3f64.sqrt() * v_mag[bus] * self.base_kv[bus]);
                }
            }
        }
    }
}

struct NrOutcome {
    status: LoadFlowStatus,
    iterations: usize,
    max_mismatch: f64,
}

#[allow(clippy::too_many_arguments)]
fn newton_raphson(
    y_bus: &[Vec<(f64, f64)>],
    bus_type: &[BusType],
    p_spec: &[f64],
    q_spec: &[f64],
    v_mag: &mut [f64],
    v_ang: &mut [f64],
    parameters: &LoadFlowParameters,
    solver: &dyn LinearSystemBackend,
) -> NrOutcome {
    // non-slack buses for P equations, PQ buses for Q equations
    let p_buses: Vec<usize> = (0..bus_type.len())
        .filter(|&i| bus_type[i] != BusType::Slack)
        .collect();
    let q_buses: Vec<usize> = (0..bus_type.len())
        .filter(|&i| bus_type[i] == BusType::PQ)
        .collect();
    let n_p = p_buses.len();
    let n_vars = n_p + q_buses.len();

    let mismatch_of = |p_calc: &[f64], q_calc: &[f64]| -> Vec<f64> {
        p_buses
            .iter()
            .map(|&i| p_spec[i] - p_calc[i])
            .chain(q_buses.iter().map(|&i| q_spec[i] - q_calc[i]))
            .collect()
    };
    let largest = |mismatch: &[f64]| mismatch.iter().fold(0.0f64, |acc, m| acc.max(m.abs()));

    if n_vars == 0 {
        return NrOutcome {
            status: LoadFlowStatus::Converged,
            iterations: 0,
            max_mismatch: 0.0,
        };
    }

    for iteration in 0..parameters.max_iterations {
        let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);
        let mismatch = mismatch_of(&p_calc, &q_calc);
        let max_mismatch = largest(&mismatch);

        if !max_mismatch.is_finite() || mismatch.iter().any(|m| m.is_nan()) {
            return NrOutcome {
                status: LoadFlowStatus::Failed,
                iterations: iteration,
                max_mismatch: f64::INFINITY,
            };
        }
        if max_mismatch < parameters.tolerance {
            return NrOutcome {
                status: LoadFlowStatus::Converged,
                iterations: iteration,
                max_mismatch,
            };
        }

        let jacobian = build_jacobian(y_bus, v_mag, v_ang, &p_calc, &q_calc, &p_buses, &q_buses);
        let delta = match solver.solve(&jacobian, &mismatch) {
            Ok(delta) => delta,
            Err(err) => {
                debug!(iteration, "newton-raphson step failed: {err:#}");
                return NrOutcome {
                    status: LoadFlowStatus::Failed,
                    iterations: iteration,
                    max_mismatch,
                };
            }
        };

        for (k, &i) in p_buses.iter().enumerate() {
            v_ang[i] += delta[k];
        }
        for (k, &i) in q_buses.iter().enumerate() {
            v_mag[i] += delta[n_p + k];
        }
    }

    let (p_calc, q_calc) = compute_power(y_bus, v_mag, v_ang);
    let max_mismatch = largest(&mismatch_of(&p_calc, &q_calc));
    let status = if max_mismatch < parameters.tolerance {
        LoadFlowStatus::Converged
    } else if max_mismatch.is_finite() {
        LoadFlowStatus::MaxIterationReached
    } else {
        LoadFlowStatus::Failed
    };
    NrOutcome {
        status,
        iterations: parameters.max_iterations,
        max_mismatch,
    }
}

/// P and Q injections (pu) from the current voltage state
fn compute_power(y_bus: &[Vec<(f64, f64)>], v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];

    for i in 0..n {
        for j in 0..n {
            let (g_ij, b_ij) = y_bus[i][j];
            if g_ij == 0.0 && b_ij == 0.0 {
                continue;
            }
            let theta_ij = v_ang[i] - v_ang[j];
            let (sin_theta, cos_theta) = theta_ij.sin_cos();
            p[i] += v_mag[i] * v_mag[j] * (g_ij * cos_theta + b_ij * sin_theta);
            q[i] += v_mag[i] * v_mag[j] * (g_ij * sin_theta - b_ij * cos_theta);
        }
    }

    (p, q)
}

/// Jacobian `[[∂P/∂θ, ∂P/∂V], [∂Q/∂θ, ∂Q/∂V]]` restricted to the unknowns.
fn build_jacobian(
    y_bus: &[Vec<(f64, f64)>],
    v_mag: &[f64],
    v_ang: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> DenseMatrix {
    let n_p = p_buses.len();
    let mut jacobian = DenseMatrix::zeros(n_p + q_buses.len());

    let terms = |i: usize, j: usize| {
        let (g_ij, b_ij) = y_bus[i][j];
        let (sin_theta, cos_theta) = (v_ang[i] - v_ang[j]).sin_cos();
        (
            g_ij * cos_theta + b_ij * sin_theta,
            g_ij * sin_theta - b_ij * cos_theta,
        )
    };

    // J11: ∂P/∂θ
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[(row, col)] = if i == j {
                -q_calc[i] - y_bus[i][i].1 * v_mag[i] * v_mag[i]
            } else {
                v_mag[i] * v_mag[j] * terms(i, j).1
            };
        }
    }

    // J12: ∂P/∂V
    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[(row, n_p + col)] = if i == j {
                p_calc[i] / v_mag[i] + y_bus[i][i].0 * v_mag[i]
            } else {
                v_mag[i] * terms(i, j).0
            };
        }
    }

    // J21: ∂Q/∂θ
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jacobian[(n_p + row, col)] = if i == j {
                p_calc[i] - y_bus[i][i].0 * v_mag[i] * v_mag[i]
            } else {
                -v_mag[i] * v_mag[j] * terms(i, j).0
            };
        }
    }

    // J22: ∂Q/∂V
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in q_buses.iter().enumerate() {
            jacobian[(n_p + row, n_p + col)] = if i == j {
                q_calc[i] / v_mag[i] - y_bus[i][i].1 * v_mag[i]
            } else {
                v_mag[i] * terms(i, j).1
            };
        }
    }

    jacobian
}
