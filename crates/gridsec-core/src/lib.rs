//! # gridsec-core: network model for security analysis
//!
//! Provides the static network topology, its limits, and the variant manager
//! that holds independently mutable network states.
//!
//! ## Design
//!
//! The topology is an **undirected multigraph**:
//! - **Nodes**: buses
//! - **Edges**: AC branches (lines, two-winding transformers) and HVDC lines
//!
//! Three-winding transformers, generators and loads reference buses by id and
//! live beside the graph. The topology never changes after [`NetworkBuilder::build`];
//! everything that a contingency or a power flow changes (connection status,
//! flows, voltages) lives in a [`VariantState`] owned by the network's
//! [`VariantManager`]. Evaluating a contingency therefore means cloning a
//! variant, mutating the clone, and dropping it.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridsec_core::*;
//!
//! let network = NetworkBuilder::new("two-bus")
//!     .with_substation(Substation::new("S1").with_country(Country::new("FR")))
//!     .with_voltage_level(VoltageLevel::new("VL1", Kilovolts(400.0)).with_substation("S1"))
//!     .with_bus(Bus::new("B1", "VL1"))
//!     .with_bus(Bus::new("B2", "VL1"))
//!     .with_branch(
//!         Branch::new("L1", "B1", "B2", 0.001, 0.01)
//!             .with_current_limits(TwoSides::One, CurrentLimits::new(Amperes(1000.0))),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(network.buses().count(), 2);
//! assert_eq!(network.variant_manager().working_variant_id().unwrap(), INITIAL_VARIANT_ID);
//! ```
//!
//! ## Modules
//!
//! - [`graph_utils`] - connected and synchronous components of a variant
//! - [`locatable`] - voltage level lookup for any identifiable element
//! - [`solver`] - dense linear-system backends used by the power flow
//! - [`variant`] - variant storage and working-variant selection
//! - [`view`] - read access to one network state

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::{Graph, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

mod builder;
pub mod error;
pub mod graph_utils;
pub mod locatable;
pub mod solver;
pub mod units;
pub mod variant;
pub mod view;

pub use builder::NetworkBuilder;
pub use error::{GridSecError, GridSecResult};
pub use graph_utils::Components;
pub use locatable::Locatable;
pub use solver::{LinearSystemBackend, SolverKind};
pub use units::{Amperes, Degrees, Kilovolts, Megavars, Megawatts};
pub use variant::{
    BranchState, BusState, InjectionState, ScopedVariant, TerminalState, ThreeWindingsState,
    VariantManager, VariantState, INITIAL_VARIANT_ID,
};
pub use view::NetworkView;

/// Terminal side of a two-terminal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TwoSides {
    One,
    Two,
}

impl TwoSides {
    pub const ALL: [TwoSides; 2] = [TwoSides::One, TwoSides::Two];

    pub fn index(self) -> usize {
        match self {
            TwoSides::One => 0,
            TwoSides::Two => 1,
        }
    }
}

/// Terminal side of a two- or three-terminal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreeSides {
    One,
    Two,
    Three,
}

impl ThreeSides {
    pub const ALL: [ThreeSides; 3] = [ThreeSides::One, ThreeSides::Two, ThreeSides::Three];

    pub fn index(self) -> usize {
        match self {
            ThreeSides::One => 0,
            ThreeSides::Two => 1,
            ThreeSides::Three => 2,
        }
    }

    pub fn to_two_sides(self) -> Option<TwoSides> {
        match self {
            ThreeSides::One => Some(TwoSides::One),
            ThreeSides::Two => Some(TwoSides::Two),
            ThreeSides::Three => None,
        }
    }
}

impl From<TwoSides> for ThreeSides {
    fn from(side: TwoSides) -> Self {
        match side {
            TwoSides::One => ThreeSides::One,
            TwoSides::Two => ThreeSides::Two,
        }
    }
}

impl fmt::Display for ThreeSides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ThreeSides::One => "ONE",
            ThreeSides::Two => "TWO",
            ThreeSides::Three => "THREE",
        };
        f.write_str(label)
    }
}

/// ISO 3166 country code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Country(String);

impl Country {
    pub fn new(code: impl AsRef<str>) -> Self {
        Country(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_true() -> bool {
    true
}

fn default_ratio() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<Country>,
}

impl Substation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            country: None,
        }
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.country = Some(country);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageLevel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub substation_id: Option<String>,
    /// Nominal (base) voltage
    pub nominal_v: Kilovolts,
    #[serde(default)]
    pub low_voltage_limit: Option<Kilovolts>,
    #[serde(default)]
    pub high_voltage_limit: Option<Kilovolts>,
}

impl VoltageLevel {
    pub fn new(id: impl Into<String>, nominal_v: Kilovolts) -> Self {
        Self {
            id: id.into(),
            name: None,
            substation_id: None,
            nominal_v,
            low_voltage_limit: None,
            high_voltage_limit: None,
        }
    }

    pub fn with_substation(mut self, substation_id: impl Into<String>) -> Self {
        self.substation_id = Some(substation_id.into());
        self
    }

    pub fn with_voltage_limits(mut self, low: Option<Kilovolts>, high: Option<Kilovolts>) -> Self {
        self.low_voltage_limit = low;
        self.high_voltage_limit = high;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub voltage_level_id: String,
}

impl Bus {
    pub fn new(id: impl Into<String>, voltage_level_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            voltage_level_id: voltage_level_id.into(),
        }
    }
}

/// Temporary admissible transmission limit (TATL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryLimit {
    pub name: String,
    /// Seconds the current may stay above this limit's predecessor
    pub acceptable_duration: u32,
    pub value: Amperes,
}

/// Permanent limit plus the temporary tiers above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLimits {
    pub permanent_limit: Amperes,
    #[serde(default)]
    pub temporary_limits: Vec<TemporaryLimit>,
}

impl CurrentLimits {
    pub fn new(permanent_limit: Amperes) -> Self {
        Self {
            permanent_limit,
            temporary_limits: Vec::new(),
        }
    }

    pub fn with_temporary_limit(
        mut self,
        name: impl Into<String>,
        acceptable_duration: u32,
        value: Amperes,
    ) -> Self {
        self.temporary_limits.push(TemporaryLimit {
            name: name.into(),
            acceptable_duration,
            value,
        });
        self
    }

    pub(crate) fn validate(&self, owner: &str) -> GridSecResult<()> {
        if !self.permanent_limit.is_finite() || self.permanent_limit.value() <= 0.0 {
            return Err(GridSecError::Config(format!(
                "'{owner}': permanent current limit must be a positive number, got {}",
                self.permanent_limit.value()
            )));
        }
        let mut durations = Vec::with_capacity(self.temporary_limits.len());
        for limit in &self.temporary_limits {
            if !limit.value.is_finite() || limit.value.value() <= 0.0 {
                return Err(GridSecError::Config(format!(
                    "'{owner}': temporary limit '{}' must be a positive number",
                    limit.name
                )));
            }
            if durations.contains(&limit.acceptable_duration) {
                return Err(GridSecError::Config(format!(
                    "'{owner}': two temporary limits share acceptable duration {}",
                    limit.acceptable_duration
                )));
            }
            durations.push(limit.acceptable_duration);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    #[default]
    Line,
    TwoWindingsTransformer,
}

/// AC branch between two buses (line or two-winding transformer).
///
/// Impedances are per-unit on the power flow MVA base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: BranchKind,
    pub bus1: String,
    pub bus2: String,
    pub resistance: f64,
    pub reactance: f64,
    /// Total charging susceptance, split half/half between the ends
    #[serde(default)]
    pub charging_b: f64,
    /// Off-nominal tap magnitude applied on side one
    #[serde(default = "default_ratio")]
    pub tap_ratio: f64,
    #[serde(default)]
    pub phase_shift: Degrees,
    #[serde(default)]
    pub current_limits1: Option<CurrentLimits>,
    #[serde(default)]
    pub current_limits2: Option<CurrentLimits>,
    /// Initial connection status of both terminals
    #[serde(default = "default_true")]
    pub connected: bool,
}

impl Branch {
    pub fn new(
        id: impl Into<String>,
        bus1: impl Into<String>,
        bus2: impl Into<String>,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: BranchKind::Line,
            bus1: bus1.into(),
            bus2: bus2.into(),
            resistance,
            reactance,
            charging_b: 0.0,
            tap_ratio: 1.0,
            phase_shift: Degrees(0.0),
            current_limits1: None,
            current_limits2: None,
            connected: true,
        }
    }

    pub fn with_current_limits(mut self, side: TwoSides, limits: CurrentLimits) -> Self {
        match side {
            TwoSides::One => self.current_limits1 = Some(limits),
            TwoSides::Two => self.current_limits2 = Some(limits),
        }
        self
    }

    pub fn with_charging(mut self, charging_b: f64) -> Self {
        self.charging_b = charging_b;
        self
    }

    pub fn as_transformer(mut self, tap_ratio: f64, phase_shift: Degrees) -> Self {
        self.kind = BranchKind::TwoWindingsTransformer;
        self.tap_ratio = tap_ratio;
        self.phase_shift = phase_shift;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn current_limits(&self, side: TwoSides) -> Option<&CurrentLimits> {
        match side {
            TwoSides::One => self.current_limits1.as_ref(),
            TwoSides::Two => self.current_limits2.as_ref(),
        }
    }

    pub fn bus_id(&self, side: TwoSides) -> &str {
        match side {
            TwoSides::One => &self.bus1,
            TwoSides::Two => &self.bus2,
        }
    }
}

/// Point-to-point HVDC link, modeled as a fixed active power transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HvdcLine {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub bus1: String,
    pub bus2: String,
    /// Transfer from side one to side two
    pub active_power_setpoint: Megawatts,
    #[serde(default = "default_true")]
    pub connected: bool,
}

impl HvdcLine {
    pub fn new(
        id: impl Into<String>,
        bus1: impl Into<String>,
        bus2: impl Into<String>,
        active_power_setpoint: Megawatts,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            bus1: bus1.into(),
            bus2: bus2.into(),
            active_power_setpoint,
            connected: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerLeg {
    pub bus: String,
    pub resistance: f64,
    pub reactance: f64,
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default)]
    pub current_limits: Option<CurrentLimits>,
}

impl TransformerLeg {
    pub fn new(bus: impl Into<String>, resistance: f64, reactance: f64) -> Self {
        Self {
            bus: bus.into(),
            resistance,
            reactance,
            ratio: 1.0,
            current_limits: None,
        }
    }

    pub fn with_current_limits(mut self, limits: CurrentLimits) -> Self {
        self.current_limits = Some(limits);
        self
    }
}

/// Three-winding transformer, modeled as a star of three legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeWindingsTransformer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub legs: [TransformerLeg; 3],
    #[serde(default = "default_true")]
    pub connected: bool,
}

impl ThreeWindingsTransformer {
    pub fn new(id: impl Into<String>, legs: [TransformerLeg; 3]) -> Self {
        Self {
            id: id.into(),
            name: None,
            legs,
            connected: true,
        }
    }

    pub fn leg(&self, side: ThreeSides) -> &TransformerLeg {
        &self.legs[side.index()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub bus: String,
    pub target_p: Megawatts,
    #[serde(default)]
    pub target_q: Megavars,
    /// Voltage setpoint when regulating
    #[serde(default)]
    pub target_v: Option<Kilovolts>,
    #[serde(default = "default_true")]
    pub voltage_regulator_on: bool,
    #[serde(default = "default_true")]
    pub connected: bool,
}

impl Generator {
    pub fn new(id: impl Into<String>, bus: impl Into<String>, target_p: Megawatts) -> Self {
        Self {
            id: id.into(),
            name: None,
            bus: bus.into(),
            target_p,
            target_q: Megavars(0.0),
            target_v: None,
            voltage_regulator_on: true,
            connected: true,
        }
    }

    pub fn with_target_v(mut self, target_v: Kilovolts) -> Self {
        self.target_v = Some(target_v);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub bus: String,
    pub p0: Megawatts,
    #[serde(default)]
    pub q0: Megavars,
    #[serde(default = "default_true")]
    pub connected: bool,
}

impl Load {
    pub fn new(id: impl Into<String>, bus: impl Into<String>, p0: Megawatts, q0: Megavars) -> Self {
        Self {
            id: id.into(),
            name: None,
            bus: bus.into(),
            p0,
            q0,
            connected: true,
        }
    }
}

/// Bounds on `angle(other_bus) - angle(reference_bus)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageAngleLimit {
    pub id: String,
    pub reference_bus: String,
    pub other_bus: String,
    #[serde(default)]
    pub low_limit: Option<Degrees>,
    #[serde(default)]
    pub high_limit: Option<Degrees>,
}

impl VoltageAngleLimit {
    pub fn new(
        id: impl Into<String>,
        reference_bus: impl Into<String>,
        other_bus: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            reference_bus: reference_bus.into(),
            other_bus: other_bus.into(),
            low_limit: None,
            high_limit: None,
        }
    }

    pub fn with_limits(mut self, low: Option<Degrees>, high: Option<Degrees>) -> Self {
        self.low_limit = low;
        self.high_limit = high;
        self
    }
}

/// Edge weights of the topology graph.
#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
    HvdcLine(HvdcLine),
}

impl Edge {
    pub fn id(&self) -> &str {
        match self {
            Edge::Branch(branch) => &branch.id,
            Edge::HvdcLine(line) => &line.id,
        }
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Edge::Branch(branch) => Some(branch),
            Edge::HvdcLine(_) => None,
        }
    }

    pub fn as_hvdc_line(&self) -> Option<&HvdcLine> {
        match self {
            Edge::HvdcLine(line) => Some(line),
            Edge::Branch(_) => None,
        }
    }
}

/// Where an identifier points inside the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef {
    Substation(usize),
    VoltageLevel(usize),
    Bus(NodeIndex),
    Branch(EdgeIndex),
    HvdcLine(EdgeIndex),
    ThreeWindingsTransformer(usize),
    Generator(usize),
    Load(usize),
    VoltageAngleLimit(usize),
}

/// Static network topology plus its variants.
#[derive(Debug)]
pub struct Network {
    id: String,
    source_format: String,
    case_date: Option<String>,
    graph: Graph<Bus, Edge, Undirected>,
    substations: Vec<Substation>,
    voltage_levels: Vec<VoltageLevel>,
    three_windings_transformers: Vec<ThreeWindingsTransformer>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    voltage_angle_limits: Vec<VoltageAngleLimit>,
    index: HashMap<String, ElementRef>,
    variants: VariantManager,
}

impl Network {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    pub fn case_date(&self) -> Option<&str> {
        self.case_date.as_deref()
    }

    pub fn graph(&self) -> &Graph<Bus, Edge, Undirected> {
        &self.graph
    }

    pub fn element(&self, id: &str) -> Option<ElementRef> {
        self.index.get(id).copied()
    }

    pub fn buses(&self) -> impl Iterator<Item = (NodeIndex, &Bus)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn bus_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bus_index(&self, id: &str) -> Option<NodeIndex> {
        match self.index.get(id) {
            Some(ElementRef::Bus(idx)) => Some(*idx),
            _ => None,
        }
    }

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.bus_index(id).map(|idx| &self.graph[idx])
    }

    pub fn branches(&self) -> impl Iterator<Item = (EdgeIndex, &Branch)> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |idx| self.graph[idx].as_branch().map(|branch| (idx, branch)))
    }

    pub fn branch(&self, id: &str) -> Option<(EdgeIndex, &Branch)> {
        match self.index.get(id) {
            Some(ElementRef::Branch(idx)) => self.graph[*idx].as_branch().map(|b| (*idx, b)),
            _ => None,
        }
    }

    pub fn hvdc_lines(&self) -> impl Iterator<Item = (EdgeIndex, &HvdcLine)> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |idx| self.graph[idx].as_hvdc_line().map(|line| (idx, line)))
    }

    /// Bus endpoints of a branch or HVDC line, side one first.
    pub fn edge_buses(&self, edge: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(edge)
    }

    pub fn substation(&self, id: &str) -> Option<&Substation> {
        match self.index.get(id) {
            Some(ElementRef::Substation(i)) => self.substations.get(*i),
            _ => None,
        }
    }

    pub fn voltage_levels(&self) -> &[VoltageLevel] {
        &self.voltage_levels
    }

    pub fn voltage_level(&self, id: &str) -> Option<&VoltageLevel> {
        match self.index.get(id) {
            Some(ElementRef::VoltageLevel(i)) => self.voltage_levels.get(*i),
            _ => None,
        }
    }

    /// Voltage level a bus belongs to.
    pub fn bus_voltage_level(&self, bus: NodeIndex) -> Option<&VoltageLevel> {
        self.graph
            .node_weight(bus)
            .and_then(|b| self.voltage_level(&b.voltage_level_id))
    }

    /// Country of a voltage level, through its substation.
    pub fn country(&self, voltage_level: &VoltageLevel) -> Option<&Country> {
        voltage_level
            .substation_id
            .as_deref()
            .and_then(|id| self.substation(id))
            .and_then(|s| s.country.as_ref())
    }

    pub fn three_windings_transformers(&self) -> &[ThreeWindingsTransformer] {
        &self.three_windings_transformers
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn voltage_angle_limits(&self) -> &[VoltageAngleLimit] {
        &self.voltage_angle_limits
    }

    pub fn variant_manager(&self) -> &VariantManager {
        &self.variants
    }

    /// Clone `source` into a new variant named `target`.
    pub fn clone_variant(&self, source: &str, target: &str) -> GridSecResult<()> {
        self.variants.clone_variant(source, target)
    }

    pub fn remove_variant(&self, id: &str) -> GridSecResult<()> {
        self.variants.remove_variant(id)
    }

    pub fn set_working_variant(&self, id: &str) -> GridSecResult<()> {
        self.variants.set_working_variant(id)
    }

    pub fn allow_multi_thread_access(&self, allow: bool) {
        self.variants.allow_multi_thread_access(allow)
    }

    /// Fresh state built from the static data: every element at its initial
    /// connection status, injections at their setpoints, nothing solved.
    pub fn initial_state(&self) -> VariantState {
        let buses = vec![BusState::default(); self.graph.node_count()];
        let branches = self
            .graph
            .edge_indices()
            .map(|idx| {
                let connected = match &self.graph[idx] {
                    Edge::Branch(branch) => branch.connected,
                    Edge::HvdcLine(line) => line.connected,
                };
                BranchState::new(connected)
            })
            .collect();
        let three_windings = self
            .three_windings_transformers
            .iter()
            .map(|t| ThreeWindingsState::new(t.connected))
            .collect();
        let generators = self
            .generators
            .iter()
            .map(|g| InjectionState::new(g.connected, g.target_p.value(), g.target_q.value()))
            .collect();
        let loads = self
            .loads
            .iter()
            .map(|l| InjectionState::new(l.connected, l.p0.value(), l.q0.value()))
            .collect();
        VariantState {
            buses,
            branches,
            three_windings,
            generators,
            loads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Network {
        NetworkBuilder::new("sample")
            .with_substation(Substation::new("S1").with_country(Country::new("be")))
            .with_voltage_level(
                VoltageLevel::new("VL1", Kilovolts(400.0))
                    .with_substation("S1")
                    .with_voltage_limits(Some(Kilovolts(380.0)), Some(Kilovolts(420.0))),
            )
            .with_bus(Bus::new("B1", "VL1"))
            .with_bus(Bus::new("B2", "VL1"))
            .with_branch(Branch::new("L1", "B1", "B2", 0.0, 0.01))
            .with_branch(Branch::new("L2", "B1", "B2", 0.0, 0.01).disconnected())
            .with_generator(Generator::new("G1", "B1", Megawatts(100.0)))
            .with_load(Load::new("LD1", "B2", Megawatts(80.0), Megavars(10.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_id() {
        let network = sample();
        assert!(matches!(network.element("L1"), Some(ElementRef::Branch(_))));
        assert!(matches!(network.element("B2"), Some(ElementRef::Bus(_))));
        assert!(network.element("nope").is_none());
        let (edge, branch) = network.branch("L2").unwrap();
        assert_eq!(branch.id, "L2");
        let (a, b) = network.edge_buses(edge).unwrap();
        assert_eq!(network.graph()[a].id, "B1");
        assert_eq!(network.graph()[b].id, "B2");
    }

    #[test]
    fn test_country_is_resolved_through_substation() {
        let network = sample();
        let vl = network.voltage_level("VL1").unwrap();
        assert_eq!(network.country(vl), Some(&Country::new("BE")));
    }

    #[test]
    fn test_initial_state_reflects_static_data() {
        let network = sample();
        let state = network.initial_state();
        let (l1, _) = network.branch("L1").unwrap();
        let (l2, _) = network.branch("L2").unwrap();
        assert!(state.branches[l1.index()].is_connected());
        assert!(!state.branches[l2.index()].terminal1.connected);
        assert_eq!(state.generators[0].p, 100.0);
        assert_eq!(state.loads[0].q, 10.0);
        assert!(state.buses.iter().all(|b| b.v.is_nan()));
    }

    #[test]
    fn test_sides() {
        assert_eq!(ThreeSides::from(TwoSides::Two), ThreeSides::Two);
        assert_eq!(ThreeSides::Three.to_two_sides(), None);
        assert_eq!(ThreeSides::One.to_string(), "ONE");
        let json = serde_json::to_string(&ThreeSides::Three).unwrap();
        assert_eq!(json, "\"THREE\"");
    }

    #[test]
    fn test_current_limits_validation() {
        let ok = CurrentLimits::new(Amperes(100.0)).with_temporary_limit("10'", 600, Amperes(120.0));
        assert!(ok.validate("L").is_ok());
        let dup = ok.clone().with_temporary_limit("1'", 600, Amperes(150.0));
        assert!(dup.validate("L").is_err());
        assert!(CurrentLimits::new(Amperes(f64::NAN)).validate("L").is_err());
    }
}
