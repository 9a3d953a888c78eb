use crate::graph_utils::Components;
use crate::variant::{BranchState, BusState, InjectionState, ThreeWindingsState, VariantState};
use crate::{Network, VoltageLevel};
use petgraph::graph::{EdgeIndex, NodeIndex};

/// Read-only pairing of the static network with one variant's state.
///
/// Detection, filtering and monitoring all read through this view so they
/// never need to know which variant they are looking at.
#[derive(Debug, Clone, Copy)]
pub struct NetworkView<'a> {
    network: &'a Network,
    state: &'a VariantState,
}

impl<'a> NetworkView<'a> {
    pub fn new(network: &'a Network, state: &'a VariantState) -> Self {
        Self { network, state }
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn state(&self) -> &'a VariantState {
        self.state
    }

    pub fn bus_state(&self, bus: NodeIndex) -> Option<&'a BusState> {
        self.state.buses.get(bus.index())
    }

    pub fn branch_state(&self, edge: EdgeIndex) -> Option<&'a BranchState> {
        self.state.branches.get(edge.index())
    }

    pub fn three_windings_state(&self, index: usize) -> Option<&'a ThreeWindingsState> {
        self.state.three_windings.get(index)
    }

    pub fn generator_state(&self, index: usize) -> Option<&'a InjectionState> {
        self.state.generators.get(index)
    }

    pub fn load_state(&self, index: usize) -> Option<&'a InjectionState> {
        self.state.loads.get(index)
    }

    pub fn bus_voltage_level(&self, bus: NodeIndex) -> Option<&'a VoltageLevel> {
        self.network.bus_voltage_level(bus)
    }

    /// Component numbering of this state's topology.
    pub fn components(&self) -> Components {
        Components::compute(self.network, self.state)
    }
}
