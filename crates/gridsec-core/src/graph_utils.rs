use crate::variant::VariantState;
use crate::{Edge, Network};
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

/// Connected and synchronous component numbering of one network state.
///
/// AC branches and transformer legs join buses synchronously; HVDC lines only
/// join them in the connected sense. Components are numbered by decreasing
/// size (ties broken by lowest bus index), so the main component is `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
    connected: Vec<usize>,
    synchronous: Vec<usize>,
}

impl Components {
    pub fn compute(network: &Network, state: &VariantState) -> Self {
        let n = network.bus_count();
        let mut connected = UnionFind::<usize>::new(n);
        let mut synchronous = UnionFind::<usize>::new(n);

        for edge in network.graph().edge_indices() {
            let closed = state
                .branches
                .get(edge.index())
                .map(|b| b.is_connected())
                .unwrap_or(false);
            if !closed {
                continue;
            }
            let Some((a, b)) = network.edge_buses(edge) else {
                continue;
            };
            connected.union(a.index(), b.index());
            if let Edge::Branch(_) = network.graph()[edge] {
                synchronous.union(a.index(), b.index());
            }
        }

        for (i, transformer) in network.three_windings_transformers().iter().enumerate() {
            let Some(legs_state) = state.three_windings.get(i) else {
                continue;
            };
            let closed_buses: Vec<usize> = transformer
                .legs
                .iter()
                .zip(legs_state.legs.iter())
                .filter(|(_, leg_state)| leg_state.connected)
                .filter_map(|(leg, _)| network.bus_index(&leg.bus))
                .map(|idx| idx.index())
                .collect();
            for pair in closed_buses.windows(2) {
                connected.union(pair[0], pair[1]);
                synchronous.union(pair[0], pair[1]);
            }
        }

        Self {
            connected: number_by_size(connected.into_labeling()),
            synchronous: number_by_size(synchronous.into_labeling()),
        }
    }

    pub fn connected_component(&self, bus: NodeIndex) -> Option<usize> {
        self.connected.get(bus.index()).copied()
    }

    pub fn synchronous_component(&self, bus: NodeIndex) -> Option<usize> {
        self.synchronous.get(bus.index()).copied()
    }

    /// Both buses share the connected and the synchronous component.
    pub fn same_component(&self, a: NodeIndex, b: NodeIndex) -> bool {
        match (
            self.connected_component(a),
            self.connected_component(b),
            self.synchronous_component(a),
            self.synchronous_component(b),
        ) {
            (Some(ca), Some(cb), Some(sa), Some(sb)) => ca == cb && sa == sb,
            _ => false,
        }
    }

    pub fn synchronous_component_count(&self) -> usize {
        self.synchronous.iter().max().map(|m| m + 1).unwrap_or(0)
    }

    /// Buses of every synchronous component, main component first.
    pub fn synchronous_islands(&self) -> Vec<Vec<NodeIndex>> {
        let mut islands = vec![Vec::new(); self.synchronous_component_count()];
        for (bus, &component) in self.synchronous.iter().enumerate() {
            islands[component].push(NodeIndex::new(bus));
        }
        islands
    }
}

fn number_by_size(labels: Vec<usize>) -> Vec<usize> {
    let mut groups: HashMap<usize, (usize, usize)> = HashMap::new();
    for (bus, &root) in labels.iter().enumerate() {
        let entry = groups.entry(root).or_insert((0, bus));
        entry.0 += 1;
        entry.1 = entry.1.min(bus);
    }
    let mut ordered: Vec<(usize, usize, usize)> = groups
        .into_iter()
        .map(|(root, (size, first))| (root, size, first))
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let numbering: HashMap<usize, usize> = ordered
        .iter()
        .enumerate()
        .map(|(num, (root, _, _))| (*root, num))
        .collect();
    labels.iter().map(|root| numbering[root]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;

    fn network() -> Network {
        NetworkBuilder::new("islands")
            .with_voltage_level(VoltageLevel::new("VL", Kilovolts(225.0)))
            .with_bus(Bus::new("A", "VL"))
            .with_bus(Bus::new("B", "VL"))
            .with_bus(Bus::new("C", "VL"))
            .with_bus(Bus::new("D", "VL"))
            .with_bus(Bus::new("E", "VL"))
            .with_branch(Branch::new("AB", "A", "B", 0.0, 0.1))
            .with_branch(Branch::new("BC", "B", "C", 0.0, 0.1))
            .with_hvdc_line(HvdcLine::new("HVDC", "C", "D", Megawatts(50.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn hvdc_joins_connected_but_not_synchronous_components() {
        let network = network();
        let components = Components::compute(&network, &network.initial_state());
        let idx = |id: &str| network.bus_index(id).unwrap();

        assert_eq!(
            components.connected_component(idx("A")),
            components.connected_component(idx("D"))
        );
        assert_ne!(
            components.synchronous_component(idx("A")),
            components.synchronous_component(idx("D"))
        );
        assert!(components.same_component(idx("A"), idx("C")));
        assert!(!components.same_component(idx("A"), idx("D")));
        assert!(!components.same_component(idx("A"), idx("E")));
    }

    #[test]
    fn main_component_is_numbered_first() {
        let network = network();
        let components = Components::compute(&network, &network.initial_state());
        let islands = components.synchronous_islands();
        assert_eq!(islands.len(), 3);
        assert_eq!(islands[0].len(), 3);
        assert_eq!(
            components.synchronous_component(network.bus_index("A").unwrap()),
            Some(0)
        );
    }

    #[test]
    fn opening_a_branch_splits_the_component() {
        let network = network();
        let mut state = network.initial_state();
        let (bc, _) = network.branch("BC").unwrap();
        state.branches[bc.index()].terminal2.connected = false;
        let components = Components::compute(&network, &state);
        let idx = |id: &str| network.bus_index(id).unwrap();
        assert!(!components.same_component(idx("B"), idx("C")));
        assert!(components.same_component(idx("A"), idx("B")));
    }
}
