//! Systematic contingency list generation.

use gridsec_core::{Network, VariantState};

use crate::spec::{Contingency, ContingencyElement, ContingencyList};

/// Which element families produce N-1 contingencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationOptions {
    pub branches: bool,
    pub generators: bool,
    pub three_windings_transformers: bool,
    pub hvdc_lines: bool,
    /// Also emit contingencies for elements already out of service
    pub include_disconnected: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            branches: true,
            generators: false,
            three_windings_transformers: false,
            hvdc_lines: false,
            include_disconnected: false,
        }
    }
}

/// One single-element contingency per selected in-service element, in network order.
///
/// Service status is read from the network's initial state.
pub fn generate_n1(network: &Network, options: &GenerationOptions) -> ContingencyList {
    let state = network.initial_state();
    let mut contingencies = Vec::new();

    if options.branches {
        for (edge, branch) in network.branches() {
            if options.include_disconnected || branch_in_service(&state, edge.index()) {
                contingencies.push(Contingency::branch(branch.id.clone()));
            }
        }
    }
    if options.hvdc_lines {
        for (edge, line) in network.hvdc_lines() {
            if options.include_disconnected || branch_in_service(&state, edge.index()) {
                contingencies.push(single(ContingencyElement::HvdcLine {
                    id: line.id.clone(),
                }));
            }
        }
    }
    if options.three_windings_transformers {
        for (i, transformer) in network.three_windings_transformers().iter().enumerate() {
            let in_service = state
                .three_windings
                .get(i)
                .map(|t| t.legs.iter().any(|leg| leg.connected))
                .unwrap_or(false);
            if options.include_disconnected || in_service {
                contingencies.push(single(ContingencyElement::ThreeWindingsTransformer {
                    id: transformer.id.clone(),
                }));
            }
        }
    }
    if options.generators {
        for (i, generator) in network.generators().iter().enumerate() {
            let in_service = state.generators.get(i).map(|g| g.connected).unwrap_or(false);
            if options.include_disconnected || in_service {
                contingencies.push(single(ContingencyElement::Generator {
                    id: generator.id.clone(),
                }));
            }
        }
    }

    ContingencyList {
        version: Some(1),
        contingencies,
    }
}

/// Every unordered pair of in-service branches.
pub fn generate_n2_branches(network: &Network) -> ContingencyList {
    let state = network.initial_state();
    let ids: Vec<&str> = network
        .branches()
        .filter(|(edge, _)| branch_in_service(&state, edge.index()))
        .map(|(_, branch)| branch.id.as_str())
        .collect();

    let mut contingencies = Vec::with_capacity(ids.len() * ids.len().saturating_sub(1) / 2);
    for (i, first) in ids.iter().enumerate() {
        for second in &ids[i + 1..] {
            contingencies.push(Contingency::new(
                format!("{first}+{second}"),
                vec![
                    ContingencyElement::Branch {
                        id: (*first).to_string(),
                    },
                    ContingencyElement::Branch {
                        id: (*second).to_string(),
                    },
                ],
            ));
        }
    }
    ContingencyList {
        version: Some(1),
        contingencies,
    }
}

fn single(element: ContingencyElement) -> Contingency {
    Contingency::new(element.id().to_string(), vec![element])
}

fn branch_in_service(state: &VariantState, edge: usize) -> bool {
    state
        .branches
        .get(edge)
        .map(|b| b.is_connected())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsec_core::*;

    fn network() -> Network {
        NetworkBuilder::new("gen")
            .with_voltage_level(VoltageLevel::new("VL", Kilovolts(225.0)))
            .with_bus(Bus::new("B1", "VL"))
            .with_bus(Bus::new("B2", "VL"))
            .with_bus(Bus::new("B3", "VL"))
            .with_branch(Branch::new("L1", "B1", "B2", 0.0, 0.1))
            .with_branch(Branch::new("L2", "B2", "B3", 0.0, 0.1))
            .with_branch(Branch::new("L3", "B1", "B3", 0.0, 0.1))
            .with_branch(Branch::new("L4", "B1", "B3", 0.0, 0.1).disconnected())
            .with_generator(Generator::new("G1", "B1", Megawatts(10.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn n1_skips_open_branches_by_default() {
        let list = generate_n1(&network(), &GenerationOptions::default());
        let ids: Vec<_> = list.contingencies.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["L1", "L2", "L3"]);
    }

    #[test]
    fn n1_can_include_generators_and_open_elements() {
        let options = GenerationOptions {
            generators: true,
            include_disconnected: true,
            ..GenerationOptions::default()
        };
        let list = generate_n1(&network(), &options);
        assert_eq!(list.contingencies.len(), 5);
        assert_eq!(
            list.contingencies[4].elements,
            vec![ContingencyElement::Generator { id: "G1".into() }]
        );
    }

    #[test]
    fn n2_pairs_each_branch_once() {
        let list = generate_n2_branches(&network());
        let ids: Vec<_> = list.contingencies.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["L1+L2", "L1+L3", "L2+L3"]);
    }
}
