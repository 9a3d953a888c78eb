use gridsec_core::{ElementRef, GridSecError, GridSecResult, Network, TerminalState, VariantState};
use petgraph::visit::EdgeRef;

use crate::spec::{Contingency, ContingencyElement};

/// Whether applying a contingency changed the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Modified,
    /// Every element was already out of service
    NoImpact,
}

impl Contingency {
    /// Check that every element exists with the declared type.
    pub fn validate_against(&self, network: &Network) -> GridSecResult<()> {
        for element in &self.elements {
            resolve(network, element)?;
        }
        Ok(())
    }

    pub fn is_valid(&self, network: &Network) -> bool {
        self.validate_against(network).is_ok()
    }

    /// Disconnect every element of the contingency in `state`.
    ///
    /// All elements are resolved before anything is touched, so a failing
    /// contingency leaves the state unchanged.
    pub fn apply(&self, network: &Network, state: &mut VariantState) -> GridSecResult<ApplyOutcome> {
        let targets = self
            .elements
            .iter()
            .map(|element| resolve(network, element))
            .collect::<GridSecResult<Vec<_>>>()?;

        let mut modified = false;
        for target in targets {
            modified |= disconnect(network, state, target)?;
        }
        Ok(if modified {
            ApplyOutcome::Modified
        } else {
            ApplyOutcome::NoImpact
        })
    }
}

fn resolve(network: &Network, element: &ContingencyElement) -> GridSecResult<ElementRef> {
    let id = element.id();
    let found = network.element(id).ok_or_else(|| {
        GridSecError::Network(format!("{} '{}' not found in network", element.kind(), id))
    })?;
    let matches = matches!(
        (element, found),
        (ContingencyElement::Branch { .. }, ElementRef::Branch(_))
            | (ContingencyElement::Generator { .. }, ElementRef::Generator(_))
            | (ContingencyElement::Load { .. }, ElementRef::Load(_))
            | (
                ContingencyElement::ThreeWindingsTransformer { .. },
                ElementRef::ThreeWindingsTransformer(_)
            )
            | (ContingencyElement::HvdcLine { .. }, ElementRef::HvdcLine(_))
            | (ContingencyElement::Bus { .. }, ElementRef::Bus(_))
    );
    if !matches {
        return Err(GridSecError::Network(format!(
            "'{}' is not a {}",
            id,
            element.kind()
        )));
    }
    Ok(found)
}

fn state_mismatch() -> GridSecError {
    GridSecError::Variant("variant state does not match the network".into())
}

fn open(terminal: &mut TerminalState) -> bool {
    let was_connected = terminal.connected;
    terminal.connected = false;
    terminal.clear_flows();
    was_connected
}

fn disconnect(network: &Network, state: &mut VariantState, target: ElementRef) -> GridSecResult<bool> {
    let modified = match target {
        ElementRef::Branch(edge) | ElementRef::HvdcLine(edge) => {
            let branch = state.branches.get_mut(edge.index()).ok_or_else(state_mismatch)?;
            let one = open(&mut branch.terminal1);
            let two = open(&mut branch.terminal2);
            one || two
        }
        ElementRef::ThreeWindingsTransformer(i) => {
            let transformer = state.three_windings.get_mut(i).ok_or_else(state_mismatch)?;
            let mut modified = false;
            for leg in &mut transformer.legs {
                modified |= open(leg);
            }
            modified
        }
        ElementRef::Generator(i) => {
            let generator = state.generators.get_mut(i).ok_or_else(state_mismatch)?;
            std::mem::replace(&mut generator.connected, false)
        }
        ElementRef::Load(i) => {
            let load = state.loads.get_mut(i).ok_or_else(state_mismatch)?;
            std::mem::replace(&mut load.connected, false)
        }
        ElementRef::Bus(node) => {
            let bus_id = network.graph()[node].id.as_str();
            let mut modified = false;
            for edge in network.graph().edges(node) {
                let branch = state
                    .branches
                    .get_mut(edge.id().index())
                    .ok_or_else(state_mismatch)?;
                let (a, b) = network.edge_buses(edge.id()).ok_or_else(state_mismatch)?;
                if a == node {
                    modified |= open(&mut branch.terminal1);
                }
                if b == node {
                    modified |= open(&mut branch.terminal2);
                }
            }
            for (i, transformer) in network.three_windings_transformers().iter().enumerate() {
                let legs = state.three_windings.get_mut(i).ok_or_else(state_mismatch)?;
                for (leg, leg_state) in transformer.legs.iter().zip(legs.legs.iter_mut()) {
                    if leg.bus == bus_id {
                        modified |= open(leg_state);
                    }
                }
            }
            for (i, generator) in network.generators().iter().enumerate() {
                if generator.bus == bus_id {
                    let injection = state.generators.get_mut(i).ok_or_else(state_mismatch)?;
                    modified |= std::mem::replace(&mut injection.connected, false);
                }
            }
            for (i, load) in network.loads().iter().enumerate() {
                if load.bus == bus_id {
                    let injection = state.loads.get_mut(i).ok_or_else(state_mismatch)?;
                    modified |= std::mem::replace(&mut injection.connected, false);
                }
            }
            modified
        }
        ElementRef::Substation(_) | ElementRef::VoltageLevel(_) | ElementRef::VoltageAngleLimit(_) => {
            return Err(GridSecError::Network(
                "only equipment can be part of a contingency".into(),
            ))
        }
    };
    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsec_core::*;

    fn network() -> Network {
        NetworkBuilder::new("apply")
            .with_voltage_level(VoltageLevel::new("VL", Kilovolts(225.0)))
            .with_bus(Bus::new("B1", "VL"))
            .with_bus(Bus::new("B2", "VL"))
            .with_bus(Bus::new("B3", "VL"))
            .with_branch(Branch::new("L12", "B1", "B2", 0.0, 0.1))
            .with_branch(Branch::new("L23", "B2", "B3", 0.0, 0.1))
            .with_branch(Branch::new("L13", "B1", "B3", 0.0, 0.1).disconnected())
            .with_generator(Generator::new("G1", "B1", Megawatts(100.0)))
            .with_load(Load::new("LD2", "B2", Megawatts(50.0), Megavars(0.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn branch_outage_opens_both_terminals() {
        let network = network();
        let mut state = network.initial_state();
        let outcome = Contingency::branch("L12").apply(&network, &mut state).unwrap();
        assert_eq!(outcome, ApplyOutcome::Modified);
        let (edge, _) = network.branch("L12").unwrap();
        assert!(!state.branches[edge.index()].terminal1.connected);
        assert!(!state.branches[edge.index()].terminal2.connected);
    }

    #[test]
    fn already_open_branch_has_no_impact() {
        let network = network();
        let mut state = network.initial_state();
        let outcome = Contingency::branch("L13").apply(&network, &mut state).unwrap();
        assert_eq!(outcome, ApplyOutcome::NoImpact);
    }

    #[test]
    fn bus_outage_opens_everything_at_the_bus() {
        let network = network();
        let mut state = network.initial_state();
        let contingency = Contingency::new("BUS2", vec![ContingencyElement::Bus { id: "B2".into() }]);
        contingency.apply(&network, &mut state).unwrap();
        let (l12, _) = network.branch("L12").unwrap();
        let (l23, _) = network.branch("L23").unwrap();
        assert!(state.branches[l12.index()].terminal1.connected);
        assert!(!state.branches[l12.index()].terminal2.connected);
        assert!(!state.branches[l23.index()].terminal1.connected);
        assert!(!state.loads[0].connected);
        assert!(state.generators[0].connected);
    }

    #[test]
    fn unknown_or_mistyped_elements_leave_state_untouched() {
        let network = network();
        let mut state = network.initial_state();
        let before = state.clone();

        let unknown = Contingency::new(
            "C",
            vec![
                ContingencyElement::Branch { id: "L12".into() },
                ContingencyElement::Branch { id: "L99".into() },
            ],
        );
        let err = unknown.apply(&network, &mut state).unwrap_err();
        assert!(err.to_string().contains("branch 'L99' not found"));
        assert_eq!(state, before);

        let mistyped = Contingency::new("G", vec![ContingencyElement::Branch { id: "G1".into() }]);
        assert!(!mistyped.is_valid(&network));
        let generator =
            Contingency::new("G", vec![ContingencyElement::Generator { id: "G1".into() }]);
        assert!(generator.is_valid(&network));
    }
}
