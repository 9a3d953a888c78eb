//! State monitors: requests to record flows and voltages in the results.

use gridsec_core::{GridSecError, GridSecResult, Network, NetworkView};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::result::NetworkResult;

/// Which network states a monitor applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "contingency_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContingencyContext {
    /// Base case and every contingency
    All,
    /// Base case only
    None,
    /// One contingency
    Specific(String),
    /// Every contingency, not the base case
    OnlyContingencies,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMonitor {
    pub context: ContingencyContext,
    #[serde(default)]
    pub branch_ids: BTreeSet<String>,
    #[serde(default)]
    pub voltage_level_ids: BTreeSet<String>,
    #[serde(default)]
    pub three_windings_transformer_ids: BTreeSet<String>,
}

impl StateMonitor {
    pub fn new(context: ContingencyContext) -> Self {
        Self {
            context,
            branch_ids: BTreeSet::new(),
            voltage_level_ids: BTreeSet::new(),
            three_windings_transformer_ids: BTreeSet::new(),
        }
    }

    /// Monitor every branch, voltage level and three-winding transformer.
    pub fn all_elements(network: &Network, context: ContingencyContext) -> Self {
        Self {
            context,
            branch_ids: network.branches().map(|(_, b)| b.id.clone()).collect(),
            voltage_level_ids: network.voltage_levels().iter().map(|vl| vl.id.clone()).collect(),
            three_windings_transformer_ids: network
                .three_windings_transformers()
                .iter()
                .map(|t| t.id.clone())
                .collect(),
        }
    }

    pub fn with_branches<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branch_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_voltage_levels<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.voltage_level_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_three_windings_transformers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.three_windings_transformer_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Every monitored id must exist in `network` with the expected type.
    pub fn validate_against(&self, network: &Network) -> GridSecResult<()> {
        let missing = |kind: &str, id: &str| {
            GridSecError::Network(format!("monitored {kind} '{id}' not found in network"))
        };
        for id in &self.branch_ids {
            network.branch(id).ok_or_else(|| missing("branch", id))?;
        }
        for id in &self.voltage_level_ids {
            network
                .voltage_level(id)
                .ok_or_else(|| missing("voltage level", id))?;
        }
        for id in &self.three_windings_transformer_ids {
            if !network
                .three_windings_transformers()
                .iter()
                .any(|t| &t.id == id)
            {
                return Err(missing("three-winding transformer", id));
            }
        }
        Ok(())
    }

    fn merge(&mut self, other: &StateMonitor) {
        self.branch_ids.extend(other.branch_ids.iter().cloned());
        self.voltage_level_ids
            .extend(other.voltage_level_ids.iter().cloned());
        self.three_windings_transformer_ids
            .extend(other.three_windings_transformer_ids.iter().cloned());
    }

    fn is_empty(&self) -> bool {
        self.branch_ids.is_empty()
            && self.voltage_level_ids.is_empty()
            && self.three_windings_transformer_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchResult {
    pub branch_id: String,
    pub p1: f64,
    pub q1: f64,
    pub i1: f64,
    pub p2: f64,
    pub q2: f64,
    pub i2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub voltage_level_id: String,
    pub bus_id: String,
    /// kV
    pub v: f64,
    /// degrees
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreeWindingsTransformerResult {
    pub three_windings_transformer_id: String,
    pub p1: f64,
    pub q1: f64,
    pub i1: f64,
    pub p2: f64,
    pub q2: f64,
    pub i2: f64,
    pub p3: f64,
    pub q3: f64,
    pub i3: f64,
}

/// Monitors grouped by the state they apply to.
#[derive(Debug, Clone, Default)]
pub struct StateMonitorIndex {
    base_case: Option<StateMonitor>,
    all_contingencies: Option<StateMonitor>,
    specific: HashMap<String, StateMonitor>,
}

impl StateMonitorIndex {
    pub fn new(monitors: &[StateMonitor]) -> Self {
        let mut index = Self::default();
        let add = |slot: &mut Option<StateMonitor>, monitor: &StateMonitor| {
            slot.get_or_insert_with(|| StateMonitor::new(monitor.context.clone()))
                .merge(monitor);
        };
        for monitor in monitors {
            match &monitor.context {
                ContingencyContext::All => {
                    add(&mut index.base_case, monitor);
                    add(&mut index.all_contingencies, monitor);
                }
                ContingencyContext::None => add(&mut index.base_case, monitor),
                ContingencyContext::OnlyContingencies => {
                    add(&mut index.all_contingencies, monitor)
                }
                ContingencyContext::Specific(id) => index
                    .specific
                    .entry(id.clone())
                    .or_insert_with(|| StateMonitor::new(monitor.context.clone()))
                    .merge(monitor),
            }
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.base_case.is_none() && self.all_contingencies.is_none() && self.specific.is_empty()
    }

    /// Union of the monitors that apply to `contingency_id`, or to the base
    /// case when `None`.
    pub fn monitor_for(&self, contingency_id: Option<&str>) -> Option<StateMonitor> {
        let merged = match contingency_id {
            None => self.base_case.clone(),
            Some(id) => {
                let mut merged = self.all_contingencies.clone();
                if let Some(specific) = self.specific.get(id) {
                    merged
                        .get_or_insert_with(|| StateMonitor::new(specific.context.clone()))
                        .merge(specific);
                }
                merged
            }
        };
        merged.filter(|m| !m.is_empty())
    }

    /// Extract the monitored quantities of the state behind `view`.
    ///
    /// Ids that are not in the network are skipped.
    pub fn network_result(&self, view: &NetworkView<'_>, contingency_id: Option<&str>) -> NetworkResult {
        match self.monitor_for(contingency_id) {
            Some(monitor) => extract(&monitor, view),
            None => NetworkResult::default(),
        }
    }
}

fn extract(monitor: &StateMonitor, view: &NetworkView<'_>) -> NetworkResult {
    let network = view.network();
    let mut result = NetworkResult::default();

    for id in &monitor.branch_ids {
        let Some((edge, branch)) = network.branch(id) else {
            continue;
        };
        let Some(state) = view.branch_state(edge) else {
            continue;
        };
        result.branch_results.push(BranchResult {
            branch_id: branch.id.clone(),
            p1: state.terminal1.p,
            q1: state.terminal1.q,
            i1: state.terminal1.i,
            p2: state.terminal2.p,
            q2: state.terminal2.q,
            i2: state.terminal2.i,
        });
    }

    for id in &monitor.voltage_level_ids {
        for (bus, b) in network.buses().filter(|(_, b)| &b.voltage_level_id == id) {
            let Some(state) = view.bus_state(bus) else {
                continue;
            };
            result.bus_results.push(BusResult {
                voltage_level_id: id.clone(),
                bus_id: b.id.clone(),
                v: state.v,
                angle: state.angle,
            });
        }
    }

    for id in &monitor.three_windings_transformer_ids {
        let Some(position) = network
            .three_windings_transformers()
            .iter()
            .position(|t| &t.id == id)
        else {
            continue;
        };
        let Some(state) = view.three_windings_state(position) else {
            continue;
        };
        let [one, two, three] = &state.legs;
        result
            .three_windings_transformer_results
            .push(ThreeWindingsTransformerResult {
                three_windings_transformer_id: id.clone(),
                p1: one.p,
                q1: one.q,
                i1: one.i,
                p2: two.p,
                q2: two.q,
                i2: two.i,
                p3: three.p,
                q3: three.q,
                i3: three.i,
            });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::triangle_network;

    #[test]
    fn index_groups_monitors_by_context() {
        let index = StateMonitorIndex::new(&[
            StateMonitor::new(ContingencyContext::All).with_branches(["L12"]),
            StateMonitor::new(ContingencyContext::None).with_voltage_levels(["VL1"]),
            StateMonitor::new(ContingencyContext::Specific("L13".into())).with_branches(["L23"]),
            StateMonitor::new(ContingencyContext::OnlyContingencies).with_branches(["L13"]),
        ]);

        let base = index.monitor_for(None).unwrap();
        assert_eq!(base.branch_ids, BTreeSet::from(["L12".to_string()]));
        assert_eq!(base.voltage_level_ids, BTreeSet::from(["VL1".to_string()]));

        let l13 = index.monitor_for(Some("L13")).unwrap();
        assert_eq!(l13.branch_ids.len(), 3);
        assert!(l13.voltage_level_ids.is_empty());

        let other = index.monitor_for(Some("L12")).unwrap();
        assert_eq!(other.branch_ids.len(), 2);
    }

    #[test]
    fn empty_index_yields_empty_results() {
        let network = triangle_network().unwrap();
        let state = network.initial_state();
        let index = StateMonitorIndex::new(&[]);
        assert!(index.is_empty());
        assert!(index
            .network_result(&NetworkView::new(&network, &state), None)
            .is_empty());
    }

    #[test]
    fn extraction_reads_branch_flows_and_bus_voltages() {
        let network = triangle_network().unwrap();
        let mut state = network.initial_state();
        let (l12, _) = network.branch("L12").unwrap();
        state.branches[l12.index()].terminal1.p = 42.0;
        state.buses[network.bus_index("B3").unwrap().index()].v = 398.0;

        let index = StateMonitorIndex::new(&[StateMonitor::new(ContingencyContext::All)
            .with_branches(["L12", "missing"])
            .with_voltage_levels(["VL1"])]);
        let result = index.network_result(&NetworkView::new(&network, &state), Some("any"));

        assert_eq!(result.branch_results.len(), 1);
        assert_eq!(result.branch_results[0].p1, 42.0);
        let buses: Vec<_> = result.bus_results.iter().map(|b| b.bus_id.as_str()).collect();
        assert_eq!(buses, vec!["B1", "B3"]);
        assert_eq!(result.bus_results[1].v, 398.0);
    }

    #[test]
    fn validation_reports_unknown_ids() {
        let network = triangle_network().unwrap();
        assert!(StateMonitor::all_elements(&network, ContingencyContext::All)
            .validate_against(&network)
            .is_ok());
        let err = StateMonitor::new(ContingencyContext::All)
            .with_branches(["L99"])
            .validate_against(&network)
            .unwrap_err();
        assert!(err.to_string().contains("L99"));
    }
}
