use crate::error::{GridSecError, GridSecResult};
use crate::variant::{VariantManager, VariantState};
use crate::{
    Branch, Bus, Edge, ElementRef, Generator, HvdcLine, Load, Network, Substation,
    ThreeWindingsTransformer, VoltageAngleLimit, VoltageLevel,
};
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_source_format() -> String {
    "gridsec-json".to_string()
}

/// Element lists that make up a network, validated by [`NetworkBuilder::build`].
///
/// The builder is also the serialized form of a network case, so a JSON case
/// file deserializes straight into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkBuilder {
    pub id: String,
    #[serde(default = "default_source_format")]
    pub source_format: String,
    #[serde(default)]
    pub case_date: Option<String>,
    #[serde(default)]
    pub substations: Vec<Substation>,
    #[serde(default)]
    pub voltage_levels: Vec<VoltageLevel>,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub hvdc_lines: Vec<HvdcLine>,
    #[serde(default)]
    pub three_windings_transformers: Vec<ThreeWindingsTransformer>,
    #[serde(default)]
    pub generators: Vec<Generator>,
    #[serde(default)]
    pub loads: Vec<Load>,
    #[serde(default)]
    pub voltage_angle_limits: Vec<VoltageAngleLimit>,
}

impl NetworkBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_format: default_source_format(),
            ..Self::default()
        }
    }

    pub fn with_source_format(mut self, source_format: impl Into<String>) -> Self {
        self.source_format = source_format.into();
        self
    }

    pub fn with_case_date(mut self, case_date: impl Into<String>) -> Self {
        self.case_date = Some(case_date.into());
        self
    }

    pub fn with_substation(mut self, substation: Substation) -> Self {
        self.substations.push(substation);
        self
    }

    pub fn with_voltage_level(mut self, voltage_level: VoltageLevel) -> Self {
        self.voltage_levels.push(voltage_level);
        self
    }

    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.buses.push(bus);
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn with_hvdc_line(mut self, line: HvdcLine) -> Self {
        self.hvdc_lines.push(line);
        self
    }

    pub fn with_three_windings_transformer(mut self, transformer: ThreeWindingsTransformer) -> Self {
        self.three_windings_transformers.push(transformer);
        self
    }

    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generators.push(generator);
        self
    }

    pub fn with_load(mut self, load: Load) -> Self {
        self.loads.push(load);
        self
    }

    pub fn with_voltage_angle_limit(mut self, limit: VoltageAngleLimit) -> Self {
        self.voltage_angle_limits.push(limit);
        self
    }

    /// Validate every reference and limit, then assemble the topology graph.
    pub fn build(self) -> GridSecResult<Network> {
        if self.id.trim().is_empty() {
            return Err(GridSecError::Validation("network id cannot be empty".into()));
        }

        let mut index: HashMap<String, ElementRef> = HashMap::new();
        let mut register = |id: &str, element: ElementRef| -> GridSecResult<()> {
            if id.trim().is_empty() {
                return Err(GridSecError::Validation("element id cannot be empty".into()));
            }
            if index.insert(id.to_string(), element).is_some() {
                return Err(GridSecError::Validation(format!(
                    "duplicate element id '{id}'"
                )));
            }
            Ok(())
        };

        for (i, substation) in self.substations.iter().enumerate() {
            register(&substation.id, ElementRef::Substation(i))?;
        }
        for (i, vl) in self.voltage_levels.iter().enumerate() {
            register(&vl.id, ElementRef::VoltageLevel(i))?;
            validate_voltage_level(vl)?;
            if let Some(substation) = &vl.substation_id {
                if !self.substations.iter().any(|s| &s.id == substation) {
                    return Err(GridSecError::Network(format!(
                        "voltage level '{}' references unknown substation '{substation}'",
                        vl.id
                    )));
                }
            }
        }

        let mut graph = Graph::new_undirected();
        let mut bus_nodes = HashMap::new();
        for bus in self.buses {
            if !self.voltage_levels.iter().any(|vl| vl.id == bus.voltage_level_id) {
                return Err(GridSecError::Network(format!(
                    "bus '{}' references unknown voltage level '{}'",
                    bus.id, bus.voltage_level_id
                )));
            }
            let id = bus.id.clone();
            let node = graph.add_node(bus);
            register(&id, ElementRef::Bus(node))?;
            bus_nodes.insert(id, node);
        }

        let lookup = |owner: &str, bus: &str| {
            bus_nodes.get(bus).copied().ok_or_else(|| {
                GridSecError::Network(format!("'{owner}' references unknown bus '{bus}'"))
            })
        };

        for branch in self.branches {
            let a = lookup(&branch.id, &branch.bus1)?;
            let b = lookup(&branch.id, &branch.bus2)?;
            validate_branch(&branch)?;
            let id = branch.id.clone();
            let edge = graph.add_edge(a, b, Edge::Branch(branch));
            register(&id, ElementRef::Branch(edge))?;
        }
        for line in self.hvdc_lines {
            let a = lookup(&line.id, &line.bus1)?;
            let b = lookup(&line.id, &line.bus2)?;
            if !line.active_power_setpoint.is_finite() {
                return Err(GridSecError::Validation(format!(
                    "HVDC line '{}' has a non-finite setpoint",
                    line.id
                )));
            }
            let id = line.id.clone();
            let edge = graph.add_edge(a, b, Edge::HvdcLine(line));
            register(&id, ElementRef::HvdcLine(edge))?;
        }
        for (i, transformer) in self.three_windings_transformers.iter().enumerate() {
            register(&transformer.id, ElementRef::ThreeWindingsTransformer(i))?;
            for leg in &transformer.legs {
                lookup(&transformer.id, &leg.bus)?;
                if let Some(limits) = &leg.current_limits {
                    limits.validate(&transformer.id)?;
                }
                if !(leg.ratio > 0.0) {
                    return Err(GridSecError::Validation(format!(
                        "three-winding transformer '{}' has a non-positive leg ratio",
                        transformer.id
                    )));
                }
            }
        }
        for (i, generator) in self.generators.iter().enumerate() {
            register(&generator.id, ElementRef::Generator(i))?;
            lookup(&generator.id, &generator.bus)?;
        }
        for (i, load) in self.loads.iter().enumerate() {
            register(&load.id, ElementRef::Load(i))?;
            lookup(&load.id, &load.bus)?;
        }
        for (i, limit) in self.voltage_angle_limits.iter().enumerate() {
            register(&limit.id, ElementRef::VoltageAngleLimit(i))?;
            lookup(&limit.id, &limit.reference_bus)?;
            lookup(&limit.id, &limit.other_bus)?;
            if let (Some(low), Some(high)) = (limit.low_limit, limit.high_limit) {
                if low.value() > high.value() {
                    return Err(GridSecError::Config(format!(
                        "voltage angle limit '{}' has low limit {} above high limit {}",
                        limit.id,
                        low.value(),
                        high.value()
                    )));
                }
            }
        }

        let mut network = Network {
            id: self.id,
            source_format: self.source_format,
            case_date: self.case_date,
            graph,
            substations: self.substations,
            voltage_levels: self.voltage_levels,
            three_windings_transformers: self.three_windings_transformers,
            generators: self.generators,
            loads: self.loads,
            voltage_angle_limits: self.voltage_angle_limits,
            index,
            variants: VariantManager::new(VariantState::default()),
        };
        // the initial variant needs the assembled topology to size its vectors
        network.variants = VariantManager::new(network.initial_state());
        Ok(network)
    }
}

fn validate_voltage_level(vl: &VoltageLevel) -> GridSecResult<()> {
    if !vl.nominal_v.is_finite() || vl.nominal_v.value() <= 0.0 {
        return Err(GridSecError::Config(format!(
            "voltage level '{}' must have a positive nominal voltage",
            vl.id
        )));
    }
    for limit in [vl.low_voltage_limit, vl.high_voltage_limit].into_iter().flatten() {
        if limit.is_nan() {
            return Err(GridSecError::Config(format!(
                "voltage level '{}' has a NaN voltage limit",
                vl.id
            )));
        }
    }
    if let (Some(low), Some(high)) = (vl.low_voltage_limit, vl.high_voltage_limit) {
        if low.value() > high.value() {
            return Err(GridSecError::Config(format!(
                "voltage level '{}' has low voltage limit {} above high voltage limit {}",
                vl.id,
                low.value(),
                high.value()
            )));
        }
    }
    Ok(())
}

fn validate_branch(branch: &Branch) -> GridSecResult<()> {
    if !branch.resistance.is_finite() || !branch.reactance.is_finite() {
        return Err(GridSecError::Validation(format!(
            "branch '{}' has a non-finite impedance",
            branch.id
        )));
    }
    if !(branch.tap_ratio > 0.0) {
        return Err(GridSecError::Validation(format!(
            "branch '{}' must have a positive tap ratio",
            branch.id
        )));
    }
    for limits in [&branch.current_limits1, &branch.current_limits2].into_iter().flatten() {
        limits.validate(&branch.id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Degrees, Kilovolts, Megawatts};

    fn base() -> NetworkBuilder {
        NetworkBuilder::new("n")
            .with_voltage_level(VoltageLevel::new("VL", Kilovolts(400.0)))
            .with_bus(Bus::new("B1", "VL"))
            .with_bus(Bus::new("B2", "VL"))
    }

    #[test]
    fn inverted_voltage_limits_are_rejected() {
        let err = NetworkBuilder::new("n")
            .with_voltage_level(
                VoltageLevel::new("VL", Kilovolts(400.0))
                    .with_voltage_limits(Some(Kilovolts(420.0)), Some(Kilovolts(380.0))),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, GridSecError::Config(_)), "{err}");
    }

    #[test]
    fn inverted_angle_limits_are_rejected() {
        let err = base()
            .with_voltage_angle_limit(
                VoltageAngleLimit::new("VAL", "B1", "B2")
                    .with_limits(Some(Degrees(10.0)), Some(Degrees(-10.0))),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, GridSecError::Config(_)));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let err = base()
            .with_branch(Branch::new("L", "B1", "B9", 0.0, 0.1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown bus 'B9'"));

        let err = base()
            .with_generator(Generator::new("G", "nowhere", Megawatts(1.0)))
            .build()
            .unwrap_err();
        assert!(matches!(err, GridSecError::Network(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected_across_element_kinds() {
        let err = base()
            .with_branch(Branch::new("B1", "B1", "B2", 0.0, 0.1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate element id 'B1'"));
    }

    #[test]
    fn case_json_round_trips_into_a_network() {
        let json = r#"{
            "id": "case",
            "voltage_levels": [{"id": "VL", "nominal_v": 225.0, "low_voltage_limit": 200.0}],
            "buses": [{"id": "B1", "voltage_level_id": "VL"}, {"id": "B2", "voltage_level_id": "VL"}],
            "branches": [{
                "id": "L1", "bus1": "B1", "bus2": "B2", "resistance": 0.0, "reactance": 0.1,
                "current_limits1": {"permanent_limit": 500.0,
                    "temporary_limits": [{"name": "20'", "acceptable_duration": 1200, "value": 600.0}]}
            }]
        }"#;
        let builder: NetworkBuilder = serde_json::from_str(json).unwrap();
        let network = builder.build().unwrap();
        assert_eq!(network.source_format(), "gridsec-json");
        let (_, branch) = network.branch("L1").unwrap();
        assert!(branch.connected);
        assert_eq!(branch.tap_ratio, 1.0);
        let limits = branch.current_limits1.as_ref().unwrap();
        assert_eq!(limits.temporary_limits[0].acceptable_duration, 1200);
    }
}
