//! Voltage level lookup for identifiable elements.
//!
//! Violation filtering needs the nominal voltage and the country behind a
//! subject id. Each element type answers that itself through [`Locatable`],
//! and [`Network::locatable`] resolves an id to the right implementation.

use crate::{
    Branch, Bus, ElementRef, Generator, HvdcLine, Load, Network, ThreeSides,
    ThreeWindingsTransformer, TwoSides, VoltageAngleLimit, VoltageLevel,
};

pub trait Locatable {
    /// Voltage level of the element, or of its terminal on `side` when the
    /// element has several. Elements with sides default to side one.
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        side: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel>;
}

fn bus_voltage_level<'n>(network: &'n Network, bus_id: &str) -> Option<&'n VoltageLevel> {
    network
        .bus(bus_id)
        .and_then(|bus| network.voltage_level(&bus.voltage_level_id))
}

impl Locatable for VoltageLevel {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        _: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        network.voltage_level(&self.id)
    }
}

impl Locatable for Bus {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        _: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        network.voltage_level(&self.voltage_level_id)
    }
}

impl Locatable for Branch {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        side: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        let side = side
            .and_then(ThreeSides::to_two_sides)
            .unwrap_or(TwoSides::One);
        bus_voltage_level(network, self.bus_id(side))
    }
}

impl Locatable for HvdcLine {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        side: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        let bus = match side {
            Some(ThreeSides::Two) => &self.bus2,
            _ => &self.bus1,
        };
        bus_voltage_level(network, bus)
    }
}

impl Locatable for ThreeWindingsTransformer {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        side: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        let leg = self.leg(side.unwrap_or(ThreeSides::One));
        bus_voltage_level(network, &leg.bus)
    }
}

impl Locatable for Generator {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        _: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        bus_voltage_level(network, &self.bus)
    }
}

impl Locatable for Load {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        _: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        bus_voltage_level(network, &self.bus)
    }
}

impl Locatable for VoltageAngleLimit {
    fn voltage_level<'n>(
        &self,
        network: &'n Network,
        _: Option<ThreeSides>,
    ) -> Option<&'n VoltageLevel> {
        bus_voltage_level(network, &self.reference_bus)
    }
}

impl Network {
    /// Resolve an identifier to its voltage-level capability.
    ///
    /// Substations have no single voltage level and resolve to `None`.
    pub fn locatable(&self, id: &str) -> Option<&dyn Locatable> {
        match self.element(id)? {
            ElementRef::VoltageLevel(_) => self.voltage_level(id).map(|v| v as &dyn Locatable),
            ElementRef::Bus(idx) => Some(&self.graph()[idx] as &dyn Locatable),
            ElementRef::Branch(idx) | ElementRef::HvdcLine(idx) => match &self.graph()[idx] {
                crate::Edge::Branch(branch) => Some(branch as &dyn Locatable),
                crate::Edge::HvdcLine(line) => Some(line as &dyn Locatable),
            },
            ElementRef::ThreeWindingsTransformer(i) => self
                .three_windings_transformers()
                .get(i)
                .map(|t| t as &dyn Locatable),
            ElementRef::Generator(i) => self.generators().get(i).map(|g| g as &dyn Locatable),
            ElementRef::Load(i) => self.loads().get(i).map(|l| l as &dyn Locatable),
            ElementRef::VoltageAngleLimit(i) => self
                .voltage_angle_limits()
                .get(i)
                .map(|l| l as &dyn Locatable),
            ElementRef::Substation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn network() -> Network {
        NetworkBuilder::new("locatable")
            .with_voltage_level(VoltageLevel::new("VL400", Kilovolts(400.0)))
            .with_voltage_level(VoltageLevel::new("VL225", Kilovolts(225.0)))
            .with_voltage_level(VoltageLevel::new("VL63", Kilovolts(63.0)))
            .with_bus(Bus::new("B400", "VL400"))
            .with_bus(Bus::new("B225", "VL225"))
            .with_bus(Bus::new("B63", "VL63"))
            .with_branch(
                Branch::new("T1", "B400", "B225", 0.0, 0.05).as_transformer(1.0, Degrees(0.0)),
            )
            .with_three_windings_transformer(ThreeWindingsTransformer::new(
                "T3",
                [
                    TransformerLeg::new("B400", 0.0, 0.02),
                    TransformerLeg::new("B225", 0.0, 0.02),
                    TransformerLeg::new("B63", 0.0, 0.02),
                ],
            ))
            .with_load(Load::new("LD", "B63", Megawatts(10.0), Megavars(0.0)))
            .build()
            .unwrap()
    }

    fn nominal(network: &Network, id: &str, side: Option<ThreeSides>) -> Option<f64> {
        network
            .locatable(id)
            .and_then(|l| l.voltage_level(network, side))
            .map(|vl| vl.nominal_v.value())
    }

    #[test]
    fn branch_resolves_by_side() {
        let network = network();
        assert_eq!(nominal(&network, "T1", Some(ThreeSides::One)), Some(400.0));
        assert_eq!(nominal(&network, "T1", Some(ThreeSides::Two)), Some(225.0));
        assert_eq!(nominal(&network, "T1", None), Some(400.0));
    }

    #[test]
    fn three_winding_transformer_resolves_each_leg() {
        let network = network();
        assert_eq!(nominal(&network, "T3", Some(ThreeSides::Three)), Some(63.0));
    }

    #[test]
    fn buses_levels_and_injections_resolve() {
        let network = network();
        assert_eq!(nominal(&network, "VL225", None), Some(225.0));
        assert_eq!(nominal(&network, "B225", None), Some(225.0));
        assert_eq!(nominal(&network, "LD", None), Some(63.0));
        assert!(network.locatable("unknown").is_none());
    }
}
