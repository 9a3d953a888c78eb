//! Small networks shared by unit and integration tests.

use gridsec_contingency::Contingency;
use gridsec_core::{
    Amperes, Branch, Bus, Country, CurrentLimits, Generator, GridSecResult, Kilovolts, Load,
    Megavars, Megawatts, Network, NetworkBuilder, Substation, TwoSides, VoltageLevel,
};

/// One 400 kV line feeding a load from a single generator.
pub fn two_bus_network(load: Megawatts) -> GridSecResult<Network> {
    NetworkBuilder::new("two-bus")
        .with_voltage_level(VoltageLevel::new("VL400", Kilovolts(400.0)))
        .with_bus(Bus::new("B1", "VL400"))
        .with_bus(Bus::new("B2", "VL400"))
        .with_branch(Branch::new("L12", "B1", "B2", 0.01, 0.1))
        .with_generator(Generator::new("G1", "B1", load))
        .with_load(Load::new("LD2", "B2", load, Megavars(10.0)))
        .build()
}

/// A 400 kV triangle carrying 600 MW from B1 to B3.
///
/// The direct line L13 takes about two thirds of the transfer, the path
/// through B2 the rest. Only L12 has limits tight enough to be exceeded:
/// roughly 290 A in the base case (below its 500 A permanent limit) and
/// about 870 A once L13 trips, which lands between its 10' (700 A) and
/// 1' (1000 A) temporary limits.
pub fn triangle_network() -> GridSecResult<Network> {
    let l12_limits = CurrentLimits::new(Amperes(500.0))
        .with_temporary_limit("10'", 600, Amperes(700.0))
        .with_temporary_limit("1'", 60, Amperes(1000.0));

    NetworkBuilder::new("triangle")
        .with_case_date("2024-01-15T10:00:00Z")
        .with_substation(Substation::new("S1").with_country(Country::new("FR")))
        .with_substation(Substation::new("S2").with_country(Country::new("BE")))
        .with_voltage_level(
            VoltageLevel::new("VL1", Kilovolts(400.0))
                .with_substation("S1")
                .with_voltage_limits(Some(Kilovolts(380.0)), Some(Kilovolts(420.0))),
        )
        .with_voltage_level(
            VoltageLevel::new("VL2", Kilovolts(400.0))
                .with_substation("S2")
                .with_voltage_limits(Some(Kilovolts(380.0)), Some(Kilovolts(420.0))),
        )
        .with_bus(Bus::new("B1", "VL1"))
        .with_bus(Bus::new("B2", "VL2"))
        .with_bus(Bus::new("B3", "VL1"))
        .with_branch(
            Branch::new("L12", "B1", "B2", 0.0005, 0.01)
                .with_current_limits(TwoSides::One, l12_limits.clone())
                .with_current_limits(TwoSides::Two, l12_limits),
        )
        .with_branch(Branch::new("L23", "B2", "B3", 0.0005, 0.01))
        .with_branch(
            Branch::new("L13", "B1", "B3", 0.0005, 0.01)
                .with_current_limits(TwoSides::One, CurrentLimits::new(Amperes(2000.0))),
        )
        .with_generator(Generator::new("G1", "B1", Megawatts(600.0)))
        .with_load(Load::new("LD3", "B3", Megawatts(600.0), Megavars(0.0)))
        .build()
}

/// One single-branch contingency per line of [`triangle_network`].
pub fn triangle_contingencies() -> Vec<Contingency> {
    ["L12", "L23", "L13"]
        .into_iter()
        .map(Contingency::branch)
        .collect()
}
