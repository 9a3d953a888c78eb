//! Unit newtypes for the static quantities of the network model.
//!
//! Nominal voltages, limits and setpoints are typed so that a voltage limit
//! cannot be compared against a current limit by accident. Solved variant
//! state stays in plain `f64` because it carries NaN for "not computed".
//!
//! ```
//! use gridsec_core::units::{Degrees, Kilovolts};
//!
//! assert!((Kilovolts(380.0).to_per_unit(Kilovolts(400.0)) - 0.95).abs() < 1e-12);
//! assert!((Degrees(180.0).to_radians() - std::f64::consts::PI).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! quantity {
    ($(#[$doc:meta])* $name:ident, $symbol:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn is_nan(self) -> bool {
                self.0.is_nan()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.0, $symbol)
            }
        }
    };
}

quantity!(
    /// Active power (MW)
    Megawatts,
    "MW"
);

quantity!(
    /// Reactive power (Mvar)
    Megavars,
    "Mvar"
);

quantity!(
    /// Current magnitude (A), the unit of every current limit
    Amperes,
    "A"
);

quantity!(
    /// Phase-to-phase voltage (kV)
    Kilovolts,
    "kV"
);

quantity!(
    /// Angle (°), used for phase shifts and angle limits
    Degrees,
    "°"
);

impl Kilovolts {
    /// Ratio to `base`; zero when the base is zero.
    #[inline]
    pub fn to_per_unit(self, base: Kilovolts) -> f64 {
        if base.0.abs() < 1e-12 {
            0.0
        } else {
            self.0 / base.0
        }
    }
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }
}
