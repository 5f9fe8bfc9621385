//! Units of measurement for parameter values
//!
//! Parameters store their magnitudes internally in SI units (meters, radians).
//! A [`Unit`] describes how a magnitude is presented to the user; conversion
//! to and from SI is a pure function of the unit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit family. Every parameter belongs to exactly one dimension and only
/// accepts values carrying a unit of that dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dim {
    /// Dimensionless quantities (indices of refraction, matrix entries).
    None,

    /// Lengths and distances. SI unit is the meter.
    Linear,

    /// Angles. SI unit is the radian.
    Angular,
}

impl Dim {
    /// The unit used for SI-canonical storage of this dimension.
    pub fn si_unit(&self) -> Unit {
        match self {
            Dim::None => Unit::None,
            Dim::Linear => Unit::M,
            Dim::Angular => Unit::Rad,
        }
    }
}

/// A concrete unit of measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    None,
    Nm,
    Mkm,
    Mm,
    Cm,
    M,
    Rad,
    Deg,
    Mrad,
}

impl Unit {
    /// The dimension this unit belongs to.
    pub fn dim(&self) -> Dim {
        match self {
            Unit::None => Dim::None,
            Unit::Nm | Unit::Mkm | Unit::Mm | Unit::Cm | Unit::M => Dim::Linear,
            Unit::Rad | Unit::Deg | Unit::Mrad => Dim::Angular,
        }
    }

    /// Convert a magnitude expressed in this unit to its SI equivalent.
    pub fn to_si(&self, value: f64) -> f64 {
        match self {
            Unit::None | Unit::M | Unit::Rad => value,
            Unit::Nm => value * 1e-9,
            Unit::Mkm => value * 1e-6,
            Unit::Mm => value * 1e-3,
            Unit::Cm => value * 1e-2,
            Unit::Deg => value.to_radians(),
            Unit::Mrad => value * 1e-3,
        }
    }

    /// Convert an SI magnitude to this unit.
    pub fn from_si(&self, value: f64) -> f64 {
        match self {
            Unit::None | Unit::M | Unit::Rad => value,
            Unit::Nm => value * 1e9,
            Unit::Mkm => value * 1e6,
            Unit::Mm => value * 1e3,
            Unit::Cm => value * 1e2,
            Unit::Deg => value.to_degrees(),
            Unit::Mrad => value * 1e3,
        }
    }

    /// Short display label, e.g. `"mm"`.
    pub fn label(&self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Nm => "nm",
            Unit::Mkm => "um",
            Unit::Mm => "mm",
            Unit::Cm => "cm",
            Unit::M => "m",
            Unit::Rad => "rad",
            Unit::Deg => "deg",
            Unit::Mrad => "mrad",
        }
    }

    /// Look a unit up by its display label.
    pub fn from_label(label: &str) -> Option<Unit> {
        match label {
            "" => Some(Unit::None),
            "nm" => Some(Unit::Nm),
            "um" => Some(Unit::Mkm),
            "mm" => Some(Unit::Mm),
            "cm" => Some(Unit::Cm),
            "m" => Some(Unit::M),
            "rad" => Some(Unit::Rad),
            "deg" => Some(Unit::Deg),
            "mrad" => Some(Unit::Mrad),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A magnitude together with the unit it is expressed in.
///
/// This is the user-facing representation of a parameter value; the parameter
/// itself keeps the SI magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Value {
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    /// A dimensionless value.
    pub fn none(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::None)
    }

    /// The SI equivalent of this value.
    pub fn to_si(&self) -> f64 {
        self.unit.to_si(self.magnitude)
    }

    /// The same physical value expressed in another unit of the same
    /// dimension. Returns `None` on a dimension mismatch.
    pub fn to_unit(&self, unit: Unit) -> Option<Value> {
        if unit.dim() != self.unit.dim() {
            return None;
        }
        Some(Value::new(unit.from_si(self.to_si()), unit))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit == Unit::None {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_dims() {
        assert_eq!(Unit::Mm.dim(), Dim::Linear);
        assert_eq!(Unit::Deg.dim(), Dim::Angular);
        assert_eq!(Unit::None.dim(), Dim::None);
        assert_eq!(Dim::Linear.si_unit(), Unit::M);
        assert_eq!(Dim::Angular.si_unit(), Unit::Rad);
    }

    #[test]
    fn test_si_conversion() {
        assert_eq!(Unit::Mm.to_si(100.0), 0.1);
        assert_eq!(Unit::Mm.from_si(0.1), 100.0);
        assert_eq!(Unit::Nm.to_si(980.0), 980e-9);
        assert_eq!(Unit::Cm.to_si(5.0), 0.05);
        assert!((Unit::Deg.to_si(180.0) - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(Unit::None.to_si(1.5), 1.5);
    }

    #[test]
    fn test_value_conversion() {
        let v = Value::new(100.0, Unit::Mm);
        assert_eq!(v.to_si(), 0.1);

        let cm = v.to_unit(Unit::Cm).unwrap();
        assert_eq!(cm.magnitude, 10.0);
        assert_eq!(cm.unit, Unit::Cm);

        // Cross-dimension conversion is rejected
        assert!(v.to_unit(Unit::Deg).is_none());
    }

    #[test]
    fn test_label_round_trip() {
        for unit in [
            Unit::None,
            Unit::Nm,
            Unit::Mkm,
            Unit::Mm,
            Unit::Cm,
            Unit::M,
            Unit::Rad,
            Unit::Deg,
            Unit::Mrad,
        ] {
            assert_eq!(Unit::from_label(unit.label()), Some(unit));
        }
        assert_eq!(Unit::from_label("furlong"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::new(3.5, Unit::Mm).to_string(), "3.5 mm");
        assert_eq!(Value::none(1.5).to_string(), "1.5");
    }
}
