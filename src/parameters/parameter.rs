//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the fundamental building block
//! of the element model. Parameters carry a physical dimension and a display
//! unit, store their magnitude internally in SI units, and can be driven by
//! formulas through the registry in [`crate::parameters::formula`].

use crate::units::{Dim, Unit, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Value {value} has dimension {value_dim:?}, parameter '{alias}' expects {dim:?}")]
    DimMismatch {
        alias: String,
        dim: Dim,
        value: f64,
        value_dim: Dim,
    },

    #[error("Parameter '{alias}' already exists")]
    DuplicateAlias { alias: String },

    #[error("Parameter '{alias}' not found")]
    NotFound { alias: String },

    #[error("Unknown unit label '{label}'")]
    UnknownUnit { label: String },
}

/// A named, unit-typed scalar value.
///
/// The magnitude is kept in SI units regardless of the display unit, so every
/// computation in the engine reads consistent numbers. Parameters are plain
/// values: a clone is fully independent of the original, which is what the
/// shadow-editing protocol in [`crate::parameters::FormulaDraft`] relies on.
///
/// # Examples
///
/// ```
/// use paraxial_rs::parameters::Parameter;
/// use paraxial_rs::units::{Dim, Unit, Value};
///
/// let mut param = Parameter::new(Dim::Linear, "L");
/// param.set_value(Value::new(100.0, Unit::Mm)).unwrap();
/// assert_eq!(param.value_si(), 0.1);
/// assert_eq!(param.value().magnitude, 100.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ParamRepr", try_from = "ParamRepr")]
pub struct Parameter {
    alias: String,
    description: String,
    dim: Dim,
    unit: Unit,
    value_si: f64,
}

impl Parameter {
    /// Create a new parameter with the given dimension and alias.
    ///
    /// The display unit starts as the dimension's SI unit and the value as
    /// zero.
    pub fn new(dim: Dim, alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            description: String::new(),
            dim,
            unit: dim.si_unit(),
            value_si: 0.0,
        }
    }

    /// Create a new parameter with a human-readable description.
    ///
    /// # Examples
    ///
    /// ```
    /// use paraxial_rs::parameters::Parameter;
    /// use paraxial_rs::units::Dim;
    ///
    /// let param = Parameter::with_description(Dim::None, "n", "Index of refraction");
    /// assert_eq!(param.alias(), "n");
    /// assert_eq!(param.description(), "Index of refraction");
    /// ```
    pub fn with_description(dim: Dim, alias: &str, description: &str) -> Self {
        let mut param = Self::new(dim, alias);
        param.description = description.to_string();
        param
    }

    /// Get the alias (string identity) of the parameter.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Get the human-readable description of the parameter.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the physical dimension of the parameter.
    pub fn dim(&self) -> Dim {
        self.dim
    }

    /// Get the preferred display unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Change the preferred display unit.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the unit belongs to this parameter's dimension, or a
    /// `DimMismatch` error otherwise. The stored SI magnitude is unaffected.
    pub fn set_unit(&mut self, unit: Unit) -> Result<(), ParameterError> {
        if unit.dim() != self.dim {
            return Err(ParameterError::DimMismatch {
                alias: self.alias.clone(),
                dim: self.dim,
                value: self.value_si,
                value_dim: unit.dim(),
            });
        }
        self.unit = unit;
        Ok(())
    }

    /// Get the current value expressed in the display unit.
    pub fn value(&self) -> Value {
        Value::new(self.unit.from_si(self.value_si), self.unit)
    }

    /// Get the current SI magnitude.
    pub fn value_si(&self) -> f64 {
        self.value_si
    }

    /// Set the value of the parameter.
    ///
    /// The value's unit becomes the new display unit.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the value's unit matches this parameter's dimension, or a
    /// `DimMismatch` error otherwise (in which case nothing changes).
    pub fn set_value(&mut self, value: Value) -> Result<(), ParameterError> {
        if value.unit.dim() != self.dim {
            return Err(ParameterError::DimMismatch {
                alias: self.alias.clone(),
                dim: self.dim,
                value: value.magnitude,
                value_dim: value.unit.dim(),
            });
        }
        self.unit = value.unit;
        self.value_si = value.to_si();
        Ok(())
    }

    /// Set the SI magnitude directly, keeping the display unit.
    pub fn set_si(&mut self, value_si: f64) {
        self.value_si = value_si;
    }
}

/// Persistence shape of a parameter: alias, unit label, display magnitude.
#[derive(Serialize, Deserialize)]
struct ParamRepr {
    alias: String,
    #[serde(default)]
    description: String,
    unit: String,
    value: f64,
}

impl From<Parameter> for ParamRepr {
    fn from(param: Parameter) -> Self {
        ParamRepr {
            alias: param.alias.clone(),
            description: param.description.clone(),
            unit: param.unit.label().to_string(),
            value: param.value().magnitude,
        }
    }
}

impl TryFrom<ParamRepr> for Parameter {
    type Error = ParameterError;

    fn try_from(repr: ParamRepr) -> Result<Self, Self::Error> {
        let unit = Unit::from_label(&repr.unit).ok_or(ParameterError::UnknownUnit {
            label: repr.unit.clone(),
        })?;
        let mut param = Parameter::with_description(unit.dim(), &repr.alias, &repr.description);
        param.unit = unit;
        param.value_si = unit.to_si(repr.value);
        Ok(param)
    }
}
