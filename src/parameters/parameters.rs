//! Parameters collection implementation
//!
//! This module provides the Parameters struct, an ordered collection of
//! Parameter objects with unique aliases. Elements keep their owned
//! parameters in one, and the formula registry evaluates expressions against
//! one. Insertion order is preserved because an element's parameter order is
//! part of its persistent identity.

use crate::parameters::expression::{EvaluationContext, ExpressionError, ExprResult};
use crate::parameters::parameter::{Parameter, ParameterError};
use crate::units::Value;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// An ordered collection of parameters with unique aliases.
///
/// # Examples
///
/// ```
/// use paraxial_rs::parameters::{Parameter, Parameters};
/// use paraxial_rs::units::{Dim, Unit, Value};
///
/// let mut params = Parameters::new();
/// params.add(Parameter::new(Dim::Linear, "L")).unwrap();
/// params.set_value("L", Value::new(100.0, Unit::Mm)).unwrap();
/// assert_eq!(params.get("L").unwrap().value_si(), 0.1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    items: Vec<Parameter>,
}

impl Parameters {
    /// Create a new empty parameters collection
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a parameter to the collection.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the parameter was added, or a `DuplicateAlias` error if a
    /// parameter with the same alias already exists.
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.contains(param.alias()) {
            return Err(ParameterError::DuplicateAlias {
                alias: param.alias().to_string(),
            });
        }
        self.items.push(param);
        Ok(())
    }

    /// Get a parameter by alias.
    pub fn get(&self, alias: &str) -> Option<&Parameter> {
        self.items.iter().find(|p| p.alias() == alias)
    }

    /// Get a mutable reference to a parameter by alias.
    pub fn get_mut(&mut self, alias: &str) -> Option<&mut Parameter> {
        self.items.iter_mut().find(|p| p.alias() == alias)
    }

    /// Get a parameter by position in the collection.
    pub fn by_index(&self, index: usize) -> Option<&Parameter> {
        self.items.get(index)
    }

    /// Check if the collection contains a parameter with the given alias.
    pub fn contains(&self, alias: &str) -> bool {
        self.items.iter().any(|p| p.alias() == alias)
    }

    /// Remove a parameter from the collection.
    ///
    /// # Returns
    ///
    /// The removed parameter, or `None` if no such parameter exists.
    pub fn remove(&mut self, alias: &str) -> Option<Parameter> {
        let index = self.items.iter().position(|p| p.alias() == alias)?;
        Some(self.items.remove(index))
    }

    /// Get the number of parameters in the collection.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the aliases of all parameters, in collection order.
    pub fn aliases(&self) -> Vec<String> {
        self.items.iter().map(|p| p.alias().to_string()).collect()
    }

    /// Get an iterator over the parameters, in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    /// Set the value of a parameter by alias.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the parameter exists and the value's dimension matches,
    /// or an error otherwise.
    pub fn set_value(&mut self, alias: &str, value: Value) -> Result<(), ParameterError> {
        let param = self.get_mut(alias).ok_or(ParameterError::NotFound {
            alias: alias.to_string(),
        })?;
        param.set_value(value)
    }

    /// Set the SI magnitude of a parameter by alias, keeping its display unit.
    pub fn set_si(&mut self, alias: &str, value_si: f64) -> Result<(), ParameterError> {
        let param = self.get_mut(alias).ok_or(ParameterError::NotFound {
            alias: alias.to_string(),
        })?;
        param.set_si(value_si);
        Ok(())
    }

    /// Serialize the collection to a JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize a collection from a JSON string.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the collection to a JSON file.
    pub fn save_json(&self, path: &Path) -> crate::error::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load a collection from a JSON file.
    pub fn load_json(path: &Path) -> crate::error::Result<Self> {
        let mut file = File::open(path)?;
        let mut json = String::new();
        file.read_to_string(&mut json)?;
        Self::from_json(&json)
    }
}

/// Expressions resolve identifiers to parameter SI magnitudes.
impl EvaluationContext for Parameters {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .map(|p| p.value_si())
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn variable_names(&self) -> Vec<String> {
        self.aliases()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Dim, Unit};

    fn sample() -> Parameters {
        let mut params = Parameters::new();
        params.add(Parameter::new(Dim::Linear, "L")).unwrap();
        params
            .add(Parameter::with_description(Dim::None, "n", "Index of refraction"))
            .unwrap();
        params.set_value("L", Value::new(100.0, Unit::Mm)).unwrap();
        params.set_value("n", Value::none(1.5)).unwrap();
        params
    }

    #[test]
    fn test_add_and_lookup() {
        let params = sample();
        assert_eq!(params.len(), 2);
        assert!(params.contains("L"));
        assert!(!params.contains("R"));
        assert_eq!(params.get("n").unwrap().value_si(), 1.5);
        assert!(params.get("R").is_none());
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut params = sample();
        let err = params.add(Parameter::new(Dim::Linear, "L")).unwrap_err();
        assert!(matches!(err, ParameterError::DuplicateAlias { .. }));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_order_preserved() {
        let params = sample();
        assert_eq!(params.aliases(), vec!["L".to_string(), "n".to_string()]);
        assert_eq!(params.by_index(0).unwrap().alias(), "L");
        assert_eq!(params.by_index(1).unwrap().alias(), "n");
    }

    #[test]
    fn test_remove() {
        let mut params = sample();
        let removed = params.remove("L").unwrap();
        assert_eq!(removed.alias(), "L");
        assert_eq!(params.len(), 1);
        assert!(params.remove("L").is_none());
    }

    #[test]
    fn test_set_missing_parameter() {
        let mut params = sample();
        let err = params.set_value("R", Value::none(1.0)).unwrap_err();
        assert!(matches!(err, ParameterError::NotFound { .. }));
        assert!(params.set_si("R", 1.0).is_err());
    }

    #[test]
    fn test_evaluation_context() {
        let params = sample();
        assert_eq!(params.get_variable("L").unwrap(), 0.1);
        assert!(params.has_variable("n"));
        assert!(params.get_variable("R").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let params = sample();
        let json = params.to_json().unwrap();

        let back = Parameters::from_json(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.aliases(), params.aliases());
        assert_eq!(back.get("L").unwrap().value_si(), 0.1);
        assert_eq!(back.get("L").unwrap().unit(), Unit::Mm);
        assert_eq!(back.get("n").unwrap().value_si(), 1.5);
        assert_eq!(back.get("n").unwrap().description(), "Index of refraction");
    }
}
