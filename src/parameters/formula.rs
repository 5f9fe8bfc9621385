//! Formula-backed parameter values
//!
//! A [`Formula`] binds an arithmetic expression to a target parameter; the
//! [`Formulas`] registry keys formulas by target alias and guards the
//! dependency graph against cycles. Evaluation failures are reported through
//! the formula status and never mutate the target parameter.
//!
//! Editing goes through a [`FormulaDraft`]: a shadow parameter/formula pair
//! that leaves the live objects untouched until an explicit `apply`.

use crate::parameters::expression::{Expression, ExpressionError};
use crate::parameters::parameter::{Parameter, ParameterError};
use crate::parameters::parameters::Parameters;
use crate::units::Value;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced when registering or committing formulas
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Failed to parse formula for '{target}': {message}")]
    Parse { target: String, message: String },

    #[error("Circular dependency in formula for '{target}'")]
    CircularDependency { target: String },
}

/// Result of the last evaluation of a formula, queryable as text for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormulaStatus {
    #[default]
    Ok,
    Error(String),
}

impl fmt::Display for FormulaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaStatus::Ok => write!(f, "OK"),
            FormulaStatus::Error(message) => write!(f, "{}", message),
        }
    }
}

/// An expression producing the value of one target parameter.
///
/// What the external serializer sees is the (target parameter name,
/// expression text) pair; status and dependencies are evaluation state and
/// rebuild on the next parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "FormulaRepr", from = "FormulaRepr")]
pub struct Formula {
    target: String,
    code: String,
    status: FormulaStatus,
    deps: Vec<String>,
}

/// Persistence shape of a formula.
#[derive(Serialize, Deserialize)]
struct FormulaRepr {
    target: String,
    code: String,
}

impl From<Formula> for FormulaRepr {
    fn from(formula: Formula) -> Self {
        FormulaRepr {
            target: formula.target,
            code: formula.code,
        }
    }
}

impl From<FormulaRepr> for Formula {
    fn from(repr: FormulaRepr) -> Self {
        Formula::with_code(&repr.target, &repr.code)
    }
}

impl Formula {
    /// Create an empty formula for the given target parameter alias.
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            code: String::new(),
            status: FormulaStatus::Ok,
            deps: Vec::new(),
        }
    }

    /// Create a formula with expression code.
    pub fn with_code(target: &str, code: &str) -> Self {
        let mut formula = Self::new(target);
        formula.set_code(code);
        formula
    }

    /// The alias of the parameter this formula computes.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The expression text.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Replace the expression text. The dependency set refreshes on the next
    /// parse (registration or calculation).
    pub fn set_code(&mut self, code: &str) {
        self.code = code.to_string();
    }

    /// Whether the last evaluation succeeded.
    pub fn ok(&self) -> bool {
        self.status == FormulaStatus::Ok
    }

    /// Status text of the last evaluation ("OK" or an error message).
    pub fn status(&self) -> String {
        self.status.to_string()
    }

    /// Aliases of the parameters the expression currently reads.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    fn fail(&mut self, message: String) -> bool {
        debug!(target: "paraxial::formula", formula = %self.target, %message, "formula rejected");
        self.status = FormulaStatus::Error(message);
        false
    }
}

/// Registry of formulas keyed by target parameter alias.
#[derive(Debug, Clone, Default)]
pub struct Formulas {
    items: HashMap<String, Formula>,
}

impl Formulas {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Get the formula currently producing the given parameter's value.
    pub fn get(&self, target: &str) -> Option<&Formula> {
        self.items.get(target)
    }

    /// Number of registered formulas.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Register or replace the formula for its target parameter.
    ///
    /// The code is parsed and the dependency set checked against the registry
    /// before anything is stored: a malformed expression or a (transitive)
    /// cycle leaves the registry unchanged.
    pub fn put(&mut self, mut formula: Formula) -> Result<(), FormulaError> {
        let expr = Expression::parse(formula.code()).map_err(|e| FormulaError::Parse {
            target: formula.target().to_string(),
            message: e.to_string(),
        })?;

        let deps = expr.variables();
        if self.would_cycle(formula.target(), &deps) {
            debug!(target: "paraxial::formula", formula = %formula.target(), "cycle rejected");
            return Err(FormulaError::CircularDependency {
                target: formula.target().to_string(),
            });
        }

        formula.deps = deps;
        self.items.insert(formula.target().to_string(), formula);
        Ok(())
    }

    /// Detach and return the formula for a parameter, reverting it to a plain
    /// editable value.
    pub fn free(&mut self, target: &str) -> Option<Formula> {
        self.items.remove(target)
    }

    /// Check whether the value of `who` (transitively) depends on `on`
    /// through registered formulas.
    pub fn depends_on(&self, who: &str, on: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![who.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(formula) = self.items.get(&current) {
                for dep in formula.deps() {
                    if dep == on {
                        return true;
                    }
                    stack.push(dep.clone());
                }
            }
        }

        false
    }

    fn would_cycle(&self, target: &str, deps: &[String]) -> bool {
        deps.iter()
            .any(|dep| dep == target || self.depends_on(dep, target))
    }

    /// Evaluate the formula for `target` and write the result into the
    /// parameter collection.
    ///
    /// Returns `true` on success. On any failure (no such formula,
    /// malformed code, unresolved identifier, cycle, evaluation fault) the
    /// target parameter keeps its value and the failure is recorded in the
    /// formula status.
    pub fn calculate(&mut self, target: &str, params: &mut Parameters) -> bool {
        // Cycle detection walks the rest of the registry, so pull the
        // formula out for the duration of its own evaluation.
        let Some(mut formula) = self.items.remove(target) else {
            return false;
        };
        let ok = self.calculate_one(&mut formula, params);
        self.items.insert(target.to_string(), formula);
        ok
    }

    fn calculate_one(&self, formula: &mut Formula, params: &mut Parameters) -> bool {
        let expr = match Expression::parse(formula.code()) {
            Ok(expr) => expr,
            Err(e) => return formula.fail(e.to_string()),
        };

        let deps = expr.variables();
        formula.deps = deps.clone();

        if !params.contains(formula.target()) {
            let message = format!("target parameter '{}' not found", formula.target());
            return formula.fail(message);
        }
        for dep in &deps {
            if !params.contains(dep) {
                return formula.fail(
                    ExpressionError::UndefinedVariable {
                        name: dep.clone(),
                    }
                    .to_string(),
                );
            }
        }
        if self.would_cycle(formula.target(), &deps) {
            let message = format!("circular dependency on '{}'", formula.target());
            return formula.fail(message);
        }

        let value = match expr.evaluate(params) {
            Ok(value) => value,
            Err(e) => return formula.fail(e.to_string()),
        };

        // Checked above, cannot fail
        let _ = params.set_si(formula.target(), value);
        formula.status = FormulaStatus::Ok;
        true
    }

    /// Evaluate every registered formula in dependency order.
    ///
    /// Returns `true` when all formulas evaluated cleanly; individual
    /// failures are recorded in each formula's status.
    pub fn calculate_all(&mut self, params: &mut Parameters) -> bool {
        let mut all_ok = true;
        for target in self.evaluation_order() {
            if !self.calculate(&target, params) {
                all_ok = false;
            }
        }
        all_ok
    }

    /// Topological order of formula targets: dependencies evaluate before
    /// the formulas reading them. Targets on a dependency cycle keep
    /// registration order; `calculate` reports them individually.
    fn evaluation_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();

        fn visit(
            target: &str,
            items: &HashMap<String, Formula>,
            visited: &mut HashSet<String>,
            order: &mut Vec<String>,
        ) {
            if !visited.insert(target.to_string()) {
                return;
            }
            if let Some(formula) = items.get(target) {
                for dep in formula.deps() {
                    visit(dep, items, visited, order);
                }
                order.push(target.to_string());
            }
        }

        let mut targets: Vec<_> = self.items.keys().cloned().collect();
        targets.sort();
        for target in targets {
            visit(&target, &self.items, &mut visited, &mut order);
        }

        order
    }
}

/// A shadow parameter/formula pair for edit preview.
///
/// A draft clones the real parameter and (if registered) its formula code, so
/// every edit and recalculation touches only the shadow. Dropping a draft has
/// no side effects; committing copies the resolved code and value back
/// through [`Formulas::put`]/[`Formulas::free`] plus a direct value set.
///
/// # Examples
///
/// ```
/// use paraxial_rs::parameters::{FormulaDraft, Formulas, Parameter, Parameters};
/// use paraxial_rs::units::{Dim, Value};
///
/// let mut params = Parameters::new();
/// params.add(Parameter::new(Dim::None, "x")).unwrap();
/// params.add(Parameter::new(Dim::None, "y")).unwrap();
/// params.set_value("x", Value::none(5.0)).unwrap();
/// let mut formulas = Formulas::new();
///
/// let mut draft = FormulaDraft::new(params.get("y").unwrap(), &formulas);
/// draft.add_formula();
/// draft.set_code("2 * x + 3");
/// assert!(draft.recalculate(&params, &formulas));
/// assert_eq!(draft.value_si(), 13.0);
/// // The live parameter is untouched until apply
/// assert_eq!(params.get("y").unwrap().value_si(), 0.0);
///
/// draft.apply(&mut formulas, &mut params).unwrap();
/// assert_eq!(params.get("y").unwrap().value_si(), 13.0);
/// assert!(formulas.get("y").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct FormulaDraft {
    param: Parameter,
    formula: Formula,
    has_formula: bool,
}

impl FormulaDraft {
    /// Start editing against a shadow copy of `real`, picking up its
    /// registered formula code if any.
    pub fn new(real: &Parameter, formulas: &Formulas) -> Self {
        let mut formula = Formula::new(real.alias());
        let has_formula = match formulas.get(real.alias()) {
            Some(registered) => {
                formula.set_code(registered.code());
                true
            }
            None => false,
        };
        Self {
            param: real.clone(),
            formula,
            has_formula,
        }
    }

    /// The shadow parameter.
    pub fn param(&self) -> &Parameter {
        &self.param
    }

    /// Current preview value in the display unit.
    pub fn value(&self) -> Value {
        self.param.value()
    }

    /// Current preview value as SI magnitude.
    pub fn value_si(&self) -> f64 {
        self.param.value_si()
    }

    /// Edit the plain value of the shadow parameter.
    pub fn set_value(&mut self, value: Value) -> Result<(), ParameterError> {
        self.param.set_value(value)
    }

    /// Whether the draft currently carries a formula.
    pub fn has_formula(&self) -> bool {
        self.has_formula
    }

    /// Switch the draft to formula-backed editing.
    pub fn add_formula(&mut self) {
        self.has_formula = true;
    }

    /// Switch the draft back to plain-value editing.
    pub fn remove_formula(&mut self) {
        self.has_formula = false;
    }

    /// The shadow formula code.
    pub fn code(&self) -> &str {
        self.formula.code()
    }

    /// Replace the shadow formula code.
    pub fn set_code(&mut self, code: &str) {
        self.formula.set_code(code);
    }

    /// Whether the last preview evaluation succeeded.
    pub fn ok(&self) -> bool {
        self.formula.ok()
    }

    /// Status text of the last preview evaluation.
    pub fn status(&self) -> String {
        self.formula.status()
    }

    /// Re-evaluate the shadow formula against the live parameters, writing
    /// the result only into the shadow parameter.
    ///
    /// `formulas` is consulted for transitive cycles exactly as if the
    /// shadow were registered.
    pub fn recalculate(&mut self, params: &Parameters, formulas: &Formulas) -> bool {
        if !self.has_formula {
            return true;
        }

        let expr = match Expression::parse(self.formula.code()) {
            Ok(expr) => expr,
            Err(e) => return self.formula.fail(e.to_string()),
        };

        let deps = expr.variables();
        self.formula.deps = deps.clone();

        for dep in &deps {
            if !params.contains(dep) {
                return self.formula.fail(
                    ExpressionError::UndefinedVariable {
                        name: dep.clone(),
                    }
                    .to_string(),
                );
            }
        }
        if deps
            .iter()
            .any(|dep| dep == self.formula.target() || formulas.depends_on(dep, self.formula.target()))
        {
            let message = format!("circular dependency on '{}'", self.formula.target());
            return self.formula.fail(message);
        }

        match expr.evaluate(params) {
            Ok(value) => {
                self.param.set_si(value);
                self.formula.status = FormulaStatus::Ok;
                true
            }
            Err(e) => self.formula.fail(e.to_string()),
        }
    }

    /// Commit the draft: register/detach the formula and copy the shadow
    /// value into the live parameter.
    ///
    /// On failure (e.g. a cycle the registry rejects) nothing is committed.
    pub fn apply(
        &self,
        formulas: &mut Formulas,
        params: &mut Parameters,
    ) -> crate::error::Result<()> {
        if self.has_formula {
            formulas.put(Formula::with_code(
                self.formula.target(),
                self.formula.code(),
            ))?;
        } else {
            formulas.free(self.formula.target());
        }
        params.set_value(self.formula.target(), self.param.value())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Dim, Unit};

    fn params_ab() -> Parameters {
        let mut params = Parameters::new();
        params.add(Parameter::new(Dim::None, "A")).unwrap();
        params.add(Parameter::new(Dim::None, "B")).unwrap();
        params.set_value("A", Value::none(1.0)).unwrap();
        params.set_value("B", Value::none(2.0)).unwrap();
        params
    }

    #[test]
    fn test_registry_get_put_free() {
        let mut formulas = Formulas::new();
        assert!(formulas.is_empty());

        formulas.put(Formula::with_code("A", "B + 1")).unwrap();
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas.get("A").unwrap().code(), "B + 1");
        assert!(formulas.get("B").is_none());

        // put replaces
        formulas.put(Formula::with_code("A", "B * 2")).unwrap();
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas.get("A").unwrap().code(), "B * 2");

        let freed = formulas.free("A").unwrap();
        assert_eq!(freed.code(), "B * 2");
        assert!(formulas.is_empty());
    }

    #[test]
    fn test_put_rejects_malformed_code() {
        let mut formulas = Formulas::new();
        let err = formulas.put(Formula::with_code("A", "B +")).unwrap_err();
        assert!(matches!(err, FormulaError::Parse { .. }));
        assert!(formulas.is_empty());
    }

    #[test]
    fn test_calculate_round_trip() {
        let mut params = Parameters::new();
        params.add(Parameter::new(Dim::Linear, "L")).unwrap();
        params.add(Parameter::new(Dim::Linear, "L2")).unwrap();
        params.set_value("L", Value::new(5.0, Unit::M)).unwrap();

        let mut formulas = Formulas::new();
        formulas.put(Formula::with_code("L2", "2*L + 3")).unwrap();

        assert!(formulas.calculate("L2", &mut params));
        assert_eq!(params.get("L2").unwrap().value_si(), 13.0);
        assert!(formulas.get("L2").unwrap().ok());
        assert_eq!(formulas.get("L2").unwrap().status(), "OK");

        params.set_value("L", Value::new(10.0, Unit::M)).unwrap();
        assert!(formulas.calculate("L2", &mut params));
        assert_eq!(params.get("L2").unwrap().value_si(), 23.0);
    }

    #[test]
    fn test_cycle_rejected_on_put() {
        let mut params = params_ab();
        let mut formulas = Formulas::new();

        formulas.put(Formula::with_code("A", "B + 1")).unwrap();
        assert!(formulas.calculate("A", &mut params));
        assert_eq!(params.get("A").unwrap().value_si(), 3.0);

        // Closing the loop must fail and leave B untouched
        let err = formulas.put(Formula::with_code("B", "A + 1")).unwrap_err();
        assert_eq!(
            err,
            FormulaError::CircularDependency {
                target: "B".to_string()
            }
        );
        assert!(formulas.get("B").is_none());
        assert_eq!(params.get("B").unwrap().value_si(), 2.0);
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut formulas = Formulas::new();
        let err = formulas.put(Formula::with_code("A", "A + 1")).unwrap_err();
        assert!(matches!(err, FormulaError::CircularDependency { .. }));
    }

    #[test]
    fn test_calculate_failures_leave_target() {
        let mut params = params_ab();
        let mut formulas = Formulas::new();

        formulas.put(Formula::with_code("A", "B + C")).unwrap();
        assert!(!formulas.calculate("A", &mut params));
        let formula = formulas.get("A").unwrap();
        assert!(!formula.ok());
        assert!(formula.status().contains("C"));
        assert_eq!(params.get("A").unwrap().value_si(), 1.0);

        // Division by zero is a status, not a fault
        formulas.put(Formula::with_code("A", "B / 0")).unwrap();
        assert!(!formulas.calculate("A", &mut params));
        assert!(formulas.get("A").unwrap().status().contains("zero"));
        assert_eq!(params.get("A").unwrap().value_si(), 1.0);
    }

    #[test]
    fn test_calculate_missing_formula() {
        let mut params = params_ab();
        let mut formulas = Formulas::new();
        assert!(!formulas.calculate("A", &mut params));
    }

    #[test]
    fn test_depends_on_transitive() {
        let mut formulas = Formulas::new();
        formulas.put(Formula::with_code("A", "B + 1")).unwrap();
        formulas.put(Formula::with_code("B", "C * 2")).unwrap();

        assert!(formulas.depends_on("A", "B"));
        assert!(formulas.depends_on("A", "C"));
        assert!(formulas.depends_on("B", "C"));
        assert!(!formulas.depends_on("C", "A"));
        assert!(!formulas.depends_on("B", "A"));
    }

    #[test]
    fn test_calculate_all_in_dependency_order() {
        let mut params = Parameters::new();
        for alias in ["A", "B", "C"] {
            params.add(Parameter::new(Dim::None, alias)).unwrap();
        }
        params.set_value("C", Value::none(2.0)).unwrap();

        let mut formulas = Formulas::new();
        // Registered "upstream last" on purpose
        formulas.put(Formula::with_code("A", "B + 1")).unwrap();
        formulas.put(Formula::with_code("B", "C * 3")).unwrap();

        assert!(formulas.calculate_all(&mut params));
        assert_eq!(params.get("B").unwrap().value_si(), 6.0);
        assert_eq!(params.get("A").unwrap().value_si(), 7.0);
    }

    #[test]
    fn test_draft_isolation_and_commit() {
        let mut params = params_ab();
        let mut formulas = Formulas::new();

        let mut draft = FormulaDraft::new(params.get("B").unwrap(), &formulas);
        assert!(!draft.has_formula());

        draft.add_formula();
        draft.set_code("A * 10");
        assert!(draft.recalculate(&params, &formulas));
        assert_eq!(draft.value_si(), 10.0);

        // Live objects untouched
        assert_eq!(params.get("B").unwrap().value_si(), 2.0);
        assert!(formulas.get("B").is_none());

        draft.apply(&mut formulas, &mut params).unwrap();
        assert_eq!(params.get("B").unwrap().value_si(), 10.0);
        assert_eq!(formulas.get("B").unwrap().code(), "A * 10");
    }

    #[test]
    fn test_draft_remove_formula() {
        let mut params = params_ab();
        let mut formulas = Formulas::new();
        formulas.put(Formula::with_code("B", "A + 1")).unwrap();

        let mut draft = FormulaDraft::new(params.get("B").unwrap(), &formulas);
        assert!(draft.has_formula());
        assert_eq!(draft.code(), "A + 1");

        draft.remove_formula();
        draft.set_value(Value::none(42.0)).unwrap();
        draft.apply(&mut formulas, &mut params).unwrap();

        assert!(formulas.get("B").is_none());
        assert_eq!(params.get("B").unwrap().value_si(), 42.0);
    }

    #[test]
    fn test_formula_serde_round_trip() {
        let formula = Formula::with_code("L2", "2*L + 3");
        let json = serde_json::to_string(&formula).unwrap();
        assert!(json.contains("\"target\":\"L2\""));
        assert!(json.contains("\"code\":\"2*L + 3\""));

        let back: Formula = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target(), "L2");
        assert_eq!(back.code(), "2*L + 3");
        assert!(back.ok());
    }

    #[test]
    fn test_draft_cycle_preview() {
        let params = params_ab();
        let mut formulas = Formulas::new();
        formulas.put(Formula::with_code("A", "B + 1")).unwrap();

        let mut draft = FormulaDraft::new(params.get("B").unwrap(), &formulas);
        draft.add_formula();
        draft.set_code("A + 1");
        assert!(!draft.recalculate(&params, &formulas));
        assert!(draft.status().contains("circular"));
        // Shadow value survives the failed evaluation
        assert_eq!(draft.value_si(), 2.0);
    }
}
