//! # Parameter System
//!
//! Named, unit-typed parameter values, the ordered collections that hold
//! them, and the formula machinery that lets one parameter be computed from
//! others.
//!
//! ## Core Components
//!
//! - [`Parameter`]: a named scalar with a physical dimension, stored in SI
//! - [`Parameters`]: an ordered collection with unique aliases
//! - [`Expression`]: parse and evaluate arithmetic over parameter aliases
//! - [`Formula`] and [`Formulas`]: expression-backed parameter values with
//!   dependency tracking and cycle rejection
//! - [`FormulaDraft`]: shadow-edit protocol: preview without mutating the
//!   live parameter until commit
//!
//! ## Example Usage
//!
//! ```rust
//! use paraxial_rs::parameters::{Formula, Formulas, Parameter, Parameters};
//! use paraxial_rs::units::{Dim, Unit, Value};
//!
//! let mut params = Parameters::new();
//! params.add(Parameter::new(Dim::Linear, "L")).unwrap();
//! params.add(Parameter::new(Dim::Linear, "L2")).unwrap();
//! params.set_value("L", Value::new(5.0, Unit::M)).unwrap();
//!
//! let mut formulas = Formulas::new();
//! formulas.put(Formula::with_code("L2", "2*L + 3")).unwrap();
//! formulas.calculate("L2", &mut params);
//!
//! assert_eq!(params.get("L2").unwrap().value_si(), 13.0);
//! ```

pub mod expression;
pub mod formula;
pub mod parameter;
pub mod parameters;

// Re-export key types
pub use expression::{BinaryOp, EvaluationContext, Expression, ExpressionError, UnaryOp};
pub use formula::{Formula, FormulaDraft, FormulaError, FormulaStatus, Formulas};
pub use parameter::{Parameter, ParameterError};
pub use parameters::Parameters;
