//! # paraxial-rs
//!
//! `paraxial-rs` is an ABCD ray-matrix engine for optical resonator
//! modeling: a polymorphic element model with per-plane (tangential and
//! sagittal) transfer matrices, driven by a unit-typed parameter system
//! with formula-backed values.
//!
//! The library provides:
//! - A closed catalog of element types (mirrors, lenses, ranges,
//!   interfaces, beam-dependent apertures) with data-driven descriptors
//! - Incremental matrix recomputation with lock/unlock batching and owner
//!   notification
//! - Named parameters with SI-canonical storage and unit conversion
//! - An expression engine binding formulas to parameters, with dependency
//!   tracking and cycle rejection
//!
//! ## Basic Usage
//!
//! ```
//! use paraxial_rs::elements::ElementType;
//! use paraxial_rs::units::{Unit, Value};
//!
//! let mut lens = ElementType::ThinLens.create();
//! lens.set_param_value("F", Value::new(50.0, Unit::Mm)).unwrap();
//! assert_eq!(lens.mt().c(), -1.0 / 0.05);
//! ```

// Public modules
pub mod error;

pub mod matrix;
pub mod units;

// Parameter system
pub mod parameters;

// Element model
pub mod elements;

// Re-exports for convenience
pub use error::{ParaxialError, Result};

pub use elements::{Element, ElementType};
pub use matrix::RayMatrix;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
