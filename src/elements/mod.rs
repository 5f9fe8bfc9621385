//! # Element Model
//!
//! The polymorphic optical element model: a closed catalog of concrete
//! types described by static descriptors, a common [`Element`] carrier with
//! the matrix recomputation protocol (including lock/unlock batching and
//! owner notification), and the beam-dependent machinery for dynamic
//! elements.

pub mod descriptor;
pub mod dynamic;
pub mod element;

// Re-export key types
pub use descriptor::{
    EditorKind, ElementOptions, ElementType, ParamSpec, TypeDescriptor, ALL_ELEMENT_TYPES,
};
pub use dynamic::{BeamCalculator, BeamState, DynamicContext, GaussCalculator};
pub use element::{Element, ElementLock, ElementOwner, ElementSnapshot};
