//! Static per-type descriptors for the element catalog
//!
//! Every concrete element type is described by one [`TypeDescriptor`]: type
//! tag, display name, label prefix, preferred parameter editor, capability
//! bits, and the parameter set the element is constructed with. Dispatch is
//! data-driven; there is no runtime type inspection anywhere in the engine.

use crate::units::{Unit, Value};
use bitflags::bitflags;

bitflags! {
    /// Element capability bits, fixed per concrete type at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ElementOptions: u32 {
        /// The element has distinct matrices for forward and back
        /// propagation. Without this bit the back matrices equal the
        /// forward pair after every recompute.
        const ASYMMETRICAL = 0x01;

        /// The element changes the wavefront, so per-element analysis
        /// should sample the beam both before and after it. Range-like and
        /// interface elements are handled separately and do not carry it.
        const CHANGES_WAVEFRONT = 0x02;
    }
}

/// Preferred parameter editor for an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    /// No editable parameters.
    None,

    /// Plain parameter list.
    List,

    /// ABCD component grid.
    Abcd,
}

/// Specification of one constructed-in parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub alias: &'static str,
    pub description: &'static str,
    pub default: Value,
}

/// Static descriptor record for a concrete element type.
#[derive(Debug)]
pub struct TypeDescriptor {
    /// Stable identification tag, used for persistence.
    pub tag: &'static str,

    /// Human-friendly type name.
    pub name: &'static str,

    /// Default prefix for generated element labels.
    pub label_prefix: &'static str,

    pub editor: EditorKind,
    pub options: ElementOptions,
    pub params: &'static [ParamSpec],
}

const MM_100: Value = Value {
    magnitude: 100.0,
    unit: Unit::Mm,
};
const DEG_0: Value = Value {
    magnitude: 0.0,
    unit: Unit::Deg,
};
const NONE_1: Value = Value {
    magnitude: 1.0,
    unit: Unit::None,
};
const NONE_0: Value = Value {
    magnitude: 0.0,
    unit: Unit::None,
};

const P_LENGTH: ParamSpec = ParamSpec {
    alias: "L",
    description: "Length",
    default: MM_100,
};
const P_IOR: ParamSpec = ParamSpec {
    alias: "n",
    description: "Index of refraction",
    default: NONE_1,
};
const P_RADIUS: ParamSpec = ParamSpec {
    alias: "R",
    description: "Radius of curvature",
    default: MM_100,
};
const P_FOCAL: ParamSpec = ParamSpec {
    alias: "F",
    description: "Focal length",
    default: MM_100,
};
const P_ALPHA: ParamSpec = ParamSpec {
    alias: "Alpha",
    description: "Angle of incidence",
    default: DEG_0,
};
const P_IOR1: ParamSpec = ParamSpec {
    alias: "n1",
    description: "Index of refraction before",
    default: NONE_1,
};
const P_IOR2: ParamSpec = ParamSpec {
    alias: "n2",
    description: "Index of refraction after",
    default: Value {
        magnitude: 1.5,
        unit: Unit::None,
    },
};
const P_APERTURE: ParamSpec = ParamSpec {
    alias: "a",
    description: "Aperture radius",
    default: Value {
        magnitude: 1.0,
        unit: Unit::Mm,
    },
};

const CUSTOM_MATRIX_PARAMS: &[ParamSpec] = &[
    ParamSpec { alias: "At", description: "A (tangential)", default: NONE_1 },
    ParamSpec { alias: "Bt", description: "B (tangential)", default: NONE_0 },
    ParamSpec { alias: "Ct", description: "C (tangential)", default: NONE_0 },
    ParamSpec { alias: "Dt", description: "D (tangential)", default: NONE_1 },
    ParamSpec { alias: "As", description: "A (sagittal)", default: NONE_1 },
    ParamSpec { alias: "Bs", description: "B (sagittal)", default: NONE_0 },
    ParamSpec { alias: "Cs", description: "C (sagittal)", default: NONE_0 },
    ParamSpec { alias: "Ds", description: "D (sagittal)", default: NONE_1 },
];

/// The closed set of concrete element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Point,
    FlatMirror,
    CurveMirror,
    ThinLens,
    CylinderLensT,
    CylinderLensS,
    EmptyRange,
    MediumRange,
    Plate,
    NormalInterface,
    SphericalInterface,
    CustomMatrix,
    GaussAperture,
    GaussApertureLens,
}

/// All concrete element types, in catalog order.
pub const ALL_ELEMENT_TYPES: &[ElementType] = &[
    ElementType::Point,
    ElementType::FlatMirror,
    ElementType::CurveMirror,
    ElementType::ThinLens,
    ElementType::CylinderLensT,
    ElementType::CylinderLensS,
    ElementType::EmptyRange,
    ElementType::MediumRange,
    ElementType::Plate,
    ElementType::NormalInterface,
    ElementType::SphericalInterface,
    ElementType::CustomMatrix,
    ElementType::GaussAperture,
    ElementType::GaussApertureLens,
];

static POINT: TypeDescriptor = TypeDescriptor {
    tag: "Point",
    name: "Point",
    label_prefix: "P",
    editor: EditorKind::None,
    options: ElementOptions::empty(),
    params: &[],
};

static FLAT_MIRROR: TypeDescriptor = TypeDescriptor {
    tag: "FlatMirror",
    name: "Flat mirror",
    label_prefix: "M",
    editor: EditorKind::None,
    options: ElementOptions::empty(),
    params: &[],
};

static CURVE_MIRROR: TypeDescriptor = TypeDescriptor {
    tag: "CurveMirror",
    name: "Spherical mirror",
    label_prefix: "M",
    editor: EditorKind::List,
    options: ElementOptions::CHANGES_WAVEFRONT,
    params: &[P_RADIUS, P_ALPHA],
};

static THIN_LENS: TypeDescriptor = TypeDescriptor {
    tag: "ThinLens",
    name: "Thin lens",
    label_prefix: "F",
    editor: EditorKind::List,
    options: ElementOptions::CHANGES_WAVEFRONT,
    params: &[P_FOCAL, P_ALPHA],
};

static CYLINDER_LENS_T: TypeDescriptor = TypeDescriptor {
    tag: "CylinderLensT",
    name: "Cylindrical tangential lens",
    label_prefix: "F",
    editor: EditorKind::List,
    options: ElementOptions::CHANGES_WAVEFRONT,
    params: &[P_FOCAL, P_ALPHA],
};

static CYLINDER_LENS_S: TypeDescriptor = TypeDescriptor {
    tag: "CylinderLensS",
    name: "Cylindrical sagittal lens",
    label_prefix: "F",
    editor: EditorKind::List,
    options: ElementOptions::CHANGES_WAVEFRONT,
    params: &[P_FOCAL, P_ALPHA],
};

static EMPTY_RANGE: TypeDescriptor = TypeDescriptor {
    tag: "EmptyRange",
    name: "Empty space",
    label_prefix: "L",
    editor: EditorKind::List,
    options: ElementOptions::empty(),
    params: &[P_LENGTH],
};

static MEDIUM_RANGE: TypeDescriptor = TypeDescriptor {
    tag: "MediumRange",
    name: "Space filled with medium",
    label_prefix: "L",
    editor: EditorKind::List,
    options: ElementOptions::empty(),
    params: &[P_LENGTH, P_IOR],
};

static PLATE: TypeDescriptor = TypeDescriptor {
    tag: "Plate",
    name: "Plate of matter",
    label_prefix: "G",
    editor: EditorKind::List,
    options: ElementOptions::empty(),
    params: &[P_LENGTH, P_IOR],
};

static NORMAL_INTERFACE: TypeDescriptor = TypeDescriptor {
    tag: "NormalInterface",
    name: "Normal interface",
    label_prefix: "s",
    editor: EditorKind::List,
    options: ElementOptions::ASYMMETRICAL,
    params: &[P_IOR1, P_IOR2],
};

static SPHERICAL_INTERFACE: TypeDescriptor = TypeDescriptor {
    tag: "SphericalInterface",
    name: "Spherical interface",
    label_prefix: "s",
    editor: EditorKind::List,
    options: ElementOptions::ASYMMETRICAL,
    params: &[P_IOR1, P_IOR2, P_RADIUS],
};

static CUSTOM_MATRIX: TypeDescriptor = TypeDescriptor {
    tag: "CustomMatrix",
    name: "Custom matrix",
    label_prefix: "C",
    editor: EditorKind::Abcd,
    options: ElementOptions::empty(),
    params: CUSTOM_MATRIX_PARAMS,
};

static GAUSS_APERTURE: TypeDescriptor = TypeDescriptor {
    tag: "GaussAperture",
    name: "Gaussian aperture",
    label_prefix: "A",
    editor: EditorKind::List,
    options: ElementOptions::empty(),
    params: &[P_APERTURE],
};

static GAUSS_APERTURE_LENS: TypeDescriptor = TypeDescriptor {
    tag: "GaussApertureLens",
    name: "Gaussian aperture with lens",
    label_prefix: "A",
    editor: EditorKind::List,
    options: ElementOptions::CHANGES_WAVEFRONT,
    params: &[P_APERTURE, P_FOCAL],
};

impl ElementType {
    /// The static descriptor record for this type.
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        match self {
            ElementType::Point => &POINT,
            ElementType::FlatMirror => &FLAT_MIRROR,
            ElementType::CurveMirror => &CURVE_MIRROR,
            ElementType::ThinLens => &THIN_LENS,
            ElementType::CylinderLensT => &CYLINDER_LENS_T,
            ElementType::CylinderLensS => &CYLINDER_LENS_S,
            ElementType::EmptyRange => &EMPTY_RANGE,
            ElementType::MediumRange => &MEDIUM_RANGE,
            ElementType::Plate => &PLATE,
            ElementType::NormalInterface => &NORMAL_INTERFACE,
            ElementType::SphericalInterface => &SPHERICAL_INTERFACE,
            ElementType::CustomMatrix => &CUSTOM_MATRIX,
            ElementType::GaussAperture => &GAUSS_APERTURE,
            ElementType::GaussApertureLens => &GAUSS_APERTURE_LENS,
        }
    }

    /// Stable identification tag of this type.
    pub fn tag(&self) -> &'static str {
        self.descriptor().tag
    }

    /// Look a type up by its tag.
    pub fn from_tag(tag: &str) -> Option<ElementType> {
        ALL_ELEMENT_TYPES.iter().copied().find(|t| t.tag() == tag)
    }

    /// Whether elements of this type have a length and support sub-range
    /// queries.
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            ElementType::EmptyRange | ElementType::MediumRange | ElementType::Plate
        )
    }

    /// Whether elements of this type separate two media.
    pub fn has_interface_iors(&self) -> bool {
        matches!(
            self,
            ElementType::NormalInterface | ElementType::SphericalInterface
        )
    }

    /// Whether the matrix of this type depends on the accumulated upstream
    /// transformation and an external beam model.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            ElementType::GaussAperture | ElementType::GaussApertureLens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for ty in ALL_ELEMENT_TYPES {
            assert_eq!(ElementType::from_tag(ty.tag()), Some(*ty));
        }
        assert_eq!(ElementType::from_tag("ElemWobble"), None);
    }

    #[test]
    fn test_capability_partition() {
        for ty in ALL_ELEMENT_TYPES {
            // A type is at most one of: range, interface, dynamic
            let caps = [ty.has_length(), ty.has_interface_iors(), ty.is_dynamic()];
            assert!(caps.iter().filter(|&&c| c).count() <= 1, "{:?}", ty);
        }
    }

    #[test]
    fn test_descriptor_params() {
        let d = ElementType::MediumRange.descriptor();
        assert_eq!(d.params.len(), 2);
        assert_eq!(d.params[0].alias, "L");
        assert_eq!(d.params[1].alias, "n");

        assert!(ElementType::Point.descriptor().params.is_empty());
        assert_eq!(ElementType::CustomMatrix.descriptor().params.len(), 8);
        assert_eq!(ElementType::CustomMatrix.descriptor().editor, EditorKind::Abcd);
    }

    #[test]
    fn test_options_are_static() {
        assert!(ElementType::NormalInterface
            .descriptor()
            .options
            .contains(ElementOptions::ASYMMETRICAL));
        assert!(ElementType::CurveMirror
            .descriptor()
            .options
            .contains(ElementOptions::CHANGES_WAVEFRONT));
        assert!(ElementType::EmptyRange.descriptor().options.is_empty());
    }
}
