//! Base element model and the matrix recomputation protocol
//!
//! An [`Element`] owns an ordered set of parameters and four ray matrices:
//! Mt/Ms for forward propagation and Mt_inv/Ms_inv for back propagation.
//! Back propagation only matters in standing-wave schemas where the beam
//! travels every element (but the endings) twice:
//!
//! ```text
//!        \|       forward propagation             |/
//!    end \| ====================================> |/ end
//! mirror \|-----[//]------[\]----()----[\\]------ |/ mirror
//!        \| <==================================== |/
//!        \|         back propagation              |/
//! ```
//!
//! Most elements are symmetrical and the back matrices equal the forward
//! pair; the ones that differ (interface elements) carry the
//! `ASYMMETRICAL` option.
//!
//! Parameter writes go through the element, which recomputes its matrices
//! and notifies its owner, unless the element is locked, in which case the
//! whole batch collapses into the single recompute at `unlock(true)`.

use crate::elements::descriptor::{ElementOptions, ElementType};
use crate::matrix::RayMatrix;
use crate::parameters::{Parameter, ParameterError, Parameters};
use crate::units::Value;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

static NEXT_ELEMENT_ID: AtomicU32 = AtomicU32::new(1);

/// Contract for objects owning optical elements (a schema/sequence).
///
/// The engine calls `element_changed` after every unlocked matrix
/// recomputation; `index_of` and `count` let elements derive their position
/// in the owning sequence.
pub trait ElementOwner {
    fn element_changed(&self, _elem: &Element) {}

    fn index_of(&self, _elem: &Element) -> Option<usize> {
        None
    }

    fn count(&self) -> usize {
        0
    }
}

/// Split matrices and sub-range position for elements with length.
#[derive(Debug, Default)]
struct RangeState {
    sub_range_si: f64,
    mt1: RayMatrix,
    ms1: RayMatrix,
    mt2: RayMatrix,
    ms2: RayMatrix,
}

/// Dynamic matrix pair for elements whose matrix depends on the beam.
#[derive(Debug, Default)]
pub(crate) struct DynamicState {
    pub(crate) mt_dyn: RayMatrix,
    pub(crate) ms_dyn: RayMatrix,
}

/// An optical element: a typed node owning parameters and ray matrices.
#[derive(Debug)]
pub struct Element {
    id: u32,
    kind: ElementType,
    label: String,
    title: String,
    params: Parameters,
    mt: RayMatrix,
    ms: RayMatrix,
    mt_inv: RayMatrix,
    ms_inv: RayMatrix,
    range: Option<RangeState>,
    dynamic: Option<DynamicState>,
    disabled: bool,
    lock_depth: u32,
    options: ElementOptions,
    owner: Option<Weak<dyn ElementOwner>>,
}

impl ElementType {
    /// Factory: create a new element of this type with its default
    /// parameters wired in and matrices computed.
    pub fn create(&self) -> Element {
        Element::new(*self)
    }
}

impl Element {
    /// Create a new element of the given type.
    ///
    /// Parameters come from the type descriptor with their default values;
    /// capability options are fixed here and never change afterwards.
    pub fn new(kind: ElementType) -> Self {
        let descriptor = kind.descriptor();

        let mut params = Parameters::new();
        for spec in descriptor.params {
            let mut param = Parameter::with_description(
                spec.default.unit.dim(),
                spec.alias,
                spec.description,
            );
            // Descriptor defaults are well-formed by construction
            let _ = param.set_value(spec.default);
            let _ = params.add(param);
        }

        let mut elem = Self {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            label: String::new(),
            title: String::new(),
            params,
            mt: RayMatrix::identity(),
            ms: RayMatrix::identity(),
            mt_inv: RayMatrix::identity(),
            ms_inv: RayMatrix::identity(),
            range: kind.has_length().then(RangeState::default),
            dynamic: kind.is_dynamic().then(DynamicState::default),
            disabled: false,
            lock_depth: 0,
            options: descriptor.options,
            owner: None,
        };
        elem.calc_matrix();
        if elem.kind.has_length() {
            elem.set_sub_range_si(0.0);
        }
        elem
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The concrete type of this element.
    pub fn kind(&self) -> ElementType {
        self.kind
    }

    /// Stable type tag, e.g. `"CurveMirror"`.
    pub fn type_tag(&self) -> &'static str {
        self.kind.tag()
    }

    // --- owner ---

    pub fn owner(&self) -> Option<Rc<dyn ElementOwner>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    /// Attach the element to an owner (or detach with `None`). The
    /// back-reference is non-owning; a dropped owner silently ends
    /// notification.
    pub fn set_owner(&mut self, owner: Option<Weak<dyn ElementOwner>>) {
        self.owner = owner;
    }

    // --- label and title ---

    /// Short identifier of the element, like a variable name: "M1", "L_f".
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// User title of the element, e.g. "Output coupler".
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// The label, or a position marker like "#2" when the label is empty
    /// and the element belongs to a sequence.
    pub fn display_label(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        if let Some(owner) = self.owner() {
            if let Some(index) = owner.index_of(self) {
                return format!("#{}", index + 1);
            }
        }
        self.kind.descriptor().label_prefix.to_string()
    }

    /// The title, or `display_label()` when the title is empty.
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        self.display_label()
    }

    /// "label (title)", or whichever of the two is set, or position and
    /// type name when both are empty.
    pub fn display_label_title(&self) -> String {
        match (self.label.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} ({})", self.label, self.title),
            (false, true) => self.label.clone(),
            (true, false) => self.title.clone(),
            (true, true) => {
                format!("{} {}", self.display_label(), self.kind.descriptor().name)
            }
        }
    }

    // --- parameters ---

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn param(&self, alias: &str) -> Option<&Parameter> {
        self.params.get(alias)
    }

    /// Write a parameter value and run the change chain: the write completes
    /// first, then the matrices recompute and the owner is notified (both
    /// suppressed while locked).
    pub fn set_param_value(&mut self, alias: &str, value: Value) -> Result<(), ParameterError> {
        self.params.set_value(alias, value)?;
        self.calc_matrix();
        Ok(())
    }

    /// Like [`Element::set_param_value`], but writing the SI magnitude
    /// directly. This is the entry point for formula-driven writes.
    pub fn set_param_si(&mut self, alias: &str, value_si: f64) -> Result<(), ParameterError> {
        self.params.set_si(alias, value_si)?;
        self.calc_matrix();
        Ok(())
    }

    pub(crate) fn param_si(&self, alias: &str) -> f64 {
        self.params.get(alias).map(|p| p.value_si()).unwrap_or(0.0)
    }

    // --- matrices ---

    pub fn mt(&self) -> &RayMatrix {
        &self.mt
    }

    pub fn ms(&self) -> &RayMatrix {
        &self.ms
    }

    pub fn mt_inv(&self) -> &RayMatrix {
        &self.mt_inv
    }

    pub fn ms_inv(&self) -> &RayMatrix {
        &self.ms_inv
    }

    /// Recompute the matrices from the current parameter values and notify
    /// the owner. No-op while locked.
    pub fn calc_matrix(&mut self) {
        if self.lock_depth > 0 {
            return;
        }
        trace!(target: "paraxial::element", elem = %self.type_tag(), id = self.id, "recompute matrices");
        self.build_matrices();
        if !self.options.contains(ElementOptions::ASYMMETRICAL) {
            self.mt_inv = self.mt;
            self.ms_inv = self.ms;
        }
        self.notify_owner();
    }

    fn notify_owner(&self) {
        if let Some(owner) = self.owner() {
            owner.element_changed(self);
        }
    }

    // --- disabling ---

    /// Disabled elements are excluded from sequence-level passes by their
    /// owner, but keep valid matrices and still recompute when asked.
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled == disabled {
            return;
        }
        self.disabled = disabled;
        self.notify_owner();
    }

    // --- locking ---

    /// Lock the element. While locked, parameter changes neither rebuild
    /// the matrices nor notify the owner. Locks nest; see [`Element::unlock`].
    pub fn lock(&mut self) {
        self.lock_depth += 1;
    }

    /// Release one lock level. When the outermost lock releases with
    /// `recalc` set, exactly one consolidated [`Element::calc_matrix`] runs,
    /// collapsing any number of locked-scope edits into one recomputation
    /// and one owner notification.
    pub fn unlock(&mut self, recalc: bool) {
        self.lock_depth = self.lock_depth.saturating_sub(1);
        if self.lock_depth == 0 && recalc {
            self.calc_matrix();
        }
    }

    pub fn locked(&self) -> bool {
        self.lock_depth > 0
    }

    /// RAII lock scope: the returned guard keeps the element locked and
    /// releases it (recalculating when `recalc` is set) on drop.
    pub fn lock_scope(&mut self, recalc: bool) -> ElementLock<'_> {
        ElementLock::new(self, recalc)
    }

    // --- options ---

    pub fn has_option(&self, option: ElementOptions) -> bool {
        self.options.contains(option)
    }

    // --- range API ---

    /// Physical length in meters. Zero for elements without length.
    pub fn length_si(&self) -> f64 {
        self.param_si("L")
    }

    /// Index of refraction of the element's medium (1 when absent).
    pub fn ior(&self) -> f64 {
        self.params.get("n").map(|p| p.value_si()).unwrap_or(1.0)
    }

    /// Length along the optical axis. Equals the physical length for every
    /// type in the current catalog; folded elements would override this.
    pub fn axis_length_si(&self) -> f64 {
        self.length_si()
    }

    /// Optical path: axis length times the index of refraction.
    pub fn optical_path_si(&self) -> f64 {
        self.axis_length_si() * self.ior()
    }

    /// Current sub-range position, for elements with length.
    pub fn sub_range_si(&self) -> Option<f64> {
        self.range.as_ref().map(|r| r.sub_range_si)
    }

    /// Matrix of the part before the sub-range point, tangential plane.
    pub fn mt1(&self) -> Option<&RayMatrix> {
        self.range.as_ref().map(|r| &r.mt1)
    }

    pub fn ms1(&self) -> Option<&RayMatrix> {
        self.range.as_ref().map(|r| &r.ms1)
    }

    /// Matrix of the part beyond the sub-range point, tangential plane.
    pub fn mt2(&self) -> Option<&RayMatrix> {
        self.range.as_ref().map(|r| &r.mt2)
    }

    pub fn ms2(&self) -> Option<&RayMatrix> {
        self.range.as_ref().map(|r| &r.ms2)
    }

    /// Split the element at a point along its axis, recomputing the
    /// intermediate matrix pairs so that `M2 * M1` reproduces the full
    /// matrix. The position is clamped into `[0, length]`. No-op for
    /// elements without length.
    pub fn set_sub_range_si(&mut self, value: f64) {
        if self.range.is_none() {
            return;
        }
        let length = self.length_si();
        let pos = value.clamp(0.0, length.max(0.0));
        let ior = self.ior();

        let (m1, m2) = match self.kind {
            // Free propagation splits into two free propagations
            ElementType::EmptyRange | ElementType::MediumRange => (
                RayMatrix::new(1.0, pos, 0.0, 1.0),
                RayMatrix::new(1.0, length - pos, 0.0, 1.0),
            ),
            // The entry interface folds into the first part and the exit
            // interface into the second
            ElementType::Plate => {
                if ior == 0.0 {
                    (RayMatrix::identity(), RayMatrix::identity())
                } else {
                    (
                        RayMatrix::new(1.0, pos / ior, 0.0, 1.0 / ior),
                        RayMatrix::new(1.0, length - pos, 0.0, ior),
                    )
                }
            }
            _ => (RayMatrix::identity(), RayMatrix::identity()),
        };

        if let Some(range) = self.range.as_mut() {
            range.sub_range_si = pos;
            range.mt1 = m1;
            range.ms1 = m1;
            range.mt2 = m2;
            range.ms2 = m2;
        }
    }

    // --- interface API ---

    /// IOR of the medium before an interface element (1 when absent).
    pub fn ior1(&self) -> f64 {
        self.params.get("n1").map(|p| p.value_si()).unwrap_or(1.0)
    }

    /// IOR of the medium after an interface element (1 when absent).
    pub fn ior2(&self) -> f64 {
        self.params.get("n2").map(|p| p.value_si()).unwrap_or(1.0)
    }

    // --- dynamic API (matrix building lives in `dynamic.rs`) ---

    pub(crate) fn dynamic_state(&mut self) -> Option<&mut DynamicState> {
        self.dynamic.as_mut()
    }

    /// Dynamic-pair tangential matrix, for dynamic elements.
    pub fn mt_dyn(&self) -> Option<&RayMatrix> {
        self.dynamic.as_ref().map(|d| &d.mt_dyn)
    }

    /// Dynamic-pair sagittal matrix, for dynamic elements.
    pub fn ms_dyn(&self) -> Option<&RayMatrix> {
        self.dynamic.as_ref().map(|d| &d.ms_dyn)
    }

    // --- matrix building ---

    fn build_matrices(&mut self) {
        let (mt, ms) = match self.kind {
            ElementType::Point | ElementType::FlatMirror => {
                (RayMatrix::identity(), RayMatrix::identity())
            }

            ElementType::CurveMirror => {
                let r = self.param_si("R");
                let cos_a = self.param_si("Alpha").cos();
                if r == 0.0 || cos_a == 0.0 {
                    (RayMatrix::identity(), RayMatrix::identity())
                } else {
                    (
                        RayMatrix::new(1.0, 0.0, -2.0 / (r * cos_a), 1.0),
                        RayMatrix::new(1.0, 0.0, -2.0 * cos_a / r, 1.0),
                    )
                }
            }

            ElementType::ThinLens => {
                let f = self.param_si("F");
                let cos_a = self.param_si("Alpha").cos();
                if f == 0.0 || cos_a == 0.0 {
                    (RayMatrix::identity(), RayMatrix::identity())
                } else {
                    (
                        RayMatrix::new(1.0, 0.0, -1.0 / (f * cos_a), 1.0),
                        RayMatrix::new(1.0, 0.0, -cos_a / f, 1.0),
                    )
                }
            }

            ElementType::CylinderLensT | ElementType::CylinderLensS => {
                let f = self.param_si("F");
                let cos_a = self.param_si("Alpha").cos();
                let lens_t = if f == 0.0 || cos_a == 0.0 {
                    RayMatrix::identity()
                } else {
                    RayMatrix::new(1.0, 0.0, -1.0 / (f * cos_a), 1.0)
                };
                let lens_s = if f == 0.0 || cos_a == 0.0 {
                    RayMatrix::identity()
                } else {
                    RayMatrix::new(1.0, 0.0, -cos_a / f, 1.0)
                };
                if self.kind == ElementType::CylinderLensT {
                    (lens_t, RayMatrix::identity())
                } else {
                    (RayMatrix::identity(), lens_s)
                }
            }

            ElementType::EmptyRange | ElementType::MediumRange => {
                let l = self.param_si("L");
                let m = RayMatrix::new(1.0, l, 0.0, 1.0);
                (m, m)
            }

            ElementType::Plate => {
                let l = self.param_si("L");
                let n = self.param_si("n");
                let m = if n == 0.0 {
                    RayMatrix::identity()
                } else {
                    RayMatrix::new(1.0, l / n, 0.0, 1.0)
                };
                (m, m)
            }

            ElementType::NormalInterface => {
                let n1 = self.param_si("n1");
                let n2 = self.param_si("n2");
                let forward = if n2 == 0.0 {
                    RayMatrix::identity()
                } else {
                    RayMatrix::new(1.0, 0.0, 0.0, n1 / n2)
                };
                let back = if n1 == 0.0 {
                    RayMatrix::identity()
                } else {
                    RayMatrix::new(1.0, 0.0, 0.0, n2 / n1)
                };
                self.mt_inv = back;
                self.ms_inv = back;
                (forward, forward)
            }

            ElementType::SphericalInterface => {
                let n1 = self.param_si("n1");
                let n2 = self.param_si("n2");
                let r = self.param_si("R");
                // A zero radius degenerates to the flat interface
                let forward = if n2 == 0.0 {
                    RayMatrix::identity()
                } else {
                    let c = if r == 0.0 { 0.0 } else { (n1 - n2) / (r * n2) };
                    RayMatrix::new(1.0, 0.0, c, n1 / n2)
                };
                // Back propagation swaps the media and flips the radius sign
                let back = if n1 == 0.0 {
                    RayMatrix::identity()
                } else {
                    let c = if r == 0.0 { 0.0 } else { (n1 - n2) / (r * n1) };
                    RayMatrix::new(1.0, 0.0, c, n2 / n1)
                };
                self.mt_inv = back;
                self.ms_inv = back;
                (forward, forward)
            }

            ElementType::CustomMatrix => (
                RayMatrix::new(
                    self.param_si("At"),
                    self.param_si("Bt"),
                    self.param_si("Ct"),
                    self.param_si("Dt"),
                ),
                RayMatrix::new(
                    self.param_si("As"),
                    self.param_si("Bs"),
                    self.param_si("Cs"),
                    self.param_si("Ds"),
                ),
            ),

            // The static pair of a dynamic element has no geometric effect;
            // the beam-dependent pair is built by `calc_dynamic_matrix`
            ElementType::GaussAperture | ElementType::GaussApertureLens => {
                (RayMatrix::identity(), RayMatrix::identity())
            }
        };

        self.mt = mt;
        self.ms = ms;
    }

    // --- persistence ---

    /// Persistent snapshot of this element.
    pub fn snapshot(&self) -> ElementSnapshot {
        ElementSnapshot {
            type_tag: self.type_tag().to_string(),
            label: self.label.clone(),
            title: self.title.clone(),
            disabled: self.disabled,
            params: self.params.clone(),
            sub_range: self.sub_range_si(),
        }
    }

    /// Apply a snapshot to this element. Parameter writes happen under a
    /// lock, so the element recomputes exactly once at the end.
    pub fn restore(&mut self, snapshot: &ElementSnapshot) -> crate::error::Result<()> {
        if snapshot.type_tag != self.type_tag() {
            return Err(crate::error::ParaxialError::InvalidState(format!(
                "snapshot of type '{}' cannot restore a '{}' element",
                snapshot.type_tag,
                self.type_tag()
            )));
        }
        self.label = snapshot.label.clone();
        self.title = snapshot.title.clone();
        self.disabled = snapshot.disabled;

        self.lock();
        let mut result = Ok(());
        for param in snapshot.params.iter() {
            if let Err(e) = self.params.set_value(param.alias(), param.value()) {
                result = Err(e.into());
                break;
            }
        }
        self.unlock(true);

        if let Some(pos) = snapshot.sub_range {
            self.set_sub_range_si(pos);
        }
        result
    }

    /// Recreate an element from a snapshot.
    pub fn from_snapshot(snapshot: &ElementSnapshot) -> crate::error::Result<Element> {
        let kind = ElementType::from_tag(&snapshot.type_tag).ok_or_else(|| {
            crate::error::ParaxialError::UnknownElementType(snapshot.type_tag.clone())
        })?;
        let mut elem = kind.create();
        elem.restore(snapshot)?;
        Ok(elem)
    }
}

/// What an element exposes to the external serializer: type tag, label,
/// title, disabled flag, ordered parameter values, and the sub-range
/// position where applicable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub disabled: bool,
    pub params: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_range: Option<f64>,
}

/// RAII guard produced by [`Element::lock_scope`]. Keeps the element locked
/// for the guard's lifetime and unlocks on drop.
pub struct ElementLock<'a> {
    elem: &'a mut Element,
    recalc: bool,
}

impl<'a> ElementLock<'a> {
    pub fn new(elem: &'a mut Element, recalc: bool) -> Self {
        elem.lock();
        Self { elem, recalc }
    }
}

impl Deref for ElementLock<'_> {
    type Target = Element;

    fn deref(&self) -> &Element {
        self.elem
    }
}

impl DerefMut for ElementLock<'_> {
    fn deref_mut(&mut self) -> &mut Element {
        self.elem
    }
}

impl Drop for ElementLock<'_> {
    fn drop(&mut self) {
        self.elem.unlock(self.recalc);
    }
}
